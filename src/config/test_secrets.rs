use crate::config::read_env_or_file;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_read_env_or_file() {
    // Case 1: Direct Env Var
    env::set_var("RANGE_BOT_TEST_SECRET", "direct_value");
    assert_eq!(
        read_env_or_file("RANGE_BOT_TEST_SECRET").unwrap(),
        "direct_value"
    );
    env::remove_var("RANGE_BOT_TEST_SECRET");

    // Case 2: File Env Var, surrounding whitespace trimmed
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "  file_value").unwrap();
    let path = file.path().to_str().unwrap();

    env::set_var("RANGE_BOT_TEST_SECRET_FILE", path);
    assert_eq!(
        read_env_or_file("RANGE_BOT_TEST_SECRET").unwrap(),
        "file_value"
    );

    // Case 3: File var pointing nowhere
    env::set_var("RANGE_BOT_TEST_SECRET_FILE", "/nonexistent/secret");
    assert!(read_env_or_file("RANGE_BOT_TEST_SECRET").is_err());
    env::remove_var("RANGE_BOT_TEST_SECRET_FILE");

    // Case 4: Missing both
    assert!(read_env_or_file("RANGE_BOT_TEST_SECRET").is_err());
}
