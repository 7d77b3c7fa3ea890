//! Helpers shared by the oracle, the orchestrator and the paper exchange.

use crate::error::BotError;
use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Bounds a collaborator call. Expiry surfaces as `BotError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BotError::Timeout {
            operation: operation.to_string(),
            limit,
        }
        .into()),
    }
}

/// Maps a collaborator failure into a typed error. Timeouts keep their own
/// variant; everything else is wrapped by `wrap` with the full error chain.
pub fn into_bot_error(err: anyhow::Error, wrap: impl FnOnce(String) -> BotError) -> BotError {
    match err.downcast::<BotError>() {
        Ok(timeout @ BotError::Timeout { .. }) => timeout,
        Ok(other) => wrap(other.to_string()),
        Err(err) => wrap(format!("{:#}", err)),
    }
}

/// Parse "BASE/QUOTE" into (base, quote).
pub fn parse_pair_symbols(pair: &str) -> (String, String) {
    match pair.split_once('/') {
        Some((base, quote)) => (base.trim().to_string(), quote.trim().to_string()),
        None => (pair.trim().to_string(), "QUOTE".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let res: Result<()> = with_timeout(Duration::from_millis(10), "mint", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = into_bot_error(res.unwrap_err(), |reason| BotError::Oracle { reason });
        assert!(matches!(err, BotError::Timeout { ref operation, .. } if operation == "mint"));
        // Sub-second limits keep their precision
        assert_eq!(err.to_string(), "mint timed out after 10ms");
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let ok = with_timeout(Duration::from_secs(1), "read", async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let failed: Result<u8> =
            with_timeout(Duration::from_secs(1), "read", async { Err(anyhow!("rpc down")) }).await;
        let err = into_bot_error(failed.unwrap_err(), |reason| BotError::SwapFailed { reason });
        assert_eq!(err.to_string(), "swap failed: rpc down");
    }

    #[test]
    fn test_parse_pair_symbols() {
        assert_eq!(
            parse_pair_symbols("WETH/USDC"),
            ("WETH".to_string(), "USDC".to_string())
        );
        assert_eq!(
            parse_pair_symbols("WETH"),
            ("WETH".to_string(), "QUOTE".to_string())
        );
    }
}
