use crate::engine::traits::PersistenceSink;
use crate::model::AuditEvent;
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::{create_dir_all, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One CSV row. Columns that do not apply to an event stay empty.
#[derive(Debug, Serialize, Clone, Default)]
pub struct AuditRecord {
    pub timestamp: String,
    pub symbol: String,
    pub event: String, // PRICE, OPEN, CLOSE, FEES, SWAP, FAIL
    pub slot: Option<String>,
    pub token_id: Option<String>,
    pub tick: Option<i32>,
    pub tick_lower: Option<i32>,
    pub tick_upper: Option<i32>,
    pub price: Option<f64>,
    pub amount0: Option<String>,
    pub amount1: Option<String>,
    pub notes: Option<String>,
}

/// Append-only `positions.csv` audit trail.
#[derive(Clone)]
pub struct PositionAuditLogger {
    symbol: String,
    writer: Arc<Mutex<Writer<std::fs::File>>>,
}

impl PositionAuditLogger {
    pub fn new(log_dir: &str, symbol: &str) -> Result<Self> {
        let dir = Path::new(log_dir);
        create_dir_all(dir).context("Failed to create log directory")?;

        let file_path = dir.join("positions.csv");
        let file_exists = file_path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .context("Failed to open positions.csv")?;

        let writer = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);

        Ok(Self {
            symbol: symbol.to_string(),
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub fn log(&self, record: AuditRecord) {
        if let Ok(mut w) = self.writer.lock() {
            if let Err(e) = w.serialize(record) {
                tracing::warn!("Failed to write position audit log: {}", e);
            } else {
                let _ = w.flush();
            }
        }
    }

    fn to_record(&self, event: &AuditEvent) -> AuditRecord {
        let base = AuditRecord {
            timestamp: Local::now().to_rfc3339(),
            symbol: self.symbol.clone(),
            ..AuditRecord::default()
        };
        match event {
            AuditEvent::PriceSample(sample) => AuditRecord {
                event: "PRICE".to_string(),
                tick: Some(sample.tick),
                price: Some(sample.price),
                ..base
            },
            AuditEvent::PositionOpened { slot, position } => AuditRecord {
                event: "OPEN".to_string(),
                slot: Some(slot.to_string()),
                token_id: Some(position.token_id.to_string()),
                tick_lower: Some(position.tick_lower),
                tick_upper: Some(position.tick_upper),
                amount0: Some(position.principal_amount0.to_string()),
                amount1: Some(position.principal_amount1.to_string()),
                notes: Some(format!("liquidity {}", position.liquidity)),
                ..base
            },
            AuditEvent::PositionClosed {
                slot,
                token_id,
                amount0,
                amount1,
            } => AuditRecord {
                event: "CLOSE".to_string(),
                slot: Some(slot.to_string()),
                token_id: Some(token_id.to_string()),
                amount0: Some(amount0.to_string()),
                amount1: Some(amount1.to_string()),
                ..base
            },
            AuditEvent::FeesCollected {
                slot,
                token_id,
                fees0,
                fees1,
            } => AuditRecord {
                event: "FEES".to_string(),
                slot: Some(slot.to_string()),
                token_id: Some(token_id.to_string()),
                amount0: Some(fees0.to_string()),
                amount1: Some(fees1.to_string()),
                ..base
            },
            AuditEvent::Swap {
                token_in,
                token_out,
                amount_in,
                amount_out,
            } => AuditRecord {
                event: "SWAP".to_string(),
                amount0: Some(amount_in.to_string()),
                amount1: Some(amount_out.to_string()),
                notes: Some(format!("{:?} -> {:?}", token_in, token_out)),
                ..base
            },
            AuditEvent::CycleFailed { reason, critical } => AuditRecord {
                event: "FAIL".to_string(),
                notes: Some(if *critical {
                    format!("CRITICAL: {}", reason)
                } else {
                    reason.clone()
                }),
                ..base
            },
        }
    }
}

impl PersistenceSink for PositionAuditLogger {
    fn record(&self, event: &AuditEvent) {
        self.log(self.to_record(event));
    }
}
