//! Narrow async seams to the chain. The live backend and the paper exchange
//! both implement these; the orchestrator never sees anything else.

use crate::model::{
    Amount, AuditEvent, CloseReceipt, MintReceipt, MintRequest, PoolSlot, PositionSnapshot,
    WalletBalances,
};
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;

/// Position manager: mint, burn-and-collect, inspect.
#[async_trait]
pub trait LiquidityManager: Send + Sync {
    async fn mint(&self, request: MintRequest) -> Result<MintReceipt>;

    /// Removes all liquidity, collects principal plus owed fees and burns the token.
    async fn close(&self, token_id: U256) -> Result<CloseReceipt>;

    async fn get_position(&self, token_id: U256) -> Result<PositionSnapshot>;

    async fn list_positions(&self, owner: Address) -> Result<Vec<PositionSnapshot>>;
}

#[async_trait]
pub trait SwapExecutor: Send + Sync {
    /// Returns the amount of `token_out` received.
    async fn swap(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: Amount,
        max_slippage_percent: f64,
    ) -> Result<Amount>;
}

#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn current_tick_and_price(&self) -> Result<PoolSlot>;

    /// Fee in hundredths of a basis point (3000 = 0.3%).
    async fn fee_tier(&self) -> Result<u32>;

    async fn tick_spacing(&self) -> Result<i32>;

    /// `(token0, token1)` as ordered by the pool.
    async fn token_order(&self) -> Result<(Address, Address)>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;
}

#[async_trait]
pub trait WalletReader: Send + Sync {
    async fn token_balances(&self) -> Result<WalletBalances>;
}

/// Fire-and-forget observability. Implementations swallow their own failures.
pub trait PersistenceSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

pub struct NoopSink;

impl PersistenceSink for NoopSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Fans one event out to several sinks.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn PersistenceSink>>,
}

impl CompositeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl PersistenceSink for CompositeSink {
    fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
