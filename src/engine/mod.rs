pub mod common;
pub mod context;
pub mod oracle;
pub mod simulation;
pub mod traits;

use crate::broadcast::{StatusBroadcaster, WSEvent};
use crate::config::strategy::RangePairConfig;
use crate::engine::oracle::PriceOracle;
use crate::engine::traits::PersistenceSink;
use crate::error::BotError;
use crate::model::AuditEvent;
use crate::strategy::orchestrator::PositionOrchestrator;
use crate::strategy::types::Decision;
use anyhow::Result;
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub check_interval: Duration,
    /// Delay after a failed cycle before the next attempt.
    pub error_backoff: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &RangePairConfig) -> Self {
        Self {
            check_interval: config.check_interval(),
            error_backoff: config.error_backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Held,
    Opened,
    Rebalanced,
}

/// Drives the orchestrator on a fixed interval.
///
/// The monitor owns the orchestrator, so a cycle can never overlap another
/// one. Shutdown is observed only between cycles.
pub struct RebalanceMonitor {
    oracle: PriceOracle,
    orchestrator: PositionOrchestrator,
    sink: Arc<dyn PersistenceSink>,
    broadcaster: Option<StatusBroadcaster>,
    owner: Address,
    settings: MonitorSettings,
    bootstrapped: bool,
}

impl RebalanceMonitor {
    pub fn new(
        oracle: PriceOracle,
        orchestrator: PositionOrchestrator,
        sink: Arc<dyn PersistenceSink>,
        broadcaster: Option<StatusBroadcaster>,
        owner: Address,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            oracle,
            orchestrator,
            sink,
            broadcaster,
            owner,
            settings,
            bootstrapped: false,
        }
    }

    pub fn orchestrator(&self) -> &PositionOrchestrator {
        &self.orchestrator
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    /// One evaluation cycle. Failures are recorded to the sink and returned;
    /// the orchestrator has already left its state consistent.
    pub async fn run_once(&mut self) -> Result<CycleOutcome, BotError> {
        let span = info_span!("cycle", id = %Uuid::new_v4());
        let result = self.cycle().instrument(span).await;

        if let Err(e) = &result {
            self.sink.record(&AuditEvent::CycleFailed {
                reason: e.to_string(),
                critical: e.is_critical(),
            });
        }
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.send(WSEvent::Summary(self.orchestrator.status_summary()));
        }
        result
    }

    async fn cycle(&mut self) -> Result<CycleOutcome, BotError> {
        if !self.bootstrapped {
            self.orchestrator.bootstrap(self.owner).await?;
            self.bootstrapped = true;
            self.reconcile().await;
        }

        let sample = self.oracle.get_current_price().await?;
        self.sink.record(&AuditEvent::PriceSample(sample));

        let outcome = match self.orchestrator.evaluate(&sample) {
            Decision::Hold => {
                if tracing::enabled!(Level::DEBUG) {
                    self.log_position_status().await;
                }
                CycleOutcome::Held
            }
            Decision::Open => {
                self.orchestrator.open_cycle(&sample).await?;
                CycleOutcome::Opened
            }
            Decision::Close | Decision::ResumeClose => {
                self.orchestrator.close_positions().await?;
                // Closing takes time; plan the new pair on a fresh price.
                let fresh = self.oracle.get_current_price().await?;
                self.sink.record(&AuditEvent::PriceSample(fresh));
                self.orchestrator.open_cycle(&fresh).await?;
                CycleOutcome::Rebalanced
            }
        };

        if outcome != CycleOutcome::Held {
            self.reconcile().await;
        }
        Ok(outcome)
    }

    async fn reconcile(&mut self) {
        if let Err(e) = self.orchestrator.reconcile_balances().await {
            warn!("[MONITOR] Balance reconciliation skipped: {}", e);
        }
    }

    async fn log_position_status(&self) {
        match self.orchestrator.position_status().await {
            Ok(status) => {
                for (slot, snapshot) in status {
                    debug!(
                        "[MONITOR] {} #{} holds {} (owed {})",
                        slot,
                        snapshot.token_id,
                        self.orchestrator
                            .pool()
                            .format_amounts(snapshot.amount0, snapshot.amount1),
                        self.orchestrator
                            .pool()
                            .format_amounts(snapshot.tokens_owed0, snapshot.tokens_owed1)
                    );
                }
            }
            Err(e) => debug!("[MONITOR] Position status unavailable: {}", e),
        }
    }

    /// Runs cycles until `shutdown` flips to true or a fatal error occurs.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "[MONITOR] Started for {} (interval {:?}, backoff {:?})",
            self.orchestrator.pool().symbol(),
            self.settings.check_interval,
            self.settings.error_backoff
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.run_once().await {
                Ok(outcome) => {
                    debug!("[MONITOR] Cycle finished: {:?}", outcome);
                    self.settings.check_interval
                }
                Err(e) if e.is_fatal() => {
                    error!("[MONITOR] Halting: {}", e);
                    return Err(anyhow::Error::new(e).context("rebalance monitor halted"));
                }
                Err(e) => {
                    warn!(
                        "[MONITOR] Cycle failed: {}. Retrying in {:?}",
                        e, self.settings.error_backoff
                    );
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("[MONITOR] Stopped gracefully.");
        Ok(())
    }
}
