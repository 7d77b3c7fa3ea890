//! The rebalancing state machine.
//!
//! `NoPositions -> Balancing -> Opening -> Holding -> Closing -> Balancing -> ...`
//!
//! The orchestrator never retries. Every failure leaves the ledger in a state
//! the next cycle can act on: empty (open again), or with occupied slots that
//! still need closing. The single exception is a failed unwind, which is
//! surfaced as a critical error.

use super::common::{self, effective_tolerance, plan_balancing_swap, separate_principal_and_fees};
use super::ledger::{signed, LedgerSnapshot, PositionLedger};
use super::liquidity_math::{expected_deposit, raw_sqrt_price};
use super::range_planner::plan_ranges;
use super::types::{Decision, FeeSplit, Phase, RangePlan, Spread, StrategyStats, SwapPlan};
use crate::broadcast::types::{format_uptime, RangeInfo, StatusSummary};
use crate::config::strategy::RangePairConfig;
use crate::constants::{
    DEFAULT_MINT_SLIPPAGE, DEFAULT_REBALANCE_TOLERANCE_PERCENT, DEFAULT_SWAP_SLIPPAGE_PERCENT,
    DEFAULT_THRESHOLD_BUFFER_SPACINGS, DEFAULT_TX_TIMEOUT,
};
use crate::engine::common::{into_bot_error, with_timeout};
use crate::engine::context::PoolContext;
use crate::engine::traits::{LiquidityManager, PersistenceSink, SwapExecutor, WalletReader};
use crate::error::BotError;
use crate::model::{
    AuditEvent, MintRequest, Position, PositionSnapshot, PriceSample, Slot, WalletBalances,
};
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RebalanceParams {
    pub width_percent: f64,
    pub rebalance_tolerance_percent: f64,
    pub swap_slippage_percent: f64,
    pub mint_slippage: Spread,
    pub threshold_buffer_spacings: i32,
    pub tx_timeout: Duration,
}

impl RebalanceParams {
    pub fn from_config(config: &RangePairConfig) -> Self {
        Self {
            width_percent: config.width_percent,
            rebalance_tolerance_percent: config.rebalance_tolerance_percent,
            swap_slippage_percent: config.swap_slippage_percent,
            mint_slippage: Spread::new(config.mint_slippage_percent),
            threshold_buffer_spacings: config.threshold_buffer_spacings,
            tx_timeout: Duration::from_secs(config.tx_timeout_secs),
        }
    }
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self {
            width_percent: 20.0,
            rebalance_tolerance_percent: DEFAULT_REBALANCE_TOLERANCE_PERCENT,
            swap_slippage_percent: DEFAULT_SWAP_SLIPPAGE_PERCENT,
            mint_slippage: DEFAULT_MINT_SLIPPAGE,
            threshold_buffer_spacings: DEFAULT_THRESHOLD_BUFFER_SPACINGS,
            tx_timeout: DEFAULT_TX_TIMEOUT,
        }
    }
}

/// Everything the orchestrator mutates. Nothing else writes to it.
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    pub phase: Phase,
    pub ledger: PositionLedger,
    pub stats: StrategyStats,
    pub last_rebalance_price: Option<f64>,
    pub baseline_sqrt_price_x96: Option<U256>,
}

pub struct Collaborators {
    pub liquidity: Arc<dyn LiquidityManager>,
    pub swapper: Arc<dyn SwapExecutor>,
    pub wallet: Arc<dyn WalletReader>,
    pub sink: Arc<dyn PersistenceSink>,
}

pub struct PositionOrchestrator {
    params: RebalanceParams,
    pool: PoolContext,
    collaborators: Collaborators,
    state: OrchestratorState,
}

impl PositionOrchestrator {
    pub fn new(params: RebalanceParams, pool: PoolContext, collaborators: Collaborators) -> Self {
        let state = OrchestratorState {
            phase: Phase::NoPositions,
            ledger: PositionLedger::default(),
            stats: StrategyStats::new(chrono::Utc::now().timestamp_millis()),
            last_rebalance_price: None,
            baseline_sqrt_price_x96: None,
        };
        Self {
            params,
            pool,
            collaborators,
            state,
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn pool(&self) -> &PoolContext {
        &self.pool
    }

    pub fn params(&self) -> &RebalanceParams {
        &self.params
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.ledger.snapshot()
    }

    /// Records the sample and decides what the cycle must do.
    pub fn evaluate(&mut self, sample: &PriceSample) -> Decision {
        let stats = &mut self.state.stats;
        stats.cycle_count += 1;
        stats.current_price = sample.price;
        stats.current_tick = Some(sample.tick);

        let snapshot = self.state.ledger.snapshot();
        let decision = common::decide(
            &snapshot,
            sample.tick,
            self.pool.tick_spacing,
            self.params.threshold_buffer_spacings,
        );
        match decision {
            Decision::Close => {
                if let Some(limits) = self.current_thresholds() {
                    info!(
                        "[ORCHESTRATOR] Tick {} breached thresholds [{}, {}]",
                        sample.tick, limits.lower, limits.upper
                    );
                }
            }
            Decision::ResumeClose => warn!(
                "[ORCHESTRATOR] Ledger holds a single position ({:?}); resuming close",
                snapshot.occupied_slots()
            ),
            Decision::Open | Decision::Hold => {}
        }
        decision
    }

    pub fn current_thresholds(&self) -> Option<super::types::Thresholds> {
        let positions = self.state.ledger.positions();
        match (&positions.upper, &positions.lower) {
            (Some(upper), Some(lower)) => Some(common::thresholds(
                lower.tick_lower,
                upper.tick_upper,
                self.pool.tick_spacing,
                self.params.threshold_buffer_spacings,
            )),
            _ => None,
        }
    }

    /// Loads wallet balances and adopts whatever the owner already has open in
    /// this pool. Positions in other pools are never touched.
    ///
    /// An adjacent pair is adopted as-is. A single position is adopted into
    /// the upper slot so the next cycle closes it. Any other set is left alone
    /// and reported as `AdoptionFailed` for an operator to sort out.
    pub async fn bootstrap(&mut self, owner: Address) -> Result<(), BotError> {
        let balances = self.read_wallet().await?;
        self.state.ledger.set_balances(balances);

        let listed = with_timeout(
            self.params.tx_timeout,
            "list_positions",
            self.collaborators.liquidity.list_positions(owner),
        )
        .await
        .map_err(|e| into_bot_error(e, |reason| BotError::Reconciliation { reason }))?;
        let total = listed.len();
        let mut live: Vec<PositionSnapshot> = listed
            .into_iter()
            .filter(|p| self.pool.contains(p) && p.liquidity > 0)
            .collect();
        live.sort_by_key(|p| p.tick_lower);
        if live.len() < total {
            debug!(
                "[ORCHESTRATOR] Ignoring {} positions outside {} or without liquidity",
                total - live.len(),
                self.pool.symbol()
            );
        }

        let decimals = self.pool.decimals();
        let adopt = |p: &PositionSnapshot| {
            Position::new(
                p.token_id,
                p.tick_lower,
                p.tick_upper,
                p.liquidity,
                (p.amount0, p.amount1),
                decimals,
            )
        };

        match live.as_slice() {
            [] => {
                info!(
                    "[ORCHESTRATOR] No existing positions; balances {}",
                    self.pool.format_amounts(balances.token0, balances.token1)
                );
                self.state.phase = Phase::NoPositions;
            }
            [lower, upper] if lower.tick_upper == upper.tick_lower => {
                self.state.ledger.record_mint(Slot::Lower, adopt(lower))?;
                self.state.ledger.record_mint(Slot::Upper, adopt(upper))?;
                info!(
                    "[ORCHESTRATOR] Adopted existing pair: lower #{} [{}, {}], upper #{} [{}, {}]",
                    lower.token_id,
                    lower.tick_lower,
                    lower.tick_upper,
                    upper.token_id,
                    upper.tick_lower,
                    upper.tick_upper
                );
                self.state.phase = Phase::Holding;
            }
            [single] => {
                warn!(
                    "[ORCHESTRATOR] Found lone position #{}; adopting it for closing",
                    single.token_id
                );
                self.state.ledger.record_mint(Slot::Upper, adopt(single))?;
                self.state.phase = Phase::Closing;
            }
            unmanaged => {
                let token_ids: Vec<U256> = unmanaged.iter().map(|p| p.token_id).collect();
                error!(
                    "[ORCHESTRATOR] Positions {:?} do not form an adjacent pair; leaving them untouched",
                    token_ids
                );
                self.state.phase = Phase::NoPositions;
                return Err(BotError::AdoptionFailed { token_ids });
            }
        }
        Ok(())
    }

    /// Compares tracked balances with the wallet and adopts the wallet's
    /// figures on divergence. Returns the previous ledger balances when they
    /// were corrected.
    pub async fn reconcile_balances(&mut self) -> Result<Option<WalletBalances>, BotError> {
        let actual = self.read_wallet().await?;
        let tracked = self.state.ledger.balances();
        if actual == tracked {
            return Ok(None);
        }
        warn!(
            "[ORCHESTRATOR] Balance divergence: tracked {} vs wallet {}; adopting wallet",
            self.pool.format_amounts(tracked.token0, tracked.token1),
            self.pool.format_amounts(actual.token0, actual.token1)
        );
        self.state.ledger.set_balances(actual);
        self.state.stats.balance_corrections += 1;
        Ok(Some(tracked))
    }

    /// Closes every occupied slot. Each slot is attempted even when another
    /// fails; the first failure is returned and its slot stays occupied.
    pub async fn close_positions(&mut self) -> Result<FeeSplit, BotError> {
        self.state.phase = Phase::Closing;
        let mut total = FeeSplit::default();
        let mut first_error = None;

        for slot in self.state.ledger.snapshot().occupied_slots() {
            match self.close_slot(slot).await {
                Ok(split) => total.accumulate(&split),
                Err(e) => {
                    error!("[ORCHESTRATOR] {}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        self.state.stats.rebalance_count += 1;
        self.state.stats.last_rebalance_at = Some(chrono::Utc::now().timestamp_millis());
        self.state.phase = Phase::Balancing;
        info!(
            "[ORCHESTRATOR] Positions closed. Fees {}",
            self.pool.format_amounts(total.fees0, total.fees1)
        );
        Ok(total)
    }

    /// Swaps towards equal value when the deviation exceeds the tolerance, or
    /// whenever the upper range alone would use up all token1.
    pub async fn rebalance_balances(
        &mut self,
        sample: &PriceSample,
    ) -> Result<Option<SwapPlan>, BotError> {
        self.state.phase = Phase::Balancing;
        let balances = self.state.ledger.balances();
        let tolerance = self.balancing_tolerance(sample, balances);
        let Some(plan) = plan_balancing_swap(
            balances,
            sample.price,
            &self.pool.token0,
            &self.pool.token1,
            tolerance,
        ) else {
            debug!("[ORCHESTRATOR] Balances within tolerance; no swap");
            return Ok(None);
        };

        let (token_in, token_out) = if plan.zero_for_one {
            (&self.pool.token0, &self.pool.token1)
        } else {
            (&self.pool.token1, &self.pool.token0)
        };
        info!(
            "[ORCHESTRATOR] Deviation {:.2}% > {:.2}%: swapping {:.6} {} for {}",
            plan.deviation_percent,
            tolerance,
            token_in.to_human(plan.amount_in),
            token_in.symbol,
            token_out.symbol
        );

        let (token_in, token_out) = (token_in.address, token_out.address);
        let amount_out = match with_timeout(
            self.params.tx_timeout,
            "swap",
            self.collaborators.swapper.swap(
                token_in,
                token_out,
                plan.amount_in,
                self.params.swap_slippage_percent,
            ),
        )
        .await
        {
            Ok(amount_out) => amount_out,
            Err(e) => {
                self.state.phase = Phase::NoPositions;
                return Err(into_bot_error(e, |reason| BotError::SwapFailed { reason }));
            }
        };

        if plan.zero_for_one {
            self.state
                .ledger
                .adjust_balances(-signed(plan.amount_in), signed(amount_out));
        } else {
            self.state
                .ledger
                .adjust_balances(signed(amount_out), -signed(plan.amount_in));
        }
        self.state.stats.swap_count += 1;
        self.collaborators.sink.record(&AuditEvent::Swap {
            token_in,
            token_out,
            amount_in: plan.amount_in,
            amount_out,
        });
        Ok(Some(plan))
    }

    fn balancing_tolerance(&self, sample: &PriceSample, balances: WalletBalances) -> f64 {
        let tolerance = self.params.rebalance_tolerance_percent;
        let (decimals0, decimals1) = self.pool.decimals();
        // A planning failure surfaces from open_positions
        let Ok(plan) = plan_ranges(
            sample.price,
            self.params.width_percent,
            self.pool.tick_spacing,
            decimals0,
            decimals1,
        ) else {
            return tolerance;
        };
        let sqrt_price = raw_sqrt_price(sample.price, decimals0, decimals1);
        match effective_tolerance(plan.upper_ticks, sqrt_price, balances, tolerance) {
            Ok(effective) if effective < tolerance => {
                info!(
                    "[ORCHESTRATOR] Upper range would take all {}; balancing regardless of tolerance",
                    self.pool.token1.symbol
                );
                effective
            }
            Ok(effective) => effective,
            Err(_) => tolerance,
        }
    }

    /// Mints the upper position with everything available, then the lower one
    /// with the token1 the upper left behind. A failed lower mint unwinds the
    /// upper position.
    pub async fn open_positions(&mut self, sample: &PriceSample) -> Result<RangePlan, BotError> {
        if let Some(slot) = self.state.ledger.snapshot().occupied_slots().first() {
            return Err(BotError::SlotOccupied(*slot));
        }
        self.state.phase = Phase::Opening;

        let (decimals0, decimals1) = self.pool.decimals();
        let plan = match plan_ranges(
            sample.price,
            self.params.width_percent,
            self.pool.tick_spacing,
            decimals0,
            decimals1,
        ) {
            Ok(plan) => plan,
            Err(e) => {
                self.state.phase = Phase::NoPositions;
                return Err(e);
            }
        };
        info!(
            "[ORCHESTRATOR] Planned ranges at {:.4}: lower [{}, {}] upper [{}, {}]",
            sample.price,
            plan.lower_ticks.lower,
            plan.lower_ticks.upper,
            plan.upper_ticks.lower,
            plan.upper_ticks.upper
        );

        let slippage = self.params.mint_slippage;
        let balances = self.state.ledger.balances();
        let sqrt_price = raw_sqrt_price(sample.price, decimals0, decimals1);
        let expected = expected_deposit(sqrt_price, plan.upper_ticks, balances);
        let (expected0, expected1) = match expected {
            Ok(expected) => expected,
            Err(e) => {
                self.state.phase = Phase::NoPositions;
                return Err(e);
            }
        };
        debug!(
            "[ORCHESTRATOR] Upper mint expected to take {}",
            self.pool.format_amounts(expected0, expected1)
        );
        let upper_request = MintRequest {
            tick_lower: plan.upper_ticks.lower,
            tick_upper: plan.upper_ticks.upper,
            amount0_desired: balances.token0,
            amount1_desired: balances.token1,
            amount0_min: slippage.markdown_amount(expected0),
            amount1_min: slippage.markdown_amount(expected1),
        };
        if let Err(e) = self.mint_slot(Slot::Upper, upper_request).await {
            self.state.phase = Phase::NoPositions;
            return Err(e);
        }

        let remaining1 = self.state.ledger.balances().token1;
        let lower_request = MintRequest {
            tick_lower: plan.lower_ticks.lower,
            tick_upper: plan.lower_ticks.upper,
            amount0_desired: 0,
            amount1_desired: remaining1,
            amount0_min: 0,
            amount1_min: slippage.markdown_amount(remaining1),
        };
        if let Err(mint_error) = self.mint_slot(Slot::Lower, lower_request).await {
            return Err(self.unwind_upper(mint_error).await);
        }

        self.state.phase = Phase::Holding;
        self.state.last_rebalance_price = Some(sample.price);
        self.state.baseline_sqrt_price_x96 = Some(sample.sqrt_price_x96);
        if let Some(limits) = self.current_thresholds() {
            info!(
                "[ORCHESTRATOR] Holding. Close thresholds: tick < {} or tick > {}",
                limits.lower, limits.upper
            );
        }
        Ok(plan)
    }

    /// Balancing then opening, for a ledger with no positions.
    pub async fn open_cycle(&mut self, sample: &PriceSample) -> Result<RangePlan, BotError> {
        self.rebalance_balances(sample).await?;
        self.open_positions(sample).await
    }

    async fn mint_slot(&mut self, slot: Slot, request: MintRequest) -> Result<Position, BotError> {
        let receipt = with_timeout(
            self.params.tx_timeout,
            "mint",
            self.collaborators.liquidity.mint(request),
        )
        .await
        .map_err(|e| into_bot_error(e, |reason| BotError::MintFailed { slot, reason }))?;

        let position = Position::new(
            receipt.token_id,
            request.tick_lower,
            request.tick_upper,
            receipt.liquidity,
            (receipt.amount0_used, receipt.amount1_used),
            self.pool.decimals(),
        );
        self.state.ledger.record_mint(slot, position.clone())?;
        self.state.ledger.adjust_balances(
            -signed(receipt.amount0_used),
            -signed(receipt.amount1_used),
        );
        self.state.stats.positions_opened += 1;

        info!(
            "[ORCHESTRATOR] Minted {} #{} [{}, {}] using {}",
            slot,
            receipt.token_id,
            request.tick_lower,
            request.tick_upper,
            self.pool
                .format_amounts(receipt.amount0_used, receipt.amount1_used)
        );
        self.collaborators.sink.record(&AuditEvent::PositionOpened {
            slot,
            position: position.clone(),
        });
        Ok(position)
    }

    async fn close_slot(&mut self, slot: Slot) -> Result<FeeSplit, BotError> {
        let position = self
            .state
            .ledger
            .position(slot)
            .cloned()
            .ok_or(BotError::SlotEmpty(slot))?;

        let receipt = with_timeout(
            self.params.tx_timeout,
            "close",
            self.collaborators.liquidity.close(position.token_id),
        )
        .await
        .map_err(|e| {
            into_bot_error(e, |reason| BotError::CloseFailed {
                slot,
                token_id: position.token_id,
                reason,
            })
        })?;

        self.state.ledger.record_close(slot)?;
        let split = separate_principal_and_fees(&position, &receipt);
        if receipt.amount0 < position.principal_amount0
            || receipt.amount1 < position.principal_amount1
        {
            debug!(
                "[ORCHESTRATOR] {} #{} returned less than principal on one side; fee floored at zero",
                slot, position.token_id
            );
        }
        self.state
            .ledger
            .adjust_balances(signed(receipt.amount0), signed(receipt.amount1));
        self.state.stats.record_fees(&split);

        info!(
            "[ORCHESTRATOR] Closed {} #{}: received {}",
            slot,
            position.token_id,
            self.pool.format_amounts(receipt.amount0, receipt.amount1)
        );
        self.collaborators.sink.record(&AuditEvent::PositionClosed {
            slot,
            token_id: position.token_id,
            amount0: receipt.amount0,
            amount1: receipt.amount1,
        });
        if split.fees0 > 0 || split.fees1 > 0 {
            self.collaborators.sink.record(&AuditEvent::FeesCollected {
                slot,
                token_id: position.token_id,
                fees0: split.fees0,
                fees1: split.fees1,
            });
        }
        Ok(split)
    }

    /// Closes the freshly minted upper position after a failed lower mint.
    async fn unwind_upper(&mut self, mint_error: BotError) -> BotError {
        warn!(
            "[ORCHESTRATOR] {}; closing upper position to avoid a lone leg",
            mint_error
        );
        let token_id = self
            .state
            .ledger
            .position(Slot::Upper)
            .map(|p| p.token_id)
            .unwrap_or_default();

        match self.close_slot(Slot::Upper).await {
            Ok(_) => {
                self.state.phase = Phase::NoPositions;
                mint_error
            }
            Err(close_error) => {
                self.state.phase = Phase::Closing;
                let mint_reason = match mint_error {
                    BotError::MintFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                let close_reason = match close_error {
                    BotError::CloseFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                let critical = BotError::UnwindFailed {
                    token_id,
                    mint_reason,
                    close_reason,
                };
                error!("[ORCHESTRATOR] {}", critical);
                critical
            }
        }
    }

    /// Live view of each tracked position from the position manager.
    pub async fn position_status(&self) -> Result<Vec<(Slot, PositionSnapshot)>, BotError> {
        let mut out = Vec::new();
        for slot in Slot::ALL {
            if let Some(position) = self.state.ledger.position(slot) {
                let snapshot = with_timeout(
                    self.params.tx_timeout,
                    "get_position",
                    self.collaborators.liquidity.get_position(position.token_id),
                )
                .await
                .map_err(|e| into_bot_error(e, |reason| BotError::Oracle { reason }))?;
                out.push((slot, snapshot));
            }
        }
        Ok(out)
    }

    pub fn status_summary(&self) -> StatusSummary {
        let stats = &self.state.stats;
        let balances = self.state.ledger.balances();
        let tick = stats.current_tick;
        let range_info = |slot: Slot| {
            self.state.ledger.position(slot).map(|p| RangeInfo {
                token_id: p.token_id.to_string(),
                tick_lower: p.tick_lower,
                tick_upper: p.tick_upper,
                price_lower: p.price_lower,
                price_upper: p.price_upper,
                liquidity: p.liquidity.to_string(),
                in_range: tick.map(|t| p.contains_tick(t)).unwrap_or(false),
            })
        };
        let uptime_secs =
            (chrono::Utc::now().timestamp_millis() - stats.started_at).max(0) as u64 / 1000;

        StatusSummary {
            symbol: self.pool.symbol(),
            price: stats.current_price,
            tick,
            phase: self.state.phase.to_string(),
            uptime: format_uptime(uptime_secs),
            upper: range_info(Slot::Upper),
            lower: range_info(Slot::Lower),
            thresholds: self.current_thresholds().map(|t| (t.lower, t.upper)),
            token0_balance: self.pool.token0.to_human(balances.token0),
            token1_balance: self.pool.token1.to_human(balances.token1),
            total_fees0: self.pool.token0.to_human(stats.total_fees0),
            total_fees1: self.pool.token1.to_human(stats.total_fees1),
            rebalance_count: stats.rebalance_count,
            cycle_count: stats.cycle_count,
            last_rebalance_price: self.state.last_rebalance_price,
        }
    }

    async fn read_wallet(&self) -> Result<WalletBalances, BotError> {
        with_timeout(
            self.params.tx_timeout,
            "token_balances",
            self.collaborators.wallet.token_balances(),
        )
        .await
        .map_err(|e| into_bot_error(e, |reason| BotError::Reconciliation { reason }))
    }
}
