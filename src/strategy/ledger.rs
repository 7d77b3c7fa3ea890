//! In-memory record of the strategy's two positions and undeployed balances.

use crate::error::BotError;
use crate::model::{Amount, Position, Slot, WalletBalances};
use ethers::types::U256;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionPair {
    pub upper: Option<Position>,
    pub lower: Option<Position>,
}

impl PositionPair {
    pub fn get(&self, slot: Slot) -> Option<&Position> {
        match slot {
            Slot::Upper => self.upper.as_ref(),
            Slot::Lower => self.lower.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Position> {
        match slot {
            Slot::Upper => &mut self.upper,
            Slot::Lower => &mut self.lower,
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.upper.is_some() as usize + self.lower.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.occupied_count() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.occupied_count() == 2
    }

    /// Exactly one leg open: a transient failure state.
    pub fn is_half_populated(&self) -> bool {
        self.occupied_count() == 1
    }
}

/// Read-only view used by the decision logic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    pub upper: Option<Position>,
    pub lower: Option<Position>,
    pub balances: WalletBalances,
}

impl LedgerSnapshot {
    pub fn occupied_slots(&self) -> Vec<Slot> {
        Slot::ALL
            .into_iter()
            .filter(|slot| match slot {
                Slot::Upper => self.upper.is_some(),
                Slot::Lower => self.lower.is_some(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: PositionPair,
    balances: WalletBalances,
}

impl PositionLedger {
    pub fn new(balances: WalletBalances) -> Self {
        Self {
            positions: PositionPair::default(),
            balances,
        }
    }

    pub fn record_mint(&mut self, slot: Slot, position: Position) -> Result<(), BotError> {
        if self.positions.get(slot).is_some() {
            return Err(BotError::SlotOccupied(slot));
        }
        if self.token_ids().contains(&position.token_id) {
            return Err(BotError::DuplicatePosition(position.token_id));
        }
        *self.positions.slot_mut(slot) = Some(position);
        Ok(())
    }

    /// Clears the slot and hands back the (now inactive) position for settlement.
    pub fn record_close(&mut self, slot: Slot) -> Result<Position, BotError> {
        let mut position = self
            .positions
            .slot_mut(slot)
            .take()
            .ok_or(BotError::SlotEmpty(slot))?;
        position.is_active = false;
        Ok(position)
    }

    /// Applies signed deltas. No validation against external truth; a delta
    /// that would go below zero clamps and is logged as an accounting anomaly.
    pub fn adjust_balances(&mut self, delta0: i128, delta1: i128) {
        self.balances.token0 = apply_delta(self.balances.token0, delta0, "token0");
        self.balances.token1 = apply_delta(self.balances.token1, delta1, "token1");
    }

    pub fn set_balances(&mut self, balances: WalletBalances) {
        self.balances = balances;
    }

    pub fn balances(&self) -> WalletBalances {
        self.balances
    }

    pub fn position(&self, slot: Slot) -> Option<&Position> {
        self.positions.get(slot)
    }

    pub fn positions(&self) -> &PositionPair {
        &self.positions
    }

    pub fn token_ids(&self) -> Vec<U256> {
        Slot::ALL
            .into_iter()
            .filter_map(|slot| self.positions.get(slot))
            .filter(|p| p.is_active)
            .map(|p| p.token_id)
            .collect()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            upper: self.positions.upper.clone(),
            lower: self.positions.lower.clone(),
            balances: self.balances,
        }
    }
}

/// Converts a raw amount to a signed delta, saturating at `i128::MAX`.
pub fn signed(amount: Amount) -> i128 {
    i128::try_from(amount).unwrap_or(i128::MAX)
}

fn apply_delta(balance: Amount, delta: i128, token: &str) -> Amount {
    if delta >= 0 {
        return balance.saturating_add(delta.unsigned_abs());
    }
    let debit = delta.unsigned_abs();
    if debit > balance {
        warn!(
            "[LEDGER] {} debit {} exceeds tracked balance {}; clamping to zero",
            token, debit, balance
        );
        0
    } else {
        balance - debit
    }
}
