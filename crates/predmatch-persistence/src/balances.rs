//! Balance operations on a unit of work.
//!
//! Each member has an `available` balance and a `frozen` balance reserved
//! by resting BUY orders. Every operation either fully applies to the
//! staged row or leaves it unchanged.

use chrono::Utc;
use predmatch_types::{
    BalanceEntry, LedgerEntry, LedgerKind, MemberId, PredmatchError, QuestionId, Result,
};
use rust_decimal::Decimal;

use crate::{Store, UnitOfWork};

impl UnitOfWork<'_> {
    /// Deposit funds (increases available balance).
    pub fn deposit(&mut self, member_id: MemberId, amount: Decimal) {
        let mut entry = self.balance(member_id);
        entry.available += amount;
        self.put_balance(member_id, entry);
    }

    /// Freeze funds (available → frozen) for a BUY order.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if available < amount.
    pub fn freeze(&mut self, member_id: MemberId, amount: Decimal) -> Result<()> {
        let mut entry = self.balance(member_id);
        if entry.available < amount {
            return Err(PredmatchError::InsufficientBalance {
                needed: amount,
                available: entry.available,
            });
        }
        entry.available -= amount;
        entry.frozen += amount;
        self.put_balance(member_id, entry);
        Ok(())
    }

    /// Unfreeze funds (frozen → available): cancels, IOC remainders and
    /// price improvement.
    ///
    /// # Errors
    /// Returns `InsufficientFrozen` if frozen < amount.
    pub fn unfreeze(&mut self, member_id: MemberId, amount: Decimal) -> Result<()> {
        let mut entry = self.frozen_at_least(member_id, amount)?;
        entry.frozen -= amount;
        entry.available += amount;
        self.put_balance(member_id, entry);
        Ok(())
    }

    /// Consume frozen funds on a BUY fill. Nothing is added back to
    /// available.
    ///
    /// # Errors
    /// Returns `InsufficientFrozen` if frozen < amount.
    pub fn consume_frozen(&mut self, member_id: MemberId, amount: Decimal) -> Result<()> {
        let mut entry = self.frozen_at_least(member_id, amount)?;
        entry.frozen -= amount;
        self.put_balance(member_id, entry);
        Ok(())
    }

    /// Credit available balance (SELL proceeds, payouts).
    pub fn credit(&mut self, member_id: MemberId, amount: Decimal) {
        let mut entry = self.balance(member_id);
        entry.available += amount;
        self.put_balance(member_id, entry);
    }

    /// Append a ledger entry for a movement already applied to the staged
    /// balance; `balance_after` is the staged available balance.
    pub fn record_movement(
        &mut self,
        member_id: MemberId,
        kind: LedgerKind,
        delta: Decimal,
        description: impl Into<String>,
        question_id: Option<QuestionId>,
    ) {
        let balance_after = self.balance(member_id).available;
        self.record_ledger(LedgerEntry {
            member_id,
            kind,
            delta,
            balance_after,
            description: description.into(),
            question_id,
            recorded_at: Utc::now(),
        });
    }

    fn frozen_at_least(&self, member_id: MemberId, amount: Decimal) -> Result<BalanceEntry> {
        let entry = self.balance(member_id);
        if entry.frozen < amount {
            return Err(PredmatchError::InsufficientFrozen {
                needed: amount,
                frozen: entry.frozen,
            });
        }
        Ok(entry)
    }
}

impl Store {
    /// Deposit in a unit of work of its own, with a DEPOSIT ledger entry.
    pub fn deposit(&self, member_id: MemberId, amount: Decimal) -> Result<BalanceEntry> {
        if amount <= Decimal::ZERO {
            return Err(PredmatchError::InvalidOrder {
                reason: format!("Deposit amount must be positive, got {amount}"),
            });
        }
        let mut uow = self.begin();
        uow.deposit(member_id, amount);
        uow.record_movement(member_id, LedgerKind::Deposit, amount, "Deposit", None);
        uow.commit()?;
        tracing::debug!(member = %member_id, %amount, "Deposit committed");
        Ok(self.balance(member_id))
    }

    /// Sum of all members' available + frozen balances.
    #[must_use]
    pub fn total_funds(&self) -> Decimal {
        self.read().balances.values().map(BalanceEntry::total).sum()
    }
}
