use std::sync::Arc;

use crate::domain::{AccountId, Cents};
use crate::storage::Ledger;

use super::AppError;

/// Application service providing the ledger operations.
/// This is the primary interface for any transport (gRPC today, anything else later).
#[derive(Debug, Clone)]
pub struct LedgerService {
    ledger: Arc<Ledger>,
}

/// Balance entry for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub account_id: AccountId,
    pub balance: Cents,
}

impl LedgerService {
    /// Create a new ledger service on top of the given ledger.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Open an account with a zero balance.
    pub fn create_account(&self, account_id: &str) -> Result<AccountId, AppError> {
        Ok(self.ledger.create(account_id)?)
    }

    /// Get the balance of a single account.
    pub fn get_balance(&self, account_id: &str) -> Result<BalanceEntry, AppError> {
        let balance = self.ledger.balance(account_id)?;
        Ok(BalanceEntry {
            account_id: account_id.to_string(),
            balance,
        })
    }

    /// Credit an account and return its new balance.
    pub fn deposit(&self, account_id: &str, amount: Cents) -> Result<Cents, AppError> {
        Ok(self.ledger.credit(account_id, amount)?)
    }

    /// Debit an account and return its new balance.
    pub fn withdraw(&self, account_id: &str, amount: Cents) -> Result<Cents, AppError> {
        Ok(self.ledger.debit(account_id, amount)?)
    }
}
