use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;

use crate::domain::{Account, AccountId, Cents};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    #[error("Account already exists: {0}")]
    AlreadyExists(AccountId),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Balance overflow in account {account_id}")]
    Overflow { account_id: AccountId },

    #[error("Ledger lock poisoned")]
    Poisoned,
}

/// What `create` does when the identifier is already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnDuplicate {
    /// Leave the existing account untouched and report success.
    #[default]
    Keep,
    /// Put the existing account back to a zero balance.
    Reset,
    /// Fail with [`LedgerError::AlreadyExists`].
    Reject,
}

impl OnDuplicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnDuplicate::Keep => "keep",
            OnDuplicate::Reset => "reset",
            OnDuplicate::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keep" => Some(OnDuplicate::Keep),
            "reset" => Some(OnDuplicate::Reset),
            "reject" => Some(OnDuplicate::Reject),
            _ => None,
        }
    }
}

impl std::fmt::Display for OnDuplicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type Slot = Arc<Mutex<Account>>;

/// In-memory, concurrency-safe account ledger.
///
/// The map lock is held only long enough to find or insert an account slot.
/// Every read-modify-write then runs under that account's own mutex, so two
/// operations on the same account are serialized while operations on
/// different accounts proceed in parallel. Slots are never removed or
/// replaced once inserted, which is what makes it sound to keep using a slot
/// after the map lock has been released.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: RwLock<HashMap<AccountId, Slot>>,
    on_duplicate: OnDuplicate,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicate_policy(on_duplicate: OnDuplicate) -> Self {
        Self {
            accounts: RwLock::default(),
            on_duplicate,
        }
    }

    pub fn duplicate_policy(&self) -> OnDuplicate {
        self.on_duplicate
    }

    /// Register a new account with a zero balance and return its identifier.
    pub fn create(&self, account_id: &str) -> Result<AccountId, LedgerError> {
        let existing = {
            let mut accounts = self.accounts.write().map_err(|_| LedgerError::Poisoned)?;
            if !accounts.contains_key(account_id) {
                accounts.insert(
                    account_id.to_string(),
                    Arc::new(Mutex::new(Account::new(account_id))),
                );
                return Ok(account_id.to_string());
            }
            Arc::clone(&accounts[account_id])
        };

        match self.on_duplicate {
            OnDuplicate::Keep => Ok(account_id.to_string()),
            OnDuplicate::Reject => Err(LedgerError::AlreadyExists(account_id.to_string())),
            OnDuplicate::Reset => {
                // Reset in place: a concurrent credit may already hold this slot.
                existing.lock().map_err(|_| LedgerError::Poisoned)?.reset();
                Ok(account_id.to_string())
            }
        }
    }

    pub fn balance(&self, account_id: &str) -> Result<Cents, LedgerError> {
        let slot = self.slot(account_id)?;
        let account = slot.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(account.balance())
    }

    /// Add `amount` to the account and return the new balance.
    pub fn credit(&self, account_id: &str, amount: Cents) -> Result<Cents, LedgerError> {
        let slot = self.slot(account_id)?;
        let mut account = slot.lock().map_err(|_| LedgerError::Poisoned)?;
        account.credit(amount).ok_or_else(|| LedgerError::Overflow {
            account_id: account_id.to_string(),
        })
    }

    /// Subtract `amount` from the account and return the new balance.
    pub fn debit(&self, account_id: &str, amount: Cents) -> Result<Cents, LedgerError> {
        let slot = self.slot(account_id)?;
        let mut account = slot.lock().map_err(|_| LedgerError::Poisoned)?;
        let balance = account.balance();
        account
            .debit(amount)
            .ok_or_else(|| LedgerError::InsufficientFunds {
                account_id: account_id.to_string(),
                balance,
                required: amount,
            })
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.slot(account_id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, account_id: &str) -> Result<Slot, LedgerError> {
        let accounts = self.accounts.read().map_err(|_| LedgerError::Poisoned)?;
        accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))
    }
}
