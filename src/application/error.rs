use thiserror::Error;
use tonic::{Code, Status};

use crate::domain::{AccountId, Cents};
use crate::storage::LedgerError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(AccountId),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Internal ledger error: {0}")]
    Internal(String),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => AppError::AccountNotFound(id),
            LedgerError::AlreadyExists(id) => AppError::AccountAlreadyExists(id),
            LedgerError::InsufficientFunds {
                account_id,
                balance,
                required,
            } => AppError::InsufficientFunds {
                account_id,
                balance,
                required,
            },
            other @ (LedgerError::Overflow { .. } | LedgerError::Poisoned) => {
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl AppError {
    pub fn code(&self) -> Code {
        match self {
            AppError::AccountNotFound(_) => Code::NotFound,
            AppError::AccountAlreadyExists(_) => Code::AlreadyExists,
            AppError::InsufficientFunds { .. } => Code::FailedPrecondition,
            AppError::Internal(_) => Code::Internal,
        }
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        match &err {
            // Internal details stay in the server log.
            AppError::Internal(_) => Status::internal("Internal ledger error"),
            AppError::AccountNotFound(_) => Status::not_found("Account not found"),
            AppError::InsufficientFunds { .. } => {
                Status::failed_precondition("Insufficient funds")
            }
            AppError::AccountAlreadyExists(_) => Status::new(err.code(), err.to_string()),
        }
    }
}
