//! Client-side driver that walks one account through the full lifecycle:
//! create, deposit, query, withdraw.
//!
//! All four calls share a single deadline measured from the start of the run.
//! The first failing step ends the run; nothing is retried. A mutation the
//! server has already committed stays committed even when its response
//! arrives too late.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tonic::transport::Channel;
use tonic::{Code, Request, Response, Status};
use tracing::info;
use uuid::Uuid;

use crate::domain::{AccountId, Cents, format_cents};
use crate::rpc::proto::{CreateAccountRequest, DepositRequest, GetBalanceRequest, WithdrawRequest};
use crate::rpc::{BankServiceClient, REQUEST_ID_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateAccount,
    Deposit,
    GetBalance,
    Withdraw,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::CreateAccount => "CreateAccount",
            Step::Deposit => "Deposit",
            Step::GetBalance => "GetBalance",
            Step::Withdraw => "Withdraw",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("{step} did not complete before the deadline")]
    DeadlineExceeded { step: Step },

    #[error("{step} failed: {} ({:?})", .status.message(), .status.code())]
    Rpc { step: Step, status: Status },
}

impl DriverError {
    pub fn step(&self) -> Step {
        match self {
            DriverError::DeadlineExceeded { step } | DriverError::Rpc { step, .. } => *step,
        }
    }
}

/// What the driver does in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverPlan {
    pub account_id: AccountId,
    pub deposit: Cents,
    pub withdraw: Cents,
    pub timeout: Duration,
}

impl Default for DriverPlan {
    fn default() -> Self {
        Self {
            account_id: "12345".to_string(),
            deposit: 10000,
            withdraw: 5000,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Balances observed along the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverReport {
    pub account_id: AccountId,
    pub balance_after_deposit: Cents,
    pub balance: Cents,
    pub balance_after_withdrawal: Cents,
}

pub async fn run(channel: Channel, plan: &DriverPlan) -> Result<DriverReport, DriverError> {
    let mut client = BankServiceClient::new(channel);
    let deadline = Instant::now() + plan.timeout;

    let created = call(
        Step::CreateAccount,
        deadline,
        client.create_account(request(
            deadline,
            CreateAccountRequest {
                account_id: plan.account_id.clone(),
            },
        )),
    )
    .await?;
    info!(account_id = %created.account_id, "account created");

    let deposited = call(
        Step::Deposit,
        deadline,
        client.deposit(request(
            deadline,
            DepositRequest {
                account_id: plan.account_id.clone(),
                amount: plan.deposit,
            },
        )),
    )
    .await?;
    info!(new_balance = %format_cents(deposited.new_balance), "deposit applied");

    let balance = call(
        Step::GetBalance,
        deadline,
        client.get_balance(request(
            deadline,
            GetBalanceRequest {
                account_id: plan.account_id.clone(),
            },
        )),
    )
    .await?;
    info!(balance = %format_cents(balance.balance), "balance fetched");

    let withdrawn = call(
        Step::Withdraw,
        deadline,
        client.withdraw(request(
            deadline,
            WithdrawRequest {
                account_id: plan.account_id.clone(),
                amount: plan.withdraw,
            },
        )),
    )
    .await?;
    info!(new_balance = %format_cents(withdrawn.new_balance), "withdrawal applied");

    Ok(DriverReport {
        account_id: created.account_id,
        balance_after_deposit: deposited.new_balance,
        balance: balance.balance,
        balance_after_withdrawal: withdrawn.new_balance,
    })
}

/// Wrap a message with the remaining budget (sent as `grpc-timeout`) and a
/// fresh request id.
fn request<T>(deadline: Instant, message: T) -> Request<T> {
    let mut request = Request::new(message);
    request.set_timeout(deadline.saturating_duration_since(Instant::now()));
    if let Ok(value) = Uuid::new_v4().to_string().parse() {
        request.metadata_mut().insert(REQUEST_ID_HEADER, value);
    }
    request
}

async fn call<T, F>(step: Step, deadline: Instant, fut: F) -> Result<T, DriverError>
where
    F: Future<Output = Result<Response<T>, Status>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(Ok(response)) => Ok(response.into_inner()),
        // The server enforced the propagated timeout before we did.
        Ok(Err(status))
            if matches!(status.code(), Code::DeadlineExceeded | Code::Cancelled)
                && Instant::now() >= deadline =>
        {
            Err(DriverError::DeadlineExceeded { step })
        }
        Ok(Err(status)) => Err(DriverError::Rpc { step, status }),
        Err(_) => Err(DriverError::DeadlineExceeded { step }),
    }
}
