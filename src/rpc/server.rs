use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info_span};

use crate::application::{AppError, LedgerService};

use super::proto::bank_service_server::{BankService, BankServiceServer};
use super::proto::{
    CreateAccountRequest, CreateAccountResponse, DepositRequest, DepositResponse,
    GetBalanceRequest, GetBalanceResponse, WithdrawRequest, WithdrawResponse,
};

/// Metadata key carrying the caller's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// gRPC front of the [`LedgerService`].
///
/// Decodes requests, forwards them verbatim and turns domain failures into
/// status codes. No validation of its own.
#[derive(Debug, Clone)]
pub struct BankHandler {
    service: LedgerService,
}

impl BankHandler {
    pub fn new(service: LedgerService) -> Self {
        Self { service }
    }

    pub fn into_server(self) -> BankServiceServer<Self> {
        BankServiceServer::new(self)
    }
}

fn request_id(metadata: &MetadataMap) -> String {
    metadata
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

fn reply<T>(method: &str, result: Result<T, AppError>) -> Result<Response<T>, Status> {
    match result {
        Ok(body) => {
            debug!(method, "request completed");
            Ok(Response::new(body))
        }
        Err(err @ AppError::Internal(_)) => {
            error!(method, error = %err, "request failed");
            Err(err.into())
        }
        Err(err) => {
            debug!(method, error = %err, code = ?err.code(), "request rejected");
            Err(err.into())
        }
    }
}

#[tonic::async_trait]
impl BankService for BankHandler {
    async fn create_account(
        &self,
        request: Request<CreateAccountRequest>,
    ) -> Result<Response<CreateAccountResponse>, Status> {
        let request_id = request_id(request.metadata());
        let req = request.into_inner();
        let span = info_span!("create_account", account_id = %req.account_id, %request_id);

        span.in_scope(|| {
            let result = self
                .service
                .create_account(&req.account_id)
                .map(|account_id| CreateAccountResponse { account_id });
            reply("CreateAccount", result)
        })
    }

    async fn get_balance(
        &self,
        request: Request<GetBalanceRequest>,
    ) -> Result<Response<GetBalanceResponse>, Status> {
        let request_id = request_id(request.metadata());
        let req = request.into_inner();
        let span = info_span!("get_balance", account_id = %req.account_id, %request_id);

        span.in_scope(|| {
            let result = self
                .service
                .get_balance(&req.account_id)
                .map(|entry| GetBalanceResponse {
                    account_id: entry.account_id,
                    balance: entry.balance,
                });
            reply("GetBalance", result)
        })
    }

    async fn deposit(
        &self,
        request: Request<DepositRequest>,
    ) -> Result<Response<DepositResponse>, Status> {
        let request_id = request_id(request.metadata());
        let req = request.into_inner();
        let span = info_span!("deposit", account_id = %req.account_id, amount = req.amount, %request_id);

        span.in_scope(|| {
            let result = self
                .service
                .deposit(&req.account_id, req.amount)
                .map(|new_balance| DepositResponse { new_balance });
            reply("Deposit", result)
        })
    }

    async fn withdraw(
        &self,
        request: Request<WithdrawRequest>,
    ) -> Result<Response<WithdrawResponse>, Status> {
        let request_id = request_id(request.metadata());
        let req = request.into_inner();
        let span = info_span!("withdraw", account_id = %req.account_id, amount = req.amount, %request_id);

        span.in_scope(|| {
            let result = self
                .service
                .withdraw(&req.account_id, req.amount)
                .map(|new_balance| WithdrawResponse { new_balance });
            reply("Withdraw", result)
        })
    }
}
