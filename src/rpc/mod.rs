pub mod proto;
mod server;

pub use proto::bank_service_client::BankServiceClient;
pub use proto::bank_service_server::BankServiceServer;
pub use server::*;
