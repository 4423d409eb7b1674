pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod driver;
pub mod rpc;
pub mod storage;
pub mod telemetry;
pub mod transport;

pub use config::Config;
pub use domain::*;
pub use storage::Ledger;
