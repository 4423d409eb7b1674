// Application layer - use cases on top of the ledger, independent of transport

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
