// Transport layer - mutual TLS credentials and the sockets on either end

pub mod channel;
pub mod server;
pub mod tls;

pub use channel::{ConnectError, connect, connect_plaintext, connect_tls};
pub use server::{LedgerServer, ServeError};
pub use tls::{CredentialError, Credentials};
