//! Exchange gateway implementations.
//!
//! - [`PaperGateway`]: in-memory exchange used for simulation and tests
//! - [`OkxGateway`]: OKX v5 REST endpoints over an [`OkxTransport`], signed
//!   HTTP by default

pub mod okx;
mod paper;

pub use okx::{HttpTransport, OkxCredentials, OkxGateway, OkxTransport};
pub use paper::{GatewayCall, GatewayOperation, PaperGateway};
