// src/connectors/mod.rs
pub mod guarded;
pub mod messages;
pub mod okx;
pub mod traits;

pub use guarded::GuardedGateway;
pub use okx::OkxClient;
pub use traits::{ExchangeGateway, ExchangeResult};
