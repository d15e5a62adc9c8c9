//! Common test utilities
//!
//! Shared across the castcore integration tests

pub mod fixtures;
pub mod gateway;

#[allow(unused_imports)]
pub use fixtures::TestLedger;
#[allow(unused_imports)]
pub use gateway::{GatewayCall, ScriptedGateway};
