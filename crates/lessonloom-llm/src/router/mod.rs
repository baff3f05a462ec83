//! Router - policy-driven backend selection
//!
//! # Module Structure
//!
//! - `settings`: `RouterSettings`
//! - `policy`: `SelectionPolicy` and the pure selection function
//! - `router_impl`: `Router` (dispatch, fallback, backend management)
//! - `mock`: scripted backends for tests

mod mock;
mod policy;
mod router_impl;
mod settings;

#[cfg(test)]
mod tests;

pub use mock::{MockBackend, MockBackendFactory, MockReply, MockScript};
pub use policy::SelectionPolicy;
pub use router_impl::{Router, TestResult, MAX_REDISPATCHES};
pub use settings::{RouterSettings, DEFAULT_TIMEOUT_MS};
