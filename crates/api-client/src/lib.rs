//! HTTP client for the Slainte backend API, implementing the sync engine's
//! remote executor contract.

mod client;
mod error;

pub use client::ApiClient;
pub use error::{ApiError, Result};
