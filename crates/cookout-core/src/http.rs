//! Shared HTTP plumbing for the coordination store and hosting API clients.
//!
//! The clients are async (reqwest); the deploy flow is sequential, so each
//! query is driven to completion on a short-lived runtime.

use std::future::Future;

pub(crate) const USER_AGENT: &str = concat!("cookout/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used for every outbound request.
pub(crate) fn client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Block the calling thread on `future`.
pub(crate) fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    Ok(runtime.block_on(future))
}
