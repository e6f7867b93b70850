//! hearth-remote — HTTP collaborators for Hearth.
//!
//! Each type implements one of the orchestrator's collaborator traits over
//! JSON/HTTP so `hearthd` can wire the service to real endpoints:
//!
//! - [`HttpTaskExecutor`] posts fire-and-forget executions
//! - [`HttpProvisioningApi`] talks to the compute provisioning gateway
//! - [`GithubReleaseFeed`] reads the latest catalog release and its asset
//! - [`ApiClient`] reads the Hearth API itself, for the client-side poller

pub mod client;
pub mod error;
pub mod executor;
mod http;
pub mod provisioning;
pub mod release_feed;

pub use client::ApiClient;
pub use error::{RemoteError, RemoteResult};
pub use executor::HttpTaskExecutor;
pub use provisioning::HttpProvisioningApi;
pub use release_feed::GithubReleaseFeed;
