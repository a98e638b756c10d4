//! Test doubles for the secrets service and the orchestrator.
//!
//! `FakeJuju` stands in for the orchestrator and records every mutating call.
//!
//! `SimCluster` holds the shared state of an in-memory vault cluster. It is
//! reachable either directly through `SimClient` or over real HTTP through
//! `FakeVault`, so the verifier and the HTTP client are tested against the
//! same behaviour.

mod fake_server;
mod sim;

pub use fake_server::FakeVault;
pub use orchestrator::{FakeJuju, JujuCall};
pub use sim::{SimClient, SimCluster};
