//! `forge-client` — async client for the hosting platform ("forge").
//!
//! Two jobs, both behind `steward-core`'s synchronous seams:
//!
//! ```text
//! ForgeClient::snapshot(org)          PlatformRunner::run(candidate)
//!     │                                   │
//!     ▼                                   ▼
//! GET /orgs/{org}/repos              one idempotent platform call
//!     │  per-repo, bounded               per ActionKind
//!     ▼                                   │
//! RepoSignals ──► OrgSnapshot         RunEffect / RunFailure
//! ```
//!
//! The engine never awaits: `PlatformRunner` bridges sync call sites (CLI
//! main thread, server blocking pool) onto a tokio runtime.

pub mod client;
pub mod error;
pub mod runner;
pub mod snapshot;
pub mod types;


pub use client::ForgeClient;
pub use error::ForgeError;
pub use runner::PlatformRunner;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ForgeError>;
