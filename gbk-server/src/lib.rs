//! # Guestbook HTTP Front-End
//!
//! Purpose: Serve a tiny list API over a master/replica store pair whose
//! addresses are discovered through a sentinel at startup.
//!
//! ## Design Principles
//! 1. **Explicit State**: The two pools are injected into the router; there
//!    are no process-wide handles.
//! 2. **Writes to Master, Reads from Replica**: Every route picks its pool by role.
//! 3. **Request-Scoped Failure**: A store error fails one request, never the process.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use bootstrap::{provision, resolve_plan, ProvisionPlan, StaticAddrs};
pub use config::{Cli, SentinelSettings};
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;
