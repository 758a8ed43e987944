// # faceit-sync-core
//
// Core library for syncing Faceit skill levels to chat-server groups.
//
// ## Architecture Overview
//
// - **ProfileClient**: Trait for fetching profiles from the rating service
// - **UserDirectory**: Trait for resolving live users on the host chat server
// - **LinkStore**: Trait for the profile → local user mapping
// - **TierTable**: Validated tier → group table (rank resolution)
// - **reconcile**: Pure group delta computation plus a separate apply step
// - **SyncScheduler**: Periodic pass that reconciles every linked user
// - **LinkCommands**: `link` / `unlink` command handlers
//
// ## Design Principles
//
// 1. **Decision separate from effect**: deltas are computed without touching the host
// 2. **Managed groups only**: groups outside the tier table are never modified
// 3. **Isolation**: one user's failure or latency never affects another's
// 4. **Fail fast on config**: an incomplete tier table refuses to start

pub mod traits;
pub mod link;
pub mod rank;
pub mod reconcile;
pub mod scheduler;
pub mod commands;
pub mod config;
pub mod error;
pub mod state;
pub mod directory;

// Re-export core types for convenience
pub use traits::{GroupId, LinkStore, Profile, ProfileClient, UserDirectory, UserHandle};
pub use link::Link;
pub use rank::TierTable;
pub use reconcile::{GroupDelta, reconcile};
pub use scheduler::{ReconciliationOutcome, SkipReason, SyncEvent, SyncHandle, SyncReport, SyncScheduler};
pub use commands::LinkCommands;
pub use config::{SchedulerConfig, SyncConfig, TierEntry};
pub use error::{Error, Result};
pub use state::{FileLinkStore, MemoryLinkStore};
pub use directory::{FileUserDirectory, MemoryUserDirectory};
