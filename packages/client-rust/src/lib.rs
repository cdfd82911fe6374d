//! `Stratum` Client: tiered persistence resolver, migration sweeper, status
//! prober and the operational panel built on them.

pub mod config;
pub mod error;
pub mod identity;
pub mod migration;
pub mod panel;
pub mod prober;
pub mod resolver;
pub mod storage;
pub mod sync_state;

pub use config::{MigrationConfig, ProbeConfig, ResolverConfig, TierPolicy};
pub use error::{MigrationError, ResolverError};
pub use identity::StaticIdentity;
pub use migration::{MigrationReport, MigrationSweeper};
pub use prober::{ProbeTargets, StatusProber};
pub use resolver::{RemoveOutcome, Resolver, ResolverDeps, SetOutcome, TierAttempt};
pub use sync_state::{SyncGuard, SyncStateTracker};
