//! `Stratum` Core: storage keys, user scopes, records, tier contracts and errors.

pub mod clock;
pub mod error;
pub mod key;
pub mod record;
pub mod scope;
pub mod traits;
pub mod types;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use error::{LocalCacheError, TierError};
pub use key::{native_key, KeyError, KeyRegistry, StorageKey, PROBE_KEY_PREFIX};
pub use record::Record;
pub use scope::{ScopeError, UserScope, GUEST_SCOPE};
pub use traits::{DurableAdapter, FallbackStore, IdentityProvider, LocalCache};
pub use types::{DiagnosticReport, SyncState, SyncStatus, TierKind, TierProbeResult};
