//! Operational diagnostics panel: probe reports, sync status, force sync.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::PanelConfig;
pub use handlers::PanelState;
pub use module::PanelModule;
