// Equipment Registry - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod equipment;
pub mod error;
pub mod import;
pub mod registry;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    load_registry, save_registry, setup_database, verify_count, with_registry, StoredRegistry,
};
pub use equipment::{
    Equipment, NewEquipment, DEFAULT_HEALTH_SCORE, DEFAULT_STATUS, MAX_HEALTH_SCORE,
};
pub use error::{RegistryError, RegistryResult};
pub use import::{load_csv, parse_csv, parse_installation_date};
pub use registry::EquipmentRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the `tracing` subscriber used by both binaries.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
