/**
 * Optional TOML configuration file: dataset
 *  shape and storage defaults.
 */
pub mod config;
/**
 * Tracing subscriber setup, panic logging and
 *  startup build reporting.
 */
pub mod logging;
/**
 * Build information captured at compile time.
 */
pub mod version;

pub use config::{Config, ConfigError, StorageDefaults};
pub use version::{build_info, BuildInfo};
