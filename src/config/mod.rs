//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → KsockConfig (validated, immutable)
//!     → each module takes its own section at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; modules read it only at load time
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    KsockConfig, ObservabilityConfig, TcpClientConfig, TcpServerConfig, UdpClientConfig,
    UdpServerConfig, WorkerConfig,
};
pub use validation::{validate_config, ValidationError};
