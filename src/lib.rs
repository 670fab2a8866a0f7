//! BSD-style socket layer with loadable worker modules.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod services;

pub use config::schema::KsockConfig;
pub use lifecycle::{ModuleHost, Worker};
pub use net::{Endpoint, SocketError, SocketHandle};
