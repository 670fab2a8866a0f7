//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Worker loop iteration fails with a transient error (accept/recv)
//!     → backoff.rs (exponential delay + jitter, capped)
//!     → wait is cut short by a stop request
//!     → success resets the failure streak
//! ```
//!
//! # Design Decisions
//! - Setup failures (bind/listen/connect) are never retried
//! - Steady-state failures are retried forever with a bounded delay
//! - Jitter keeps several workers from retrying in lockstep

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff};
