//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber wakes → server stops accepting
//!     → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast coordinator; the server and background tasks subscribe
//! - Signal handling lives in the binary, the library only sees the future

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
