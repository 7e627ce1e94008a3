//! Process lifecycle.
//!
//! ```text
//! Ctrl-C / SIGTERM (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → HTTP server stops accepting, in-flight requests finish
//!     → nonce sweeper and config watcher exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
