//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, span)
//!     → middleware/request_context.rs (identity, client IP, referer, CASA, resolution)
//!     → handlers.rs (load content, decide, render JSON or SOAP)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;
pub mod soap;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
