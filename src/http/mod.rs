//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, request-id layers, graceful shutdown)
//!     → request.rs (assign / propagate x-request-id)
//!     → pipeline stages defined here:
//!         static_files.rs (stage 6)
//!         body.rs         (stage 7, JSON body)
//!         cookies.rs      (stage 9)
//!     → routing registry
//!     → Send to client
//! ```

pub mod body;
pub mod cookies;
pub mod request;
pub mod server;
pub mod static_files;

pub use body::{JsonBody, JsonBodyParser};
pub use cookies::{CookieParser, Cookies};
pub use request::X_REQUEST_ID;
pub use server::{build_registry, HttpServer};
pub use static_files::StaticFiles;
