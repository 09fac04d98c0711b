//! HTTP surface: `/api/students`, `/api/courses`, `/api/health`.

pub mod error;
mod handlers;
mod router;
pub mod types;

pub use router::router;
pub use types::AppState;
