//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                  POST /?w=..&h=..&output=..                     │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌────────────────────────────┐   │
//! │  │        handlers          │  │          routes            │   │
//! │  │ (spawn_blocking + Stream)│  │ (router, CORS, body limit) │   │
//! │  └──────────────────────────┘  └────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{health_handler, process_handler, AppState, ErrorResponse, HealthResponse};
pub use routes::{create_router, RouterConfig};
