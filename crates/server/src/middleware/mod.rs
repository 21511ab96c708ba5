//! HTTP middleware for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. CORS
//! 3. `TraceLayer` (request span)
//! 4. Request ID (recorded into the span above)
//!
//! Authentication is not a layer: handlers declare what they need through
//! the extractors in [`auth`].

pub mod auth;
pub mod request_id;

pub use auth::{Admin, AuthenticatedUser, Caller, MaybeDevice, MaybeUser, MobileDevice};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
