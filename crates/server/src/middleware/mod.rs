//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, error capture)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded in the span, echoed in the response)
//! 4. CORS
//! 5. Security headers
//! 6. Rate limiting (auth routes only)
//!
//! Authentication is not a layer: handlers opt in with the [`RequireUser`] and
//! [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireAdmin, RequireUser};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
