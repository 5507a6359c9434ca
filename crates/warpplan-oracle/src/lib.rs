//! warpplan-oracle: the advisory oracle, behind a validation wall.
//!
//! The oracle is an external model endpoint that may be slow, may refuse
//! requests, and may return anything at all. This crate builds a bounded
//! request, ships it over an `OracleTransport`, and turns whatever comes
//! back into a `Decision` whose action is guaranteed to be one of the four
//! allowed values.
//!
//! # Architecture
//!
//! ```text
//! OracleClient::invoke()
//!   ├── request::build_body()      policy prompt + telemetry + hints
//!   ├── OracleTransport::post()    HttpTransport (hyper + rustls) or a test double
//!   ├── 429 / RESOURCE_EXHAUSTED → Backoff::trip(retry_after) → OracleError::RateLimited
//!   ├── other non-2xx / timeout  → OracleError::Unavailable
//!   └── response::decode()        fence stripping, action coercion, reason truncation
//! ```
//!
//! # Backoff
//!
//! Rate-limit signals push the `Backoff` window out by the server's
//! `Retry-After` hint, or `base * 2^power` without one, capped at the
//! configured maximum. The caller resets the exponent after a successful
//! round trip.

pub mod backoff;
pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod transport;

pub use backoff::Backoff;
pub use client::OracleClient;
pub use error::{OracleError, TransportError};
pub use request::{Hints, PolicyHints};
pub use transport::{BoxFuture, HttpTransport, OracleTransport, RawResponse};
