//! Client for the TimeTagger time-tracking REST API.
//!
//! # Overview
//! Fetches records and settings, syncs changes incrementally since a
//! checkpoint, and writes records and settings back. Records are never hard
//! deleted: a description starting with `HIDDEN` marks them as removed.
//!
//! # Design
//! - `TimeTaggerClient` is stateless and does no I/O. Each operation is split
//!   into `build_*` (produces an `HttpRequest`) and `parse_*` (consumes an
//!   `HttpResponse`), so hosts can bring their own HTTP stack.
//! - `BlockingClient` runs the same operations over a `Transport`, by default
//!   `UreqTransport`, and handles the reset-triggered full resync.
//! - The JSON shapes of the service stay private to the crate; callers only
//!   see `Record`, `Setting`, `WriteResult` and `Updates`.

pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;
mod wire;

pub use blocking::BlockingClient;
pub use client::TimeTaggerClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{Record, Setting, UpdateFeed, Updates, WriteResult, HIDDEN_MARKER};
pub use wire::MAX_TIMESTAMP;
