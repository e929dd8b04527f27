//! Remote HTTP API access
//!
//! - [`transport`]: the network seam and its `reqwest` implementation
//! - [`client`]: retry/backoff and error classification
//! - [`graph`]: the two Microsoft Graph calls a meeting needs

pub mod client;
pub mod graph;
pub mod transport;

pub use client::{ApiClient, RetryPolicy};
pub use graph::{GraphClient, MeetingRequest, OnlineMeeting, Profile};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
