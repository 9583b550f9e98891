//! CRM export adapter.
//!
//! One export pipeline replaces the original trio of overlapping
//! migration scripts: assessments are written to a durable outbox on
//! submission, and a background dispatcher delivers them to the CRM
//! through a pluggable transport (REST contact API or inbound webhook)
//! with bounded retries and exponential backoff.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{DispatchSummary, ExportDispatcher};
pub use transport::{
    build_transport, contact_payload, ExportError, ExportTransport, RestTransport,
    WebhookTransport,
};
