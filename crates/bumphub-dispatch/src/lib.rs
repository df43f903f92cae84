//! # BumpHub Dispatch
//!
//! The outbound edge of the engine: a transport-independent
//! [`NotificationPayload`], pure renderers that build payloads from
//! records, and the [`Dispatcher`] trait with its webhook
//! implementation (Discord-compatible embed JSON, bounded timeout,
//! exponential backoff on retryable errors).
//!
//! ```text
//! record ──render_*──▶ NotificationPayload ──Dispatcher──▶ webhook
//!                                            ├── send  → message id
//!                                            └── edit  → in place
//! ```

pub mod mock;
pub mod payload;
pub mod render;
pub mod webhook;

pub use mock::{MockCall, MockDispatcher};
pub use payload::{MessageId, NotificationPayload, PayloadField};
pub use render::{render_bump, render_new_listing, render_status, BoardStats};
pub use webhook::{Dispatcher, WebhookDispatcher};
