//! Outbound messaging for the reminder bot.
//!
//! Defines the message model (text, date pickers, quick actions), the
//! [`MessageGateway`] trait used to reply to and push to users, and its
//! implementations:
//!
//! - [`HttpGateway`] posts to an HTTP relay
//! - [`LoggingGateway`] for local runs
//! - [`RecordingGateway`] for tests

pub mod error;
pub mod format;
pub mod http;
pub mod message;
pub mod recording;
pub mod sender;

pub use error::GatewayError;
pub use http::{GatewayConfig, HttpGateway};
pub use message::{OutboundMessage, PickerBounds, QuickAction, ReplyContext};
pub use recording::{Delivery, RecordingGateway};
pub use sender::{LoggingGateway, MessageGateway};
