//! A client-side SPDY multiplexed session runtime: binary framing,
//! per-stream and per-session flow control, server push with URL
//! claiming, and graceful shutdown, all running as a single cooperative
//! task per session over one transport.
//!
//! The entry point is [`session::open`], which pairs a [`session::SessionHandle`]
//! (used to create and claim streams) with a [`session::Session`] future that
//! must be driven — typically via `tokio::spawn(session.run())` — for any
//! of it to happen.

pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod pool;
pub mod properties;
pub mod proto;
pub mod session;
pub mod ssl;
pub mod streams;
pub mod transport;

pub use config::{Builder, FlowControlMode, SessionConfig, Version};
pub use error::{Error, Reason};
pub use session::{open, CreateStreamRequest, Session, SessionHandle, StreamEvent, StreamHandle};
pub use streams::StreamKind;
