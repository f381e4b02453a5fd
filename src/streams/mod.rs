//! Stream-side state: flow-control windows, the state machine for a
//! single stream, the arena that stores them, and the registry of
//! auxiliary indices (by id, by unclaimed push URL, pending requests).

pub mod flow_control;
pub mod registry;
pub mod store;
pub mod stream;

pub use flow_control::{RecvWindow, SendWindow};
pub use registry::{PendingRequest, Registry};
pub use store::{Key, Store};
pub use stream::{Direction, Produce, State, Stream, StreamKind};
