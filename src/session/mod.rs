//! The duplex streaming session: state machine, transport and audio egress.

pub mod state;
pub mod streaming;
pub mod transport;

pub use state::SessionState;
pub use streaming::{SessionEvent, StreamingSession, spawn_audio_sender};
pub use transport::{Connector, Inbound, MockConnector, Outbound, Transport, WebSocketConnector};
