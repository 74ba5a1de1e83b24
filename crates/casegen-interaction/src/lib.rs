//! Protocol plumbing for casegen.
//!
//! - `decoder`: byte fragments to `StreamFrame`s
//! - `session`: the `GenerationSession` state machine driving one exchange
//! - `http_transport` / `channel_transport`: `StreamTransport` implementations

pub mod channel_transport;
pub mod decoder;
pub mod http_transport;
pub mod session;

pub use channel_transport::{ChannelTransport, StreamFeeder, encode_frame};
pub use decoder::FrameDecoder;
pub use http_transport::HttpStreamTransport;
pub use session::{GenerationSession, SessionEvent, SessionHandle, SessionState};
