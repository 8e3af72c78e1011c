//! Protocol types and framing. The transport itself (connection acceptor,
//! socket lifecycle) lives outside this crate and speaks these types over
//! the [`codec`] framing, delivering outbound events through a
//! [`ConnectionSink`].

pub mod codec;
pub mod errors;
pub mod messages;

pub use codec::{read_prefixed, write_prefixed};
pub use errors::SerializationError;
pub use messages::{ClientCommand, ConnectionId, ConnectionSink, ServerEvent};
