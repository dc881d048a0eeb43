mod channel;
mod dispatch;
mod guest;
mod host;
mod protocol;

pub use channel::{ChannelError, CommandChannel, RawWriter, Requests};
pub use dispatch::{ChannelDispatch, Dispatch, HostDispatch, LocalDispatch};
pub use guest::{Guest, GuestError};
pub use host::{Host, HostHandle};
pub use protocol::{
    DEFAULT_PORT, GuessArgs, HOST_REQUEST_LINES, HostCommand, JOIN_REJECTED, JoinReply, Line,
    REMOTE_REQUEST_LINES, REQUEST_MARKER, RESPONSE_MARKER, RemoteCommand, decode_bool,
    encode_bool, single_line,
};
