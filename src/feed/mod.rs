//! Live AISStream client.

mod client;
mod protocol;

pub use client::{
    dispatch, forward_shutdown, handle_payload, Backoff, ConnectionState, FeedClient, FeedConfig,
    AISSTREAM_URL, API_KEY_ENV,
};
pub use protocol::{parse_frame, Frame, FrameError, Subscription, IDENTITY_KIND, POSITION_KIND};
