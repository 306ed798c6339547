//! Binary wire protocol for the switchboard data plane
//!
//! Frames are a big-endian u32 length followed by a bincode payload. Both
//! hops use the same framing: client to router (`callrw`-style requests) and
//! router to storage master.

pub mod client;
pub mod codec;
pub mod message;

pub use client::WireClient;
pub use codec::{FrameReader, FrameWriter, DEFAULT_MAX_FRAME_SIZE};
pub use message::{ErrorCode, Request, RequestBody, Response, ResponseBody};

use thiserror::Error;

/// Wire protocol errors
#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds limit of {1} bytes")]
    FrameTooLarge(usize, usize),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("operation timed out")]
    Timeout,
    #[error("response id {got} does not match request id {want}")]
    IdMismatch { want: u64, got: u64 },
    #[error("remote error ({code}): {message}")]
    Remote {
        code: message::ErrorCode,
        message: String,
    },
}
