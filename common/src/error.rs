use thiserror::Error;

/// A frame that could not be turned into a [`crate::protocol::Message`].
///
/// Every variant is dropped without a reply; callers log them at debug level
/// at most.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown tag {0:?}")]
    UnknownTag(String),
    #[error("tag {0:?} is not accepted by this peer")]
    Unexpected(&'static str),
    #[error("tag {0:?} requires a payload")]
    MissingPayload(&'static str),
    #[error("field {0:?} is not an unsigned integer")]
    BadField(String),
    #[error("expected 3 time fields, found {0}")]
    FieldCount(usize),
    #[error("time {0} is out of range")]
    OutOfRange(String),
    #[error("frame exceeds {0} bytes")]
    Oversized(usize),
    #[error("frame is not valid utf-8")]
    NotUtf8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no device found: {0}")]
    NoDeviceFound(String),
    #[error("not connected to a device")]
    NotConnected,
    #[error("link lost: {0}")]
    LinkLost(String),
}
