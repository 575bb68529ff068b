//! Text framing shared by the controller and the device.
//!
//! Frames are `tag` or `tag:payload`, terminated by [`FRAME_DELIMITER`].
//! Time payloads are `H-M-S`.

use std::fmt;

use crate::{
    error::FrameError,
    time::{parse_time_fields, Time},
};

pub const FRAME_DELIMITER: u8 = b',';
pub const TAG_SEPARATOR: char = ':';
pub const FIELD_SEPARATOR: char = '-';

pub const TAG_CONNECT: &str = "c";
pub const TAG_DISCONNECT: &str = "d";
pub const TAG_CALIBRATE: &str = "s";
pub const TAG_ALARM: &str = "s1";
pub const TAG_PLAYBACK: &str = "m";

pub const DEFAULT_MAX_FRAME_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// `c`: controller attached.
    Connect,
    /// `d`: controller leaving.
    Disconnect,
    /// `s:H-M-S`: set the device clock.
    Calibrate(Time),
    /// `s1:H-M-S`: alarm set request, or the device's report of it.
    Alarm(Time),
    /// `m:0|1`: playback stopped or started.
    Playback(bool),
}

impl Message {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Connect => TAG_CONNECT,
            Self::Disconnect => TAG_DISCONNECT,
            Self::Calibrate(_) => TAG_CALIBRATE,
            Self::Alarm(_) => TAG_ALARM,
            Self::Playback(_) => TAG_PLAYBACK,
        }
    }

    /// Parses one frame (without its delimiter).
    ///
    /// Numeric time fields outside their range are clamped, so a peer that
    /// stores the decoded value and echoes it reports what it actually kept.
    pub fn decode(frame: &str) -> Result<Self, FrameError> {
        let frame = frame.trim();
        if frame.is_empty() {
            return Err(FrameError::Empty);
        }

        let (tag, payload) = match frame.split_once(TAG_SEPARATOR) {
            Some((tag, payload)) => (tag, Some(payload)),
            None => (frame, None),
        };

        match tag {
            TAG_CONNECT => Ok(Self::Connect),
            TAG_DISCONNECT => Ok(Self::Disconnect),
            TAG_CALIBRATE => {
                let payload = payload.ok_or(FrameError::MissingPayload(TAG_CALIBRATE))?;
                Ok(Self::Calibrate(decode_time(payload)?))
            }
            TAG_ALARM => {
                let payload = payload.ok_or(FrameError::MissingPayload(TAG_ALARM))?;
                Ok(Self::Alarm(decode_time(payload)?))
            }
            TAG_PLAYBACK => {
                let payload = payload.ok_or(FrameError::MissingPayload(TAG_PLAYBACK))?;
                Ok(Self::Playback(payload.trim() == "1"))
            }
            other => Err(FrameError::UnknownTag(other.to_string())),
        }
    }

    /// Encoded frame including the trailing delimiter.
    pub fn to_frame(&self) -> String {
        format!("{self}{}", FRAME_DELIMITER as char)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect | Self::Disconnect => f.write_str(self.tag()),
            Self::Calibrate(time) | Self::Alarm(time) => {
                write!(f, "{}{TAG_SEPARATOR}{time}", self.tag())
            }
            Self::Playback(playing) => {
                write!(f, "{}{TAG_SEPARATOR}{}", self.tag(), u8::from(*playing))
            }
        }
    }
}

fn decode_time(payload: &str) -> Result<Time, FrameError> {
    let [hour, minute, second] = parse_time_fields(payload)?;
    Ok(Time::clamped(hour, minute, second))
}

/// Splits an arbitrary byte stream into delimiter-terminated frames.
///
/// Bytes arrive in whatever chunks the link delivers them. A partial frame
/// that grows past `max_frame_bytes` is reported once and then discarded up
/// to the next delimiter.
#[derive(Debug, Clone)]
pub struct FrameSplitter {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
    discarding: bool,
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameSplitter {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_frame_bytes),
            max_frame_bytes: max_frame_bytes.max(1),
            discarding: false,
        }
    }

    /// Feeds a chunk and returns every frame it completed, in order.
    /// Empty frames (`,,`) are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, FrameError>> {
        let mut frames = Vec::new();

        for &byte in bytes {
            if byte == FRAME_DELIMITER {
                if self.discarding {
                    self.discarding = false;
                } else if !self.buffer.is_empty() {
                    let raw = std::mem::take(&mut self.buffer);
                    frames.push(String::from_utf8(raw).map_err(|_| FrameError::NotUtf8));
                }
                continue;
            }

            if self.discarding {
                continue;
            }

            if self.buffer.len() == self.max_frame_bytes {
                self.buffer.clear();
                self.discarding = true;
                frames.push(Err(FrameError::Oversized(self.max_frame_bytes)));
                continue;
            }

            self.buffer.push(byte);
        }

        frames
    }
}
