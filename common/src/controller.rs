use serde::Serialize;

use crate::{
    error::{FrameError, SessionError},
    protocol::{Message, TAG_CALIBRATE, TAG_CONNECT, TAG_DISCONNECT},
    time::Time,
};

/// Outbound half of an established radio link.
///
/// Sends are fire-and-forget: `Ok` means the frame was handed to the link,
/// not that the device received it.
pub trait Link {
    fn send(&mut self, frame: &str) -> Result<(), SessionError>;

    /// Releases the link. Called exactly once when the session lets go of it.
    fn forget(&mut self);
}

/// Device-reported state as last seen by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mirror {
    pub time: Option<Time>,
    pub playing: bool,
}

enum Connection<L> {
    Disconnected,
    Connected { link: L, mirror: Mirror },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub connected: bool,
    #[serde(rename = "mirroredTime")]
    pub mirrored_time: Option<Time>,
    #[serde(rename = "clockFace")]
    pub clock_face: String,
    pub playing: bool,
}

/// Controller side of the protocol. Never treats its own requests as truth:
/// the mirror only changes when the device reports.
pub struct ControllerSession<L> {
    connection: Connection<L>,
}

impl<L: Link> Default for ControllerSession<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Link> ControllerSession<L> {
    pub fn new() -> Self {
        Self {
            connection: Connection::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected { .. })
    }

    pub fn link(&self) -> Option<&L> {
        match &self.connection {
            Connection::Connected { link, .. } => Some(link),
            Connection::Disconnected => None,
        }
    }

    pub fn mirror(&self) -> Option<Mirror> {
        match &self.connection {
            Connection::Connected { mirror, .. } => Some(*mirror),
            Connection::Disconnected => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        let mirror = self.mirror().unwrap_or_default();
        SessionStatus {
            connected: self.is_connected(),
            mirrored_time: mirror.time,
            clock_face: mirror
                .time
                .unwrap_or(Time::MIDNIGHT)
                .clock_face(),
            playing: mirror.playing,
        }
    }

    /// Adopts a freshly established link, announces the controller and
    /// requests calibration to `now`. Any previous link is released first.
    ///
    /// If either announcement cannot be handed to the link, the link is
    /// released and the session stays disconnected.
    pub fn connect(&mut self, mut link: L, now: Time) -> Result<(), SessionError> {
        self.release();

        for message in [Message::Connect, Message::Calibrate(now)] {
            if let Err(err) = link.send(&message.to_frame()) {
                link.forget();
                return Err(err);
            }
        }

        self.connection = Connection::Connected {
            link,
            mirror: Mirror::default(),
        };
        Ok(())
    }

    /// Requests a new alarm time. The mirror is left alone until the device
    /// echoes it back.
    pub fn set_alarm_time(&mut self, time: Time) -> Result<(), SessionError> {
        let Connection::Connected { link, .. } = &mut self.connection else {
            return Err(SessionError::NotConnected);
        };

        if let Err(err) = link.send(&Message::Alarm(time).to_frame()) {
            self.release();
            return Err(err);
        }
        Ok(())
    }

    /// Says goodbye and drops the mirror. A failed goodbye is ignored.
    pub fn disconnect(&mut self) {
        if let Connection::Connected { link, .. } = &mut self.connection {
            let _ = link.send(&Message::Disconnect.to_frame());
        }
        self.release();
    }

    /// The link went away underneath the session.
    pub fn link_lost(&mut self) {
        self.release();
    }

    /// Dispatches one inbound frame. Frames arriving while disconnected are
    /// ignored.
    pub fn handle_frame(&mut self, frame: &str) -> Result<(), FrameError> {
        let Connection::Connected { mirror, .. } = &mut self.connection else {
            return Ok(());
        };

        match Message::decode(frame)? {
            Message::Alarm(time) => mirror.time = Some(time),
            Message::Playback(playing) => mirror.playing = playing,
            Message::Connect => return Err(FrameError::Unexpected(TAG_CONNECT)),
            Message::Disconnect => return Err(FrameError::Unexpected(TAG_DISCONNECT)),
            Message::Calibrate(_) => return Err(FrameError::Unexpected(TAG_CALIBRATE)),
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Connection::Connected { mut link, .. } =
            std::mem::replace(&mut self.connection, Connection::Disconnected)
        {
            link.forget();
        }
    }
}
