use crate::{
    config::DeviceConfig,
    error::FrameError,
    melody::{Chime, Pluck},
    protocol::{Message, TAG_PLAYBACK},
    time::Time,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Playback {
    pub active: bool,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub current_time: Time,
    pub calibrated: bool,
    pub alarm_time: Time,
    pub playback: Playback,
}

impl DeviceState {
    /// Fresh boot: uncalibrated, alarm parked at the boot time.
    pub fn boot(now: Time) -> Self {
        Self {
            current_time: now,
            calibrated: false,
            alarm_time: now,
            playback: Playback::default(),
        }
    }
}

/// Effects the host runtime carries out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceAction {
    Play(Pluck),
    /// Cut off the note being played and anything still queued.
    Silence,
    SetClock(Time),
    Send(Message),
}

/// Inputs the device reacts to. Each one is applied to completion before
/// the next.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Received(Message),
    MinuteRollover(Time),
    Tick,
    /// Shake gesture: stop and rewind.
    Stop,
    /// Button A: resume from the current cursor.
    Resume,
}

#[derive(Debug, Clone)]
pub struct DeviceEngine {
    pub config: DeviceConfig,
    state: DeviceState,
}

impl DeviceEngine {
    pub fn new(config: DeviceConfig, boot_time: Time) -> Self {
        Self {
            config,
            state: DeviceState::boot(boot_time),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    pub fn apply(&mut self, event: DeviceEvent) -> Result<Vec<DeviceAction>, FrameError> {
        match event {
            DeviceEvent::Received(message) => self.handle_message(message),
            DeviceEvent::MinuteRollover(now) => Ok(self.on_minute_rollover(now)),
            DeviceEvent::Tick => Ok(self.tick()),
            DeviceEvent::Stop => Ok(self.stop()),
            DeviceEvent::Resume => Ok(self.resume()),
        }
    }

    /// Decodes and handles one raw frame. A frame that fails to decode
    /// leaves the state untouched and produces no reply.
    pub fn receive_frame(&mut self, frame: &str) -> Result<Vec<DeviceAction>, FrameError> {
        let message = Message::decode(frame)?;
        self.handle_message(message)
    }

    pub fn handle_message(&mut self, message: Message) -> Result<Vec<DeviceAction>, FrameError> {
        match message {
            Message::Connect => Ok(self.chime(Chime::Connect)),
            Message::Disconnect => Ok(self.chime(Chime::Disconnect)),
            Message::Calibrate(time) => {
                self.state.current_time = time;
                self.state.calibrated = true;
                Ok(vec![
                    DeviceAction::SetClock(time),
                    DeviceAction::Send(Message::Alarm(self.state.current_time)),
                ])
            }
            Message::Alarm(time) => {
                self.state.alarm_time = time;
                Ok(vec![DeviceAction::Send(Message::Alarm(self.state.alarm_time))])
            }
            Message::Playback(_) => Err(FrameError::Unexpected(TAG_PLAYBACK)),
        }
    }

    fn chime(&self, chime: Chime) -> Vec<DeviceAction> {
        chime
            .notes()
            .into_iter()
            .map(|note| DeviceAction::Play(self.config.chime_pluck(note)))
            .collect()
    }
}
