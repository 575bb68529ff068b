pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod melody;
pub mod protocol;
pub mod scheduler;
pub mod time;

pub use config::{ChimeConfig, ControllerConfig, DeviceConfig, RuntimeConfig};
pub use controller::{ControllerSession, Link, Mirror, SessionStatus};
pub use device::{DeviceAction, DeviceEngine, DeviceEvent, DeviceState, Playback};
pub use error::{FrameError, SessionError};
pub use melody::{Chime, Note, Pluck, MELODY};
pub use protocol::{FrameSplitter, Message, FRAME_DELIMITER};
pub use time::Time;
