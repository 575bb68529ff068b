use std::{fmt, str::FromStr};

use chrono::Timelike;
use serde::Serialize;

use crate::{error::FrameError, protocol::FIELD_SEPARATOR};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Time of day with second resolution.
///
/// Values are always in range; construction either validates ([`Time::new`])
/// or clamps ([`Time::clamped`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Time {
    hour: u8,
    minute: u8,
    second: u8,
}

impl Time {
    pub const MIDNIGHT: Self = Self {
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub fn new(hour: u32, minute: u32, second: u32) -> Option<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        Some(Self {
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        })
    }

    pub fn clamped(hour: u32, minute: u32, second: u32) -> Self {
        Self {
            hour: hour.min(23) as u8,
            minute: minute.min(59) as u8,
            second: second.min(59) as u8,
        }
    }

    pub fn from_chrono<T: Timelike>(value: &T) -> Self {
        // Leap seconds report second 60.
        Self::clamped(value.hour(), value.minute(), value.second())
    }

    pub fn from_seconds_of_day(seconds: u64) -> Self {
        let seconds = seconds % SECONDS_PER_DAY;
        Self {
            hour: (seconds / 3600) as u8,
            minute: (seconds / 60 % 60) as u8,
            second: (seconds % 60) as u8,
        }
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn second(self) -> u8 {
        self.second
    }

    pub fn seconds_of_day(self) -> u64 {
        self.hour as u64 * 3600 + self.minute as u64 * 60 + self.second as u64
    }

    /// Hour and minute match; seconds are ignored.
    pub fn same_minute(self, other: Time) -> bool {
        self.hour == other.hour && self.minute == other.minute
    }

    /// 12-hour `hh:mm am` rendering used by the controller's clock face.
    pub fn clock_face(self) -> String {
        let hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        let suffix = if self.hour < 12 { "am" } else { "pm" };
        format!("{hour:02}:{:02} {suffix}", self.minute)
    }
}

/// Wire form: `H-M-S` with no zero padding.
impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.hour, self.minute, self.second
        )
    }
}

/// Strict parse of the wire form; out-of-range fields are rejected rather
/// than clamped.
impl FromStr for Time {
    type Err = FrameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let [hour, minute, second] = parse_time_fields(value)?;
        Time::new(hour, minute, second).ok_or_else(|| FrameError::OutOfRange(value.to_string()))
    }
}

/// Splits an `H-M-S` payload into three unsigned integers.
pub fn parse_time_fields(payload: &str) -> Result<[u32; 3], FrameError> {
    let fields: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();
    let [hour, minute, second] = fields.as_slice() else {
        return Err(FrameError::FieldCount(fields.len()));
    };

    let parse = |field: &str| {
        let digits = field.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FrameError::BadField(field.to_string()));
        }
        digits
            .parse::<u32>()
            .map_err(|_| FrameError::BadField(field.to_string()))
    };

    Ok([parse(*hour)?, parse(*minute)?, parse(*second)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_without_padding() {
        let time = Time::new(9, 5, 0).unwrap();
        assert_eq!(time.to_string(), "9-5-0");
    }

    #[test]
    fn strict_parse_rejects_out_of_range() {
        assert_eq!("10-30-0".parse::<Time>(), Ok(Time::new(10, 30, 0).unwrap()));
        assert!(matches!(
            "24-0-0".parse::<Time>(),
            Err(FrameError::OutOfRange(_))
        ));
        assert!(matches!(
            "ab-0-0".parse::<Time>(),
            Err(FrameError::BadField(field)) if field == "ab"
        ));
        assert_eq!("1-2".parse::<Time>(), Err(FrameError::FieldCount(2)));
        assert_eq!("1-2-3-4".parse::<Time>(), Err(FrameError::FieldCount(4)));
    }

    #[test]
    fn fields_must_be_plain_digits() {
        assert_eq!(parse_time_fields(" 7 -08-9"), Ok([7, 8, 9]));
        for payload in ["+5-0-0", "5--1-0", "5- -0", "0x1-0-0"] {
            assert!(parse_time_fields(payload).is_err(), "{payload}");
        }
    }

    #[test]
    fn clamps_each_field_independently() {
        assert_eq!(Time::clamped(25, 61, 7), Time::new(23, 59, 7).unwrap());
    }

    #[test]
    fn wraps_seconds_of_day() {
        let time = Time::from_seconds_of_day(SECONDS_PER_DAY + 3_661);
        assert_eq!(time, Time::new(1, 1, 1).unwrap());
        assert_eq!(time.seconds_of_day(), 3_661);
    }

    #[test]
    fn same_minute_ignores_seconds() {
        let a = Time::new(10, 30, 0).unwrap();
        let b = Time::new(10, 30, 59).unwrap();
        let c = Time::new(10, 31, 0).unwrap();
        assert!(a.same_minute(b));
        assert!(!a.same_minute(c));
    }

    #[test]
    fn clock_face_uses_twelve_hour_form() {
        assert_eq!(Time::MIDNIGHT.clock_face(), "12:00 am");
        assert_eq!(Time::new(9, 5, 0).unwrap().clock_face(), "09:05 am");
        assert_eq!(Time::new(12, 30, 0).unwrap().clock_face(), "12:30 pm");
        assert_eq!(Time::new(23, 59, 0).unwrap().clock_face(), "11:59 pm");
    }
}
