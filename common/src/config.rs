use serde::{Deserialize, Serialize};

use crate::{
    melody::{Note, Pluck},
    protocol::DEFAULT_MAX_FRAME_BYTES,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChimeConfig {
    pub duration_ms: u32,
    pub slope: u8,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            duration_ms: 200,
            slope: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub listen_addr: String,
    pub tick_interval_ms: u64,
    pub note_duration_ms: u32,
    pub note_slope: u8,
    pub sample_ms: u32,
    pub chime: ChimeConfig,
    pub max_frame_bytes: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7878".to_string(),
            tick_interval_ms: 300,
            note_duration_ms: 300,
            note_slope: 4,
            sample_ms: 10,
            chime: ChimeConfig::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl DeviceConfig {
    pub fn sanitize(&mut self) {
        self.tick_interval_ms = self.tick_interval_ms.clamp(50, 5_000);
        self.sample_ms = self.sample_ms.clamp(1, 100);
        self.note_duration_ms = self.note_duration_ms.clamp(self.sample_ms, 5_000);
        self.chime.duration_ms = self.chime.duration_ms.clamp(self.sample_ms, 5_000);
        self.note_slope = self.note_slope.max(1);
        self.chime.slope = self.chime.slope.max(1);
        self.max_frame_bytes = self.max_frame_bytes.clamp(16, 1_024);
    }

    pub fn note_pluck(&self, note: Note) -> Pluck {
        Pluck {
            note,
            duration_ms: self.note_duration_ms,
            slope: self.note_slope,
            sample_ms: self.sample_ms,
        }
    }

    pub fn chime_pluck(&self, note: Note) -> Pluck {
        Pluck {
            note,
            duration_ms: self.chime.duration_ms,
            slope: self.chime.slope,
            sample_ms: self.sample_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub device_addr: String,
    pub connect_timeout_ms: u64,
    pub http_port: u16,
    pub timezone: String,
    pub max_frame_bytes: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_addr: "127.0.0.1:7878".to_string(),
            connect_timeout_ms: 5_000,
            http_port: 8080,
            timezone: "America/Los_Angeles".to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        self.connect_timeout_ms = self.connect_timeout_ms.clamp(100, 60_000);
        self.max_frame_bytes = self.max_frame_bytes.clamp(16, 1_024);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl RuntimeConfig {
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let mut runtime: Self = serde_json::from_slice(raw)?;
        runtime.sanitize();
        Ok(runtime)
    }

    pub fn sanitize(&mut self) {
        self.device.sanitize();
        self.controller.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let runtime = RuntimeConfig::from_json_slice(br#"{"controller":{"http_port":9000}}"#)
            .unwrap();

        assert_eq!(runtime.device, DeviceConfig::default());
        assert_eq!(runtime.controller.http_port, 9000);
        assert_eq!(runtime.controller.device_addr, "127.0.0.1:7878");
    }

    #[test]
    fn sanitize_clamps_timing() {
        let mut config = DeviceConfig {
            tick_interval_ms: 1,
            sample_ms: 0,
            note_slope: 0,
            max_frame_bytes: 0,
            ..DeviceConfig::default()
        };
        config.sanitize();

        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.sample_ms, 1);
        assert_eq!(config.note_slope, 1);
        assert_eq!(config.max_frame_bytes, 16);
    }

    #[test]
    fn default_plucks_match_envelopes() {
        let config = DeviceConfig::default();

        assert_eq!(config.chime_pluck(Note::C5).samples().count(), 20);
        assert_eq!(config.note_pluck(Note::C4).samples().count(), 30);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(RuntimeConfig::from_json_slice(b"{not json").is_err());
    }
}
