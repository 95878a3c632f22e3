use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Minimum wait between triggering a conversion and reading it back.
pub const MIN_SETTLE_DELAY_MS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFaultPolicy {
    /// Log the fault and keep going with the sentinel value.
    PassThrough,
    /// Log the fault and end the tick before any network traffic.
    AbortTick,
}

/// Switches for the two behaviors whose intent is unclear. The defaults keep
/// the fan latched on and leave the light alone before the on-time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuationPolicy {
    #[serde(default)]
    pub fan_release_below_threshold: bool,
    #[serde(default)]
    pub light_off_before_on_time: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    pub tick_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub blink_interval_ms: u64,
    pub mirror_presence_on_indicator: bool,
    pub sensor_fault_policy: SensorFaultPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            settle_delay_ms: MIN_SETTLE_DELAY_MS,
            blink_interval_ms: 300,
            mirror_presence_on_indicator: true,
            sensor_fault_policy: SensorFaultPolicy::PassThrough,
        }
    }
}

impl ControlConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    pub fn sanitize(&mut self) {
        self.tick_interval_ms = self.tick_interval_ms.clamp(100, 3_600_000);
        self.settle_delay_ms = self.settle_delay_ms.clamp(MIN_SETTLE_DELAY_MS, 1_000);
        self.blink_interval_ms = self.blink_interval_ms.clamp(50, 5_000);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub telemetry_url: String,
    pub settings_url: String,
    pub http_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            telemetry_url: "http://192.168.1.100:8080/api/telemetry".to_string(),
            settings_url: "http://192.168.1.100:8080/api/settings".to_string(),
            http_timeout_ms: 10_000,
        }
    }
}

impl NetworkConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Replaces each endpoint that has a value; `None` keeps the current one.
    pub fn override_endpoints(&mut self, telemetry_url: Option<&str>, settings_url: Option<&str>) {
        if let Some(url) = telemetry_url {
            self.telemetry_url = url.to_string();
        }
        if let Some(url) = settings_url {
            self.settings_url = url.to_string();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinConfig {
    pub temp_pin: i32,
    pub motion_pin: i32,
    pub indicator_pin: i32,
    pub fan_pin: i32,
    pub light_pin: i32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            temp_pin: 5,
            motion_pin: 12,
            indicator_pin: 22,
            fan_pin: 18,
            light_pin: 19,
        }
    }
}

impl PinConfig {
    fn assigned(&self) -> [i32; 5] {
        [
            self.temp_pin,
            self.motion_pin,
            self.indicator_pin,
            self.fan_pin,
            self.light_pin,
        ]
    }

    pub fn sanitize(&mut self) {
        let pins = self.assigned();
        let duplicated = pins
            .iter()
            .enumerate()
            .any(|(i, pin)| pins[..i].contains(pin));
        if duplicated || pins.iter().any(|pin| *pin < 0) {
            *self = Self::default();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub network: NetworkConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub actuation: ActuationPolicy,
    #[serde(default)]
    pub pins: PinConfig,
    pub timezone: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            control: ControlConfig::default(),
            actuation: ActuationPolicy::default(),
            pins: PinConfig::default(),
            timezone: "UTC".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.control.sanitize();
        self.pins.sanitize();
        self.network.http_timeout_ms = self.network.http_timeout_ms.clamp(1_000, 60_000);
        if self.timezone.parse::<Tz>().is_err() {
            self.timezone = "UTC".to_string();
        }
    }
}
