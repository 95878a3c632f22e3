//! Seams between the control loop and the device.
//!
//! Each component owns the port it talks to; nothing here is global.

use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;

use crate::error::{OutputError, TransportError};

/// One-wire temperature driver.
pub trait TemperatureProbe {
    /// Start a conversion on the bus.
    fn request_conversion(&mut self);

    /// Converted value in °C, or [`crate::DEVICE_DISCONNECTED_C`] when the probe
    /// does not answer.
    fn read_celsius(&mut self) -> f32;
}

pub trait MotionInput {
    fn is_motion(&mut self) -> bool;
}

/// Source of `YYYY-MM-DDTHH:MM:SS` timestamps.
pub trait Clock {
    fn now_iso8601(&mut self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Non-positive values follow the client library convention for a
    /// transport failure.
    pub status: i32,
    pub body: Vec<u8>,
}

pub trait HttpTransport {
    fn post(
        &mut self,
        url: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError>;

    fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError>;
}

pub trait Outputs {
    fn set_fan(&mut self, on: bool) -> Result<(), OutputError>;
    fn set_light(&mut self, on: bool) -> Result<(), OutputError>;
    fn set_indicator(&mut self, on: bool) -> Result<(), OutputError>;
}

/// Network association status. Association itself happens outside the loop.
pub trait NetworkLink {
    fn is_connected(&mut self) -> bool;
    fn local_address(&mut self) -> Option<String>;
}

/// Blocking delays. Swapped for a recording implementation in tests.
pub trait Scheduler {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Wall clock rendered in a fixed IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Falls back to UTC for names chrono-tz does not know.
    pub fn from_name(timezone: &str) -> Self {
        Self::new(timezone.parse().unwrap_or(Tz::UTC))
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now_iso8601(&mut self) -> String {
        Utc::now()
            .with_timezone(&self.timezone)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
    }
}
