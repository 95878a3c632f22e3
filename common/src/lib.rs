pub mod actuation;
pub mod config;
pub mod control;
pub mod error;
pub mod ports;
pub mod sensor;
pub mod settings;
pub mod telemetry;
pub mod time;
pub mod types;

#[cfg(test)]
mod testing;

pub use actuation::ActuationController;
pub use config::{
    ActuationPolicy, ControlConfig, NetworkConfig, PinConfig, RuntimeConfig, SensorFaultPolicy,
};
pub use control::{ControlLoop, LoopState, TickOutcome};
pub use error::{
    ErrorKind, FetchError, OutputError, ReportError, TickError, TimeParseError, TransportError,
};
pub use ports::{
    Clock, HttpResponse, HttpTransport, MotionInput, NetworkLink, Outputs, Scheduler,
    SystemClock, TemperatureProbe, ThreadScheduler,
};
pub use sensor::SensorReader;
pub use settings::SettingsFetcher;
pub use telemetry::{TelemetryReporter, CONTENT_TYPE_JSON};
pub use time::{compare, TimeOfDay};
pub use types::{Actuation, Reading, TelemetryPayload, UserSettings, DEVICE_DISCONNECTED_C};
