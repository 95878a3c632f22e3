use log::{debug, info, warn};

use crate::{
    actuation::ActuationController,
    config::{ControlConfig, SensorFaultPolicy},
    error::TickError,
    ports::{Clock, HttpTransport, MotionInput, NetworkLink, Outputs, Scheduler, TemperatureProbe},
    sensor::SensorReader,
    settings::SettingsFetcher,
    telemetry::TelemetryReporter,
    types::Actuation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Connecting,
    Running,
}

impl LoopState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Running => "RUNNING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The link was down; nothing was read, sent or written.
    Offline,
    Completed { status: i32, actuation: Actuation },
}

/// Single-threaded telemetry-and-actuation loop.
///
/// Every tick runs read → report → fetch → decide → apply strictly in order.
/// Any failure ends the tick; the next one starts from scratch after the
/// fixed interval.
pub struct ControlLoop<P, M, C, H, O, L, S> {
    config: ControlConfig,
    reader: SensorReader<P, M, C>,
    reporter: TelemetryReporter<H>,
    fetcher: SettingsFetcher<H>,
    controller: ActuationController,
    outputs: O,
    link: L,
    scheduler: S,
    state: LoopState,
}

impl<P, M, C, H, O, L, S> ControlLoop<P, M, C, H, O, L, S>
where
    P: TemperatureProbe,
    M: MotionInput,
    C: Clock,
    H: HttpTransport,
    O: Outputs,
    L: NetworkLink,
    S: Scheduler,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ControlConfig,
        reader: SensorReader<P, M, C>,
        reporter: TelemetryReporter<H>,
        fetcher: SettingsFetcher<H>,
        controller: ActuationController,
        outputs: O,
        link: L,
        scheduler: S,
    ) -> Self {
        Self {
            config,
            reader,
            reporter,
            fetcher,
            controller,
            outputs,
            link,
            scheduler,
            state: LoopState::Connecting,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Blocks until the link is up, blinking the indicator meanwhile.
    pub fn connect(&mut self) {
        if self.state == LoopState::Running {
            return;
        }

        info!("connecting");
        let mut lit = false;
        while !self.link.is_connected() {
            lit = !lit;
            if let Err(err) = self.outputs.set_indicator(lit) {
                warn!("{err}");
            }
            self.scheduler.sleep(self.config.blink_interval());
        }

        if let Err(err) = self.outputs.set_indicator(false) {
            warn!("{err}");
        }
        let address = self
            .link
            .local_address()
            .unwrap_or_else(|| "unknown".to_string());
        info!("connected with IP {address}");
        self.state = LoopState::Running;
    }

    pub fn tick(&mut self) -> Result<TickOutcome, TickError> {
        if !self.link.is_connected() {
            return Ok(TickOutcome::Offline);
        }

        let reading = self.reader.read(&mut self.scheduler);
        if reading.is_sensor_fault() {
            warn!(
                "temperature probe returned {:.1}°C; probe disconnected?",
                reading.temperature_c
            );
            if self.config.sensor_fault_policy == SensorFaultPolicy::AbortTick {
                return Err(TickError::SensorFault(reading.temperature_c));
            }
        }

        let status = self.reporter.report(&reading)?;
        let settings = self.fetcher.fetch()?;
        let now = reading.time_of_day()?;

        let actuation = self
            .controller
            .decide(reading.temperature_c, now, &settings);
        self.apply(actuation, reading.presence)?;

        Ok(TickOutcome::Completed { status, actuation })
    }

    /// One tick plus the fixed inter-tick sleep. Errors are logged, never raised.
    pub fn step(&mut self) -> Option<TickOutcome> {
        let outcome = match self.tick() {
            Ok(TickOutcome::Offline) => {
                warn!("link down; skipping tick");
                Some(TickOutcome::Offline)
            }
            Ok(outcome) => {
                debug!("tick completed: {outcome:?}");
                Some(outcome)
            }
            Err(err) => {
                warn!("tick aborted [{}]: {err}", err.kind().as_str());
                None
            }
        };
        self.scheduler.sleep(self.config.tick_interval());
        outcome
    }

    pub fn run(&mut self) -> ! {
        self.connect();
        info!("control loop {}", self.state.as_str());
        loop {
            self.step();
        }
    }

    fn apply(&mut self, actuation: Actuation, presence: bool) -> Result<(), TickError> {
        if let Some(on) = actuation.fan {
            self.outputs.set_fan(on)?;
        }
        if let Some(on) = actuation.light {
            self.outputs.set_light(on)?;
        }
        if self.config.mirror_presence_on_indicator {
            self.outputs.set_indicator(presence)?;
        }
        Ok(())
    }
}
