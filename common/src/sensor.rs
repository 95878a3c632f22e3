use std::time::Duration;

use log::info;

use crate::{
    config::MIN_SETTLE_DELAY_MS,
    ports::{Clock, MotionInput, Scheduler, TemperatureProbe},
    types::Reading,
};

/// Temperature, presence and timestamp acquisition for one tick.
///
/// Sentinel temperatures from the driver are passed through untouched; see
/// [`Reading::is_sensor_fault`].
pub struct SensorReader<P, M, C> {
    probe: P,
    motion: M,
    clock: C,
    settle_delay: Duration,
}

impl<P, M, C> SensorReader<P, M, C>
where
    P: TemperatureProbe,
    M: MotionInput,
    C: Clock,
{
    pub fn new(probe: P, motion: M, clock: C, settle_delay: Duration) -> Self {
        Self {
            probe,
            motion,
            clock,
            settle_delay: settle_delay.max(Duration::from_millis(MIN_SETTLE_DELAY_MS)),
        }
    }

    pub fn read<S: Scheduler>(&mut self, scheduler: &mut S) -> Reading {
        self.probe.request_conversion();
        scheduler.sleep(self.settle_delay);
        let temperature_c = self.probe.read_celsius();
        info!("temperature: {temperature_c:.2}°C");

        let presence = self.motion.is_motion();
        if presence {
            info!("motion detected");
        } else {
            info!("no motion");
        }

        Reading {
            temperature_c,
            presence,
            timestamp: self.clock.now_iso8601(),
        }
    }
}
