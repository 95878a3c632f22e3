use crate::{
    config::ActuationPolicy,
    time::TimeOfDay,
    types::{Actuation, UserSettings},
};

/// Pure mapping from temperature, time of day and user settings to output
/// intent. Applying the intent is the control loop's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActuationController {
    policy: ActuationPolicy,
}

impl ActuationController {
    pub fn new(policy: ActuationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ActuationPolicy {
        self.policy
    }

    pub fn decide(&self, temp_c: f32, now: TimeOfDay, settings: &UserSettings) -> Actuation {
        Actuation {
            fan: self.decide_fan(temp_c, settings.user_temp),
            light: self.decide_light(now, settings),
        }
    }

    /// Latched on by default: nothing turns the fan off again unless
    /// `fan_release_below_threshold` is set.
    fn decide_fan(&self, temp_c: f32, user_temp: f32) -> Option<bool> {
        if temp_c > user_temp {
            Some(true)
        } else if self.policy.fan_release_below_threshold {
            Some(false)
        } else {
            None
        }
    }

    /// The off-time wins over the on-time; only one of them fires per tick.
    fn decide_light(&self, now: TimeOfDay, settings: &UserSettings) -> Option<bool> {
        if now >= settings.light_time_off {
            Some(false)
        } else if now >= settings.user_light {
            Some(true)
        } else if self.policy.light_off_before_on_time {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> UserSettings {
        UserSettings {
            user_temp: 25.0,
            light_time_off: TimeOfDay::new(18, 0, 0),
            user_light: TimeOfDay::new(17, 0, 0),
        }
    }

    fn at(clock: &str) -> TimeOfDay {
        clock.parse().unwrap()
    }

    #[test]
    fn hot_evening_turns_fan_on_and_light_off() {
        let decision = ActuationController::default().decide(30.0, at("19:00:00"), &settings());
        assert_eq!(
            decision,
            Actuation {
                fan: Some(true),
                light: Some(false),
            }
        );
    }

    #[test]
    fn between_thresholds_turns_light_on() {
        let decision = ActuationController::default().decide(20.0, at("17:30:00"), &settings());
        assert_eq!(
            decision,
            Actuation {
                fan: None,
                light: Some(true),
            }
        );
    }

    #[test]
    fn before_both_thresholds_changes_nothing() {
        let decision = ActuationController::default().decide(20.0, at("10:00:00"), &settings());
        assert!(decision.is_noop());
    }

    #[test]
    fn thresholds_are_inclusive() {
        let controller = ActuationController::default();
        assert_eq!(
            controller.decide(20.0, at("17:00:00"), &settings()).light,
            Some(true)
        );
        assert_eq!(
            controller.decide(20.0, at("18:00:00"), &settings()).light,
            Some(false)
        );
        // Equal temperature is not above the threshold.
        assert_eq!(controller.decide(25.0, at("10:00:00"), &settings()).fan, None);
    }

    #[test]
    fn off_time_wins_when_it_precedes_on_time() {
        let inverted = UserSettings {
            light_time_off: TimeOfDay::new(6, 0, 0),
            user_light: TimeOfDay::new(17, 0, 0),
            ..settings()
        };
        let decision = ActuationController::default().decide(20.0, at("20:00:00"), &inverted);
        assert_eq!(decision.light, Some(false));
    }

    #[test]
    fn release_policy_turns_fan_off() {
        let controller = ActuationController::new(ActuationPolicy {
            fan_release_below_threshold: true,
            ..ActuationPolicy::default()
        });
        assert_eq!(
            controller.decide(20.0, at("10:00:00"), &settings()).fan,
            Some(false)
        );
        assert_eq!(
            controller.decide(26.0, at("10:00:00"), &settings()).fan,
            Some(true)
        );
    }

    #[test]
    fn early_light_policy_turns_light_off() {
        let controller = ActuationController::new(ActuationPolicy {
            light_off_before_on_time: true,
            ..ActuationPolicy::default()
        });
        assert_eq!(
            controller.decide(20.0, at("10:00:00"), &settings()).light,
            Some(false)
        );
    }

    #[test]
    fn sentinel_temperature_never_trips_the_fan() {
        let decision = ActuationController::default().decide(
            crate::DEVICE_DISCONNECTED_C,
            at("10:00:00"),
            &settings(),
        );
        assert_eq!(decision.fan, None);
    }
}
