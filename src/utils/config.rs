//! Controller configuration: thresholds, ranges, timing and override policy.
//!
//! Everything the arbitration logic needs to know about a deployment is carried in one
//! `ControllerConfig` value handed over at construction. Two presets mirror the deployments
//! the controller was built for: a servo following the averaged light level, and stepper
//! blinds with an independent room-light relay.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::error::ControlError;

/// Highest value a 12-bit ADC channel can report.
pub const ADC_MAX: u16 = 4095;
pub const SERVO_MAX_DEGREES: u16 = 180;
pub const DEFAULT_STEPS_PER_REVOLUTION: u16 = 2048;
/// Outside light level above which the blinds close.
pub const OUTSIDE_THRESHOLD: u16 = 2500;
/// Inside light level below which the room light switches on.
pub const INSIDE_THRESHOLD: u16 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorKind {
    Servo,
    Stepper,
    Relay,
}

impl ActuatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActuatorKind::Servo => "servo",
            ActuatorKind::Stepper => "stepper",
            ActuatorKind::Relay => "relay",
        }
    }
}

/// How the autonomous target is derived from the composite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlLaw {
    /// Linear map of the sensor range onto the position range.
    Proportional,
    /// Two end positions selected by a threshold latch.
    Bistable,
}

/// Which channels feed the composite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeSource {
    Average,
    Channel(usize),
}

/// Direction in which a threshold latch engages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Engage when the value rises above the threshold.
    Above,
    /// Engage when the value falls below the threshold.
    Below,
}

/// When an overridden controller goes back to autonomous control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumePolicy {
    /// Resume commands are ignored; an override lasts until power cycle.
    Latched,
    /// An explicit resume command restores autonomous control.
    OnCommand,
    /// Like `OnCommand`, and also reverts after this many cycles without a new override.
    /// Must be at least 1.
    AfterIdleCycles(u32),
}

/// Independent on/off output driven by one sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub channel: usize,
    pub threshold: u16,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub actuator: ActuatorKind,
    pub law: ControlLaw,
    pub composite: CompositeSource,
    pub channels: usize,
    pub sensor_min: u16,
    pub sensor_max: u16,
    pub position_min: u16,
    pub position_max: u16,
    pub sampling_period: Duration,
    pub threshold: u16,
    pub deadband: u16,
    pub relay: Option<RelayConfig>,
    pub steps_per_revolution: u16,
    pub max_steps_per_call: u16,
    pub smoothing_window: usize,
    pub resume: ResumePolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::servo()
    }
}

impl ControllerConfig {
    /// Servo (0-180°) following the average of two light channels, 100 ms cycle.
    pub fn servo() -> Self {
        Self {
            actuator: ActuatorKind::Servo,
            law: ControlLaw::Proportional,
            composite: CompositeSource::Average,
            channels: 2,
            sensor_min: 0,
            sensor_max: ADC_MAX,
            position_min: 0,
            position_max: SERVO_MAX_DEGREES,
            sampling_period: Duration::from_millis(100),
            threshold: OUTSIDE_THRESHOLD,
            deadband: 0,
            relay: None,
            steps_per_revolution: DEFAULT_STEPS_PER_REVOLUTION,
            max_steps_per_call: 1,
            smoothing_window: 1,
            resume: ResumePolicy::OnCommand,
        }
    }

    /// Stepper blinds closing on bright outside light (channel 0) plus a room-light relay
    /// switching on when the inside level (channel 1) drops.
    pub fn blinds() -> Self {
        Self {
            actuator: ActuatorKind::Stepper,
            law: ControlLaw::Bistable,
            composite: CompositeSource::Channel(0),
            channels: 2,
            sensor_min: 0,
            sensor_max: ADC_MAX,
            position_min: 0,
            position_max: DEFAULT_STEPS_PER_REVOLUTION - 1,
            sampling_period: Duration::from_millis(100),
            threshold: OUTSIDE_THRESHOLD,
            deadband: 0,
            relay: Some(RelayConfig {
                channel: 1,
                threshold: INSIDE_THRESHOLD,
                trigger: Trigger::Below,
            }),
            steps_per_revolution: DEFAULT_STEPS_PER_REVOLUTION,
            max_steps_per_call: 32,
            smoothing_window: 1,
            resume: ResumePolicy::OnCommand,
        }
    }

    /// A single relay as the primary actuator, switched by the averaged light level.
    pub fn relay() -> Self {
        Self {
            actuator: ActuatorKind::Relay,
            law: ControlLaw::Bistable,
            position_min: 0,
            position_max: 1,
            ..Self::servo()
        }
    }

    pub fn with_position_range(mut self, min: u16, max: u16) -> Self {
        self.position_min = min;
        self.position_max = max;
        self
    }

    pub fn with_sensor_range(mut self, min: u16, max: u16) -> Self {
        self.sensor_min = min;
        self.sensor_max = max;
        self
    }

    pub fn with_sampling_period(mut self, period: Duration) -> Self {
        self.sampling_period = period;
        self
    }

    pub fn with_law(mut self, law: ControlLaw) -> Self {
        self.law = law;
        self
    }

    pub fn with_composite(mut self, composite: CompositeSource) -> Self {
        self.composite = composite;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_threshold(mut self, threshold: u16) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_deadband(mut self, deadband: u16) -> Self {
        self.deadband = deadband;
        self
    }

    pub fn with_relay(mut self, relay: Option<RelayConfig>) -> Self {
        self.relay = relay;
        self
    }

    /// Also moves the upper position bound to the last step of the revolution.
    pub fn with_steps_per_revolution(mut self, steps: u16) -> Self {
        self.steps_per_revolution = steps;
        self.position_max = steps.saturating_sub(1);
        self
    }

    pub fn with_max_steps_per_call(mut self, steps: u16) -> Self {
        self.max_steps_per_call = steps;
        self
    }

    pub fn with_smoothing_window(mut self, window: usize) -> Self {
        self.smoothing_window = window;
        self
    }

    pub fn with_resume(mut self, resume: ResumePolicy) -> Self {
        self.resume = resume;
        self
    }

    /// Checks cross-field consistency. The arbiter assumes a validated config.
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.channels == 0 {
            return Err(invalid("at least one sensor channel is required"));
        }
        if self.sensor_min >= self.sensor_max {
            return Err(invalid(format!(
                "sensor_min {} must be below sensor_max {}",
                self.sensor_min, self.sensor_max
            )));
        }
        if self.position_min > self.position_max {
            return Err(invalid(format!(
                "position_min {} exceeds position_max {}",
                self.position_min, self.position_max
            )));
        }
        if let CompositeSource::Channel(ch) = self.composite {
            if ch >= self.channels {
                return Err(invalid(format!(
                    "composite channel {} out of {} channels",
                    ch, self.channels
                )));
            }
        }
        if let Some(relay) = &self.relay {
            if relay.channel >= self.channels {
                return Err(invalid(format!(
                    "relay channel {} out of {} channels",
                    relay.channel, self.channels
                )));
            }
        }
        if self.sampling_period.is_zero() {
            return Err(invalid("sampling_period must be non-zero"));
        }
        if self.smoothing_window == 0 {
            return Err(invalid("smoothing_window must be at least 1"));
        }
        if self.resume == ResumePolicy::AfterIdleCycles(0) {
            return Err(invalid("AfterIdleCycles needs at least one idle cycle"));
        }

        match self.actuator {
            ActuatorKind::Servo if self.position_max > SERVO_MAX_DEGREES => Err(invalid(format!(
                "servo position_max {} exceeds {} degrees",
                self.position_max, SERVO_MAX_DEGREES
            ))),
            ActuatorKind::Stepper if self.max_steps_per_call == 0 => {
                Err(invalid("max_steps_per_call must be non-zero for a stepper"))
            }
            ActuatorKind::Stepper if self.position_max >= self.steps_per_revolution => {
                Err(invalid(format!(
                    "stepper position_max {} must be below steps_per_revolution {}",
                    self.position_max, self.steps_per_revolution
                )))
            }
            ActuatorKind::Relay if self.position_max > 1 => {
                Err(invalid("relay positions are limited to 0 (off) and 1 (on)"))
            }
            _ => Ok(()),
        }
    }
}

fn invalid(msg: impl Into<String>) -> ControlError {
    ControlError::InvalidConfig(msg.into())
}
