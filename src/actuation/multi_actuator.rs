//! multi_actuator.rs
//! The actuators of one deployment: the arbitrated primary actuator and an optional
//! room-light relay, driven from the same control cycle.

use crate::actuation::{
    actuator::{RelayDriver, ServoDriver, SimRelay, SimServo, SimStepper, StepperDriver},
    controller::Decision,
};
use crate::utils::config::{ActuatorKind, ControllerConfig};

pub enum PrimaryActuator {
    Servo(Box<dyn ServoDriver>),
    Stepper(Box<dyn StepperDriver>),
    Relay(Box<dyn RelayDriver>),
}

impl PrimaryActuator {
    pub fn kind(&self) -> ActuatorKind {
        match self {
            PrimaryActuator::Servo(_) => ActuatorKind::Servo,
            PrimaryActuator::Stepper(_) => ActuatorKind::Stepper,
            PrimaryActuator::Relay(_) => ActuatorKind::Relay,
        }
    }
}

/// What the bank did with one decision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriveOutcome {
    /// A new target reached the driver.
    pub wrote: bool,
    /// The stepper still has distance to go after this cycle's increment.
    pub moving: bool,
}

pub struct ActuatorBank {
    primary: PrimaryActuator,
    light: Option<Box<dyn RelayDriver>>,
}

impl ActuatorBank {
    pub fn new(primary: PrimaryActuator, light: Option<Box<dyn RelayDriver>>) -> Self {
        Self { primary, light }
    }

    /// Simulated drivers matching the configured actuator kind and relay rule.
    pub fn simulated(config: &ControllerConfig) -> Self {
        let primary = match config.actuator {
            ActuatorKind::Servo => PrimaryActuator::Servo(Box::new(SimServo::new())),
            ActuatorKind::Stepper => PrimaryActuator::Stepper(Box::new(SimStepper::starting_at(
                config.position_min,
                config.max_steps_per_call,
            ))),
            ActuatorKind::Relay => PrimaryActuator::Relay(Box::new(SimRelay::new())),
        };
        let light = config
            .relay
            .map(|_| Box::new(SimRelay::new()) as Box<dyn RelayDriver>);

        Self::new(primary, light)
    }

    /// Passes this cycle's decision to the primary driver.
    ///
    /// Servo and relay only see changed targets. The stepper is stepped on every cycle,
    /// towards whatever the current target is.
    pub fn drive(&mut self, decision: &Decision) -> DriveOutcome {
        let target = decision.command.position;
        match &mut self.primary {
            PrimaryActuator::Servo(servo) => {
                if decision.changed {
                    servo.set_position(target);
                }
                DriveOutcome {
                    wrote: decision.changed,
                    moving: false,
                }
            }
            PrimaryActuator::Stepper(stepper) => DriveOutcome {
                wrote: decision.changed,
                moving: stepper.drive_toward(target),
            },
            PrimaryActuator::Relay(relay) => {
                if decision.changed {
                    relay.set_state(target != 0);
                }
                DriveOutcome {
                    wrote: decision.changed,
                    moving: false,
                }
            }
        }
    }

    /// No-op when the deployment has no room-light relay.
    pub fn switch_light(&mut self, on: bool) {
        if let Some(relay) = self.light.as_mut() {
            relay.set_state(on);
        }
    }

    /// Position as reported by the driver (relay: 0 or 1).
    pub fn physical_position(&self) -> u16 {
        match &self.primary {
            PrimaryActuator::Servo(servo) => servo.position(),
            PrimaryActuator::Stepper(stepper) => stepper.position(),
            PrimaryActuator::Relay(relay) => relay.is_on() as u16,
        }
    }

    pub fn light_on(&self) -> Option<bool> {
        self.light.as_ref().map(|relay| relay.is_on())
    }

    pub fn kind(&self) -> ActuatorKind {
        self.primary.kind()
    }
}
