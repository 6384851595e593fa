//! actuator.rs
//! Driver capabilities, one trait per actuator kind, with simulated implementations.
//!
//! Servo and relay writes are instantaneous. The stepper is polled: every call moves at most
//! `max_steps_per_call` steps so a long traversal never stalls the control cycle.

pub trait ServoDriver: Send {
    fn set_position(&mut self, degrees: u16);
    fn position(&self) -> u16;
}

pub trait StepperDriver: Send {
    /// Moves a bounded number of steps towards `target`.
    /// Returns `true` while the physical position still differs from the target.
    fn drive_toward(&mut self, target: u16) -> bool;
    fn position(&self) -> u16;
}

pub trait RelayDriver: Send {
    /// Idempotent.
    fn set_state(&mut self, on: bool);
    fn is_on(&self) -> bool;
}

#[derive(Debug, Default, Clone)]
pub struct SimServo {
    position: u16,
    writes: u64,
}

impl SimServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl ServoDriver for SimServo {
    fn set_position(&mut self, degrees: u16) {
        self.position = degrees;
        self.writes += 1;
    }

    fn position(&self) -> u16 {
        self.position
    }
}

#[derive(Debug, Clone)]
pub struct SimStepper {
    position: u16,
    max_steps_per_call: u16,
    steps_taken: u64,
}

impl SimStepper {
    pub fn new(max_steps_per_call: u16) -> Self {
        Self::starting_at(0, max_steps_per_call)
    }

    pub fn starting_at(position: u16, max_steps_per_call: u16) -> Self {
        Self {
            position,
            max_steps_per_call: max_steps_per_call.max(1),
            steps_taken: 0,
        }
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }
}

impl StepperDriver for SimStepper {
    fn drive_toward(&mut self, target: u16) -> bool {
        let distance = target.abs_diff(self.position);
        if distance == 0 {
            return false;
        }

        let step = distance.min(self.max_steps_per_call);
        if target > self.position {
            self.position += step;
        } else {
            self.position -= step;
        }
        self.steps_taken += step as u64;

        self.position != target
    }

    fn position(&self) -> u16 {
        self.position
    }
}

#[derive(Debug, Default, Clone)]
pub struct SimRelay {
    on: bool,
    switches: u64,
}

impl SimRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switches(&self) -> u64 {
        self.switches
    }
}

impl RelayDriver for SimRelay {
    fn set_state(&mut self, on: bool) {
        if self.on != on {
            self.on = on;
            self.switches += 1;
        }
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
