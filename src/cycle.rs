//! cycle.rs
//! The fixed-period control cycle: sample → arbitrate → drive → encode → transmit → wait.
//!
//! - Remote events arrive through the mailbox and are drained once per cycle
//! - Real-time pacing: SpinSleeper releases cycles on a fixed schedule
//! - A cycle released after its deadline is counted as an overrun; the schedule is not reset
//!   so the average rate is kept

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use log::{debug, info, warn};
use parking_lot::Mutex;
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::actuation::{
    controller::{ControlArbiter, ControlState, Decision, LightDecision, LightRule, Mode},
    multi_actuator::{ActuatorBank, DriveOutcome},
};
use crate::link::{
    mailbox::{OverrideMailbox, RemoteEvent},
    receiver::{MailboxHandler, RemoteChannel},
};
use crate::sensing::{
    sensor::{AdcSource, SensorReading, SensorSampler},
    transmitter::{TelemetryEncoder, TelemetryFrame, Transmitter},
};
use crate::utils::{
    config::ControllerConfig,
    error::ControlError,
    metrics::{CycleRecord, CycleRecorder, Metrics, SharedMetrics, push_capped, push_capped_u64},
};

/// Everything that happened in one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub reading: SensorReading,
    pub event: Option<RemoteEvent>,
    pub decision: Decision,
    pub drive: DriveOutcome,
    pub light: Option<LightDecision>,
    pub frame: TelemetryFrame,
    pub transmitted: bool,
    pub state: ControlState,
}

pub struct ControlLoop<A: AdcSource, R: RemoteChannel> {
    config: ControllerConfig,
    sampler: SensorSampler<A>,
    arbiter: ControlArbiter,
    light: Option<LightRule>,
    bank: ActuatorBank,
    encoder: TelemetryEncoder,
    transmitter: Transmitter<R>,
    mailbox: Arc<OverrideMailbox>,
    metrics: SharedMetrics,
    recorder: Option<CycleRecorder>,
    started: Instant,
}

impl<A: AdcSource, R: RemoteChannel> ControlLoop<A, R> {
    pub fn new(
        config: ControllerConfig,
        adc: A,
        bank: ActuatorBank,
        link: R,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        if bank.kind() != config.actuator {
            return Err(ControlError::InvalidConfig(format!(
                "configured for a {} but the bank drives a {}",
                config.actuator.name(),
                bank.kind().name()
            )));
        }

        Ok(Self {
            sampler: SensorSampler::new(adc, &config),
            arbiter: ControlArbiter::new(&config),
            light: config.relay.as_ref().map(LightRule::new),
            bank,
            encoder: TelemetryEncoder::new(config.channels),
            transmitter: Transmitter::new(link),
            mailbox: Arc::new(OverrideMailbox::new()),
            metrics: Arc::new(Mutex::new(Metrics::default())),
            recorder: None,
            started: Instant::now(),
            config,
        })
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_recorder(mut self, recorder: CycleRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn mailbox(&self) -> Arc<OverrideMailbox> {
        self.mailbox.clone()
    }

    /// Handler a transport binding calls from its own context.
    pub fn handler(&self) -> MailboxHandler {
        MailboxHandler::new(self.mailbox.clone())
    }

    pub fn state(&self) -> ControlState {
        self.arbiter.state()
    }

    pub fn bank(&self) -> &ActuatorBank {
        &self.bank
    }

    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    pub fn transmitter(&self) -> &Transmitter<R> {
        &self.transmitter
    }

    pub fn sampler_mut(&mut self) -> &mut SensorSampler<A> {
        &mut self.sampler
    }

    /// Runs a single cycle without waiting.
    pub fn step(&mut self) -> CycleReport {
        let cycle_start = Instant::now();
        let mode_before = self.arbiter.state().mode;

        let reading = self.sampler.sample();
        let event = self.mailbox.take();
        let decision = self.arbiter.arbitrate(&reading, event);
        let drive = self.bank.drive(&decision);

        let light = self.light.as_mut().map(|rule| rule.evaluate(&reading));
        if let Some(l) = light.filter(|l| l.changed) {
            self.bank.switch_light(l.on);
        }

        let frame = self.encoder.encode(&reading);
        let transmitted = self.transmitter.transmit(&frame);
        let state = self.arbiter.state();

        info!(
            "{} composite={} -> {} {} [{}]{}{}",
            format_channels(&reading.raw),
            reading.composite,
            self.config.actuator.name(),
            decision.command.position,
            decision.command.source.name(),
            if drive.moving { " moving" } else { "" },
            match light {
                Some(l) if l.on => " light=on",
                Some(_) => " light=off",
                None => "",
            }
        );

        {
            let mut m = self.metrics.lock();
            m.total_cycles += 1;
            push_capped(&mut m.composite, reading.composite as f64);
            push_capped(&mut m.position, decision.command.position as f64);
            push_capped_u64(&mut m.cycle_us, cycle_start.elapsed().as_micros() as u64);
            if matches!(event, Some(RemoteEvent::Override(_))) {
                m.overrides_applied += 1;
            }
            if mode_before == Mode::Overridden && state.mode == Mode::Autonomous {
                m.resumes += 1;
            }
            m.ignored_payloads = self.mailbox.ignored();
            if drive.wrote {
                m.actuator_writes += 1;
            }
            if light.is_some_and(|l| l.changed) {
                m.light_switches += 1;
            }
            if transmitted {
                m.telemetry_sent += 1;
            } else {
                m.telemetry_drops += 1;
            }
        }

        if let Some(recorder) = &self.recorder {
            recorder.record(CycleRecord {
                tick: reading.tick,
                elapsed_ms: self.started.elapsed().as_millis() as u64,
                channels: join_values(&reading.raw),
                composite: reading.composite,
                position: decision.command.position,
                source: decision.command.source.name(),
                mode: state.mode.name(),
                changed: decision.changed,
                moving: drive.moving,
                light: light.map(|l| l.on),
            });
        }

        CycleReport {
            reading,
            event,
            decision,
            drive,
            light,
            frame,
            transmitted,
            state,
        }
    }

    /// Runs cycles at the configured period until `running` is cleared.
    /// Returns the number of cycles executed.
    pub fn run(&mut self, running: &AtomicBool) -> u64 {
        let period = self.config.sampling_period;
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

        let mut next_release = Instant::now();
        let mut last_release = next_release;
        let mut cycles = 0u64;

        info!(
            "[ControlLoop] started: {} period={:?} law={:?}",
            self.config.actuator.name(),
            period,
            self.config.law
        );

        while running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_release {
                sleeper.sleep(next_release - now);
            } else if cycles > 0 && now.duration_since(next_release) > period / 10 {
                // Released late: previous cycle or the scheduler ate into this period
                self.metrics.lock().record_overrun();
                warn!(
                    "[ControlLoop] cycle {} released {:?} late",
                    cycles + 1,
                    now.duration_since(next_release)
                );
            }

            let release = Instant::now();
            if cycles > 0 {
                let actual_us = release.duration_since(last_release).as_micros() as u64;
                let jitter_us = actual_us.abs_diff(period.as_micros() as u64);
                push_capped_u64(&mut self.metrics.lock().jitter_us, jitter_us);
            }
            last_release = release;

            self.step();
            cycles += 1;
            next_release += period;
        }

        debug!("[ControlLoop] stopped after {} cycles", cycles);
        cycles
    }
}

fn format_channels(raw: &[u16]) -> String {
    raw.iter()
        .enumerate()
        .map(|(i, v)| format!("ch{}={}", i, v))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn join_values(raw: &[u16]) -> String {
    raw.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(";")
}
