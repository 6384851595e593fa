//! sensor.rs
//! Samples the light channels once per control cycle and derives the composite value.
//! - ADC access goes through `AdcSource`; the sampler never fails and never blocks
//! - values above the ADC resolution are clamped, not rejected
//! - optional per-channel moving average before the composite is computed

use std::time::Instant;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::sensing::processor::MovingAverage;
use crate::utils::config::{ADC_MAX, CompositeSource, ControllerConfig};

/// Raw analog input. One call reads one channel and always yields a value.
pub trait AdcSource {
    fn read(&mut self, channel: usize) -> u16;
}

/// One sampling cycle worth of light readings.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Raw channel values in declaration order (0..=4095), as read from the ADC.
    pub raw: Vec<u16>,
    /// Channel values after smoothing; equal to `raw` when smoothing is off.
    pub filtered: Vec<u16>,
    /// Value fed into the control decision, derived from `filtered`.
    pub composite: u16,
    /// Monotonic sample counter, starting at 1.
    pub tick: u64,
    pub taken_at: Instant,
}

impl SensorReading {
    pub fn new(raw: Vec<u16>, composite: u16, tick: u64) -> Self {
        Self {
            filtered: raw.clone(),
            raw,
            composite,
            tick,
            taken_at: Instant::now(),
        }
    }

    pub fn with_filtered(mut self, filtered: Vec<u16>) -> Self {
        self.filtered = filtered;
        self
    }

    /// Raw channel value, or 0 when the channel does not exist.
    #[inline]
    pub fn channel(&self, index: usize) -> u16 {
        self.raw.get(index).copied().unwrap_or(0)
    }

    /// Smoothed channel value used by threshold rules, or 0 when the channel does not exist.
    #[inline]
    pub fn level(&self, index: usize) -> u16 {
        self.filtered.get(index).copied().unwrap_or(0)
    }
}

/// Composite of a set of channel values. Total over any input, including an empty one.
pub fn composite_of(raw: &[u16], source: CompositeSource) -> u16 {
    match source {
        CompositeSource::Average => {
            if raw.is_empty() {
                return 0;
            }
            let sum: u32 = raw.iter().map(|&v| v as u32).sum();
            (sum / raw.len() as u32) as u16
        }
        CompositeSource::Channel(index) => raw.get(index).copied().unwrap_or(0),
    }
}

pub struct SensorSampler<A: AdcSource> {
    adc: A,
    channels: usize,
    composite: CompositeSource,
    smoothing: Option<Vec<MovingAverage>>,
    tick: u64,
}

impl<A: AdcSource> SensorSampler<A> {
    pub fn new(adc: A, config: &ControllerConfig) -> Self {
        let smoothing = (config.smoothing_window > 1).then(|| {
            (0..config.channels)
                .map(|_| MovingAverage::new(config.smoothing_window))
                .collect()
        });

        Self {
            adc,
            channels: config.channels,
            composite: config.composite,
            smoothing,
            tick: 0,
        }
    }

    /// Reads every channel once and builds the reading for this cycle.
    pub fn sample(&mut self) -> SensorReading {
        self.tick += 1;

        let raw: Vec<u16> = (0..self.channels)
            .map(|ch| self.adc.read(ch).min(ADC_MAX))
            .collect();

        let filtered: Vec<u16> = match self.smoothing.as_mut() {
            Some(filters) => raw
                .iter()
                .zip(filters.iter_mut())
                .map(|(&value, filter)| filter.push(value))
                .collect(),
            None => raw.clone(),
        };

        let composite = composite_of(&filtered, self.composite);
        SensorReading::new(raw, composite, self.tick).with_filtered(filtered)
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}

/// Light-dependent resistors on a voltage divider, simulated.
///
/// Each channel has a base level, an optional drift that sweeps the level back and forth
/// across the ADC range, and uniform noise.
pub struct SimulatedLdr {
    levels: Vec<f64>,
    drift: Vec<f64>,
    noise: f64,
    rng: StdRng,
}

impl SimulatedLdr {
    pub fn new(levels: &[u16], noise: u16, seed: u64) -> Self {
        Self {
            levels: levels.iter().map(|&l| l as f64).collect(),
            drift: vec![0.0; levels.len()],
            noise: noise as f64,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Level change per read; the direction flips at either end of the ADC range.
    pub fn with_drift(mut self, channel: usize, per_read: f64) -> Self {
        if let Some(d) = self.drift.get_mut(channel) {
            *d = per_read;
        }
        self
    }

    pub fn set_level(&mut self, channel: usize, level: u16) {
        if let Some(l) = self.levels.get_mut(channel) {
            *l = level.min(ADC_MAX) as f64;
        }
    }
}

impl AdcSource for SimulatedLdr {
    fn read(&mut self, channel: usize) -> u16 {
        let (Some(level), Some(drift)) =
            (self.levels.get_mut(channel), self.drift.get_mut(channel))
        else {
            return 0;
        };

        *level += *drift;
        if *level >= ADC_MAX as f64 || *level <= 0.0 {
            *drift = -*drift;
            *level = level.clamp(0.0, ADC_MAX as f64);
        }

        let noise = if self.noise > 0.0 {
            self.rng.random_range(-self.noise..self.noise)
        } else {
            0.0
        };
        (*level + noise).round().clamp(0.0, ADC_MAX as f64) as u16
    }
}

/// Replays fixed frames of channel values, one frame per sampling cycle.
///
/// The frame advances after its last channel has been read; the final frame repeats.
pub struct ScriptedAdc {
    frames: Vec<Vec<u16>>,
    cursor: usize,
}

impl ScriptedAdc {
    pub fn new(frames: Vec<Vec<u16>>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Every channel reads `value` on every cycle.
    pub fn constant(channels: usize, value: u16) -> Self {
        Self::new(vec![vec![value; channels]])
    }
}

impl AdcSource for ScriptedAdc {
    fn read(&mut self, channel: usize) -> u16 {
        let Some(frame) = self.frames.get(self.cursor) else {
            return 0;
        };
        let value = frame.get(channel).copied().unwrap_or(0);
        if channel + 1 >= frame.len() && self.cursor + 1 < self.frames.len() {
            self.cursor += 1;
        }
        value
    }
}
