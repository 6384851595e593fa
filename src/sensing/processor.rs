//! Signal conditioning for raw light readings.
//!
//! Moving-average smoothing per channel, and conversion from a raw ADC count to lux for a
//! light-dependent resistor wired as the lower leg of a voltage divider.

use std::collections::VecDeque;

use crate::utils::config::ADC_MAX;

/// Fixed-window moving average over raw ADC counts.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    buf: VecDeque<u16>,
    sum: u32,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buf: VecDeque::with_capacity(window),
            sum: 0,
        }
    }

    /// Adds a sample and returns the mean of the samples currently in the window.
    pub fn push(&mut self, value: u16) -> u16 {
        self.buf.push_back(value);
        self.sum += value as u32;

        if self.buf.len() > self.window {
            if let Some(old) = self.buf.pop_front() {
                self.sum -= old as u32;
            }
        }

        (self.sum / self.buf.len() as u32) as u16
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// ADC count → lux for an LDR divider.
///
/// Counts are clamped one step inside the ADC range and voltages within `margin` of either
/// rail are treated as saturated (0 lux), so the conversion is defined for every input.
#[derive(Debug, Clone, Copy)]
pub struct LuxConverter {
    pub vref: f64,
    pub r_fixed: f64,
    pub a_coeff: f64,
    pub b_coeff: f64,
    pub margin: f64,
    pub max_lux: f64,
}

impl Default for LuxConverter {
    fn default() -> Self {
        Self {
            vref: 3.3,
            r_fixed: 10_000.0,
            a_coeff: 500_000.0,
            b_coeff: 1.0,
            margin: 0.01,
            max_lux: 5_000.0,
        }
    }
}

impl LuxConverter {
    pub fn adc_to_voltage(&self, adc: u16) -> f64 {
        let adc = adc.clamp(1, ADC_MAX - 1);
        (adc as f64 / ADC_MAX as f64) * self.vref
    }

    /// LDR resistance, or `None` when the divider output is pinned to a rail.
    pub fn voltage_to_resistance(&self, v_out: f64) -> Option<f64> {
        if v_out <= self.margin || v_out >= self.vref - self.margin {
            return None;
        }
        Some(self.r_fixed * ((self.vref - v_out) / v_out))
    }

    pub fn resistance_to_lux(&self, resistance: f64) -> f64 {
        if resistance <= 0.0 || !resistance.is_finite() {
            return 0.0;
        }
        (self.a_coeff / resistance)
            .powf(1.0 / self.b_coeff)
            .clamp(0.0, self.max_lux)
    }

    pub fn to_lux(&self, adc: u16) -> f64 {
        self.voltage_to_resistance(self.adc_to_voltage(adc))
            .map(|r| self.resistance_to_lux(r))
            .unwrap_or(0.0)
    }
}
