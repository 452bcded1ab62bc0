//! Time evaluators
//!
//! Strategy objects that map clip time to the value of one node property.
//! Owned by a time facet; built when the controller initializes.

use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::PropertyValue;
use crate::resource::animation::Keyframe;

/// One clip contribution passed to a blended evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSample {
    /// Clip index
    pub clip: usize,
    /// Clip time in seconds, after offset, scale and shift
    pub time: f64,
    /// Blend factor
    pub weight: f64,
}

/// Maps time to a property value
pub trait TimeEvaluator: Send + fmt::Debug {
    /// Property written with the evaluated value
    fn property(&self) -> &str;

    /// Evaluate a single clip at full weight
    fn evaluate(&mut self, clip: usize, time: f64) -> Option<PropertyValue>;

    /// Evaluate several clips and blend them by weight
    fn evaluate_blended(&mut self, samples: &[ClipSample]) -> Option<PropertyValue> {
        let parts = samples
            .iter()
            .filter_map(|sample| self.evaluate(sample.clip, sample.time).map(|value| (value, sample.weight)))
            .collect::<Vec<_>>();
        PropertyValue::weighted_sum(&parts)
    }
}

/// Linear interpolation over keyframes, one key list per clip
#[derive(Debug, Clone, Default)]
pub struct KeyframeEvaluator {
    property: String,
    clips: Vec<Vec<Keyframe>>,
}

impl KeyframeEvaluator {
    /// Create an evaluator without clips
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            clips: Vec::new(),
        }
    }

    /// Set the keys of a clip; keys are sorted by time
    pub fn with_clip(mut self, clip: usize, mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        if self.clips.len() <= clip {
            self.clips.resize_with(clip + 1, Vec::new);
        }
        self.clips[clip] = keys;
        self
    }

    /// Number of clip slots
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }
}

impl TimeEvaluator for KeyframeEvaluator {
    fn property(&self) -> &str {
        &self.property
    }

    fn evaluate(&mut self, clip: usize, time: f64) -> Option<PropertyValue> {
        let keys = self.clips.get(clip)?;
        let first = keys.first()?;
        let last = keys.last()?;
        if time <= first.time {
            return Some(first.value.clone());
        }
        if time >= last.time {
            return Some(last.value.clone());
        }
        let next = keys.partition_point(|key| key.time <= time);
        let (a, b) = (&keys[next - 1], &keys[next]);
        let span = b.time - a.time;
        if span <= f64::EPSILON {
            return Some(b.value.clone());
        }
        a.value.lerp(&b.value, (time - a.time) / span)
    }
}

/// Writes scaled time into a uniform property
#[derive(Debug, Clone)]
pub struct UniformTimeEvaluator {
    property: String,
    scale: f64,
}

impl UniformTimeEvaluator {
    /// Create a uniform evaluator
    pub fn new(property: impl Into<String>, scale: f64) -> Self {
        Self {
            property: property.into(),
            scale,
        }
    }
}

impl TimeEvaluator for UniformTimeEvaluator {
    fn property(&self) -> &str {
        &self.property
    }

    fn evaluate(&mut self, _clip: usize, time: f64) -> Option<PropertyValue> {
        Some(PropertyValue::Float(time * self.scale))
    }
}

/// Periodic waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveShape {
    /// Sine
    #[default]
    Sine,
    /// Symmetric triangle
    Triangle,
    /// Rising sawtooth
    Sawtooth,
    /// Square
    Square,
}

impl WaveShape {
    /// Parse a shape name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sine" => Some(Self::Sine),
            "triangle" => Some(Self::Triangle),
            "sawtooth" => Some(Self::Sawtooth),
            "square" => Some(Self::Square),
            _ => None,
        }
    }

    /// Value in `[-1, 1]` at `cycles` periods
    pub fn sample(self, cycles: f64) -> f64 {
        let phase = cycles.rem_euclid(1.0);
        match self {
            Self::Sine => (phase * TAU).sin(),
            Self::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Self::Sawtooth => 2.0 * phase - 1.0,
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Writes a waveform of time into a uniform property
#[derive(Debug, Clone)]
pub struct WaveEvaluator {
    property: String,
    shape: WaveShape,
    amplitude: f64,
    frequency: f64,
    phase: f64,
    bias: f64,
}

impl WaveEvaluator {
    /// Create a wave evaluator
    pub fn new(property: impl Into<String>, shape: WaveShape, amplitude: f64, frequency: f64, phase: f64, bias: f64) -> Self {
        Self {
            property: property.into(),
            shape,
            amplitude,
            frequency,
            phase,
            bias,
        }
    }
}

impl TimeEvaluator for WaveEvaluator {
    fn property(&self) -> &str {
        &self.property
    }

    fn evaluate(&mut self, _clip: usize, time: f64) -> Option<PropertyValue> {
        let value = self.bias + self.amplitude * self.shape.sample(time * self.frequency + self.phase);
        Some(PropertyValue::Float(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> KeyframeEvaluator {
        KeyframeEvaluator::new("x").with_clip(
            0,
            vec![Keyframe::new(10.0, 20.0), Keyframe::new(0.0, 0.0)],
        )
    }

    #[test]
    fn test_keyframe_interpolates_and_clamps() {
        let mut evaluator = ramp();
        assert_relative_eq!(evaluator.evaluate(0, 2.5).unwrap().as_float().unwrap(), 5.0);
        assert_relative_eq!(evaluator.evaluate(0, -1.0).unwrap().as_float().unwrap(), 0.0);
        assert_relative_eq!(evaluator.evaluate(0, 99.0).unwrap().as_float().unwrap(), 20.0);
        assert!(evaluator.evaluate(3, 1.0).is_none());
    }

    #[test]
    fn test_blended_default_weights_values() {
        let mut evaluator = ramp().with_clip(1, vec![Keyframe::new(0.0, 100.0)]);
        let value = evaluator
            .evaluate_blended(&[
                ClipSample { clip: 0, time: 5.0, weight: 0.5 },
                ClipSample { clip: 1, time: 0.0, weight: 0.5 },
            ])
            .unwrap();
        assert_relative_eq!(value.as_float().unwrap(), 55.0);
    }

    #[test]
    fn test_wave_shapes() {
        assert_relative_eq!(WaveShape::Sine.sample(0.25), 1.0, epsilon = 1e-12);
        assert_relative_eq!(WaveShape::Triangle.sample(0.5), 1.0);
        assert_relative_eq!(WaveShape::Triangle.sample(0.0), -1.0);
        assert_relative_eq!(WaveShape::Sawtooth.sample(1.5), 0.0);
        assert_relative_eq!(WaveShape::Square.sample(0.75), -1.0);
        assert_eq!(WaveShape::from_name("Square"), Some(WaveShape::Square));
    }

    #[test]
    fn test_wave_evaluator_bias_and_amplitude() {
        let mut wave = WaveEvaluator::new("glow", WaveShape::Sawtooth, 2.0, 1.0, 0.0, 1.0);
        assert_relative_eq!(wave.evaluate(0, 0.75).unwrap().as_float().unwrap(), 2.0);
    }
}
