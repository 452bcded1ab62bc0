//! Time facet
//!
//! Turns the timelines in scope of a logic traversal into clip samples and
//! runs the facet's evaluators on them.
//!
//! For a timeline at time `t` the facet first applies the offset
//! (`t + time_offset`, negative values delay the start and skip the
//! timeline), then the scale, then the shift:
//! `clip_time = (t + time_offset) * time_scale + time_shift`.

use crate::controller::evaluator::{ClipSample, TimeEvaluator};
use crate::graph::{AttributeExt, Attributes, PropertyValue};
use crate::tracker::TimelineSample;

/// Time controller state
#[derive(Debug)]
pub struct TimeFacet {
    /// Added after scaling
    pub time_shift: f64,
    /// Added before scaling
    pub time_offset: f64,
    /// Playback rate
    pub time_scale: f64,
    /// Enabled timeline units, one bit per unit index
    pub unit_mask: u32,
    /// Trigger groups this controller responds to
    pub group_mask: u32,
    /// Rescale blend factors of all relevant timelines to sum to one
    pub normalize_blend_factors: bool,
    evaluators: Vec<Box<dyn TimeEvaluator>>,
    built: Vec<Box<dyn TimeEvaluator>>,
}

impl Default for TimeFacet {
    fn default() -> Self {
        Self {
            time_shift: 0.0,
            time_offset: 0.0,
            time_scale: 1.0,
            unit_mask: u32::MAX,
            group_mask: u32::MAX,
            normalize_blend_factors: true,
            evaluators: Vec::new(),
            built: Vec::new(),
        }
    }
}

impl TimeFacet {
    /// Create a facet with neutral timing
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an evaluator that lives as long as the facet
    pub fn add_evaluator(&mut self, evaluator: Box<dyn TimeEvaluator>) {
        self.evaluators.push(evaluator);
    }

    /// Number of evaluators, including those built at init
    pub fn evaluator_count(&self) -> usize {
        self.evaluators.len() + self.built.len()
    }

    pub(crate) fn set_built(&mut self, built: Vec<Box<dyn TimeEvaluator>>) {
        self.built = built;
    }

    pub(crate) fn clear_built(&mut self) {
        self.built.clear();
    }

    /// Clip samples for the timelines relevant to this facet
    pub fn clip_samples(&self, timelines: &[TimelineSample]) -> Vec<ClipSample> {
        let mut samples = timelines
            .iter()
            .filter(|timeline| self.responds_to(timeline))
            .filter_map(|timeline| {
                let started = timeline.time + self.time_offset;
                (started >= 0.0).then(|| ClipSample {
                    clip: timeline.clip,
                    time: started * self.time_scale + self.time_shift,
                    weight: timeline.weight,
                })
            })
            .collect::<Vec<_>>();

        if self.normalize_blend_factors {
            let total: f64 = samples.iter().map(|sample| sample.weight).sum();
            if total > 0.0 {
                for sample in &mut samples {
                    sample.weight /= total;
                }
            }
        }
        samples
    }

    fn responds_to(&self, timeline: &TimelineSample) -> bool {
        let unit_enabled = timeline.unit < 32 && self.unit_mask & (1 << timeline.unit) != 0;
        unit_enabled && timeline.group_mask & self.group_mask != 0
    }

    /// Evaluate every evaluator, returning the property writes
    ///
    /// A lone timeline at full weight takes the single-clip path; anything
    /// else goes through the blended path.
    pub fn evaluate(&mut self, timelines: &[TimelineSample]) -> Vec<(String, PropertyValue)> {
        let samples = self.clip_samples(timelines);
        let single = match samples.as_slice() {
            [] => return Vec::new(),
            [sample] if (sample.weight - 1.0).abs() <= f64::EPSILON => Some(*sample),
            _ => None,
        };
        self.evaluators
            .iter_mut()
            .chain(self.built.iter_mut())
            .filter_map(|evaluator| {
                let value = match single {
                    Some(sample) => evaluator.evaluate(sample.clip, sample.time),
                    None => evaluator.evaluate_blended(&samples),
                };
                value.map(|value| (evaluator.property().to_string(), value))
            })
            .collect()
    }

    pub(crate) fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        self.time_shift = attributes.float_or("time_shift", self.time_shift)?;
        self.time_offset = attributes.float_or("time_offset", self.time_offset)?;
        self.time_scale = attributes.float_or("time_scale", self.time_scale)?;
        self.unit_mask = mask_attribute(attributes, "unit_mask", self.unit_mask)?;
        self.group_mask = mask_attribute(attributes, "group_mask", self.group_mask)?;
        self.normalize_blend_factors = attributes.bool_or("normalize", self.normalize_blend_factors)?;
        Ok(())
    }
}

pub(crate) fn mask_attribute(attributes: &Attributes, key: &str, default: u32) -> Result<u32, String> {
    let bits = attributes.int_or(key, i64::from(default))?;
    u32::try_from(bits).map_err(|_| format!("attribute '{key}' must fit in 32 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::evaluator::KeyframeEvaluator;
    use crate::foundation::collections::NodeKey;
    use crate::resource::animation::Keyframe;
    use approx::assert_relative_eq;

    fn timeline(unit: u32, clip: usize, time: f64, weight: f64) -> TimelineSample {
        TimelineSample {
            source: NodeKey::default(),
            unit,
            group_mask: 1,
            clip,
            time,
            weight,
        }
    }

    fn identity_ramp() -> Box<KeyframeEvaluator> {
        let keys = vec![Keyframe::new(0.0, 0.0), Keyframe::new(100.0, 100.0)];
        Box::new(KeyframeEvaluator::new("x").with_clip(0, keys.clone()).with_clip(1, keys))
    }

    #[test]
    fn test_offset_scale_shift_order() {
        let facet = TimeFacet {
            time_offset: 1.0,
            time_scale: 2.0,
            time_shift: 0.5,
            ..TimeFacet::default()
        };
        let samples = facet.clip_samples(&[timeline(0, 0, 3.0, 1.0)]);
        assert_relative_eq!(samples[0].time, 8.5);
    }

    #[test]
    fn test_negative_offset_delays_start() {
        let facet = TimeFacet {
            time_offset: -2.0,
            ..TimeFacet::default()
        };
        assert!(facet.clip_samples(&[timeline(0, 0, 1.0, 1.0)]).is_empty());
        assert_eq!(facet.clip_samples(&[timeline(0, 0, 2.5, 1.0)]).len(), 1);
    }

    #[test]
    fn test_scale_invariance() {
        let mut doubled = TimeFacet {
            time_scale: 2.0,
            ..TimeFacet::default()
        };
        doubled.add_evaluator(identity_ramp());
        let mut plain = TimeFacet::default();
        plain.add_evaluator(identity_ramp());

        for t in [0.0, 1.0, 3.5, 20.0] {
            let a = doubled.evaluate(&[timeline(0, 0, t / 2.0, 1.0)]);
            let b = plain.evaluate(&[timeline(0, 0, t, 1.0)]);
            assert_relative_eq!(a[0].1.as_float().unwrap(), b[0].1.as_float().unwrap());
        }
    }

    #[test]
    fn test_normalized_weights_sum_to_one() {
        let facet = TimeFacet::default();
        let samples = facet.clip_samples(&[
            timeline(0, 0, 1.0, 0.3),
            timeline(1, 1, 1.0, 2.0),
            timeline(2, 0, 1.0, 0.0),
        ]);
        let total: f64 = samples.iter().map(|sample| sample.weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unit_and_group_masks_filter() {
        let facet = TimeFacet {
            unit_mask: 0b10,
            group_mask: 0b100,
            ..TimeFacet::default()
        };
        let mut wrong_group = timeline(1, 0, 1.0, 1.0);
        wrong_group.group_mask = 0b1;
        let mut right = timeline(1, 0, 1.0, 1.0);
        right.group_mask = 0b110;
        assert!(facet.clip_samples(&[timeline(0, 0, 1.0, 1.0), wrong_group]).is_empty());
        assert_eq!(facet.clip_samples(&[right]).len(), 1);
    }

    #[test]
    fn test_blended_evaluation_uses_normalized_weights() {
        let mut facet = TimeFacet::default();
        facet.add_evaluator(identity_ramp());
        let writes = facet.evaluate(&[timeline(0, 0, 10.0, 1.0), timeline(1, 1, 30.0, 3.0)]);
        assert_eq!(writes[0].0, "x");
        assert_relative_eq!(writes[0].1.as_float().unwrap(), 25.0);
    }
}
