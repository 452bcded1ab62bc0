//! Keyframe animations

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::controller::KeyframeEvaluator;
use crate::graph::PropertyValue;

/// A value at a point in clip time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Clip time in seconds
    pub time: f64,
    /// Property value at that time
    pub value: PropertyValue,
}

impl Keyframe {
    /// Create a keyframe
    pub fn new(time: f64, value: impl Into<PropertyValue>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }
}

/// One clip: keyframe tracks keyed by property name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationClip {
    /// Clip name
    pub name: String,
    /// Property tracks
    pub tracks: BTreeMap<String, Vec<Keyframe>>,
}

/// A set of clips, addressed by index from timelines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Animation {
    /// Clips in index order
    pub clips: Vec<AnimationClip>,
}

impl Animation {
    /// Index of a clip by name
    pub fn clip_index(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|clip| clip.name == name)
    }

    /// One evaluator per animated property, covering every clip
    pub fn evaluators(&self) -> Vec<KeyframeEvaluator> {
        let properties = self
            .clips
            .iter()
            .flat_map(|clip| clip.tracks.keys())
            .collect::<BTreeSet<_>>();
        properties
            .into_iter()
            .map(|property| {
                self.clips
                    .iter()
                    .enumerate()
                    .fold(KeyframeEvaluator::new(property.clone()), |evaluator, (index, clip)| {
                        let keys = clip.tracks.get(property).cloned().unwrap_or_default();
                        evaluator.with_clip(index, keys)
                    })
            })
            .collect()
    }
}

impl Config for Animation {}
