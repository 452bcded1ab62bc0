//! Node property values
//!
//! Nodes keep a small property bag that controllers write into and renderers
//! read from. Values are dynamically typed; blending is only defined between
//! values of the same variant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Transform, Vec3};

/// Attribute map used to configure nodes and controllers from templates
pub type Attributes = BTreeMap<String, PropertyValue>;

/// A dynamically typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point scalar
    Float(f64),
    /// Text value
    Text(String),
    /// 3D vector
    Vector(Vec3),
    /// Full transform
    Transform(Transform),
}

impl PropertyValue {
    /// Read as a float; integers are widened
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Read as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Read as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Read as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Read as a vector
    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            Self::Vector(value) => Some(*value),
            _ => None,
        }
    }

    /// Read as a transform
    pub fn as_transform(&self) -> Option<&Transform> {
        match self {
            Self::Transform(value) => Some(value),
            _ => None,
        }
    }

    /// Linear interpolation between two values of the same kind
    ///
    /// Discrete kinds (bool, int, text) step at `t >= 0.5`.
    pub fn lerp(&self, other: &Self, t: f64) -> Option<Self> {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a + (b - a) * t)),
            (Self::Vector(a), Self::Vector(b)) => Some(Self::Vector(a.lerp(b, t as f32))),
            (Self::Transform(a), Self::Transform(b)) => {
                Transform::weighted_blend(&[(a, (1.0 - t) as f32), (b, t as f32)]).map(Self::Transform)
            }
            (Self::Bool(_), Self::Bool(_)) | (Self::Int(_), Self::Int(_)) | (Self::Text(_), Self::Text(_)) => {
                Some(if t >= 0.5 { other.clone() } else { self.clone() })
            }
            _ => None,
        }
    }

    /// Weighted combination of several values of the same kind
    ///
    /// Continuous kinds are summed by weight; discrete kinds take the value
    /// with the largest weight. Mixed kinds yield `None`.
    pub fn weighted_sum(parts: &[(Self, f64)]) -> Option<Self> {
        let (first, _) = parts.first()?;
        match first {
            Self::Float(_) => parts
                .iter()
                .map(|(value, weight)| value.as_float().map(|v| v * weight))
                .sum::<Option<f64>>()
                .map(Self::Float),
            Self::Vector(_) => parts
                .iter()
                .map(|(value, weight)| value.as_vector().map(|v| v * *weight as f32))
                .try_fold(Vec3::zeros(), |acc, v| v.map(|v| acc + v))
                .map(Self::Vector),
            Self::Transform(_) => {
                let transforms = parts
                    .iter()
                    .map(|(value, weight)| value.as_transform().map(|t| (t, *weight as f32)))
                    .collect::<Option<Vec<_>>>()?;
                Transform::weighted_blend(&transforms).map(Self::Transform)
            }
            Self::Bool(_) | Self::Int(_) | Self::Text(_) => {
                if parts.iter().any(|(value, _)| std::mem::discriminant(value) != std::mem::discriminant(first)) {
                    return None;
                }
                parts
                    .iter()
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(value, _)| value.clone())
            }
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec3> for PropertyValue {
    fn from(value: Vec3) -> Self {
        Self::Vector(value)
    }
}

impl From<Transform> for PropertyValue {
    fn from(value: Transform) -> Self {
        Self::Transform(value)
    }
}

/// Attribute lookup helpers shared by node and controller configuration
pub trait AttributeExt {
    /// Float attribute or default
    fn float_or(&self, key: &str, default: f64) -> Result<f64, String>;
    /// Boolean attribute or default
    fn bool_or(&self, key: &str, default: bool) -> Result<bool, String>;
    /// Integer attribute or default
    fn int_or(&self, key: &str, default: i64) -> Result<i64, String>;
    /// Optional text attribute
    fn text(&self, key: &str) -> Result<Option<&str>, String>;
}

impl AttributeExt for Attributes {
    fn float_or(&self, key: &str, default: f64) -> Result<f64, String> {
        self.get(key).map_or(Ok(default), |value| {
            value.as_float().ok_or_else(|| format!("attribute '{key}' must be a number"))
        })
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, String> {
        self.get(key).map_or(Ok(default), |value| {
            value.as_bool().ok_or_else(|| format!("attribute '{key}' must be a boolean"))
        })
    }

    fn int_or(&self, key: &str, default: i64) -> Result<i64, String> {
        self.get(key).map_or(Ok(default), |value| {
            value.as_int().ok_or_else(|| format!("attribute '{key}' must be an integer"))
        })
    }

    fn text(&self, key: &str) -> Result<Option<&str>, String> {
        self.get(key).map_or(Ok(None), |value| {
            value.as_text().map(Some).ok_or_else(|| format!("attribute '{key}' must be text"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_float_lerp() {
        let a = PropertyValue::Float(0.0);
        let b = PropertyValue::Float(10.0);
        assert_relative_eq!(a.lerp(&b, 0.25).unwrap().as_float().unwrap(), 2.5);
    }

    #[test]
    fn test_mixed_lerp_fails() {
        assert!(PropertyValue::Float(0.0).lerp(&PropertyValue::Bool(true), 0.5).is_none());
    }

    #[test]
    fn test_weighted_sum_vectors() {
        let parts = [
            (PropertyValue::Vector(Vec3::new(1.0, 0.0, 0.0)), 0.5),
            (PropertyValue::Vector(Vec3::new(0.0, 1.0, 0.0)), 0.5),
        ];
        let sum = PropertyValue::weighted_sum(&parts).unwrap().as_vector().unwrap();
        assert_relative_eq!(sum, Vec3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn test_weighted_sum_discrete_picks_heaviest() {
        let parts = [(PropertyValue::Bool(false), 0.3), (PropertyValue::Bool(true), 0.7)];
        assert_eq!(PropertyValue::weighted_sum(&parts), Some(PropertyValue::Bool(true)));
    }

    #[test]
    fn test_attribute_helpers() {
        let mut attributes = Attributes::new();
        attributes.insert("scale".to_string(), PropertyValue::Int(2));
        attributes.insert("name".to_string(), PropertyValue::Float(1.0));
        assert_relative_eq!(attributes.float_or("scale", 1.0).unwrap(), 2.0);
        assert_relative_eq!(attributes.float_or("missing", 3.0).unwrap(), 3.0);
        assert!(attributes.text("name").is_err());
    }
}
