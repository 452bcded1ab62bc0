//! Controller facets
//!
//! The closed set of capabilities a controller can carry. A built-in
//! controller class is just a particular combination of facets.

use crate::controller::evaluator::{TimeEvaluator, UniformTimeEvaluator, WaveEvaluator, WaveShape};
use crate::controller::link::{LinkFacet, NodeLinkFacet};
use crate::controller::time::TimeFacet;
use crate::controller::variable::VariableFacet;
use crate::graph::{AttributeExt, Attributes};
use crate::resource::{ResourceSet, ResourceTarget};

/// Facet discriminant for capability queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    /// Timeline-driven evaluation
    Time,
    /// Keyframe animation resource
    Animation,
    /// Time written into a uniform
    Uniform,
    /// Waveform written into a uniform
    Wave,
    /// Named variables written into the owner
    Variable,
    /// Properties copied from another node
    Link,
    /// Flags mirrored from another node
    NodeLink,
}

/// Animation controller state: the animation resource to play
#[derive(Debug, Default)]
pub struct AnimationFacet {
    /// Animation resource reference
    pub animation: ResourceTarget,
}

impl AnimationFacet {
    /// Play the named animation resource
    pub fn new(resource: impl Into<String>) -> Self {
        let mut animation = ResourceTarget::new();
        animation.add_resource(resource);
        Self { animation }
    }

    fn build(&mut self, resources: &ResourceSet) -> Result<Vec<Box<dyn TimeEvaluator>>, String> {
        if self.animation.is_empty() {
            return Ok(Vec::new());
        }
        self.animation.resolve(resources);
        let animation = self
            .animation
            .get_resource(resources, 0)
            .and_then(|resource| resource.as_animation())
            .ok_or_else(|| format!("animation '{}' is not loaded", self.animation.id(0).unwrap_or_default()))?;
        Ok(animation
            .evaluators()
            .into_iter()
            .map(|evaluator| Box::new(evaluator) as Box<dyn TimeEvaluator>)
            .collect())
    }
}

/// Uniform time controller state
#[derive(Debug, Clone)]
pub struct UniformFacet {
    /// Property receiving the value
    pub property: String,
    /// Multiplier applied to clip time
    pub scale: f64,
}

impl Default for UniformFacet {
    fn default() -> Self {
        Self {
            property: "time".to_string(),
            scale: 1.0,
        }
    }
}

/// Wave uniform time controller state
#[derive(Debug, Clone)]
pub struct WaveFacet {
    /// Property receiving the value
    pub property: String,
    /// Waveform
    pub shape: WaveShape,
    /// Peak deviation from the bias
    pub amplitude: f64,
    /// Periods per second of clip time
    pub frequency: f64,
    /// Phase in periods
    pub phase: f64,
    /// Center value
    pub bias: f64,
}

impl Default for WaveFacet {
    fn default() -> Self {
        Self {
            property: "wave".to_string(),
            shape: WaveShape::Sine,
            amplitude: 1.0,
            frequency: 1.0,
            phase: 0.0,
            bias: 0.0,
        }
    }
}

/// The facets of one controller
#[derive(Debug, Default)]
pub struct Facets {
    /// Time facet
    pub time: Option<TimeFacet>,
    /// Animation facet
    pub animation: Option<AnimationFacet>,
    /// Uniform facet
    pub uniform: Option<UniformFacet>,
    /// Wave facet
    pub wave: Option<WaveFacet>,
    /// Variable facet
    pub variable: Option<VariableFacet>,
    /// Link facet
    pub link: Option<LinkFacet>,
    /// Node link facet
    pub node_link: Option<NodeLinkFacet>,
}

impl Facets {
    /// No facets
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a time facet
    pub fn with_time(mut self, facet: TimeFacet) -> Self {
        self.time = Some(facet);
        self
    }

    /// Add an animation facet
    pub fn with_animation(mut self, facet: AnimationFacet) -> Self {
        self.animation = Some(facet);
        self
    }

    /// Add a uniform facet
    pub fn with_uniform(mut self, facet: UniformFacet) -> Self {
        self.uniform = Some(facet);
        self
    }

    /// Add a wave facet
    pub fn with_wave(mut self, facet: WaveFacet) -> Self {
        self.wave = Some(facet);
        self
    }

    /// Add a variable facet
    pub fn with_variable(mut self, facet: VariableFacet) -> Self {
        self.variable = Some(facet);
        self
    }

    /// Add a link facet
    pub fn with_link(mut self, facet: LinkFacet) -> Self {
        self.link = Some(facet);
        self
    }

    /// Add a node link facet
    pub fn with_node_link(mut self, facet: NodeLinkFacet) -> Self {
        self.node_link = Some(facet);
        self
    }

    /// Whether a facet is present
    pub fn has(&self, kind: FacetKind) -> bool {
        match kind {
            FacetKind::Time => self.time.is_some(),
            FacetKind::Animation => self.animation.is_some(),
            FacetKind::Uniform => self.uniform.is_some(),
            FacetKind::Wave => self.wave.is_some(),
            FacetKind::Variable => self.variable.is_some(),
            FacetKind::Link => self.link.is_some(),
            FacetKind::NodeLink => self.node_link.is_some(),
        }
    }

    /// Kinds of all present facets
    pub fn kinds(&self) -> Vec<FacetKind> {
        [
            FacetKind::Time,
            FacetKind::Animation,
            FacetKind::Uniform,
            FacetKind::Wave,
            FacetKind::Variable,
            FacetKind::Link,
            FacetKind::NodeLink,
        ]
        .into_iter()
        .filter(|kind| self.has(*kind))
        .collect()
    }

    pub(crate) fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        if let Some(time) = &mut self.time {
            time.configure(attributes)?;
        }
        if let Some(animation) = &mut self.animation {
            if let Some(name) = attributes.text("animation")? {
                *animation = AnimationFacet::new(name);
            }
        }
        if let Some(uniform) = &mut self.uniform {
            if let Some(property) = attributes.text("property")? {
                uniform.property = property.to_string();
            }
            uniform.scale = attributes.float_or("scale", uniform.scale)?;
        }
        if let Some(wave) = &mut self.wave {
            if let Some(property) = attributes.text("property")? {
                wave.property = property.to_string();
            }
            if let Some(shape) = attributes.text("shape")? {
                wave.shape = WaveShape::from_name(shape).ok_or_else(|| format!("unknown wave shape '{shape}'"))?;
            }
            wave.amplitude = attributes.float_or("amplitude", wave.amplitude)?;
            wave.frequency = attributes.float_or("frequency", wave.frequency)?;
            wave.phase = attributes.float_or("phase", wave.phase)?;
            wave.bias = attributes.float_or("bias", wave.bias)?;
        }
        if let Some(variable) = &mut self.variable {
            variable.configure(attributes);
        }
        if let Some(link) = &mut self.link {
            link.configure(attributes)?;
        }
        if let Some(node_link) = &mut self.node_link {
            node_link.configure(attributes)?;
        }
        Ok(())
    }

    /// Build the evaluators the time facet runs, from the other facets
    pub(crate) fn build_evaluators(&mut self, resources: &ResourceSet) -> Result<(), String> {
        if self.time.is_none() {
            return Ok(());
        }
        let mut built = match &mut self.animation {
            Some(animation) => animation.build(resources)?,
            None => Vec::new(),
        };
        if let Some(uniform) = &self.uniform {
            built.push(Box::new(UniformTimeEvaluator::new(uniform.property.clone(), uniform.scale)));
        }
        if let Some(wave) = &self.wave {
            built.push(Box::new(WaveEvaluator::new(
                wave.property.clone(),
                wave.shape,
                wave.amplitude,
                wave.frequency,
                wave.phase,
                wave.bias,
            )));
        }
        if let Some(time) = &mut self.time {
            time.set_built(built);
        }
        Ok(())
    }

    pub(crate) fn release_evaluators(&mut self) {
        if let Some(time) = &mut self.time {
            time.clear_built();
        }
    }
}
