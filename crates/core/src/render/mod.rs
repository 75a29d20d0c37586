use std::collections::HashMap;

use crate::{Layer, LightRole, LightSample};

/// Rendering collaborator driven by the journey timeline.
///
/// Implementations own the actual scene graph. They are only ever called by
/// the timeline while it holds its state lock, so they never see concurrent
/// mutation.
pub trait Stage: Send + 'static {
    /// Builds the scene graph. Returns `true` when a previous install already
    /// exists, in which case nothing is rebuilt.
    fn install(&mut self) -> bool;

    /// Whether the layer was loaded. Blends skip missing layers.
    fn has_layer(&self, layer: Layer) -> bool;

    /// Absolute uniform scale of a layer.
    fn set_layer_scale(&mut self, layer: Layer, scale: f32);

    /// World position of a layer.
    fn set_layer_position(&mut self, layer: Layer, position: [f32; 3]);

    /// Intensity and color of one light.
    fn set_light(&mut self, role: LightRole, sample: LightSample);
}

/// Stage without a renderer behind it. Keeps the latest value pushed for every
/// layer and light, which is all the command line runner and tests need.
#[derive(Debug)]
pub struct HeadlessStage {
    installed: bool,
    available: Vec<Layer>,
    scales: HashMap<Layer, f32>,
    positions: HashMap<Layer, [f32; 3]>,
    lights: HashMap<LightRole, LightSample>,
    light_updates: usize,
}

impl HeadlessStage {
    /// Stage with all three layers present.
    pub fn new() -> Self {
        Self::with_layers(&Layer::ALL)
    }

    /// Stage where only `layers` could be loaded.
    pub fn with_layers(layers: &[Layer]) -> Self {
        Self {
            installed: false,
            available: layers.to_vec(),
            scales: HashMap::new(),
            positions: HashMap::new(),
            lights: HashMap::new(),
            light_updates: 0,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Last scale written to `layer`.
    pub fn scale(&self, layer: Layer) -> Option<f32> {
        self.scales.get(&layer).copied()
    }

    /// Last position written to `layer`.
    pub fn position(&self, layer: Layer) -> Option<[f32; 3]> {
        self.positions.get(&layer).copied()
    }

    /// Last sample written to the `role` light.
    pub fn light(&self, role: LightRole) -> Option<LightSample> {
        self.lights.get(&role).copied()
    }

    /// Number of light writes received so far.
    pub fn light_updates(&self) -> usize {
        self.light_updates
    }
}

impl Default for HeadlessStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for HeadlessStage {
    fn install(&mut self) -> bool {
        let existed = self.installed;
        self.installed = true;
        existed
    }

    fn has_layer(&self, layer: Layer) -> bool {
        self.available.contains(&layer)
    }

    fn set_layer_scale(&mut self, layer: Layer, scale: f32) {
        if self.has_layer(layer) {
            self.scales.insert(layer, scale);
        }
    }

    fn set_layer_position(&mut self, layer: Layer, position: [f32; 3]) {
        if self.has_layer(layer) {
            self.positions.insert(layer, position);
        }
    }

    fn set_light(&mut self, role: LightRole, sample: LightSample) {
        self.lights.insert(role, sample);
        self.light_updates += 1;
    }
}
