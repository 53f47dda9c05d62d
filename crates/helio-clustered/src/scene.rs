//! Scene database – the opaque geometry the renderer draws
//!
//! Lights are not part of the scene: they live in the renderer's
//! [`LightSet`](crate::LightSet) and are animated on the GPU.

use crate::mesh::DrawCall;

/// Ordered list of opaque draws
///
/// Objects are rasterized in insertion order. Build draws with
/// [`Renderer::object`](crate::Renderer::object) or [`DrawCall::new`].
#[derive(Clone, Default)]
pub struct Scene {
    pub objects: Vec<DrawCall>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(mut self, draw: DrawCall) -> Self {
        self.objects.push(draw);
        self
    }

    pub fn push(&mut self, draw: DrawCall) {
        self.objects.push(draw);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
