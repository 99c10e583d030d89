//! Per-frame uniform block shared by the CPU and GPU ray marchers.
//!
//! Layout mirrors `struct Frame` in `shaders/raymarch.wgsl`: every row is
//! 16 bytes so the block needs no padding rules beyond `#[repr(C)]`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::{camera::FlyCamera, settings::RenderSettings};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub inverse_view_projection: [[f32; 4]; 4],
    /// xyz camera position, w elapsed seconds.
    pub camera: [f32; 4],
    /// xy output size in pixels, z ray hit threshold, w epsilon.
    pub resolution: [f32; 4],
    /// power, escape radius, max iterations, step limit.
    pub fractal: [f32; 4],
    /// xyz fractal center, w max distance.
    pub center: [f32; 4],
    /// xyz background color, w unused.
    pub background: [f32; 4],
    /// xyz light position, w light power.
    pub light: [f32; 4],
    /// xyz light color, w light radius.
    pub light_color: [f32; 4],
    /// ambient, diffuse, specular, shininess.
    pub material: [f32; 4],
    /// softness, min distance, min step, max step.
    pub shadow: [f32; 4],
    /// shadow max iterations, noise scale, noise amplitude, bloom intensity.
    pub extra: [f32; 4],
    /// xyz bloom color, w unused.
    pub bloom_color: [f32; 4],
    /// coloring method, background kind, effect bits, unused.
    pub modes: [u32; 4],
}

impl FrameUniforms {
    pub fn new(
        settings: &RenderSettings,
        camera: &FlyCamera,
        size: (u32, u32),
        time: f32,
    ) -> Self {
        let (width, height) = (size.0.max(1) as f32, size.1.max(1) as f32);
        let view_projection = camera.projection_matrix(width / height) * camera.view_matrix();
        let position = camera.position();
        let s = settings;

        Self {
            inverse_view_projection: view_projection.inverse().to_cols_array_2d(),
            camera: [position.x, position.y, position.z, time],
            resolution: [width, height, s.ray_hit_threshold, s.epsilon],
            fractal: [
                s.power,
                s.escape_radius,
                s.max_iterations as f32,
                s.step_limit as f32,
            ],
            center: extend(s.fractal_center, s.max_distance),
            background: extend(s.background_color, 0.0),
            light: extend(s.light_pos, s.light_power),
            light_color: extend(s.light_color, s.light_radius),
            material: [
                s.ambient_strength,
                s.diffuse_strength,
                s.specular_strength,
                s.specular_shininess,
            ],
            shadow: [
                s.shadow_softness,
                s.shadow_min_distance,
                s.shadow_min_step_size,
                s.shadow_max_step_size,
            ],
            extra: [
                s.shadow_max_iterations as f32,
                s.noise_scale,
                s.noise_amplitude,
                s.bloom_intensity,
            ],
            bloom_color: extend(s.bloom_color, 0.0),
            modes: [
                s.coloring_method.index(),
                s.background.index(),
                s.effects.bits(),
                0,
            ],
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.resolution[0] as u32, self.resolution[1] as u32)
    }

    pub fn camera_position(&self) -> Vec3 {
        Vec3::new(self.camera[0], self.camera[1], self.camera[2])
    }

    pub fn has_effect(&self, flag: u32) -> bool {
        self.modes[2] & flag != 0
    }

    /// Primary ray direction through a point in normalized device coordinates
    /// (`x` right, `y` up, both in `[-1, 1]`).
    pub fn ray_direction(&self, ndc: Vec2) -> Vec3 {
        let inverse = Mat4::from_cols_array_2d(&self.inverse_view_projection);
        let near = inverse * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
        let far = inverse * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        (far.truncate() / far.w - near.truncate() / near.w).normalize()
    }

    /// NDC of the center of pixel `(x, y)`, with `y` growing downwards.
    pub fn pixel_ndc(&self, x: u32, y: u32) -> Vec2 {
        let (width, height) = (self.resolution[0], self.resolution[1]);
        Vec2::new(
            (x as f32 + 0.5) / width * 2.0 - 1.0,
            1.0 - (y as f32 + 0.5) / height * 2.0,
        )
    }
}

fn extend(xyz: [f32; 3], w: f32) -> [f32; 4] {
    [xyz[0], xyz[1], xyz[2], w]
}
