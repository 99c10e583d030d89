//! Render parameters owned by the app and passed by reference to the UI,
//! the uniform builder and the renderers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColoringMethod {
    /// Escape iteration count over the iteration limit.
    #[default]
    Iterations,
    /// Closest approach of the orbit to the origin.
    OrbitTrap,
    /// March distance over the maximum distance.
    Distance,
}

impl ColoringMethod {
    pub const ALL: [ColoringMethod; 3] = [
        ColoringMethod::Iterations,
        ColoringMethod::OrbitTrap,
        ColoringMethod::Distance,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ColoringMethod::Iterations => "Iterations",
            ColoringMethod::OrbitTrap => "Orbit trap",
            ColoringMethod::Distance => "Distance",
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            ColoringMethod::Iterations => 0,
            ColoringMethod::OrbitTrap => 1,
            ColoringMethod::Distance => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    #[default]
    Solid,
    /// Gradient lookup indexed by the ray's elevation.
    Gradient,
}

impl BackgroundKind {
    pub fn label(&self) -> &'static str {
        match self {
            BackgroundKind::Solid => "Solid",
            BackgroundKind::Gradient => "Gradient",
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            BackgroundKind::Solid => 0,
            BackgroundKind::Gradient => 1,
        }
    }
}

/// Feature toggles, packed into a bitmask for the shader.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Effects {
    pub show_light: bool,
    pub noise: bool,
    pub blinn_phong: bool,
    pub soft_shadow: bool,
    pub bloom: bool,
    pub ambient_occlusion: bool,
    pub normal_visualization: bool,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            show_light: false,
            noise: true,
            blinn_phong: true,
            soft_shadow: true,
            bloom: true,
            ambient_occlusion: true,
            normal_visualization: false,
        }
    }
}

pub const FLAG_SHOW_LIGHT: u32 = 1 << 0;
pub const FLAG_NOISE: u32 = 1 << 1;
pub const FLAG_BLINN_PHONG: u32 = 1 << 2;
pub const FLAG_SOFT_SHADOW: u32 = 1 << 3;
pub const FLAG_BLOOM: u32 = 1 << 4;
pub const FLAG_AMBIENT_OCCLUSION: u32 = 1 << 5;
pub const FLAG_NORMALS: u32 = 1 << 6;

impl Effects {
    pub fn bits(&self) -> u32 {
        [
            (self.show_light, FLAG_SHOW_LIGHT),
            (self.noise, FLAG_NOISE),
            (self.blinn_phong, FLAG_BLINN_PHONG),
            (self.soft_shadow, FLAG_SOFT_SHADOW),
            (self.bloom, FLAG_BLOOM),
            (self.ambient_occlusion, FLAG_AMBIENT_OCCLUSION),
            (self.normal_visualization, FLAG_NORMALS),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(0, |bits, (_, flag)| bits | flag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    // Fractal
    pub max_iterations: u32,
    pub escape_radius: f32,
    pub power: f32,
    pub fractal_center: [f32; 3],

    // Marching
    pub step_limit: u32,
    pub epsilon: f32,
    pub max_distance: f32,
    pub ray_hit_threshold: f32,

    // Color
    pub coloring_method: ColoringMethod,
    pub background: BackgroundKind,
    pub background_color: [f32; 3],
    pub noise_scale: f32,
    pub noise_amplitude: f32,

    // Lighting
    pub light_pos: [f32; 3],
    pub light_power: f32,
    pub light_radius: f32,
    pub light_color: [f32; 3],
    pub ambient_strength: f32,
    pub diffuse_strength: f32,
    pub specular_strength: f32,
    pub specular_shininess: f32,

    // Shadows
    pub shadow_softness: f32,
    pub shadow_min_distance: f32,
    pub shadow_min_step_size: f32,
    pub shadow_max_step_size: f32,
    pub shadow_max_iterations: u32,

    // Bloom
    pub bloom_intensity: f32,
    pub bloom_color: [f32; 3],

    /// Fraction of the viewport resolution used by the CPU backend.
    pub preview_scale: f32,

    pub effects: Effects,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            escape_radius: 4.0,
            power: 8.0,
            fractal_center: [0.0, 0.0, -1.5],
            step_limit: 1000,
            epsilon: 0.0001,
            max_distance: 50.0,
            ray_hit_threshold: 0.00001,
            coloring_method: ColoringMethod::default(),
            background: BackgroundKind::default(),
            background_color: [1.0, 1.0, 1.0],
            noise_scale: 1.0,
            noise_amplitude: 0.5,
            light_pos: [2.0, 2.0, 5.0],
            light_power: 0.4,
            light_radius: 0.1,
            light_color: [0.9, 0.9, 0.9],
            ambient_strength: 0.5,
            diffuse_strength: 1.0,
            specular_strength: 0.5,
            specular_shininess: 32.0,
            shadow_softness: 32.0,
            shadow_min_distance: 0.01,
            shadow_min_step_size: 0.01,
            shadow_max_step_size: 0.1,
            shadow_max_iterations: 128,
            bloom_intensity: 5.0,
            bloom_color: [1.0, 1.0, 1.0],
            preview_scale: 0.25,
            effects: Effects::default(),
        }
    }
}

impl RenderSettings {
    /// Pulls values loaded from disk back into ranges the renderers accept.
    pub fn sanitize(&mut self) {
        self.max_iterations = self.max_iterations.clamp(1, 512);
        self.step_limit = self.step_limit.clamp(1, 10_000);
        self.shadow_max_iterations = self.shadow_max_iterations.clamp(1, 1024);
        self.escape_radius = self.escape_radius.max(1.0);
        self.epsilon = self.epsilon.max(1e-7);
        self.ray_hit_threshold = self.ray_hit_threshold.max(1e-8);
        self.max_distance = self.max_distance.max(self.epsilon);
        self.shadow_min_step_size = self.shadow_min_step_size.max(1e-5);
        self.shadow_max_step_size = self.shadow_max_step_size.max(self.shadow_min_step_size);
        self.preview_scale = self.preview_scale.clamp(0.05, 1.0);
    }
}

/// Panel visibility; not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub show_gui: bool,
    pub show_gradient_editor: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            show_gui: true,
            show_gradient_editor: false,
        }
    }
}

/// Frame timing shown in the top bar, refreshed once per second.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub fps: u32,
    pub update_ms: f64,
    pub frame_ms: f64,
    frames: u32,
    window: f64,
}

impl FrameStats {
    pub fn record(&mut self, frame_secs: f64, update_secs: f64) {
        self.frames += 1;
        self.window += frame_secs;
        self.frame_ms = frame_secs * 1000.0;
        self.update_ms = update_secs * 1000.0;
        if self.window >= 1.0 {
            self.fps = self.frames;
            self.frames = 0;
            self.window -= 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_bits_follow_toggles() {
        let effects = Effects::default();
        let bits = effects.bits();

        assert_eq!(bits & FLAG_SHOW_LIGHT, 0);
        assert_ne!(bits & FLAG_NOISE, 0);
        assert_ne!(bits & FLAG_BLOOM, 0);
        assert_eq!(bits & FLAG_NORMALS, 0);

        let none = Effects {
            show_light: false,
            noise: false,
            blinn_phong: false,
            soft_shadow: false,
            bloom: false,
            ambient_occlusion: false,
            normal_visualization: false,
        };
        assert_eq!(none.bits(), 0);
    }

    #[test]
    fn sanitize_repairs_out_of_range_values() {
        let mut settings = RenderSettings {
            max_iterations: 0,
            step_limit: 0,
            shadow_min_step_size: 0.5,
            shadow_max_step_size: 0.1,
            preview_scale: 3.0,
            ..RenderSettings::default()
        };
        settings.sanitize();

        assert_eq!(settings.max_iterations, 1);
        assert_eq!(settings.step_limit, 1);
        assert_eq!(settings.shadow_max_step_size, 0.5);
        assert_eq!(settings.preview_scale, 1.0);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings: RenderSettings = toml::from_str(
            r#"
            power = 6.0
            coloring_method = "orbit_trap"

            [effects]
            bloom = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.power, 6.0);
        assert_eq!(settings.coloring_method, ColoringMethod::OrbitTrap);
        assert!(!settings.effects.bloom);
        assert!(settings.effects.noise);
        assert_eq!(settings.max_iterations, 25);
    }

    #[test]
    fn fps_counts_frames_per_second() {
        let mut stats = FrameStats::default();
        for _ in 0..8 {
            stats.record(0.125, 0.01);
        }

        assert_eq!(stats.fps, 8);
        assert!((stats.frame_ms - 125.0).abs() < 1e-9);
    }
}
