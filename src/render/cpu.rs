//! CPU ray marcher. Same scene and shading model as `shaders/raymarch.wgsl`,
//! used as the default backend and as the fallback when the GPU path fails.

use glam::Vec3;
use image::{ImageBuffer, Rgba};

use crate::{
    gradient::{LUT_BYTES, LUT_SIZE},
    settings::{
        FLAG_AMBIENT_OCCLUSION, FLAG_BLINN_PHONG, FLAG_BLOOM, FLAG_NOISE, FLAG_NORMALS,
        FLAG_SHOW_LIGHT, FLAG_SOFT_SHADOW,
    },
    uniforms::FrameUniforms,
};

/// Rays that miss this sphere around the fractal center are background.
pub const BOUNDING_RADIUS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub distance: f32,
    pub iterations: u32,
    /// Smallest orbit radius seen while iterating.
    pub trap: f32,
}

/// Distance estimate to a power-N Mandelbulb centered at the origin.
pub fn mandelbulb(point: Vec3, power: f32, escape_radius: f32, max_iterations: u32) -> DistanceSample {
    let mut z = point;
    let mut dr = 1.0;
    let mut trap = f32::MAX;
    let mut iterations = 0;

    while iterations < max_iterations {
        let r = z.length();
        if r > escape_radius {
            break;
        }
        trap = trap.min(r);

        let theta = if r > 0.0 { (z.z / r).acos() } else { 0.0 };
        let phi = z.y.atan2(z.x);
        dr = r.powf(power - 1.0) * power * dr + 1.0;

        let zr = r.powf(power);
        let (theta, phi) = (theta * power, phi * power);
        z = zr * Vec3::new(theta.sin() * phi.cos(), phi.sin() * theta.sin(), theta.cos()) + point;
        iterations += 1;
    }

    let r = z.length().max(f32::MIN_POSITIVE);
    DistanceSample {
        distance: 0.5 * r.ln() * r / dr,
        iterations,
        trap,
    }
}

pub fn render(uniforms: &FrameUniforms, lut: &[u8; LUT_BYTES]) -> Vec<u8> {
    let (width, height) = uniforms.size();
    let scene = Scene::new(uniforms, lut);
    let mut buf: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(width, height);

    for (y, row) in buf.enumerate_rows_mut() {
        for (x, _, px) in row {
            let dir = uniforms.ray_direction(uniforms.pixel_ndc(x, y));
            let color = scene.shade(dir);
            *px = Rgba([to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]);
        }
    }
    buf.into_raw()
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

struct Hit {
    t: f32,
    point: Vec3,
    sample: DistanceSample,
}

struct March {
    hit: Option<Hit>,
    steps: u32,
}

/// Uniforms unpacked into named fields for the per-pixel loop.
struct Scene<'a> {
    frame: &'a FrameUniforms,
    lut: &'a [u8; LUT_BYTES],
    origin: Vec3,
    center: Vec3,
    power: f32,
    escape_radius: f32,
    max_iterations: u32,
    step_limit: u32,
    max_distance: f32,
    hit_threshold: f32,
    epsilon: f32,
    background: Vec3,
    light_pos: Vec3,
    light_power: f32,
    light_color: Vec3,
    light_radius: f32,
    ambient: f32,
    diffuse: f32,
    specular: f32,
    shininess: f32,
    shadow_softness: f32,
    shadow_min_distance: f32,
    shadow_min_step: f32,
    shadow_max_step: f32,
    shadow_max_iterations: u32,
    noise_scale: f32,
    noise_amplitude: f32,
    bloom_intensity: f32,
    bloom_color: Vec3,
    coloring_method: u32,
    background_kind: u32,
}

impl<'a> Scene<'a> {
    fn new(u: &'a FrameUniforms, lut: &'a [u8; LUT_BYTES]) -> Self {
        Self {
            frame: u,
            lut,
            origin: u.camera_position(),
            center: xyz(u.center),
            power: u.fractal[0],
            escape_radius: u.fractal[1],
            max_iterations: u.fractal[2] as u32,
            step_limit: u.fractal[3] as u32,
            max_distance: u.center[3],
            hit_threshold: u.resolution[2],
            epsilon: u.resolution[3],
            background: xyz(u.background),
            light_pos: xyz(u.light),
            light_power: u.light[3],
            light_color: xyz(u.light_color),
            light_radius: u.light_color[3],
            ambient: u.material[0],
            diffuse: u.material[1],
            specular: u.material[2],
            shininess: u.material[3],
            shadow_softness: u.shadow[0],
            shadow_min_distance: u.shadow[1],
            shadow_min_step: u.shadow[2],
            shadow_max_step: u.shadow[3],
            shadow_max_iterations: u.extra[0] as u32,
            noise_scale: u.extra[1],
            noise_amplitude: u.extra[2],
            bloom_intensity: u.extra[3],
            bloom_color: xyz(u.bloom_color),
            coloring_method: u.modes[0],
            background_kind: u.modes[1],
        }
    }

    fn has(&self, flag: u32) -> bool {
        self.frame.has_effect(flag)
    }

    fn distance(&self, point: Vec3) -> DistanceSample {
        mandelbulb(point - self.center, self.power, self.escape_radius, self.max_iterations)
    }

    fn march(&self, dir: Vec3) -> March {
        let Some((enter, exit)) = sphere_span(self.origin - self.center, dir, BOUNDING_RADIUS) else {
            return March { hit: None, steps: 0 };
        };
        let far = exit.min(self.max_distance);
        let mut t = enter.max(0.0);
        let mut steps = 0;

        while steps < self.step_limit && t <= far {
            let point = self.origin + dir * t;
            let sample = self.distance(point);
            steps += 1;
            if sample.distance < self.hit_threshold.max(self.epsilon * t) {
                return March {
                    hit: Some(Hit { t, point, sample }),
                    steps,
                };
            }
            t += sample.distance;
        }
        March { hit: None, steps }
    }

    fn normal(&self, point: Vec3) -> Vec3 {
        let e = self.epsilon.max(1e-5);
        let d = |offset: Vec3| {
            self.distance(point + offset * e).distance - self.distance(point - offset * e).distance
        };
        Vec3::new(d(Vec3::X), d(Vec3::Y), d(Vec3::Z)).normalize_or_zero()
    }

    fn soft_shadow(&self, point: Vec3, to_light: Vec3, light_distance: f32) -> f32 {
        let mut shade: f32 = 1.0;
        let mut t = self.shadow_min_distance;
        for _ in 0..self.shadow_max_iterations {
            if t >= light_distance {
                break;
            }
            let h = self.distance(point + to_light * t).distance;
            if h < self.hit_threshold {
                return 0.0;
            }
            shade = shade.min(self.shadow_softness * h / t);
            t += h.clamp(self.shadow_min_step, self.shadow_max_step);
        }
        shade.clamp(0.0, 1.0)
    }

    fn ambient_occlusion(&self, point: Vec3, normal: Vec3) -> f32 {
        let mut occlusion = 0.0;
        let mut weight = 1.0;
        for i in 1..=5 {
            let h = 0.01 + 0.03 * i as f32;
            occlusion += (h - self.distance(point + normal * h).distance) * weight;
            weight *= 0.75;
        }
        (1.0 - 3.0 * occlusion).clamp(0.0, 1.0)
    }

    fn lut(&self, t: f32) -> Vec3 {
        let idx = (t.clamp(0.0, 1.0) * (LUT_SIZE - 1) as f32).round() as usize * 3;
        Vec3::new(
            self.lut[idx] as f32,
            self.lut[idx + 1] as f32,
            self.lut[idx + 2] as f32,
        ) / 255.0
    }

    fn background(&self, dir: Vec3) -> Vec3 {
        match self.background_kind {
            1 => self.lut(dir.y * 0.5 + 0.5),
            _ => self.background,
        }
    }

    fn surface_color(&self, hit: &Hit) -> Vec3 {
        let metric = match self.coloring_method {
            1 => hit.sample.trap,
            2 => hit.t / self.max_distance,
            _ => hit.sample.iterations as f32 / self.max_iterations.max(1) as f32,
        };
        let mut base = self.lut(metric);
        if self.has(FLAG_NOISE) {
            let n = value_noise((hit.point - self.center) * self.noise_scale);
            base *= 1.0 + self.noise_amplitude * (n - 0.5);
        }
        base
    }

    fn shade(&self, dir: Vec3) -> Vec3 {
        let march = self.march(dir);
        let mut color = match &march.hit {
            None => self.background(dir),
            Some(hit) => self.light_surface(hit, dir),
        };

        if self.has(FLAG_SHOW_LIGHT) {
            let hit_t = march.hit.as_ref().map_or(f32::MAX, |hit| hit.t);
            let along = (self.light_pos - self.origin).dot(dir);
            if along > 0.0
                && along < hit_t
                && (self.origin + dir * along).distance(self.light_pos) < self.light_radius
            {
                color = self.light_color;
            }
        }

        if self.has(FLAG_BLOOM) && self.step_limit > 0 {
            let glow = march.steps as f32 / self.step_limit as f32;
            color += self.bloom_color * glow * self.bloom_intensity;
        }
        color
    }

    fn light_surface(&self, hit: &Hit, dir: Vec3) -> Vec3 {
        let normal = self.normal(hit.point);
        if self.has(FLAG_NORMALS) {
            return normal * 0.5 + 0.5;
        }

        let base = self.surface_color(hit);
        // step back off the surface before casting secondary rays
        let surface = hit.point + normal * self.hit_threshold.max(self.epsilon) * 2.0;
        let to_light = self.light_pos - surface;
        let light_distance = to_light.length();
        let to_light = to_light / light_distance.max(f32::MIN_POSITIVE);

        let shadow = if self.has(FLAG_SOFT_SHADOW) {
            self.soft_shadow(surface, to_light, light_distance)
        } else {
            1.0
        };
        let ao = if self.has(FLAG_AMBIENT_OCCLUSION) {
            self.ambient_occlusion(hit.point, normal)
        } else {
            1.0
        };

        if !self.has(FLAG_BLINN_PHONG) {
            return base * ao * shadow;
        }

        let diffuse = normal.dot(to_light).max(0.0) * self.diffuse;
        let half = (to_light - dir).normalize_or_zero();
        let specular = normal.dot(half).max(0.0).powf(self.shininess) * self.specular;
        base * self.ambient * ao
            + self.light_color * self.light_power * shadow * (base * diffuse + Vec3::splat(specular))
    }
}

fn xyz(v: [f32; 4]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

/// Entry and exit distances of a ray against a sphere at the origin.
fn sphere_span(origin: Vec3, dir: Vec3, radius: f32) -> Option<(f32, f32)> {
    let b = origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let exit = -b + root;
    if exit < 0.0 {
        return None;
    }
    Some((-b - root, exit))
}

fn hash(p: Vec3) -> f32 {
    let h = (p.dot(Vec3::new(127.1, 311.7, 74.7))).sin() * 43_758.547;
    h - h.floor()
}

/// Trilinear value noise in `[0, 1)`.
fn value_noise(p: Vec3) -> f32 {
    let cell = p.floor();
    let f = p - cell;
    let u = f * f * (Vec3::splat(3.0) - 2.0 * f);
    let corner = |x: f32, y: f32, z: f32| hash(cell + Vec3::new(x, y, z));

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let x00 = lerp(corner(0.0, 0.0, 0.0), corner(1.0, 0.0, 0.0), u.x);
    let x10 = lerp(corner(0.0, 1.0, 0.0), corner(1.0, 1.0, 0.0), u.x);
    let x01 = lerp(corner(0.0, 0.0, 1.0), corner(1.0, 0.0, 1.0), u.x);
    let x11 = lerp(corner(0.0, 1.0, 1.0), corner(1.0, 1.0, 1.0), u.x);
    lerp(lerp(x00, x10, u.y), lerp(x01, x11, u.y), u.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::FlyCamera,
        gradient::GradientEngine,
        settings::{BackgroundKind, Effects, RenderSettings},
    };

    fn quiet_settings() -> RenderSettings {
        RenderSettings {
            max_iterations: 8,
            step_limit: 128,
            effects: Effects {
                show_light: false,
                noise: false,
                blinn_phong: false,
                soft_shadow: false,
                bloom: false,
                ambient_occlusion: false,
                normal_visualization: false,
            },
            ..RenderSettings::default()
        }
    }

    #[test]
    fn distance_estimate_is_positive_far_away() {
        let sample = mandelbulb(Vec3::new(0.0, 0.0, 5.0), 8.0, 4.0, 25);

        // escapes before the first iteration
        assert_eq!(sample.iterations, 0);
        assert!(sample.distance > 1.0, "distance={}", sample.distance);
    }

    #[test]
    fn origin_is_inside_the_bulb() {
        let sample = mandelbulb(Vec3::ZERO, 8.0, 4.0, 25);

        assert_eq!(sample.iterations, 25);
        assert!(sample.distance <= 0.0);
        assert_eq!(sample.trap, 0.0);
    }

    #[test]
    fn sphere_span_handles_hits_and_misses() {
        let (enter, exit) = sphere_span(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, 2.0).unwrap();
        assert!((enter - 3.0).abs() < 1e-6);
        assert!((exit - 7.0).abs() < 1e-6);

        assert!(sphere_span(Vec3::new(0.0, 3.0, 5.0), Vec3::NEG_Z, 2.0).is_none());
        assert!(sphere_span(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, 2.0).is_none());
    }

    #[test]
    fn value_noise_stays_in_unit_range() {
        for i in 0..200 {
            let p = Vec3::new(i as f32 * 0.37, -(i as f32) * 0.11, i as f32 * 1.3);
            let n = value_noise(p);
            assert!((0.0..1.0).contains(&n), "noise={n}");
        }
    }

    #[test]
    fn looking_away_shows_solid_background() {
        let mut settings = quiet_settings();
        settings.background_color = [0.0, 1.0, 0.0];
        let mut camera = FlyCamera::default();
        camera.apply_look_delta(360.0, 0.0, true); // turn around, facing +Z
        let uniforms = FrameUniforms::new(&settings, &camera, (8, 6), 0.0);
        let lut = GradientEngine::new().generate_texture_bytes();

        let pixels = render(&uniforms, &lut);

        assert_eq!(pixels.len(), 8 * 6 * 4);
        assert!(pixels.chunks_exact(4).all(|px| px == [0, 255, 0, 255]));
    }

    #[test]
    fn gradient_background_samples_lut_by_elevation() {
        let mut settings = quiet_settings();
        settings.background = BackgroundKind::Gradient;
        let mut camera = FlyCamera::default();
        camera.apply_look_delta(360.0, 0.0, true);
        let uniforms = FrameUniforms::new(&settings, &camera, (1, 3), 0.0);
        let lut = GradientEngine::new().generate_texture_bytes();

        let pixels = render(&uniforms, &lut);

        // default ramp is black -> white, so upper rows are brighter
        assert!(pixels[0] > pixels[4]);
        assert!(pixels[4] > pixels[8]);
    }

    #[test]
    fn fractal_in_front_of_camera_is_hit() {
        let settings = quiet_settings();
        let camera = FlyCamera::default();
        let uniforms = FrameUniforms::new(&settings, &camera, (3, 3), 0.0);
        let lut = GradientEngine::new().generate_texture_bytes();
        let scene = Scene::new(&uniforms, &lut);

        let march = scene.march(camera.front());

        let hit = march.hit.expect("center ray should reach the bulb");
        assert!(hit.t > 0.5 && hit.t < 2.5, "t={}", hit.t);
        assert!(march.steps <= 128);
    }

    #[test]
    fn normal_visualization_maps_normals_to_unit_cube() {
        let mut settings = quiet_settings();
        settings.effects.normal_visualization = true;
        let uniforms = FrameUniforms::new(&settings, &FlyCamera::default(), (1, 1), 0.0);
        let lut = GradientEngine::new().generate_texture_bytes();

        let pixels = render(&uniforms, &lut);

        // the surface faces the camera, so the normal's z component is positive
        assert!(pixels[2] > 128, "pixel={:?}", &pixels[..4]);
    }
}
