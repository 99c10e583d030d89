//! eframe application: panels, viewport input and per-frame rendering.

use std::time::Instant;

use eframe::{egui, App};
use egui::{
    pos2, Align2, Color32, ColorImage, CursorGrab, FontId, Key, Rect, Sense, TextureHandle,
    TextureOptions, ViewportCommand,
};

use crate::{
    camera::{FlyCamera, MoveKeys},
    gradient::{editor::gradient_editor_ui, GradientEngine, LUT_BYTES},
    project::{self, Project},
    render::{self, RenderBackend},
    settings::{BackgroundKind, ColoringMethod, FrameStats, RenderSettings, ViewState},
    uniforms::FrameUniforms,
};

#[cfg(feature = "gpu")]
use crate::render::GpuRenderer;

/// Scroll points per degree of field of view.
const SCROLL_PER_DEGREE: f32 = 50.0;

/// Cursor grab while flying. winit only locks on macOS and Wayland; elsewhere
/// the cursor is confined and warped back to the viewport center each frame.
fn look_grab() -> CursorGrab {
    let wayland = cfg!(target_os = "linux") && std::env::var_os("WAYLAND_DISPLAY").is_some();
    if cfg!(target_os = "macos") || wayland {
        CursorGrab::Locked
    } else {
        CursorGrab::Confined
    }
}

/// Raw mouse motion of this frame. Unlike pointer deltas it keeps arriving
/// while the cursor is pinned against the window edge.
fn look_delta(events: &[egui::Event]) -> egui::Vec2 {
    events
        .iter()
        .filter_map(|event| match event {
            egui::Event::MouseMoved(delta) => Some(*delta),
            _ => None,
        })
        .fold(egui::Vec2::ZERO, |sum, delta| sum + delta)
}

pub struct ClovenApp {
    name: String,
    settings: RenderSettings,
    camera: FlyCamera,
    gradient: GradientEngine,
    backend: RenderBackend,
    view: ViewState,
    stats: FrameStats,
    lut: [u8; LUT_BYTES],
    tex: Option<TextureHandle>,
    render_size: (u32, u32),
    look_mode: bool,
    look_grab: CursorGrab,
    started: Instant,
    last_update: Instant,
    #[cfg(feature = "gpu")]
    gpu: Option<GpuRenderer>,
}

impl ClovenApp {
    pub fn new(project: Project) -> Self {
        let mut app = Self {
            name: String::new(),
            settings: RenderSettings::default(),
            camera: FlyCamera::default(),
            gradient: GradientEngine::new(),
            backend: RenderBackend::default(),
            view: ViewState::default(),
            stats: FrameStats::default(),
            lut: [0; LUT_BYTES],
            tex: None,
            render_size: (0, 0),
            look_mode: false,
            look_grab: CursorGrab::None,
            started: Instant::now(),
            last_update: Instant::now(),
            #[cfg(feature = "gpu")]
            gpu: None,
        };
        app.apply_project(project);
        app
    }

    fn apply_project(&mut self, project: Project) {
        self.name = project.name;
        self.settings = project.settings;
        self.settings.sanitize();
        self.camera = FlyCamera::from_pose(&project.camera);
        self.gradient = GradientEngine::from_stops(project.gradient);
        self.backend = project.backend;
    }

    fn to_project(&self) -> Project {
        Project {
            name: self.name.clone(),
            backend: self.backend,
            camera: self.camera.pose(),
            gradient: self.gradient.to_stops(),
            settings: self.settings.clone(),
        }
    }

    #[cfg(feature = "gpu")]
    fn ensure_gpu(&mut self) {
        if self.backend != RenderBackend::Gpu || self.gpu.is_some() {
            return;
        }
        match GpuRenderer::new() {
            Ok(renderer) => self.gpu = Some(renderer),
            Err(err) => {
                log::warn!("GPU init failed: {err}. Falling back to CPU.");
                self.backend = RenderBackend::Cpu;
            }
        }
    }

    fn set_look_mode(&mut self, ctx: &egui::Context, enabled: bool) {
        if self.look_mode == enabled {
            return;
        }
        self.look_mode = enabled;
        self.look_grab = if enabled { look_grab() } else { CursorGrab::None };
        ctx.send_viewport_cmd(ViewportCommand::CursorGrab(self.look_grab));
        ctx.send_viewport_cmd(ViewportCommand::CursorVisible(!enabled));
        log::debug!("look mode {}", if enabled { "on" } else { "off" });
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let typing = ctx.wants_keyboard_input();
        let (toggle_gui, toggle_gradient, escape) = ctx.input(|i| {
            (
                i.key_pressed(Key::F1),
                !typing && i.key_pressed(Key::G),
                i.key_pressed(Key::Escape),
            )
        });
        if toggle_gui {
            self.view.show_gui = !self.view.show_gui;
        }
        if toggle_gradient {
            self.view.show_gradient_editor = !self.view.show_gradient_editor;
        }
        if escape {
            self.set_look_mode(ctx, false);
        }
    }

    fn fly(&mut self, ctx: &egui::Context, dt: f32, viewport: Rect, viewport_hovered: bool) {
        let (keys, look, scroll) = ctx.input(|i| {
            let keys = MoveKeys {
                forward: i.key_down(Key::W),
                back: i.key_down(Key::S),
                left: i.key_down(Key::A),
                right: i.key_down(Key::D),
                up: i.key_down(Key::Space),
                down: i.key_down(Key::C),
                slow: i.modifiers.shift,
                fast: i.modifiers.ctrl,
            };
            (keys, look_delta(&i.raw.events), i.raw_scroll_delta.y)
        });

        if self.look_mode {
            if keys.any_direction() {
                self.camera.apply_translation(keys, dt);
            }
            if look != egui::Vec2::ZERO {
                // screen y grows downwards, pitch grows upwards
                self.camera.apply_look_delta(look.x, -look.y, true);
            }
            if matches!(self.look_grab, CursorGrab::Confined) {
                ctx.send_viewport_cmd(ViewportCommand::CursorPosition(viewport.center()));
            }
        }
        if (self.look_mode || viewport_hovered) && scroll != 0.0 {
            self.camera.apply_zoom_delta(scroll / SCROLL_PER_DEGREE);
        }
    }

    /// A closed editor never sees the release of a drag it started.
    fn end_hidden_editor_gesture(&mut self) {
        if !self.view.show_gradient_editor {
            self.gradient.cancel_gesture();
        }
    }

    fn render_viewport(&mut self, ui: &mut egui::Ui, rect: Rect) {
        if self.gradient.take_dirty() {
            self.lut = self.gradient.generate_texture_bytes();
        }

        let scale = match self.backend {
            RenderBackend::Cpu => self.settings.preview_scale,
            #[cfg(feature = "gpu")]
            RenderBackend::Gpu => 1.0,
        };
        let ppp = ui.ctx().pixels_per_point();
        let size = (
            (rect.width() * ppp * scale).max(1.0) as u32,
            (rect.height() * ppp * scale).max(1.0) as u32,
        );
        self.render_size = size;

        let time = self.started.elapsed().as_secs_f32();
        let uniforms = FrameUniforms::new(&self.settings, &self.camera, size, time);
        let pixels = render::render_frame(
            &uniforms,
            &self.lut,
            self.backend,
            #[cfg(feature = "gpu")]
            self.gpu.as_mut(),
        );

        let image = ColorImage::from_rgba_unmultiplied([size.0 as usize, size.1 as usize], &pixels);
        let tex = self.tex.get_or_insert_with(|| {
            ui.ctx()
                .load_texture("viewport", image.clone(), TextureOptions::LINEAR)
        });
        tex.set(image, TextureOptions::LINEAR);
        ui.painter().image(
            tex.id(),
            rect,
            Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
            Color32::WHITE,
        );

        if !self.look_mode {
            ui.painter().text(
                rect.left_bottom() + egui::vec2(8.0, -8.0),
                Align2::LEFT_BOTTOM,
                "Click to fly (WASD, Space/C, Shift/Ctrl), Esc to release, F1 panel, G gradient",
                FontId::proportional(13.0),
                Color32::from_white_alpha(200),
            );
        }
    }
}

impl App for ClovenApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let update_start = Instant::now();
        let dt = self.last_update.elapsed().as_secs_f32();
        self.last_update = update_start;

        self.handle_shortcuts(ctx);
        #[cfg(feature = "gpu")]
        self.ensure_gpu();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.heading("Cloven");
                ui.separator();
                if ui.button("Save project").clicked() {
                    project::save_project_dialog(&self.to_project());
                }
                if ui.button("Load project").clicked() {
                    if let Some(project) = project::open_project_dialog() {
                        self.apply_project(project);
                    }
                }
                ui.separator();
                ui.label("Backend:");
                let before = self.backend;
                ui.selectable_value(&mut self.backend, RenderBackend::Cpu, RenderBackend::Cpu.label());
                #[cfg(feature = "gpu")]
                ui.selectable_value(&mut self.backend, RenderBackend::Gpu, RenderBackend::Gpu.label());
                if self.backend != before {
                    log::info!("render backend set to {}", self.backend.label());
                }
                ui.separator();
                if ui.button("Reset camera").clicked() {
                    self.camera.reset();
                }
                ui.checkbox(&mut self.view.show_gradient_editor, "Gradient");
                ui.separator();
                ui.label(format!(
                    "{} fps | frame {:.1} ms | update {:.1} ms | {}x{}",
                    self.stats.fps,
                    self.stats.frame_ms,
                    self.stats.update_ms,
                    self.render_size.0,
                    self.render_size.1,
                ));
                #[cfg(feature = "gpu")]
                if let (RenderBackend::Gpu, Some(gpu)) = (self.backend, self.gpu.as_ref()) {
                    ui.weak(gpu.adapter_name());
                }
            });
        });

        if self.view.show_gui {
            egui::SidePanel::left("settings")
                .default_width(320.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.label("Name");
                            ui.text_edit_singleline(&mut self.name);
                        });
                        ui.separator();
                        settings_panel_ui(ui, &mut self.settings);
                        camera_panel_ui(ui, &mut self.camera);
                    });
                });
        }

        egui::Window::new("Gradient")
            .open(&mut self.view.show_gradient_editor)
            .resizable(false)
            .show(ctx, |ui| gradient_editor_ui(ui, &mut self.gradient));
        self.end_hidden_editor_gesture();

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let rect = ui.available_rect_before_wrap();
                let response = ui.allocate_rect(rect, Sense::click());
                if response.clicked() {
                    self.set_look_mode(ctx, true);
                }
                self.fly(ctx, dt, rect, response.hovered());
                self.render_viewport(ui, rect);
            });

        self.stats
            .record(dt as f64, update_start.elapsed().as_secs_f64());
        ctx.request_repaint();
    }
}

fn settings_panel_ui(ui: &mut egui::Ui, s: &mut RenderSettings) {
    ui.collapsing("Fractal", |ui| {
        ui.add(egui::Slider::new(&mut s.power, 1.0..=16.0).text("Power"));
        ui.add(egui::Slider::new(&mut s.max_iterations, 1..=256).text("Max iterations"));
        ui.add(egui::Slider::new(&mut s.escape_radius, 1.0..=16.0).text("Escape radius"));
        vec3_ui(ui, "Center", &mut s.fractal_center, 0.01);
    });

    ui.collapsing("Ray marching", |ui| {
        ui.add(egui::Slider::new(&mut s.step_limit, 1..=5000).text("Step limit"));
        ui.add(egui::Slider::new(&mut s.max_distance, 1.0..=200.0).text("Max distance"));
        ui.add(
            egui::Slider::new(&mut s.epsilon, 1e-6..=1e-2)
                .logarithmic(true)
                .text("Epsilon"),
        );
        ui.add(
            egui::Slider::new(&mut s.ray_hit_threshold, 1e-7..=1e-2)
                .logarithmic(true)
                .text("Hit threshold"),
        );
        ui.add(egui::Slider::new(&mut s.preview_scale, 0.05..=1.0).text("CPU preview scale"));
    });

    ui.collapsing("Color", |ui| {
        egui::ComboBox::from_label("Coloring")
            .selected_text(s.coloring_method.label())
            .show_ui(ui, |ui| {
                for method in ColoringMethod::ALL {
                    ui.selectable_value(&mut s.coloring_method, method, method.label());
                }
            });
        ui.horizontal(|ui| {
            ui.label("Background");
            for kind in [BackgroundKind::Solid, BackgroundKind::Gradient] {
                ui.selectable_value(&mut s.background, kind, kind.label());
            }
        });
        if s.background == BackgroundKind::Solid {
            color_ui(ui, "Background color", &mut s.background_color);
        }
        ui.add(egui::Slider::new(&mut s.noise_scale, 0.1..=50.0).text("Noise scale"));
        ui.add(egui::Slider::new(&mut s.noise_amplitude, 0.0..=2.0).text("Noise amplitude"));
    });

    ui.collapsing("Lighting", |ui| {
        vec3_ui(ui, "Light", &mut s.light_pos, 0.05);
        color_ui(ui, "Light color", &mut s.light_color);
        ui.add(egui::Slider::new(&mut s.light_power, 0.0..=4.0).text("Power"));
        ui.add(egui::Slider::new(&mut s.light_radius, 0.01..=1.0).text("Radius"));
        ui.add(egui::Slider::new(&mut s.ambient_strength, 0.0..=1.0).text("Ambient"));
        ui.add(egui::Slider::new(&mut s.diffuse_strength, 0.0..=2.0).text("Diffuse"));
        ui.add(egui::Slider::new(&mut s.specular_strength, 0.0..=2.0).text("Specular"));
        ui.add(egui::Slider::new(&mut s.specular_shininess, 1.0..=256.0).text("Shininess"));
    });

    ui.collapsing("Shadows", |ui| {
        ui.add(egui::Slider::new(&mut s.shadow_softness, 1.0..=128.0).text("Softness"));
        ui.add(egui::Slider::new(&mut s.shadow_min_distance, 0.001..=0.5).text("Min distance"));
        ui.add(egui::Slider::new(&mut s.shadow_min_step_size, 0.001..=0.1).text("Min step"));
        ui.add(egui::Slider::new(&mut s.shadow_max_step_size, 0.01..=1.0).text("Max step"));
        ui.add(egui::Slider::new(&mut s.shadow_max_iterations, 1..=512).text("Max iterations"));
    });

    ui.collapsing("Bloom", |ui| {
        ui.add(egui::Slider::new(&mut s.bloom_intensity, 0.0..=20.0).text("Intensity"));
        color_ui(ui, "Bloom color", &mut s.bloom_color);
    });

    ui.collapsing("Effects", |ui| {
        let e = &mut s.effects;
        ui.checkbox(&mut e.show_light, "Show light");
        ui.checkbox(&mut e.noise, "Noise");
        ui.checkbox(&mut e.blinn_phong, "Blinn-Phong");
        ui.checkbox(&mut e.soft_shadow, "Soft shadows");
        ui.checkbox(&mut e.ambient_occlusion, "Ambient occlusion");
        ui.checkbox(&mut e.bloom, "Bloom");
        ui.checkbox(&mut e.normal_visualization, "Normals");
    });

    // sliders allow min step > max step
    s.sanitize();
}

fn camera_panel_ui(ui: &mut egui::Ui, camera: &mut FlyCamera) {
    ui.collapsing("Camera", |ui| {
        let p = camera.position();
        ui.label(format!("Position {:.3} {:.3} {:.3}", p.x, p.y, p.z));
        ui.label(format!(
            "Yaw {:.1}°  Pitch {:.1}°  FOV {:.1}°",
            camera.yaw(),
            camera.pitch(),
            camera.fov()
        ));
        let mut speed = camera.speed();
        if ui
            .add(egui::Slider::new(&mut speed, 0.01..=5.0).logarithmic(true).text("Speed"))
            .changed()
        {
            camera.set_speed(speed);
        }
        let mut sensitivity = camera.sensitivity();
        if ui
            .add(egui::Slider::new(&mut sensitivity, 0.05..=2.0).text("Sensitivity"))
            .changed()
        {
            camera.set_sensitivity(sensitivity);
        }
        if ui.button("Reset").clicked() {
            camera.reset();
        }
    });
}

fn vec3_ui(ui: &mut egui::Ui, label: &str, v: &mut [f32; 3], speed: f64) {
    ui.horizontal(|ui| {
        ui.label(label);
        for c in v.iter_mut() {
            ui.add(egui::DragValue::new(c).speed(speed));
        }
    });
}

fn color_ui(ui: &mut egui::Ui, label: &str, rgb: &mut [f32; 3]) {
    ui.horizontal(|ui| {
        ui.color_edit_button_rgb(rgb);
        ui.label(label);
    });
}
