use eframe::egui;
use egui::{pos2, vec2, Color32, Rect, Sense, Shape, Stroke};
use glam::Vec2;

use super::{Gesture, GradientEngine, PointerEvent, Rgba, StripLayout};
use crate::project;

/// Gradient editor: preview strip with draggable stop markers and a color
/// picker for the selected stop.
///
/// Left click on the strip adds a stop, left drag on a marker moves it,
/// right click on a marker deletes it.
pub fn gradient_editor_ui(ui: &mut egui::Ui, engine: &mut GradientEngine) {
    ui.horizontal(|ui| {
        if ui.button("Reset").clicked() {
            engine.reset_to_default();
        }
        if ui.button("Randomize").clicked() {
            engine.randomize();
        }
        if ui.button("Flip").clicked() {
            engine.flip();
        }
        if ui.button("Cycle colors").clicked() {
            engine.cycle_colors();
        }
    });
    ui.horizontal(|ui| {
        if ui.button("Export .clvgrad").clicked() {
            project::save_gradient_dialog(&engine.to_stops());
        }
        if ui.button("Import .clvgrad").clicked() {
            if let Some(stops) = project::open_gradient_dialog() {
                *engine = GradientEngine::from_stops(stops);
            }
        }
    });
    ui.separator();

    let strip = StripLayout::default().size;
    let (space, _) = ui.allocate_exact_size(
        vec2(strip.x + 20.0, strip.y + 25.0),
        Sense::click_and_drag(),
    );
    let layout = StripLayout::at(Vec2::new(space.min.x + 10.0, space.min.y + 20.0));

    paint_strip(ui, engine, &layout);

    if let Some(id) = engine.selected() {
        if let Some(stop) = engine.stop(id).copied() {
            ui.label(format!("Stop at {:.3}", stop.position));
            let mut rgb = [stop.color[0], stop.color[1], stop.color[2]];
            if ui.color_edit_button_rgb(&mut rgb).changed() {
                engine.set_stop_color(id, with_rgb(stop.color, rgb));
            }
        }
    }
    ui.small(format!("{} stops", engine.len()));

    for event in pointer_events(ui) {
        engine.handle_pointer(&layout, event);
    }
    // release landed outside this window's frames
    if engine.gesture() != Gesture::Idle && !ui.input(|i| i.pointer.primary_down()) {
        engine.cancel_gesture();
    }
}

/// Replaces the color channels of `color`, keeping its alpha.
fn with_rgb(color: Rgba, rgb: [f32; 3]) -> Rgba {
    [rgb[0], rgb[1], rgb[2], color[3]]
}

fn pointer_events(ui: &egui::Ui) -> Vec<PointerEvent> {
    ui.input(|i| {
        let mut events = Vec::new();
        let Some(pos) = i.pointer.latest_pos() else {
            return events;
        };
        let point = Vec2::new(pos.x, pos.y);
        if i.pointer.primary_pressed() {
            events.push(PointerEvent::PrimaryPressed(point));
        }
        if i.pointer.primary_down() && i.pointer.delta() != egui::Vec2::ZERO {
            events.push(PointerEvent::Moved(point));
        }
        if i.pointer.primary_released() {
            events.push(PointerEvent::PrimaryReleased(point));
        }
        if i.pointer.secondary_pressed() {
            events.push(PointerEvent::SecondaryPressed(point));
        }
        events
    })
}

fn paint_strip(ui: &egui::Ui, engine: &GradientEngine, layout: &StripLayout) {
    let painter = ui.painter();
    let origin = pos2(layout.origin.x, layout.origin.y);

    for x in 0..layout.size.x as u32 {
        let x = x as f32;
        let color = engine.interpolate(x / layout.size.x);
        painter.rect_filled(
            Rect::from_min_size(origin + vec2(x, 0.0), vec2(1.0, layout.size.y)),
            0.0,
            to_color32(color),
        );
    }

    let selected = engine.selected();
    for (id, stop) in engine.stops() {
        let (min, max) = layout.marker_rect(stop.position);
        let marker = Rect::from_min_max(pos2(min.x, min.y), pos2(max.x, max.y));

        painter.add(Shape::closed_line(
            vec![
                marker.min + vec2(5.5, 17.0),
                marker.min + vec2(2.5, 11.0),
                marker.min + vec2(8.5, 11.0),
            ],
            Stroke::new(1.0, Color32::WHITE),
        ));
        painter.rect_stroke(marker, 0.0, Stroke::new(1.0, Color32::BLACK));
        painter.rect_stroke(marker.shrink(1.0), 0.0, Stroke::new(1.0, Color32::WHITE));
        painter.rect_filled(marker.shrink(2.0), 0.0, to_color32(stop.color));

        if selected == Some(id) {
            painter.rect_stroke(marker.expand(1.0), 0.0, Stroke::new(1.0, Color32::BLACK));
        }
    }

    painter.rect_stroke(
        Rect::from_min_size(origin, vec2(layout.size.x, layout.size.y)),
        0.0,
        Stroke::new(1.0, Color32::GRAY),
    );
}

fn to_color32(color: Rgba) -> Color32 {
    let [r, g, b, a] = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picker_edit_keeps_alpha_and_exact_channels() {
        let stop = [0.1, 0.2, 0.3, 0.4];

        let edited = with_rgb(stop, [0.123_456, 0.5, 0.999_9]);

        assert_eq!(edited, [0.123_456, 0.5, 0.999_9, 0.4]);
    }

    #[test]
    fn picker_edit_reaches_engine_unrounded() {
        let mut engine = GradientEngine::new();
        let id = engine.selected().unwrap();
        let stop = *engine.stop(id).unwrap();

        engine.set_stop_color(id, with_rgb(stop.color, [0.301, 0.602, 0.903]));

        assert_eq!(engine.stop(id).unwrap().color, [0.301, 0.602, 0.903, 1.0]);
    }
}
