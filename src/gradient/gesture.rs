//! Pointer gestures over the gradient preview strip.
//!
//! The editor widget translates raw input into [`PointerEvent`]s; everything
//! about which stop is picked, dragged, added or deleted lives here so it can
//! be exercised without a GUI.

use glam::Vec2;

use super::{GradientEngine, StopId};

/// Offset of a marker's top-left corner from its stop's x position on the strip.
const MARKER_OFFSET: Vec2 = Vec2::new(-5.0, -18.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Primary button went down on a marker; no movement yet.
    Selecting(StopId),
    Dragging(StopId),
}

impl Gesture {
    pub fn stop(&self) -> Option<StopId> {
        match self {
            Gesture::Idle => None,
            Gesture::Selecting(id) | Gesture::Dragging(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    PrimaryPressed(Vec2),
    Moved(Vec2),
    PrimaryReleased(Vec2),
    SecondaryPressed(Vec2),
}

/// Screen geometry of the preview strip and its stop markers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripLayout {
    pub origin: Vec2,
    pub size: Vec2,
    pub marker: Vec2,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            origin: Vec2::ZERO,
            size: Vec2::new(400.0, 40.0),
            marker: Vec2::new(11.0, 11.0),
        }
    }
}

impl StripLayout {
    pub fn at(origin: Vec2) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    /// Top-left and bottom-right corners of the marker for a stop at `position`.
    pub fn marker_rect(&self, position: f32) -> (Vec2, Vec2) {
        let min = Vec2::new(self.origin.x + position * self.size.x, self.origin.y) + MARKER_OFFSET;
        (min, min + self.marker)
    }

    pub fn hits_marker(&self, position: f32, point: Vec2) -> bool {
        let (min, max) = self.marker_rect(position);
        contains(min, max, point)
    }

    pub fn contains_strip(&self, point: Vec2) -> bool {
        contains(self.origin, self.origin + self.size, point)
    }

    /// Gradient position under `x`, not clamped.
    pub fn position_at(&self, x: f32) -> f32 {
        (x - self.origin.x) / self.size.x
    }
}

fn contains(min: Vec2, max: Vec2, point: Vec2) -> bool {
    point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
}

impl GradientEngine {
    /// First marker under `point`, in stored order.
    pub fn hit_test(&self, layout: &StripLayout, point: Vec2) -> Option<StopId> {
        self.stops()
            .find(|(_, stop)| layout.hits_marker(stop.position, point))
            .map(|(id, _)| id)
    }

    /// Picks the marker under `point`, making it the selection.
    pub fn select_stop(&mut self, layout: &StripLayout, point: Vec2) -> Option<StopId> {
        let id = self.hit_test(layout, point)?;
        self.select(id);
        Some(id)
    }

    pub fn handle_pointer(&mut self, layout: &StripLayout, event: PointerEvent) {
        match (self.gesture(), event) {
            (Gesture::Idle, PointerEvent::PrimaryPressed(point)) => {
                if let Some(id) = self.select_stop(layout, point) {
                    self.set_gesture(Gesture::Selecting(id));
                }
            }
            (Gesture::Selecting(id) | Gesture::Dragging(id), PointerEvent::Moved(point)) => {
                self.set_gesture(Gesture::Dragging(id));
                self.move_stop(id, layout.position_at(point.x));
            }
            (Gesture::Selecting(_) | Gesture::Dragging(_), PointerEvent::PrimaryReleased(_)) => {
                self.finish_drag();
            }
            (Gesture::Idle, PointerEvent::PrimaryReleased(point)) => {
                if layout.contains_strip(point) {
                    let position = layout.position_at(point.x).clamp(0.0, 1.0);
                    self.add_stop(position, self.interpolate(position));
                }
            }
            (Gesture::Idle, PointerEvent::SecondaryPressed(point)) => {
                if let Some(id) = self.hit_test(layout, point) {
                    self.delete_stop(id);
                }
            }
            _ => {}
        }
    }
}
