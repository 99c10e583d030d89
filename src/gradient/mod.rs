//! Multi-stop color gradient: editing, interpolation and lookup-texture
//! synthesis for the fractal shader.

pub mod editor;
pub mod gesture;

use std::{borrow::Cow, cmp::Ordering};

use serde::{Deserialize, Serialize};

pub use gesture::{Gesture, PointerEvent, StripLayout};

/// Number of texels in the lookup texture handed to the renderer.
pub const LUT_SIZE: usize = 256;
/// Size in bytes of [`GradientEngine::generate_texture_bytes`] (RGB only).
pub const LUT_BYTES: usize = LUT_SIZE * 3;

pub type Rgba = [f32; 4];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f32,
    pub color: Rgba,
}

impl ColorStop {
    pub fn new(position: f32, color: Rgba) -> Self {
        Self { position, color }
    }
}

/// Stable handle for a stop. Survives re-sorting, never reused within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StopId(u64);

#[derive(Debug, Clone)]
struct Slot {
    id: StopId,
    stop: ColorStop,
}

#[derive(Debug, Clone)]
pub struct GradientEngine {
    slots: Vec<Slot>,
    selected: Option<StopId>,
    gesture: Gesture,
    next_id: u64,
    dirty: bool,
}

impl Default for GradientEngine {
    fn default() -> Self {
        let mut engine = Self {
            slots: Vec::new(),
            selected: None,
            gesture: Gesture::Idle,
            next_id: 0,
            dirty: true,
        };
        engine.reset_to_default();
        engine
    }
}

impl GradientEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an engine from persisted stops. An empty list yields the default ramp.
    pub fn from_stops<I>(stops: I) -> Self
    where
        I: IntoIterator<Item = ColorStop>,
    {
        let mut engine = Self::default();
        let mut slots: Vec<Slot> = stops
            .into_iter()
            .map(|stop| Slot {
                id: engine.allocate_id(),
                stop: ColorStop::new(stop.position.clamp(0.0, 1.0), stop.color),
            })
            .collect();
        if slots.is_empty() {
            log::warn!("gradient has no stops, using the default ramp");
            return engine;
        }
        sort_slots(&mut slots);
        engine.selected = slots.first().map(|slot| slot.id);
        engine.slots = slots;
        engine.dirty = true;
        engine
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Stops in their current stored order (unsorted while a drag is active).
    pub fn stops(&self) -> impl Iterator<Item = (StopId, &ColorStop)> + '_ {
        self.slots.iter().map(|slot| (slot.id, &slot.stop))
    }

    /// Value snapshot of the stops sorted by position, used for persistence.
    pub fn to_stops(&self) -> Vec<ColorStop> {
        self.sorted_slots().iter().map(|slot| slot.stop).collect()
    }

    pub fn stop(&self, id: StopId) -> Option<&ColorStop> {
        self.index_of(id).map(|idx| &self.slots[idx].stop)
    }

    pub fn selected(&self) -> Option<StopId> {
        self.selected
    }

    pub fn selected_stop(&self) -> Option<&ColorStop> {
        self.selected.and_then(|id| self.stop(id))
    }

    pub fn select(&mut self, id: StopId) -> bool {
        if self.index_of(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether the stops changed since the last call and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    // ------------------------- Sampling -------------------------

    pub fn interpolate(&self, position: f32) -> Rgba {
        let sorted = self.sorted_slots();
        let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
            return [0.0, 0.0, 0.0, 1.0];
        };
        if position <= first.stop.position {
            return first.stop.color;
        }
        if position >= last.stop.position {
            return last.stop.color;
        }
        for pair in sorted.windows(2) {
            let (lower, upper) = (&pair[0].stop, &pair[1].stop);
            if position >= lower.position && position <= upper.position {
                let span = upper.position - lower.position;
                if span <= f32::EPSILON {
                    return lower.color;
                }
                let t = (position - lower.position) / span;
                return lerp_rgba(lower.color, upper.color, t);
            }
        }
        last.stop.color
    }

    /// 256 RGB texels sampled evenly over `[0, 1]`; alpha is dropped.
    pub fn generate_texture_bytes(&self) -> [u8; LUT_BYTES] {
        let mut bytes = [0u8; LUT_BYTES];
        for (i, texel) in bytes.chunks_exact_mut(3).enumerate() {
            let color = self.interpolate(i as f32 / (LUT_SIZE - 1) as f32);
            texel[0] = channel_to_byte(color[0]);
            texel[1] = channel_to_byte(color[1]);
            texel[2] = channel_to_byte(color[2]);
        }
        bytes
    }

    // ------------------------- Editing -------------------------

    pub fn add_stop(&mut self, position: f32, color: Rgba) -> StopId {
        let id = self.allocate_id();
        self.slots.push(Slot {
            id,
            stop: ColorStop::new(position.clamp(0.0, 1.0), color),
        });
        sort_slots(&mut self.slots);
        self.selected = Some(id);
        self.dirty = true;
        log::debug!("added gradient stop at {position:.3}");
        id
    }

    /// Moves a stop. Storage is left unsorted while a drag is in progress.
    pub fn move_stop(&mut self, id: StopId, position: f32) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.slots[idx].stop.position = position.clamp(0.0, 1.0);
        if !matches!(self.gesture, Gesture::Dragging(_)) {
            sort_slots(&mut self.slots);
        }
        self.dirty = true;
        true
    }

    pub fn set_stop_color(&mut self, id: StopId, color: Rgba) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.slots[idx].stop.color = color;
        self.dirty = true;
        true
    }

    /// Removes a stop unless it is the last one. Selection moves to the first stop.
    pub fn delete_stop(&mut self, id: StopId) -> bool {
        if self.slots.len() <= 1 {
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.slots.remove(idx);
        self.selected = self.slots.first().map(|slot| slot.id);
        if self.gesture.stop() == Some(id) {
            self.gesture = Gesture::Idle;
        }
        self.dirty = true;
        log::debug!("deleted gradient stop, {} remaining", self.slots.len());
        true
    }

    pub fn reset_to_default(&mut self) {
        let ramp = [
            ColorStop::new(0.0, [0.0, 0.0, 0.0, 1.0]),
            ColorStop::new(0.5, [0.5, 0.5, 0.5, 1.0]),
            ColorStop::new(1.0, [1.0, 1.0, 1.0, 1.0]),
        ];
        self.slots = ramp
            .into_iter()
            .map(|stop| Slot {
                id: self.allocate_id(),
                stop,
            })
            .collect();
        self.selected = Some(self.slots[1].id);
        self.gesture = Gesture::Idle;
        self.dirty = true;
    }

    pub fn randomize(&mut self) {
        self.randomize_with(&mut fastrand::Rng::new());
    }

    /// Replaces every stop with a random position and opaque color, keeping the count.
    pub fn randomize_with(&mut self, rng: &mut fastrand::Rng) {
        for slot in &mut self.slots {
            slot.stop = ColorStop::new(rng.f32(), [rng.f32(), rng.f32(), rng.f32(), 1.0]);
        }
        sort_slots(&mut self.slots);
        self.selected = self.slots.first().map(|slot| slot.id);
        self.gesture = Gesture::Idle;
        self.dirty = true;
    }

    /// Mirrors every stop around the middle of the ramp.
    pub fn flip(&mut self) {
        for slot in &mut self.slots {
            slot.stop.position = 1.0 - slot.stop.position;
        }
        sort_slots(&mut self.slots);
        self.dirty = true;
    }

    /// Shifts colors one stop to the right, wrapping the last color to the front.
    pub fn cycle_colors(&mut self) {
        if self.slots.len() < 2 {
            return;
        }
        let mut colors: Vec<Rgba> = self.slots.iter().map(|slot| slot.stop.color).collect();
        colors.rotate_right(1);
        for (slot, color) in self.slots.iter_mut().zip(colors) {
            slot.stop.color = color;
        }
        self.dirty = true;
    }

    // ------------------------- Internals -------------------------

    fn allocate_id(&mut self) -> StopId {
        let id = StopId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: StopId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    fn sorted_slots(&self) -> Cow<'_, [Slot]> {
        let sorted = self
            .slots
            .windows(2)
            .all(|pair| pair[0].stop.position <= pair[1].stop.position);
        if sorted {
            Cow::Borrowed(&self.slots)
        } else {
            let mut scratch = self.slots.clone();
            sort_slots(&mut scratch);
            Cow::Owned(scratch)
        }
    }

    pub(crate) fn set_gesture(&mut self, gesture: Gesture) {
        self.gesture = gesture;
    }

    pub(crate) fn finish_drag(&mut self) {
        self.gesture = Gesture::Idle;
        sort_slots(&mut self.slots);
    }

    /// Ends any gesture whose release will never arrive, e.g. when the editor
    /// is hidden mid-drag. The dragged stop keeps its last position.
    pub fn cancel_gesture(&mut self) {
        if self.gesture != Gesture::Idle {
            log::debug!("cancelled gradient gesture {:?}", self.gesture);
            self.finish_drag();
        }
    }
}

fn sort_slots(slots: &mut [Slot]) {
    slots.sort_by(|a, b| {
        a.stop
            .position
            .partial_cmp(&b.stop.position)
            .unwrap_or(Ordering::Equal)
    });
}

fn lerp_rgba(a: Rgba, b: Rgba, t: f32) -> Rgba {
    let s = 1.0 - t;
    [
        a[0] * s + b[0] * t,
        a[1] * s + b[1] * t,
        a[2] * s + b[2] * t,
        a[3] * s + b[3] * t,
    ]
}

fn channel_to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn assert_rgba_eq(actual: Rgba, expected: Rgba) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!(
                (a - e).abs() <= EPSILON,
                "actual={actual:?} expected={expected:?}"
            );
        }
    }

    fn two_stop() -> GradientEngine {
        GradientEngine::from_stops([
            ColorStop::new(0.2, [1.0, 0.0, 0.0, 1.0]),
            ColorStop::new(0.8, [0.0, 0.0, 1.0, 0.0]),
        ])
    }

    #[test]
    fn default_ramp_is_black_gray_white_with_middle_selected() {
        let engine = GradientEngine::new();
        let stops = engine.to_stops();

        assert_eq!(stops.len(), 3);
        assert_eq!(stops[0].position, 0.0);
        assert_eq!(stops[1].position, 0.5);
        assert_eq!(stops[2].position, 1.0);
        assert_eq!(engine.selected_stop(), Some(&stops[1]));
    }

    #[test]
    fn quarter_of_default_ramp_is_between_black_and_gray() {
        let engine = GradientEngine::new();

        assert_rgba_eq(engine.interpolate(0.25), [0.25, 0.25, 0.25, 1.0]);
    }

    #[test]
    fn positions_outside_range_clamp_to_boundary_colors() {
        let engine = two_stop();

        assert_eq!(engine.interpolate(0.0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(engine.interpolate(-3.0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(engine.interpolate(0.95), [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(engine.interpolate(12.0), [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn exact_stop_positions_return_stop_colors() {
        let engine = GradientEngine::from_stops([
            ColorStop::new(0.0, [0.1, 0.2, 0.3, 1.0]),
            ColorStop::new(0.3, [0.9, 0.8, 0.7, 0.5]),
            ColorStop::new(1.0, [0.4, 0.4, 0.4, 1.0]),
        ]);

        assert_eq!(engine.interpolate(0.3), [0.9, 0.8, 0.7, 0.5]);
        assert_eq!(engine.interpolate(1.0), [0.4, 0.4, 0.4, 1.0]);
    }

    #[test]
    fn interpolation_lerps_every_channel_including_alpha() {
        let engine = two_stop();

        assert_rgba_eq(engine.interpolate(0.5), [0.5, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn coincident_stops_do_not_divide_by_zero() {
        let engine = GradientEngine::from_stops([
            ColorStop::new(0.5, [1.0, 0.0, 0.0, 1.0]),
            ColorStop::new(0.5, [0.0, 1.0, 0.0, 1.0]),
        ]);

        let color = engine.interpolate(0.5);
        assert!(color.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn texture_bytes_are_rgb_rounded_and_fixed_size() {
        let engine = GradientEngine::new();
        let bytes = engine.generate_texture_bytes();

        assert_eq!(bytes.len(), 768);
        assert_eq!(&bytes[0..3], &[0, 0, 0]);
        assert_eq!(&bytes[765..768], &[255, 255, 255]);
        // texel 128 samples 128/255 ≈ 0.50196 -> 128
        assert_eq!(&bytes[384..387], &[128, 128, 128]);

        let single = GradientEngine::from_stops([ColorStop::new(0.4, [0.2, 0.4, 0.6, 0.0])]);
        let bytes = single.generate_texture_bytes();
        assert_eq!(bytes.len(), LUT_BYTES);
        assert!(bytes.chunks_exact(3).all(|texel| texel == [51, 102, 153]));
    }

    #[test]
    fn add_stop_sorts_and_selects_new_stop() {
        let mut engine = GradientEngine::new();
        let id = engine.add_stop(0.25, [1.0, 0.0, 0.0, 1.0]);

        assert_eq!(engine.len(), 4);
        assert_eq!(engine.selected(), Some(id));
        let positions: Vec<f32> = engine.stops().map(|(_, s)| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn add_stop_clamps_position() {
        let mut engine = GradientEngine::new();
        let id = engine.add_stop(1.7, [1.0; 4]);

        assert_eq!(engine.stop(id).map(|s| s.position), Some(1.0));
    }

    #[test]
    fn selection_follows_identity_across_sorts() {
        let mut engine = GradientEngine::new();
        let id = engine.add_stop(0.1, [0.3, 0.3, 0.9, 1.0]);

        assert!(engine.move_stop(id, 0.9));
        assert_eq!(engine.selected(), Some(id));
        assert_eq!(engine.selected_stop().map(|s| s.color), Some([0.3, 0.3, 0.9, 1.0]));
        let positions: Vec<f32> = engine.stops().map(|(_, s)| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.5, 0.9, 1.0]);
    }

    #[test]
    fn move_stop_clamps_to_unit_range() {
        let mut engine = GradientEngine::new();
        let id = engine.selected().unwrap();

        engine.move_stop(id, -0.5);
        assert_eq!(engine.stop(id).map(|s| s.position), Some(0.0));
        engine.move_stop(id, 4.0);
        assert_eq!(engine.stop(id).map(|s| s.position), Some(1.0));
    }

    #[test]
    fn deleting_last_stop_is_refused() {
        let mut engine = GradientEngine::from_stops([ColorStop::new(0.5, [1.0; 4])]);
        let id = engine.selected().unwrap();

        assert!(!engine.delete_stop(id));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn delete_reassigns_selection_to_first_stop() {
        let mut engine = GradientEngine::new();
        let middle = engine.selected().unwrap();

        assert!(engine.delete_stop(middle));
        assert_eq!(engine.len(), 2);
        let (first, _) = engine.stops().next().unwrap();
        assert_eq!(engine.selected(), Some(first));
        assert!(engine.stop(middle).is_none());
        assert!(!engine.select(middle));
    }

    #[test]
    fn stop_count_never_drops_below_one() {
        let mut engine = GradientEngine::new();
        for _ in 0..10 {
            let (id, _) = engine.stops().next().unwrap();
            engine.delete_stop(id);
        }

        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn randomize_keeps_count_sorts_and_selects_first() {
        let mut engine = GradientEngine::new();
        engine.add_stop(0.3, [1.0; 4]);
        engine.add_stop(0.6, [1.0; 4]);
        let mut rng = fastrand::Rng::with_seed(7);

        engine.randomize_with(&mut rng);

        assert_eq!(engine.len(), 5);
        let stops: Vec<ColorStop> = engine.stops().map(|(_, s)| *s).collect();
        assert!(stops.windows(2).all(|w| w[0].position <= w[1].position));
        assert!(stops
            .iter()
            .all(|s| (0.0..=1.0).contains(&s.position) && s.color[3] == 1.0));
        assert_eq!(engine.selected_stop(), Some(&stops[0]));
    }

    #[test]
    fn reset_restores_default_ramp() {
        let mut engine = two_stop();
        engine.reset_to_default();

        assert_eq!(engine.to_stops(), GradientEngine::new().to_stops());
        assert_eq!(engine.selected_stop().map(|s| s.position), Some(0.5));
    }

    #[test]
    fn empty_input_falls_back_to_default_ramp() {
        let engine = GradientEngine::from_stops(Vec::new());

        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn flip_mirrors_positions() {
        let mut engine = two_stop();
        engine.flip();
        let stops = engine.to_stops();

        assert!((stops[0].position - 0.2).abs() < EPSILON);
        assert_eq!(stops[0].color, [0.0, 0.0, 1.0, 0.0]);
        assert!((stops[1].position - 0.8).abs() < EPSILON);
    }

    #[test]
    fn cycle_colors_rotates_right() {
        let mut engine = GradientEngine::new();
        engine.cycle_colors();
        let colors: Vec<Rgba> = engine.to_stops().iter().map(|s| s.color).collect();

        assert_eq!(
            colors,
            vec![
                [1.0, 1.0, 1.0, 1.0],
                [0.0, 0.0, 0.0, 1.0],
                [0.5, 0.5, 0.5, 1.0],
            ]
        );
    }

    #[test]
    fn dirty_flag_tracks_edits() {
        let mut engine = GradientEngine::new();
        assert!(engine.take_dirty());
        assert!(!engine.take_dirty());

        let id = engine.selected().unwrap();
        engine.set_stop_color(id, [0.1, 0.2, 0.3, 1.0]);
        assert!(engine.is_dirty());
        assert!(engine.take_dirty());
        assert!(!engine.is_dirty());
    }
}
