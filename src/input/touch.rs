//! # Virtual Touch Joysticks
//!
//! Two on-screen joysticks, one for translation and one for rotation,
//! combined into a single control vector.
//!
//! The widgets themselves are drawn and hit-tested by the UI layer. That
//! layer forwards gestures through a [`VirtualJoystick`] handle:
//!
//! - `on_start()` when a finger lands (resets to origin)
//! - `on_move(angle, distance)` while dragging
//! - `on_end()` when the finger lifts (resets to origin)
//!
//! ## Offset Conversion
//!
//! Angles are in radians as reported by the widget; distance is the
//! normalized offset from the widget centre (`0.0..=1.0`). Below the
//! deadzone both axes are zero, otherwise:
//!
//! ```text
//! x =  sin(angle) * distance
//! y = -cos(angle) * distance
//! ```
//!
//! ## Usage
//!
//! ```
//! use teleop_link::control::{ControlVector, Deadzone};
//! use teleop_link::input::touch::{TouchJoystickPair, VirtualJoystick};
//! use teleop_link::input::InputSource;
//!
//! let translation = VirtualJoystick::new();
//! let rotation = VirtualJoystick::new();
//! let mut pair = TouchJoystickPair::new(translation.clone(), rotation.clone(), Deadzone::new(0.05)?);
//!
//! pair.attach();
//! translation.on_move(0.0, 1.0);
//! assert_eq!(pair.sample(), Some(ControlVector::new(0.0, -1.0, 0.0, 0.0)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use super::InputSource;
use crate::config::Config;
use crate::control::{ControlVector, Deadzone};
use crate::error::Result;

/// Widget radius in pixels; pixel distances are divided by this.
pub const JOYSTICK_RADIUS_PX: f32 = 50.0;

#[derive(Debug, Default)]
struct WidgetState {
    attached: bool,
    x: f32,
    y: f32,
    deadzone: f32,
}

impl WidgetState {
    fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
    }
}

/// Handle to one on-screen joystick.
///
/// Cheap to clone; all clones drive the same widget. Gestures arriving while
/// the widget is not attached to a session are ignored.
#[derive(Debug, Clone, Default)]
pub struct VirtualJoystick {
    state: Arc<Mutex<WidgetState>>,
}

impl VirtualJoystick {
    /// Creates a detached widget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        // Plain data: a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Finger down.
    pub fn on_start(&self) {
        let mut state = self.lock();
        if state.attached {
            state.reset();
        }
    }

    /// Drag to `angle` radians at normalized `distance` (clamped to `0..=1`).
    pub fn on_move(&self, angle: f32, distance: f32) {
        let mut state = self.lock();
        if !state.attached {
            return;
        }
        let distance = if distance.is_nan() { 0.0 } else { distance.clamp(0.0, 1.0) };
        if distance < state.deadzone {
            state.reset();
            return;
        }
        state.x = angle.sin() * distance;
        state.y = -angle.cos() * distance;
    }

    /// Drag reported in pixels from the widget centre.
    pub fn on_move_pixels(&self, angle: f32, distance_px: f32) {
        self.on_move(angle, distance_px / JOYSTICK_RADIUS_PX);
    }

    /// Finger up.
    pub fn on_end(&self) {
        let mut state = self.lock();
        if state.attached {
            state.reset();
        }
    }

    /// Current `(x, y)` offset.
    #[must_use]
    pub fn offset(&self) -> (f32, f32) {
        let state = self.lock();
        (state.x, state.y)
    }

    /// Whether the widget is bound to a session.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    fn bind(&self, deadzone: Deadzone) {
        let mut state = self.lock();
        state.attached = true;
        state.deadzone = deadzone.threshold();
        state.reset();
    }

    fn release(&self) {
        let mut state = self.lock();
        state.attached = false;
        state.reset();
    }
}

/// Translation and rotation joysticks sampled as one input source.
#[derive(Debug)]
pub struct TouchJoystickPair {
    translation: VirtualJoystick,
    rotation: VirtualJoystick,
    deadzone: Deadzone,
    attached: bool,
}

impl TouchJoystickPair {
    /// Creates the pair. The deadzone is measured in normalized widget units.
    #[must_use]
    pub fn new(translation: VirtualJoystick, rotation: VirtualJoystick, deadzone: Deadzone) -> Self {
        Self {
            translation,
            rotation,
            deadzone,
            attached: false,
        }
    }

    /// Creates the pair with fresh widgets and the `[touch]` deadzone.
    ///
    /// Returns the pair along with the translation and rotation handles the
    /// UI layer forwards gestures to.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` if the configured deadzone is out of range.
    pub fn from_config(config: &Config) -> Result<(Self, VirtualJoystick, VirtualJoystick)> {
        let translation = VirtualJoystick::new();
        let rotation = VirtualJoystick::new();
        let pair = Self::new(translation.clone(), rotation.clone(), config.touch_deadzone()?);
        Ok((pair, translation, rotation))
    }
}

impl InputSource for TouchJoystickPair {
    fn name(&self) -> &'static str {
        "touch"
    }

    fn attach(&mut self) {
        self.translation.bind(self.deadzone);
        self.rotation.bind(self.deadzone);
        self.attached = true;
    }

    fn sample(&mut self) -> Option<ControlVector> {
        if !self.attached {
            return None;
        }
        let (lx, ly) = self.translation.offset();
        let (rx, ry) = self.rotation.offset();
        Some(ControlVector::new(lx, ly, rx, ry))
    }

    fn detach(&mut self) {
        self.translation.release();
        self.rotation.release();
        self.attached = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn attached_pair(deadzone: f32) -> (TouchJoystickPair, VirtualJoystick, VirtualJoystick) {
        let translation = VirtualJoystick::new();
        let rotation = VirtualJoystick::new();
        let mut pair = TouchJoystickPair::new(
            translation.clone(),
            rotation.clone(),
            Deadzone::new(deadzone).unwrap(),
        );
        pair.attach();
        (pair, translation, rotation)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_angle_zero_points_screen_up_as_negative_y() {
        let (mut pair, translation, _) = attached_pair(0.05);
        translation.on_move(0.0, 1.0);
        assert_eq!(pair.sample(), Some(ControlVector::new(0.0, -1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_quarter_turn_maps_to_x() {
        let (_, translation, _) = attached_pair(0.05);
        translation.on_move(FRAC_PI_2, 0.5);
        let (x, y) = translation.offset();
        assert!(approx(x, 0.5));
        assert!(approx(y, 0.0));
    }

    #[test]
    fn test_half_turn_is_positive_y() {
        let (_, _, rotation) = attached_pair(0.05);
        rotation.on_move(PI, 0.8);
        let (x, y) = rotation.offset();
        assert!(approx(x, 0.0));
        assert!(approx(y, 0.8));
    }

    #[test]
    fn test_below_deadzone_collapses_both_axes() {
        let (_, translation, _) = attached_pair(0.05);
        translation.on_move(1.0, 0.6);
        translation.on_move(1.0, 0.04);
        assert_eq!(translation.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_from_config_uses_touch_deadzone() {
        let mut config = Config::default();
        config.touch.deadzone = 0.3;
        let (mut pair, translation, rotation) = TouchJoystickPair::from_config(&config).unwrap();
        pair.attach();

        translation.on_move(0.0, 0.25);
        rotation.on_move(0.0, 0.35);
        assert_eq!(pair.sample(), Some(ControlVector::new(0.0, 0.0, 0.0, -0.35)));
    }

    #[test]
    fn test_from_config_rejects_bad_deadzone() {
        let mut config = Config::default();
        config.touch.deadzone = 1.5;
        assert!(TouchJoystickPair::from_config(&config).is_err());
    }

    #[test]
    fn test_pixel_distance_normalized_by_radius() {
        let (_, translation, _) = attached_pair(0.05);
        // 2 px is 0.04 in widget units: inside the deadzone
        translation.on_move_pixels(FRAC_PI_2, 2.0);
        assert_eq!(translation.offset(), (0.0, 0.0));
        translation.on_move_pixels(FRAC_PI_2, 25.0);
        assert!(approx(translation.offset().0, 0.5));
    }

    #[test]
    fn test_distance_clamped_to_unit() {
        let (_, translation, _) = attached_pair(0.05);
        translation.on_move_pixels(FRAC_PI_2, 400.0);
        assert!(approx(translation.offset().0, 1.0));
    }

    #[test]
    fn test_start_and_end_reset_to_origin() {
        let (mut pair, translation, rotation) = attached_pair(0.05);
        translation.on_move(FRAC_PI_2, 1.0);
        rotation.on_move(FRAC_PI_2, 1.0);
        translation.on_end();
        rotation.on_start();
        assert_eq!(pair.sample(), Some(ControlVector::NEUTRAL));
    }

    #[test]
    fn test_widgets_combine_into_one_vector() {
        let (mut pair, translation, rotation) = attached_pair(0.05);
        translation.on_move(FRAC_PI_2, 1.0);
        rotation.on_move(PI, 0.5);
        let v = pair.sample().unwrap();
        assert!(approx(v.lx, 1.0));
        assert!(approx(v.ly, 0.0));
        assert!(approx(v.rx, 0.0));
        assert!(approx(v.ry, 0.5));
    }

    #[test]
    fn test_detached_pair_ignores_gestures() {
        let translation = VirtualJoystick::new();
        let rotation = VirtualJoystick::new();
        let mut pair = TouchJoystickPair::new(translation.clone(), rotation, Deadzone::NONE);

        translation.on_move(0.0, 1.0);
        assert!(!translation.is_attached());
        assert_eq!(translation.offset(), (0.0, 0.0));
        assert_eq!(pair.sample(), None);
    }

    #[test]
    fn test_detach_without_attach_is_safe() {
        let mut pair = TouchJoystickPair::new(VirtualJoystick::new(), VirtualJoystick::new(), Deadzone::NONE);
        pair.detach();
        pair.detach();
        assert_eq!(pair.sample(), None);
    }

    #[test]
    fn test_detach_releases_and_resets_widgets() {
        let (mut pair, translation, rotation) = attached_pair(0.05);
        translation.on_move(0.0, 1.0);
        pair.detach();
        assert!(!translation.is_attached());
        assert!(!rotation.is_attached());
        assert_eq!(translation.offset(), (0.0, 0.0));

        // Remount starts from the origin
        pair.attach();
        assert_eq!(pair.sample(), Some(ControlVector::NEUTRAL));
    }
}
