//! # Gamepad Sampler
//!
//! Polls a physical gamepad at a fixed cadence and turns its stick positions
//! into control vectors.
//!
//! ## Layout
//!
//! Snapshots use the standard gamepad layout:
//!
//! | Index | Axis | Index | Button |
//! |-------|------|-------|--------|
//! | 0 | Left stick X | 0-3 | Face buttons (S, E, W, N) |
//! | 1 | Left stick Y | 4-7 | Shoulders and triggers |
//! | 2 | Right stick X | 8 | Select / Share |
//! | 3 | Right stick Y | 9 | Start / Options |
//! | | | 10-11 | Stick clicks |
//! | | | 12-15 | D-Pad |
//! | | | 16 | Home / PS |
//!
//! ## Control Mapping
//!
//! The axis mapping is part of the contract with the steered device and is
//! applied after the deadzone, with every axis inverted:
//!
//! | Output | Source |
//! |--------|--------|
//! | `lx` | `-axes[1]` (left stick Y) |
//! | `ly` | `-axes[0]` (left stick X) |
//! | `rx` | `-axes[3]` (right stick Y) |
//! | `ry` | `-axes[2]` (right stick X) |

use tracing::{debug, info};

use super::InputSource;
use crate::control::{ControlVector, Deadzone};

/// Number of axes in a snapshot.
pub const AXIS_COUNT: usize = 4;
/// Number of buttons in a snapshot.
pub const BUTTON_COUNT: usize = 17;
/// Start / Options button index.
pub const BUTTON_START: usize = 9;

/// Raw state of one gamepad at one instant.
///
/// Axes are normalized to `-1.0..=1.0` by the provider; no deadzone has been
/// applied yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GamepadSnapshot {
    pub axes: [f32; AXIS_COUNT],
    pub buttons: [bool; BUTTON_COUNT],
}

impl GamepadSnapshot {
    /// Returns whether `index` is pressed. Unknown indices read as released.
    #[must_use]
    pub fn is_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }
}

/// Access to whichever gamepad is currently present.
///
/// `None` means there is no device right now. Providers recover on their own
/// when a device appears.
#[cfg_attr(test, mockall::automock)]
pub trait GamepadProvider: Send {
    fn poll(&mut self) -> Option<GamepadSnapshot>;
}

/// Receiver of fullscreen requests from the gamepad.
#[cfg_attr(test, mockall::automock)]
pub trait PresentationControl: Send {
    fn set_fullscreen(&mut self, fullscreen: bool);
}

/// Presentation sink for headless use: records requests in the log.
#[derive(Debug, Default)]
pub struct LoggingPresentation;

impl PresentationControl for LoggingPresentation {
    fn set_fullscreen(&mut self, fullscreen: bool) {
        info!("Fullscreen {}", if fullscreen { "requested" } else { "exit requested" });
    }
}

/// Press-edge detector that flips a fullscreen flag once per button press.
///
/// Holding the button does not repeat the toggle; it must be released first.
///
/// # Examples
///
/// ```
/// use teleop_link::input::gamepad::FullscreenToggle;
///
/// let mut toggle = FullscreenToggle::default();
/// assert_eq!(toggle.update(true), Some(true));   // press: enter
/// assert_eq!(toggle.update(true), None);         // held
/// assert_eq!(toggle.update(false), None);        // release
/// assert_eq!(toggle.update(true), Some(false));  // press: exit
/// ```
#[derive(Debug, Clone, Default)]
pub struct FullscreenToggle {
    fullscreen: bool,
    button_down: bool,
}

impl FullscreenToggle {
    /// Feeds the current button level; returns the new fullscreen state on a
    /// press edge.
    pub fn update(&mut self, pressed: bool) -> Option<bool> {
        if !pressed {
            self.button_down = false;
            return None;
        }
        if self.button_down {
            return None;
        }
        self.button_down = true;
        self.fullscreen = !self.fullscreen;
        Some(self.fullscreen)
    }

    /// Current fullscreen flag.
    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Clears both the flag and the held-button tracking.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Maps a raw snapshot to a control vector using the fixed axis permutation.
///
/// # Examples
///
/// ```
/// use teleop_link::control::{ControlVector, Deadzone};
/// use teleop_link::input::gamepad::{map_snapshot, GamepadSnapshot};
///
/// let mut snap = GamepadSnapshot::default();
/// snap.axes = [0.5, -1.0, 0.1, 0.3];
///
/// let v = map_snapshot(&snap, Deadzone::new(0.2)?);
/// assert_eq!(v, ControlVector::new(1.0, -0.5, -0.3, 0.0));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use]
pub fn map_snapshot(snapshot: &GamepadSnapshot, deadzone: Deadzone) -> ControlVector {
    let [a0, a1, a2, a3] = snapshot.axes.map(|a| deadzone.apply(a));
    ControlVector::new(-a1, -a0, -a3, -a2)
}

/// Polled gamepad input source.
pub struct GamepadSampler {
    provider: Box<dyn GamepadProvider>,
    presentation: Box<dyn PresentationControl>,
    deadzone: Deadzone,
    fullscreen_button: usize,
    toggle: FullscreenToggle,
    attached: bool,
    device_present: bool,
}

impl GamepadSampler {
    /// Creates a sampler over `provider`.
    ///
    /// # Arguments
    ///
    /// * `provider` - Gamepad access
    /// * `presentation` - Receiver of fullscreen toggles
    /// * `deadzone` - Applied to every raw axis
    /// * `fullscreen_button` - Button index that toggles fullscreen
    pub fn new(
        provider: Box<dyn GamepadProvider>,
        presentation: Box<dyn PresentationControl>,
        deadzone: Deadzone,
        fullscreen_button: usize,
    ) -> Self {
        Self {
            provider,
            presentation,
            deadzone,
            fullscreen_button,
            toggle: FullscreenToggle::default(),
            attached: false,
            device_present: false,
        }
    }

    /// The configured deadzone.
    #[must_use]
    pub fn deadzone(&self) -> Deadzone {
        self.deadzone
    }
}

impl InputSource for GamepadSampler {
    fn name(&self) -> &'static str {
        "gamepad"
    }

    fn attach(&mut self) {
        self.toggle.reset();
        self.attached = true;
    }

    fn sample(&mut self) -> Option<ControlVector> {
        if !self.attached {
            return None;
        }

        let Some(snapshot) = self.provider.poll() else {
            if self.device_present {
                info!("Gamepad disconnected");
                self.device_present = false;
            }
            return None;
        };
        if !self.device_present {
            info!("Gamepad available");
            self.device_present = true;
        }

        if let Some(fullscreen) = self.toggle.update(snapshot.is_pressed(self.fullscreen_button)) {
            debug!("Fullscreen button pressed, fullscreen = {}", fullscreen);
            self.presentation.set_fullscreen(fullscreen);
        }

        Some(map_snapshot(&snapshot, self.deadzone))
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn snapshot(axes: [f32; 4], start: bool) -> GamepadSnapshot {
        let mut buttons = [false; BUTTON_COUNT];
        buttons[BUTTON_START] = start;
        GamepadSnapshot { axes, buttons }
    }

    fn sampler_with(
        snapshots: Vec<Option<GamepadSnapshot>>,
        presentation: MockPresentationControl,
    ) -> GamepadSampler {
        let mut provider = MockGamepadProvider::new();
        let mut queue = snapshots.into_iter();
        provider.expect_poll().returning(move || queue.next().flatten());
        GamepadSampler::new(
            Box::new(provider),
            Box::new(presentation),
            Deadzone::new(0.2).unwrap(),
            BUTTON_START,
        )
    }

    #[test]
    fn test_axis_permutation_and_inversion() {
        let snap = snapshot([0.3, 0.4, 0.5, 0.6], false);
        let v = map_snapshot(&snap, Deadzone::NONE);
        assert_eq!(v, ControlVector::new(-0.4, -0.3, -0.6, -0.5));
    }

    #[test]
    fn test_deadzone_applied_before_inversion() {
        let snap = snapshot([-0.19, 0.19, -0.21, 0.21], false);
        let v = map_snapshot(&snap, Deadzone::new(0.2).unwrap());
        assert_eq!(v, ControlVector::new(0.0, 0.0, -0.21, 0.21));
        assert!(v.lx.is_sign_positive());
    }

    #[test]
    fn test_full_deflection() {
        let snap = snapshot([1.0, -1.0, -1.0, 1.0], false);
        let v = map_snapshot(&snap, Deadzone::new(0.2).unwrap());
        assert_eq!(v, ControlVector::new(1.0, -1.0, -1.0, 1.0));
    }

    #[test]
    fn test_not_attached_yields_nothing() {
        let mut sampler = sampler_with(vec![], MockPresentationControl::new());
        assert_eq!(sampler.sample(), None);
    }

    #[test]
    fn test_missing_device_is_not_an_error() {
        let mut sampler = sampler_with(
            vec![Some(snapshot([0.0, 0.5, 0.0, 0.0], false)), None, None],
            MockPresentationControl::new(),
        );
        sampler.attach();
        assert_eq!(sampler.sample(), Some(ControlVector::new(-0.5, 0.0, 0.0, 0.0)));
        assert_eq!(sampler.sample(), None);
        assert_eq!(sampler.sample(), None);
    }

    #[test]
    fn test_held_button_toggles_once() {
        let mut presentation = MockPresentationControl::new();
        presentation.expect_set_fullscreen().with(eq(true)).times(1).return_const(());

        let mut sampler = sampler_with(
            vec![
                Some(snapshot([0.0; 4], true)),
                Some(snapshot([0.0; 4], true)),
                Some(snapshot([0.0; 4], true)),
            ],
            presentation,
        );
        sampler.attach();
        for _ in 0..3 {
            assert_eq!(sampler.sample(), Some(ControlVector::NEUTRAL));
        }
    }

    #[test]
    fn test_press_release_press_toggles_twice() {
        let mut seq = Sequence::new();
        let mut presentation = MockPresentationControl::new();
        presentation
            .expect_set_fullscreen()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        presentation
            .expect_set_fullscreen()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut sampler = sampler_with(
            vec![
                Some(snapshot([0.0; 4], true)),
                Some(snapshot([0.0; 4], false)),
                Some(snapshot([0.0; 4], true)),
            ],
            presentation,
        );
        sampler.attach();
        for _ in 0..3 {
            sampler.sample();
        }
    }

    #[test]
    fn test_toggle_independent_of_axis_changes() {
        let mut presentation = MockPresentationControl::new();
        presentation.expect_set_fullscreen().times(1).return_const(());

        let mut sampler = sampler_with(
            vec![
                Some(snapshot([0.0, 0.9, 0.0, 0.0], true)),
                Some(snapshot([0.0, 0.5, 0.0, 0.0], true)),
            ],
            presentation,
        );
        sampler.attach();
        assert_eq!(sampler.sample(), Some(ControlVector::new(-0.9, 0.0, 0.0, 0.0)));
        assert_eq!(sampler.sample(), Some(ControlVector::new(-0.5, 0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_toggle_state_machine() {
        let mut toggle = FullscreenToggle::default();
        assert!(!toggle.is_fullscreen());
        assert_eq!(toggle.update(false), None);
        assert_eq!(toggle.update(true), Some(true));
        assert!(toggle.is_fullscreen());
        assert_eq!(toggle.update(true), None);
        assert_eq!(toggle.update(false), None);
        assert_eq!(toggle.update(true), Some(false));
        toggle.reset();
        assert!(!toggle.is_fullscreen());
    }

    #[test]
    fn test_unknown_button_index_reads_released() {
        let snap = snapshot([0.0; 4], true);
        assert!(snap.is_pressed(BUTTON_START));
        assert!(!snap.is_pressed(99));
    }
}
