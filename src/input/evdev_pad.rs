//! # Evdev Gamepad Provider
//!
//! Linux gamepad access through the evdev interface.
//!
//! ## Device Selection
//!
//! When no device path is configured, all `/dev/input/event*` nodes are
//! scanned in sorted order and the first one exposing `ABS_X`, `ABS_Y` and
//! `BTN_SOUTH` is used. If the device goes away, the provider reports no data
//! and rescans at most once per second.
//!
//! ## Reading State
//!
//! The provider never waits for events. Each poll reads the current absolute
//! axis and key state with ioctls, which suits a fixed-cadence sampler.
//!
//! | Snapshot | evdev source |
//! |----------|--------------|
//! | axes 0-3 | configured axis codes (default `ABS_X`, `ABS_Y`, `ABS_RX`, `ABS_RY`) |
//! | buttons 0-11, 16 | `BTN_*` keys in standard order |
//! | buttons 12-15 | `BTN_DPAD_*` keys or `ABS_HAT0X`/`ABS_HAT0Y` |

use evdev::{AbsoluteAxisType, Device, Key};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::gamepad::{GamepadProvider, GamepadSnapshot, AXIS_COUNT, BUTTON_COUNT};
use crate::error::{LinkError, Result};

/// Minimum time between device scans while no gamepad is open.
const RESCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Default evdev axis codes for LX, LY, RX, RY.
pub const DEFAULT_AXIS_CODES: [u16; AXIS_COUNT] = [
    AbsoluteAxisType::ABS_X.0,
    AbsoluteAxisType::ABS_Y.0,
    AbsoluteAxisType::ABS_RX.0,
    AbsoluteAxisType::ABS_RY.0,
];

/// evdev keys in standard gamepad button order.
const BUTTON_KEYS: [Key; BUTTON_COUNT] = [
    Key::BTN_SOUTH,
    Key::BTN_EAST,
    Key::BTN_WEST,
    Key::BTN_NORTH,
    Key::BTN_TL,
    Key::BTN_TR,
    Key::BTN_TL2,
    Key::BTN_TR2,
    Key::BTN_SELECT,
    Key::BTN_START,
    Key::BTN_THUMBL,
    Key::BTN_THUMBR,
    Key::BTN_DPAD_UP,
    Key::BTN_DPAD_DOWN,
    Key::BTN_DPAD_LEFT,
    Key::BTN_DPAD_RIGHT,
    Key::BTN_MODE,
];

const DPAD_UP: usize = 12;
const DPAD_DOWN: usize = 13;
const DPAD_LEFT: usize = 14;
const DPAD_RIGHT: usize = 15;

/// Scales a raw axis reading into `-1.0..=1.0` using the axis' reported range.
///
/// Returns `0.0` for a degenerate range.
///
/// # Examples
///
/// ```
/// use teleop_link::input::evdev_pad::normalize_axis;
///
/// assert_eq!(normalize_axis(0, 0, 255), -1.0);
/// assert_eq!(normalize_axis(255, 0, 255), 1.0);
/// assert_eq!(normalize_axis(0, -32768, 32767).abs() < 0.001, true);
/// ```
#[must_use]
pub fn normalize_axis(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = (maximum as f64) - (minimum as f64);
    let scaled = 2.0 * ((value as f64) - (minimum as f64)) / span - 1.0;
    (scaled as f32).clamp(-1.0, 1.0)
}

/// Folds hat axis values into the D-Pad buttons of a snapshot.
fn apply_hat(buttons: &mut [bool; BUTTON_COUNT], hat_x: i32, hat_y: i32) {
    buttons[DPAD_LEFT] |= hat_x < 0;
    buttons[DPAD_RIGHT] |= hat_x > 0;
    buttons[DPAD_UP] |= hat_y < 0;
    buttons[DPAD_DOWN] |= hat_y > 0;
}

/// Returns true if the device looks like a gamepad.
fn is_gamepad(device: &Device) -> bool {
    let has_sticks = device.supported_absolute_axes().map_or(false, |axes| {
        axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
    });
    let has_buttons = device
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::BTN_SOUTH));
    has_sticks && has_buttons
}

/// Gamepad provider backed by a Linux evdev node.
pub struct EvdevGamepad {
    device: Option<Device>,
    device_path: Option<PathBuf>,
    configured_path: Option<PathBuf>,
    axis_codes: [u16; AXIS_COUNT],
    last_scan: Option<Instant>,
}

impl std::fmt::Debug for EvdevGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevGamepad")
            .field("device_path", &self.device_path)
            .field("axis_codes", &self.axis_codes)
            .finish_non_exhaustive()
    }
}

impl EvdevGamepad {
    /// Creates a provider. No device is opened until the first poll.
    ///
    /// # Arguments
    ///
    /// * `configured_path` - Fixed `/dev/input/eventX` path, or `None` to scan
    /// * `axis_codes` - evdev codes read as LX, LY, RX, RY
    #[must_use]
    pub fn new(configured_path: Option<PathBuf>, axis_codes: [u16; AXIS_COUNT]) -> Self {
        Self {
            device: None,
            device_path: None,
            configured_path,
            axis_codes,
            last_scan: None,
        }
    }

    /// Path of the open device, if any.
    #[must_use]
    pub fn device_path(&self) -> Option<&Path> {
        self.device_path.as_deref()
    }

    /// Finds and opens the first gamepad under `/dev/input`.
    ///
    /// # Errors
    ///
    /// - `Controller`: `/dev/input` is missing or unreadable, or no gamepad
    ///   was found
    pub fn scan() -> Result<(Device, PathBuf)> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(LinkError::Controller(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| LinkError::Controller(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LinkError::Controller(format!("Failed to read directory entry: {}", e)))?;

        // Sorted so the same pad wins when several are plugged in
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("event"));
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    if is_gamepad(&device) {
                        return Ok((device, path));
                    }
                    debug!("Skipping non-gamepad input device: {}", path.display());
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(LinkError::Controller("no gamepad found".to_string()))
    }

    fn open_device(&self) -> Result<(Device, PathBuf)> {
        match &self.configured_path {
            Some(path) => {
                let device = Device::open(path).map_err(|e| {
                    LinkError::Controller(format!("Failed to open {}: {}", path.display(), e))
                })?;
                Ok((device, path.clone()))
            }
            None => Self::scan(),
        }
    }

    fn ensure_device(&mut self) -> bool {
        if self.device.is_some() {
            return true;
        }
        if let Some(last) = self.last_scan {
            if last.elapsed() < RESCAN_INTERVAL {
                return false;
            }
        }
        self.last_scan = Some(Instant::now());

        match self.open_device() {
            Ok((device, path)) => {
                info!(
                    "Opened gamepad {} at {}",
                    device.name().unwrap_or("(unnamed)"),
                    path.display()
                );
                self.device = Some(device);
                self.device_path = Some(path);
                true
            }
            Err(e) => {
                debug!("Gamepad not available: {}", e);
                false
            }
        }
    }

    fn read_snapshot(device: &Device, axis_codes: &[u16; AXIS_COUNT]) -> std::io::Result<GamepadSnapshot> {
        let abs = device.get_abs_state()?;
        let keys = device.get_key_state()?;

        let mut snapshot = GamepadSnapshot::default();
        for (slot, &code) in snapshot.axes.iter_mut().zip(axis_codes.iter()) {
            if let Some(info) = abs.get(code as usize) {
                *slot = normalize_axis(info.value, info.minimum, info.maximum);
            }
        }
        for (slot, key) in snapshot.buttons.iter_mut().zip(BUTTON_KEYS.iter()) {
            *slot = keys.contains(*key);
        }

        let hat = |axis: AbsoluteAxisType| abs.get(axis.0 as usize).map_or(0, |info| info.value);
        apply_hat(
            &mut snapshot.buttons,
            hat(AbsoluteAxisType::ABS_HAT0X),
            hat(AbsoluteAxisType::ABS_HAT0Y),
        );

        Ok(snapshot)
    }
}

impl GamepadProvider for EvdevGamepad {
    fn poll(&mut self) -> Option<GamepadSnapshot> {
        if !self.ensure_device() {
            return None;
        }
        let device = self.device.as_ref()?;

        match Self::read_snapshot(device, &self.axis_codes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Lost gamepad: {}", e);
                self.device = None;
                self.device_path = None;
                None
            }
        }
    }
}
