//! # Control Vector
//!
//! The canonical four-axis command sent to the device, and the deadzone that
//! is applied to raw axis readings before they become one.
//!
//! ## Axes
//!
//! | Field | Meaning | Range |
//! |-------|---------|-------|
//! | `lx` | Translation, first axis | -1.0 to 1.0 |
//! | `ly` | Translation, second axis | -1.0 to 1.0 |
//! | `rx` | Rotation, first axis | -1.0 to 1.0 |
//! | `ry` | Rotation, second axis | -1.0 to 1.0 |
//!
//! ## Wire Format
//!
//! A vector serializes to a flat JSON object with exactly these four keys:
//!
//! ```
//! use teleop_link::control::vector::ControlVector;
//!
//! let v = ControlVector::new(0.0, -1.0, 0.5, 0.0);
//! assert_eq!(v.to_json()?, r#"{"lx":0.0,"ly":-1.0,"rx":0.5,"ry":0.0}"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::de::Error;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Minimum axis value.
pub const AXIS_MIN: f32 = -1.0;
/// Maximum axis value.
pub const AXIS_MAX: f32 = 1.0;

/// Combined translation and rotation intent.
///
/// Immutable once constructed: every sample produces a new value. Equality is
/// exact and component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlVector {
    pub lx: f32,
    pub ly: f32,
    pub rx: f32,
    pub ry: f32,
}

impl ControlVector {
    /// All axes at rest.
    pub const NEUTRAL: ControlVector = ControlVector {
        lx: 0.0,
        ly: 0.0,
        rx: 0.0,
        ry: 0.0,
    };

    /// Creates a vector, clamping every axis to `[-1, 1]`.
    ///
    /// NaN becomes `0.0` and negative zero is stored as positive zero, so two
    /// vectors describing the same stick position always compare equal and
    /// serialize identically.
    ///
    /// # Examples
    ///
    /// ```
    /// use teleop_link::control::vector::ControlVector;
    ///
    /// let v = ControlVector::new(1.7, -0.0, f32::NAN, -3.0);
    /// assert_eq!(v, ControlVector::new(1.0, 0.0, 0.0, -1.0));
    /// assert!(v.ly.is_sign_positive());
    /// ```
    #[must_use]
    pub fn new(lx: f32, ly: f32, rx: f32, ry: f32) -> Self {
        Self {
            lx: canonical_axis(lx),
            ly: canonical_axis(ly),
            rx: canonical_axis(rx),
            ry: canonical_axis(ry),
        }
    }

    /// Returns true when every axis is exactly zero.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    /// Serializes the vector to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[inline]
fn canonical_axis(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    // Adding positive zero turns -0.0 into 0.0 and leaves everything else alone.
    value.clamp(AXIS_MIN, AXIS_MAX) + 0.0
}

/// Threshold below which an axis magnitude is forced to exactly zero.
///
/// Values at or above the threshold pass through unscaled.
///
/// # Examples
///
/// ```
/// use teleop_link::control::vector::Deadzone;
///
/// let dz = Deadzone::new(0.2)?;
/// assert_eq!(dz.apply(0.19), 0.0);
/// assert_eq!(dz.apply(-0.2), -0.2);
/// assert_eq!(dz.apply(dz.apply(0.5)), 0.5);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzone(f32);

impl Deadzone {
    /// No deadzone: every value passes unchanged.
    pub const NONE: Deadzone = Deadzone(0.0);

    /// Creates a deadzone.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` unless `threshold` is in `[0, 1)`.
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&threshold) {
            return Err(LinkError::Config(toml::de::Error::custom(format!(
                "deadzone {} must be in [0.0, 1.0)",
                threshold
            ))));
        }
        Ok(Self(threshold))
    }

    /// Returns the threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.0
    }

    /// Returns `0.0` if `|value| < threshold`, otherwise `value`.
    #[must_use]
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        if value.abs() < self.0 {
            0.0
        } else {
            value
        }
    }

    /// Applies the deadzone to each axis independently.
    #[must_use]
    pub fn apply_vector(&self, v: ControlVector) -> ControlVector {
        ControlVector::new(
            self.apply(v.lx),
            self.apply(v.ly),
            self.apply(v.rx),
            self.apply(v.ry),
        )
    }
}

impl Default for Deadzone {
    fn default() -> Self {
        Self::NONE
    }
}
