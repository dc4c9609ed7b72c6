//! # Input Module
//!
//! Sources of operator input, sampled at a fixed cadence while a session is
//! connected.
//!
//! This module handles:
//! - The `InputSource` lifecycle (attach on mount, detach on unmount)
//! - A polled gamepad sampler with a fullscreen button edge detector
//! - A Linux evdev gamepad provider
//! - A pair of virtual touch joysticks combined into one control vector

pub mod evdev_pad;
pub mod gamepad;
pub mod touch;

use tracing::debug;

use crate::control::{ChangeGate, ControlVector};

/// A producer of control vectors.
///
/// Sources live for the whole process; the connection manager attaches them
/// when a session opens and detaches them when it closes.
pub trait InputSource: Send {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Binds the source to its underlying device or widgets.
    fn attach(&mut self);

    /// Reads the current input.
    ///
    /// `None` means no data is available (device missing, not attached).
    /// That is a normal state, not an error.
    fn sample(&mut self) -> Option<ControlVector>;

    /// Releases bindings. Must be safe to call without a prior `attach`.
    fn detach(&mut self);
}

/// Lifecycle handle for one source mounted into a session.
///
/// Takes the source for the lifetime of the session and owns its change
/// gate. [`MountedSource::unmount`] detaches the source and hands it back
/// for the next session.
pub struct MountedSource {
    source: Box<dyn InputSource>,
    gate: ChangeGate,
}

impl MountedSource {
    /// Attaches `source` and seeds its gate with the neutral vector, so a
    /// device at rest emits nothing on mount.
    pub fn mount(mut source: Box<dyn InputSource>) -> Self {
        source.attach();
        debug!("Mounted input source: {}", source.name());
        Self {
            source,
            gate: ChangeGate::with_initial(ControlVector::NEUTRAL),
        }
    }

    /// Samples the source and returns the vector if it changed.
    pub fn poll(&mut self) -> Option<ControlVector> {
        let sample = self.source.sample()?;
        self.gate.admit(sample)
    }

    /// Name of the mounted source.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.source.name()
    }

    /// Detaches the source and returns it.
    pub fn unmount(mut self) -> Box<dyn InputSource> {
        self.source.detach();
        debug!("Unmounted input source: {}", self.source.name());
        self.source
    }
}
