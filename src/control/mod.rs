//! # Control Module
//!
//! The canonical control vector and the filters applied before it is handed
//! to the rate limiter.
//!
//! This module handles:
//! - The four-axis `ControlVector` and its JSON wire shape
//! - Deadzone normalization of raw axis readings
//! - Suppressing consecutive identical vectors (`ChangeGate`)

pub mod change_gate;
pub mod vector;

pub use change_gate::ChangeGate;
pub use vector::{ControlVector, Deadzone};
