//! # Teleop Link Library
//!
//! Drive a teleoperated device from a gamepad or on-screen joysticks.
//!
//! Operator input is sampled every 50 ms, filtered so only changes pass,
//! rate limited to one command per 100 ms and sent as JSON over a WebSocket
//! that is re-established every second while it is down.

pub mod config;
pub mod control;
pub mod error;
pub mod input;
pub mod link;
