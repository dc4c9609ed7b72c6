//! # Change Gate
//!
//! Drops a control vector when it is identical to the last one let through,
//! so a stick held still produces no traffic.

use super::vector::ControlVector;

/// Stateful filter that forwards a vector only when it differs from the
/// previously forwarded one.
///
/// Equality is exact and component-wise; no tolerance is applied.
///
/// # Examples
///
/// ```
/// use teleop_link::control::change_gate::ChangeGate;
/// use teleop_link::control::vector::ControlVector;
///
/// let mut gate = ChangeGate::with_initial(ControlVector::NEUTRAL);
/// let forward = ControlVector::new(0.0, 1.0, 0.0, 0.0);
///
/// assert_eq!(gate.admit(ControlVector::NEUTRAL), None);
/// assert_eq!(gate.admit(forward), Some(forward));
/// assert_eq!(gate.admit(forward), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeGate {
    last: Option<ControlVector>,
}

impl ChangeGate {
    /// Creates an empty gate. The first candidate always passes.
    #[must_use]
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Creates a gate that behaves as if `initial` had already been forwarded.
    #[must_use]
    pub fn with_initial(initial: ControlVector) -> Self {
        Self {
            last: Some(initial),
        }
    }

    /// Offers a candidate; returns it if it differs from the last admitted value.
    pub fn admit(&mut self, candidate: ControlVector) -> Option<ControlVector> {
        if self.last == Some(candidate) {
            return None;
        }
        self.last = Some(candidate);
        Some(candidate)
    }

    /// The last admitted value, if any.
    #[must_use]
    pub fn last(&self) -> Option<ControlVector> {
        self.last
    }

    /// Forgets the held value.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(lx: f32, ly: f32, rx: f32, ry: f32) -> ControlVector {
        ControlVector::new(lx, ly, rx, ry)
    }

    #[test]
    fn test_first_candidate_passes_on_empty_gate() {
        let mut gate = ChangeGate::new();
        assert_eq!(gate.admit(ControlVector::NEUTRAL), Some(ControlVector::NEUTRAL));
        assert_eq!(gate.last(), Some(ControlVector::NEUTRAL));
    }

    #[test]
    fn test_duplicate_suppressed() {
        let mut gate = ChangeGate::new();
        let a = v(0.5, 0.0, 0.0, 0.0);
        assert!(gate.admit(a).is_some());
        assert!(gate.admit(a).is_none());
        assert!(gate.admit(a).is_none());
    }

    #[test]
    fn test_any_component_change_passes() {
        let mut gate = ChangeGate::with_initial(ControlVector::NEUTRAL);
        assert!(gate.admit(v(0.0, 0.0, 0.0, 0.01)).is_some());
        assert!(gate.admit(v(0.0, 0.0, 0.01, 0.01)).is_some());
        assert!(gate.admit(v(0.0, 0.01, 0.01, 0.01)).is_some());
        assert!(gate.admit(v(0.01, 0.01, 0.01, 0.01)).is_some());
    }

    #[test]
    fn test_return_to_previous_value_passes() {
        let mut gate = ChangeGate::with_initial(ControlVector::NEUTRAL);
        let a = v(1.0, 0.0, 0.0, 0.0);
        assert!(gate.admit(a).is_some());
        assert_eq!(gate.admit(ControlVector::NEUTRAL), Some(ControlVector::NEUTRAL));
        assert_eq!(gate.admit(a), Some(a));
    }

    #[test]
    fn test_no_consecutive_duplicates_in_output() {
        let inputs = [
            v(0.0, 0.0, 0.0, 0.0),
            v(0.2, 0.0, 0.0, 0.0),
            v(0.2, 0.0, 0.0, 0.0),
            v(0.3, 0.0, 0.0, 0.0),
            v(0.3, 0.0, 0.0, 0.0),
            v(0.3, 0.0, 0.0, 0.0),
            v(0.0, 0.0, 0.0, 0.0),
        ];
        let mut gate = ChangeGate::new();
        let admitted: Vec<_> = inputs.iter().filter_map(|&c| gate.admit(c)).collect();
        assert_eq!(admitted.len(), 4);
        for pair in admitted.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_reset_forgets_value() {
        let mut gate = ChangeGate::with_initial(ControlVector::NEUTRAL);
        gate.reset();
        assert_eq!(gate.last(), None);
        assert!(gate.admit(ControlVector::NEUTRAL).is_some());
    }
}
