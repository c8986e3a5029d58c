//! Observable state of the homing recovery sequence.

/// Reported by `MotionController` and exported in telemetry. `Failed` is
/// sticky until a fresh homing request; positions are stale while it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingStatus {
    /// Not homing; positions are trusted.
    Inactive,
    /// Non-blocking homing state machine is running; motor forced on.
    InProgress,
    /// Seek or back-off timed out; previous positions retained, no retry
    /// until the caller requests homing again.
    Failed,
}
