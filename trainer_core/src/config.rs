//! Runtime configuration for the motion and sensing subsystems.
//!
//! These are the validated structs consumed by the engine. They are separate
//! from the TOML-deserialized config in `trainer_config`.

use crate::units::DEFAULT_PHYS_MAX_STEPS;

/// Motion, safety and homing parameters for `MotionController`.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    /// Physical travel in microsteps; logical 1000 maps onto this.
    pub phys_max_steps: i32,
    /// Nominal cruise step rate (steps/sec).
    pub run_sps: f32,
    /// Jog rate used by the homing sequence.
    pub jog_sps: f32,
    /// Ramp restart rate after enable or direction change.
    pub ramp_start_sps: f32,
    /// Ramp acceleration (steps/sec^2).
    pub ramp_accel_sps2: f32,
    /// Reduce to `slow_zone_sps` once |error| drops below this many logical units.
    pub slow_zone_logical: i32,
    /// Approach rate inside the slow zone.
    pub slow_zone_sps: f32,
    /// Step-rate clamp; intervals outside this stall motion or exceed the motor.
    pub min_sps: f32,
    pub max_sps: f32,
    /// Re-enable the motor once tracking error reaches this band (logical units).
    pub on_deadband_logical: i32,
    /// Start the settle timer once error is inside this tighter band.
    pub off_deadband_logical: i32,
    /// Disable the motor after error stays inside the off band this long.
    pub idle_off_ms: u64,
    /// A raw limit-switch change must hold this long to be accepted.
    pub limit_debounce_ms: u64,
    /// Debounce settling iterations at the start of homing.
    pub homing_settle_ticks: u32,
    /// Back-off-from-pressed-switch timeout.
    pub homing_backoff_timeout_ms: u64,
    /// Seek-switch timeout; expiry is a reported homing failure.
    pub homing_seek_timeout_ms: u64,
    /// Steps to retreat after the switch trips before zeroing.
    pub homing_backoff_steps: u32,
    /// Minimum gap between limit-trip-driven rehome requests.
    pub rehome_cooldown_ms: u64,
    /// Auto-disable once speed stays below this for `speed_holdoff_ms`.
    pub speed_disable_mph: f32,
    /// Speed at which the auto-disable latch releases (hysteresis).
    pub speed_enable_mph: f32,
    pub speed_holdoff_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            phys_max_steps: DEFAULT_PHYS_MAX_STEPS,
            run_sps: 2500.0,
            jog_sps: 800.0,
            ramp_start_sps: 900.0,
            ramp_accel_sps2: 6000.0,
            slow_zone_logical: 200,
            slow_zone_sps: 1000.0,
            min_sps: 50.0,
            max_sps: 5000.0,
            on_deadband_logical: 12,
            off_deadband_logical: 6,
            idle_off_ms: 1500,
            limit_debounce_ms: 8,
            homing_settle_ticks: 30,
            homing_backoff_timeout_ms: 2000,
            homing_seek_timeout_ms: 10_000,
            homing_backoff_steps: 100,
            rehome_cooldown_ms: 2000,
            speed_disable_mph: 2.0,
            speed_enable_mph: 2.3,
            speed_holdoff_ms: 800,
        }
    }
}

/// Hall sensor and speed-filter parameters for `SpeedSensor`.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    /// Magnets per roller revolution.
    pub pulses_per_rev: u8,
    /// Roller diameter in inches; fixes the RPM↔mph factor.
    pub roller_diameter_in: f32,
    /// Reject edges arriving sooner than this after the last accepted one.
    pub holdoff_us: u64,
    /// Reject intervals shorter than this (bounce/noise).
    pub min_interval_us: u64,
    /// No edge for this long means stopped (rate = 0).
    pub dropout_us: u64,
    /// EMA time constant in seconds.
    pub filter_tau_s: f32,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            pulses_per_rev: 6,
            roller_diameter_in: 3.25,
            holdoff_us: 3000,
            min_interval_us: 1500,
            dropout_us: 1_000_000,
            filter_tau_s: 0.60,
        }
    }
}
