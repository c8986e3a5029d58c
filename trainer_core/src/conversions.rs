//! `From` implementations bridging `trainer_config` types to
//! `trainer_core` types, so the CLI never maps fields by hand.

use crate::config::{MotionCfg, SensorCfg};
use crate::tables::IdleCurve;

impl From<&trainer_config::MotionToml> for MotionCfg {
    fn from(c: &trainer_config::MotionToml) -> Self {
        Self {
            phys_max_steps: c.phys_max_steps,
            run_sps: c.run_sps,
            jog_sps: c.jog_sps,
            ramp_start_sps: c.ramp_start_sps,
            ramp_accel_sps2: c.ramp_accel_sps2,
            slow_zone_logical: c.slow_zone_logical,
            slow_zone_sps: c.slow_zone_sps,
            min_sps: c.min_sps,
            max_sps: c.max_sps,
            on_deadband_logical: c.on_deadband_logical,
            off_deadband_logical: c.off_deadband_logical,
            idle_off_ms: c.idle_off_ms,
            limit_debounce_ms: c.limit_debounce_ms,
            homing_settle_ticks: c.homing_settle_ticks,
            homing_backoff_timeout_ms: c.homing_backoff_timeout_ms,
            homing_seek_timeout_ms: c.homing_seek_timeout_ms,
            homing_backoff_steps: c.homing_backoff_steps,
            rehome_cooldown_ms: c.rehome_cooldown_ms,
            speed_disable_mph: c.speed_disable_mph,
            speed_enable_mph: c.speed_enable_mph,
            speed_holdoff_ms: c.speed_holdoff_ms,
        }
    }
}

impl From<&trainer_config::SensorToml> for SensorCfg {
    fn from(c: &trainer_config::SensorToml) -> Self {
        Self {
            pulses_per_rev: c.pulses_per_rev,
            roller_diameter_in: c.roller_diameter_in,
            holdoff_us: c.holdoff_us,
            min_interval_us: c.min_interval_us,
            dropout_us: c.dropout_us,
            filter_tau_s: c.filter_tau_s,
        }
    }
}

impl From<&trainer_config::PersistedIdleCurve> for IdleCurve {
    fn from(c: &trainer_config::PersistedIdleCurve) -> Self {
        Self {
            a: c.a,
            b: c.b,
            c: c.c,
            d: c.d,
        }
    }
}
