#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the trainer runtime.
//!
//! `Config` and sub-structs are deserialized from TOML and validated.
//! Every motion and sensor field has a default matching the shipped
//! hardware, so a minimal config only needs `[pins]`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub motor_step: u8,
    pub motor_dir: u8,
    pub motor_en: Option<u8>,
    pub limit_in: u8,
    pub hall_in: u8,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MotionToml {
    /// Full travel in microsteps (logical 1000 maps here).
    pub phys_max_steps: i32,
    pub run_sps: f32,
    pub jog_sps: f32,
    pub ramp_start_sps: f32,
    pub ramp_accel_sps2: f32,
    pub slow_zone_logical: i32,
    pub slow_zone_sps: f32,
    pub min_sps: f32,
    pub max_sps: f32,
    pub on_deadband_logical: i32,
    pub off_deadband_logical: i32,
    pub idle_off_ms: u64,
    pub limit_debounce_ms: u64,
    pub homing_settle_ticks: u32,
    pub homing_backoff_timeout_ms: u64,
    pub homing_seek_timeout_ms: u64,
    pub homing_backoff_steps: u32,
    pub rehome_cooldown_ms: u64,
    pub speed_disable_mph: f32,
    pub speed_enable_mph: f32,
    pub speed_holdoff_ms: u64,
}

impl Default for MotionToml {
    fn default() -> Self {
        Self {
            phys_max_steps: 6960,
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

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SensorToml {
    pub pulses_per_rev: u8,
    pub roller_diameter_in: f32,
    /// Ignore edges this close after the previous accepted edge (noise).
    pub holdoff_us: u64,
    /// Shortest plausible pulse interval; anything faster is chatter.
    pub min_interval_us: u64,
    /// No edge for this long reads as a stopped wheel.
    pub dropout_us: u64,
    pub filter_tau_s: f32,
}

impl Default for SensorToml {
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Treat low limit-switch level as pressed when true
    pub limit_active_low: bool,
    /// Treat the falling hall edge as the pulse when true
    pub hall_falling_edge: bool,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            limit_active_low: true,
            hall_falling_edge: true,
        }
    }
}

/// Idle-curve coefficients pinned in the config file; preferred over the
/// values in the settings store when present.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedIdleCurve {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    #[serde(default)]
    pub d: f32,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub motion: MotionToml,
    #[serde(default)]
    pub sensor: SensorToml,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub idle_curve: Option<PersistedIdleCurve>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Motion
        if self.motion.phys_max_steps <= 0 {
            eyre::bail!("motion.phys_max_steps must be > 0");
        }
        if self.motion.min_sps <= 0.0 {
            eyre::bail!("motion.min_sps must be > 0");
        }
        if self.motion.max_sps < self.motion.min_sps {
            eyre::bail!("motion.max_sps must be >= motion.min_sps");
        }
        if self.motion.run_sps <= 0.0 || self.motion.jog_sps <= 0.0 {
            eyre::bail!("motion step rates must be > 0");
        }
        if self.motion.ramp_start_sps <= 0.0 || self.motion.ramp_accel_sps2 <= 0.0 {
            eyre::bail!("motion ramp parameters must be > 0");
        }
        if self.motion.slow_zone_logical < 0 || self.motion.slow_zone_logical > 1000 {
            eyre::bail!("motion.slow_zone_logical must be in [0, 1000]");
        }
        if self.motion.off_deadband_logical > self.motion.on_deadband_logical {
            eyre::bail!("motion.off_deadband_logical must not exceed on_deadband_logical");
        }
        if self.motion.speed_enable_mph < self.motion.speed_disable_mph {
            eyre::bail!("motion.speed_enable_mph must be >= speed_disable_mph");
        }
        if self.motion.homing_seek_timeout_ms == 0 {
            eyre::bail!("motion.homing_seek_timeout_ms must be >= 1");
        }
        if self.motion.homing_seek_timeout_ms > 5 * 60 * 1000 {
            eyre::bail!("motion.homing_seek_timeout_ms is unreasonably large (>5min)");
        }

        // Sensor
        if self.sensor.pulses_per_rev == 0 {
            eyre::bail!("sensor.pulses_per_rev must be >= 1");
        }
        if self.sensor.roller_diameter_in <= 0.0 {
            eyre::bail!("sensor.roller_diameter_in must be > 0");
        }
        if self.sensor.filter_tau_s <= 0.0 {
            eyre::bail!("sensor.filter_tau_s must be > 0");
        }
        if self.sensor.min_interval_us >= self.sensor.dropout_us {
            eyre::bail!("sensor.min_interval_us must be < sensor.dropout_us");
        }

        // Idle curve
        if let Some(curve) = &self.idle_curve {
            for (name, v) in [
                ("a", curve.a),
                ("b", curve.b),
                ("c", curve.c),
                ("d", curve.d),
            ] {
                if !v.is_finite() {
                    eyre::bail!("idle_curve.{name} must be finite");
                }
            }
        }

        Ok(())
    }
}
