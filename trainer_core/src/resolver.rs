//! Control-mode state and target resolution.
//!
//! The resolver owns the rider-facing control state (mode, ERG watt
//! target, SIM grade, manual holds) and turns it plus the current speed
//! into one logical position target per tick. It never touches the motor;
//! the motion layer consumes the resolved target.

use crate::tables::CalibrationStore;
use crate::units::{LOGICAL_MAX, LOGICAL_MIN};

/// Active control mode. Discriminants match the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlMode {
    Idle = 0,
    Sim = 1,
    Erg = 2,
}

/// Raw simulation parameters as received from the head unit.
///
/// Wind speed is signed mm/s, grade is signed hundredths of a percent,
/// rolling and wind resistance coefficients are scaled u8 per the FE-C
/// encoding. Only grade affects the resistance target; the rest are kept
/// for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimParams {
    pub wind_mm_s: i16,
    pub grade_hundredths: i16,
    pub crr_raw: u8,
    pub cw_raw: u8,
}

impl SimParams {
    pub fn grade_percent(&self) -> f64 {
        f64::from(self.grade_hundredths) / 100.0
    }
}

/// Resolves the per-tick logical position target from mode and speed.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    mode: ControlMode,
    erg_target_watts: u16,
    sim: SimParams,
    manual_hold: Option<i32>,
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetResolver {
    pub fn new() -> Self {
        Self {
            mode: ControlMode::Idle,
            erg_target_watts: 0,
            sim: SimParams::default(),
            manual_hold: None,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn erg_target_watts(&self) -> u16 {
        self.erg_target_watts
    }

    pub fn sim_params(&self) -> SimParams {
        self.sim
    }

    pub fn manual_hold(&self) -> Option<i32> {
        self.manual_hold
    }

    /// Switch mode. Per-mode setpoints are retained so a round trip
    /// through another mode is lossless.
    pub fn set_mode(&mut self, mode: ControlMode) {
        if mode != self.mode {
            tracing::info!(?mode, "control mode changed");
        }
        self.mode = mode;
    }

    /// Set the ERG watt target and switch to ERG mode.
    pub fn set_erg_target(&mut self, watts: u16) {
        self.erg_target_watts = watts;
        self.mode = ControlMode::Erg;
        tracing::debug!(watts, "erg target set");
    }

    /// Set SIM parameters and switch to SIM mode.
    pub fn set_sim_params(&mut self, params: SimParams) {
        self.sim = params;
        self.mode = ControlMode::Sim;
        tracing::debug!(grade = params.grade_percent(), "sim params set");
    }

    /// Pin the target to a fixed logical position until cleared. Wins
    /// over every mode.
    pub fn set_manual_hold(&mut self, logical_pos: i32) {
        let pos = logical_pos.clamp(LOGICAL_MIN, LOGICAL_MAX);
        self.manual_hold = Some(pos);
        tracing::debug!(pos, "manual hold set");
    }

    pub fn clear_manual_hold(&mut self) {
        if self.manual_hold.take().is_some() {
            tracing::debug!("manual hold cleared");
        }
    }

    /// Basic resistance command: raw 0..=200 in 0.5 % steps maps linearly
    /// onto the logical range and behaves as a manual hold.
    pub fn set_resistance_level(&mut self, raw: u8) {
        let raw = raw.min(200);
        self.set_manual_hold(i32::from(raw) * 5);
    }

    /// Resolve the logical target for the current state at `speed_mph`.
    pub fn resolve(&self, cal: &CalibrationStore, speed_mph: f32) -> i32 {
        if let Some(pos) = self.manual_hold {
            return pos;
        }
        let pos = match self.mode {
            ControlMode::Idle => return cal.idle.position_for(speed_mph),
            ControlMode::Erg => {
                cal.erg_position(f64::from(speed_mph), f64::from(self.erg_target_watts))
            }
            ControlMode::Sim => cal.sim_position(f64::from(speed_mph), self.sim.grade_percent()),
        };
        (pos.round() as i32).clamp(LOGICAL_MIN, LOGICAL_MAX)
    }
}
