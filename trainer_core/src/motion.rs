//! Stepper motion profile, limit-switch handling and homing.
//!
//! The controller is driven by frequent `update()` calls (the tick loop)
//! and emits at most one step pulse per call. All timing is taken from the
//! caller-supplied microsecond timestamp so the whole state machine runs
//! unmodified against a manual clock in tests.
//!
//! Safety rules enforced here:
//!
//! - the limit switch is debounced before anything reacts to it
//! - normal motion is inhibited until a homing run has succeeded
//! - a debounced limit hit during normal motion schedules a re-home
//!   (rate-limited by a cooldown); a failed homing run latches
//!   `homing_failed` and stops all motion until homing is restarted
//! - while homing runs, a rehome is pending or a failure is latched, the
//!   motor is forced enabled so torque stays available during recovery
//! - the driver is de-energized when the wheel is too slow to need
//!   resistance, and after an idle timeout at target

use trainer_traits::{LimitSwitch, StepDriver};

use crate::config::MotionCfg;
use crate::error::Result;
use crate::hw_error::map_hw_error;
use crate::status::HomingStatus;
use crate::units::{
    LOGICAL_MAX, LOGICAL_MIN, logical_to_steps, sps_to_interval_us, steps_to_logical,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HomingPhase {
    /// Let the debouncer converge on the real switch state.
    Settle { ticks_left: u32 },
    /// Switch already pressed at start: move away until it releases.
    BackoffIfPressed { deadline_us: u64 },
    /// Move toward the switch until it trips.
    Seek { deadline_us: u64 },
    /// Step off the switch, then declare the current spot zero.
    BackoffFinal { steps_left: u32 },
}

/// Two-state debouncer: the raw reading must hold for the full window
/// before the stable state follows it.
#[derive(Debug)]
struct Debounce {
    raw: bool,
    stable: bool,
    last_change_us: u64,
    window_us: u64,
}

impl Debounce {
    fn new(window_us: u64) -> Self {
        Self {
            raw: false,
            stable: false,
            last_change_us: 0,
            window_us,
        }
    }

    fn update(&mut self, raw: bool, now_us: u64) -> bool {
        if raw != self.raw {
            self.raw = raw;
            self.last_change_us = now_us;
        }
        if self.raw != self.stable
            && now_us.saturating_sub(self.last_change_us) >= self.window_us
        {
            self.stable = self.raw;
        }
        self.stable
    }
}

/// Hysteresis gate on wheel speed: resistance is pointless (and the motor
/// fights the rider) when the wheel barely turns. Dropping below the
/// disable threshold must persist for the holdoff before motion stops;
/// re-enabling requires the higher enable threshold.
#[derive(Debug)]
struct SpeedGate {
    allow: bool,
    below_since_us: Option<u64>,
}

impl SpeedGate {
    fn new() -> Self {
        Self {
            allow: false,
            below_since_us: None,
        }
    }

    fn update(&mut self, speed_mph: f32, now_us: u64, cfg: &MotionCfg) -> bool {
        if speed_mph >= cfg.speed_enable_mph {
            self.below_since_us = None;
            self.allow = true;
        } else if speed_mph < cfg.speed_disable_mph {
            match self.below_since_us {
                None => self.below_since_us = Some(now_us),
                Some(since) => {
                    if now_us.saturating_sub(since) >= cfg.speed_holdoff_ms * 1000 {
                        self.allow = false;
                    }
                }
            }
        } else {
            // Between the thresholds: keep the current verdict.
            self.below_since_us = None;
        }
        self.allow
    }
}

/// Ramped step-pulse generator with homing and limit safety.
pub struct MotionController<D: StepDriver, L: LimitSwitch> {
    driver: D,
    limit: L,
    cfg: MotionCfg,

    pos_steps: i32,
    target_steps: i32,

    enabled: bool,
    forward: bool,
    moving: bool,
    current_sps: f32,
    last_pulse_us: u64,
    last_motion_us: u64,

    debounce: Debounce,
    gate: SpeedGate,

    homed: bool,
    homing: Option<HomingPhase>,
    homing_failed: bool,
    rehome_requested: bool,
    last_home_done_us: u64,
}

impl<D: StepDriver, L: LimitSwitch> MotionController<D, L> {
    pub fn new(driver: D, limit: L, cfg: MotionCfg) -> Self {
        let debounce = Debounce::new(cfg.limit_debounce_ms * 1000);
        Self {
            driver,
            limit,
            cfg,
            pos_steps: 0,
            target_steps: 0,
            enabled: false,
            forward: true,
            moving: false,
            current_sps: 0.0,
            last_pulse_us: 0,
            last_motion_us: 0,
            debounce,
            gate: SpeedGate::new(),
            homed: false,
            homing: None,
            homing_failed: false,
            rehome_requested: false,
            last_home_done_us: 0,
        }
    }

    pub fn position_logical(&self) -> i32 {
        steps_to_logical(self.pos_steps, self.cfg.phys_max_steps)
    }

    pub fn target_logical(&self) -> i32 {
        steps_to_logical(self.target_steps, self.cfg.phys_max_steps)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    pub fn homing_failed(&self) -> bool {
        self.homing_failed
    }

    pub fn homing_status(&self) -> HomingStatus {
        if self.homing.is_some() {
            HomingStatus::InProgress
        } else if self.homing_failed {
            HomingStatus::Failed
        } else {
            HomingStatus::Inactive
        }
    }

    /// Set the logical position target. Clamped to the logical range;
    /// takes effect on the next tick (retained across a homing run, which
    /// re-zeroes it).
    pub fn set_target_logical(&mut self, logical: i32) {
        let logical = logical.clamp(LOGICAL_MIN, LOGICAL_MAX);
        self.target_steps = logical_to_steps(logical, self.cfg.phys_max_steps);
    }

    /// Begin a homing run. Clears a latched failure and any pending
    /// re-home request; normal motion resumes only after it succeeds.
    pub fn start_homing(&mut self, now_us: u64) {
        tracing::info!("homing started");
        self.homing = Some(HomingPhase::Settle {
            ticks_left: self.cfg.homing_settle_ticks,
        });
        self.homing_failed = false;
        self.rehome_requested = false;
        self.homed = false;
        self.moving = false;
        self.current_sps = self.cfg.jog_sps;
        self.last_pulse_us = now_us;
    }

    /// Advance the controller by one tick.
    pub fn update(&mut self, now_us: u64, speed_mph: f32) -> Result<()> {
        let raw = self.limit.is_pressed().map_err(map_hw_error)?;
        let pressed = self.debounce.update(raw, now_us);

        if self.homing.is_some() {
            return self.homing_tick(now_us, pressed);
        }

        // A latched failure inhibits motion but keeps torque available;
        // the carriage position is suspect, so it must not be free to drop.
        if self.homing_failed {
            self.set_enabled(true)?;
            return Ok(());
        }

        // A switch hit with the carriage supposedly elsewhere means lost
        // steps; schedule a re-home.
        if pressed && self.homed && self.pos_steps > self.cfg.homing_backoff_steps as i32 {
            if !self.rehome_requested {
                tracing::warn!(
                    pos = self.position_logical(),
                    "limit tripped away from home, re-home scheduled"
                );
            }
            self.rehome_requested = true;
        }
        if self.rehome_requested {
            if now_us.saturating_sub(self.last_home_done_us)
                >= self.cfg.rehome_cooldown_ms * 1000
            {
                self.start_homing(now_us);
            } else {
                // Recovery pending: the motor is forced enabled and the
                // gate and idle-off must not de-energize it.
                self.set_enabled(true)?;
            }
            return Ok(());
        }

        if !self.homed {
            return Ok(());
        }

        if !self.gate.update(speed_mph, now_us, &self.cfg) {
            if self.moving {
                self.moving = false;
                self.current_sps = 0.0;
            }
            self.set_enabled(false)?;
            return Ok(());
        }

        self.follow_target(now_us)
    }

    /// De-energize the driver; failures are logged, not propagated
    /// (best-effort shutdown path).
    pub fn stop(&mut self) {
        if let Err(e) = self.driver.set_enabled(false) {
            tracing::warn!(error = %e, "failed to disable driver on stop");
        }
        self.enabled = false;
        self.moving = false;
        self.current_sps = 0.0;
    }

    fn set_enabled(&mut self, on: bool) -> Result<()> {
        if self.enabled != on {
            self.driver.set_enabled(on).map_err(map_hw_error)?;
            self.enabled = on;
            tracing::debug!(on, "driver enable changed");
        }
        Ok(())
    }

    fn set_direction(&mut self, forward: bool) -> Result<()> {
        if self.forward != forward {
            self.driver.set_direction(forward).map_err(map_hw_error)?;
            self.forward = forward;
            // Direction reversal restarts the ramp.
            self.current_sps = self.cfg.ramp_start_sps;
        }
        Ok(())
    }

    /// Emit one pulse if the current step interval has elapsed. Returns
    /// whether a pulse was emitted.
    fn maybe_pulse(&mut self, now_us: u64) -> Result<bool> {
        let interval = sps_to_interval_us(self.current_sps, self.cfg.min_sps, self.cfg.max_sps);
        if now_us.saturating_sub(self.last_pulse_us) < interval {
            return Ok(false);
        }
        self.driver.pulse().map_err(map_hw_error)?;
        self.last_pulse_us = now_us;
        self.pos_steps += if self.forward { 1 } else { -1 };
        self.last_motion_us = now_us;
        Ok(true)
    }

    fn follow_target(&mut self, now_us: u64) -> Result<()> {
        let err = self.target_steps - self.pos_steps;
        let on_band =
            i64::from(self.cfg.on_deadband_logical) * i64::from(self.cfg.phys_max_steps) / 1000;
        let off_band =
            i64::from(self.cfg.off_deadband_logical) * i64::from(self.cfg.phys_max_steps) / 1000;

        if !self.moving {
            if i64::from(err.abs()) >= on_band {
                self.moving = true;
                self.current_sps = self.cfg.ramp_start_sps;
                self.last_pulse_us = now_us;
                self.last_motion_us = now_us;
            } else {
                // Holding at target: cut holding current after the idle
                // timeout. Error outside the off band restarts the settle
                // timer even though it is not yet enough to move.
                if i64::from(err.abs()) > off_band {
                    self.last_motion_us = now_us;
                } else if self.enabled
                    && now_us.saturating_sub(self.last_motion_us) >= self.cfg.idle_off_ms * 1000
                {
                    self.set_enabled(false)?;
                }
                return Ok(());
            }
        } else if i64::from(err.abs()) <= off_band {
            self.moving = false;
            self.current_sps = 0.0;
            self.last_motion_us = now_us;
            return Ok(());
        }

        self.set_enabled(true)?;
        self.set_direction(err > 0)?;

        // Approach deceleration: close to the target the profile is
        // capped hard so the carriage cannot overshoot; the cap applies
        // immediately, also when already running faster.
        let err_logical = steps_to_logical(err.abs(), self.cfg.phys_max_steps);
        let cap = if err_logical <= self.cfg.slow_zone_logical {
            self.cfg.slow_zone_sps
        } else {
            self.cfg.run_sps
        };
        if self.current_sps > cap {
            self.current_sps = cap;
        }

        // Travel limits hold even if the target bookkeeping is off.
        if (self.forward && self.pos_steps >= self.cfg.phys_max_steps)
            || (!self.forward && self.pos_steps <= 0)
        {
            self.moving = false;
            self.current_sps = 0.0;
            return Ok(());
        }

        if self.maybe_pulse(now_us)? {
            let interval = sps_to_interval_us(self.current_sps, self.cfg.min_sps, self.cfg.max_sps);
            let dt_s = interval as f32 / 1_000_000.0;
            self.current_sps = (self.current_sps + self.cfg.ramp_accel_sps2 * dt_s).min(cap);
        }
        Ok(())
    }

    fn homing_tick(&mut self, now_us: u64, pressed: bool) -> Result<()> {
        self.set_enabled(true)?;
        self.current_sps = self.cfg.jog_sps;

        let Some(phase) = self.homing else {
            return Ok(());
        };

        match phase {
            HomingPhase::Settle { ticks_left } => {
                if ticks_left > 1 {
                    self.homing = Some(HomingPhase::Settle {
                        ticks_left: ticks_left - 1,
                    });
                } else if pressed {
                    tracing::debug!("switch pressed at start, backing off");
                    self.homing = Some(HomingPhase::BackoffIfPressed {
                        deadline_us: now_us + self.cfg.homing_backoff_timeout_ms * 1000,
                    });
                    self.last_pulse_us = now_us;
                } else {
                    self.homing = Some(HomingPhase::Seek {
                        deadline_us: now_us + self.cfg.homing_seek_timeout_ms * 1000,
                    });
                    self.last_pulse_us = now_us;
                }
            }
            HomingPhase::BackoffIfPressed { deadline_us } => {
                if !pressed {
                    self.homing = Some(HomingPhase::Seek {
                        deadline_us: now_us + self.cfg.homing_seek_timeout_ms * 1000,
                    });
                } else if now_us >= deadline_us {
                    self.fail_homing("switch did not release during backoff");
                } else {
                    self.set_direction(true)?;
                    self.current_sps = self.cfg.jog_sps;
                    self.maybe_pulse(now_us)?;
                }
            }
            HomingPhase::Seek { deadline_us } => {
                if pressed {
                    self.homing = Some(HomingPhase::BackoffFinal {
                        steps_left: self.cfg.homing_backoff_steps,
                    });
                } else if now_us >= deadline_us {
                    self.fail_homing("switch not found before timeout");
                } else {
                    self.set_direction(false)?;
                    self.current_sps = self.cfg.jog_sps;
                    self.maybe_pulse(now_us)?;
                }
            }
            HomingPhase::BackoffFinal { steps_left } => {
                if steps_left == 0 {
                    self.finish_homing(now_us);
                } else {
                    self.set_direction(true)?;
                    self.current_sps = self.cfg.jog_sps;
                    if self.maybe_pulse(now_us)? {
                        self.homing = Some(HomingPhase::BackoffFinal {
                            steps_left: steps_left - 1,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn finish_homing(&mut self, now_us: u64) {
        self.pos_steps = 0;
        self.target_steps = 0;
        self.homed = true;
        self.homing = None;
        self.homing_failed = false;
        self.rehome_requested = false;
        self.last_home_done_us = now_us;
        self.moving = false;
        self.current_sps = 0.0;
        self.last_motion_us = now_us;
        tracing::info!("homing complete, position zeroed");
    }

    /// Latch the failure and keep positions as-is so the operator can see
    /// where the run stopped. No automatic retry.
    fn fail_homing(&mut self, reason: &str) {
        tracing::error!(reason, "homing failed");
        self.homing = None;
        self.homing_failed = true;
        self.rehome_requested = false;
        self.moving = false;
        self.current_sps = 0.0;
    }
}
