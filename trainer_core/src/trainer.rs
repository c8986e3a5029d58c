//! Type-state builder for `Trainer` and the top-level tick loop.
//!
//! The builder enforces at compile time that a step driver and a limit
//! switch are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use trainer_traits::clock::{Clock, MonotonicClock};
use trainer_traits::{LimitSwitch, SettingsStore, StepDriver};

use crate::config::{MotionCfg, SensorCfg};
use crate::error::{BuildError, Result, TrainerError};
use crate::hall::{HallCapture, SpeedSensor};
use crate::motion::MotionController;
use crate::resolver::{ControlMode, SimParams, TargetResolver};
use crate::status::HomingStatus;
use crate::tables::CalibrationStore;

/// Telemetry power readings are clamped to this many watts.
pub const POWER_CLAMP_W: f64 = 2000.0;

/// One coherent view of the whole machine, taken between ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub logical_pos: i32,
    pub logical_target: i32,
    pub mode: ControlMode,
    pub enabled: bool,
    pub manual_hold: Option<i32>,
    pub homing: HomingStatus,
    pub homing_failed: bool,
    pub speed_mph: f32,
    /// Estimated rider power, clamped to `0..=POWER_CLAMP_W`.
    pub power_w: u16,
}

/// The complete trainer engine: speed sensing, target resolution and
/// motion control behind one `tick()` entry point.
pub struct Trainer {
    sensor: SpeedSensor,
    resolver: TargetResolver,
    cal: CalibrationStore,
    motion: MotionController<Box<dyn StepDriver>, Box<dyn LimitSwitch>>,
    store: Option<Box<dyn SettingsStore>>,
}

impl core::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trainer")
            .field("pos", &self.motion.position_logical())
            .field("target", &self.motion.target_logical())
            .field("mode", &self.resolver.mode())
            .field("speed_mph", &self.sensor.speed_mph())
            .finish()
    }
}

impl Trainer {
    /// Start building a Trainer.
    pub fn builder() -> TrainerBuilder<Missing, Missing> {
        TrainerBuilder::default()
    }

    /// One control-loop iteration: refresh the speed estimate, resolve
    /// the target for the active mode, advance the motion profile.
    pub fn tick(&mut self) -> Result<()> {
        let speed = self.sensor.update();
        let now_us = self.sensor.now_us();
        let target = self.resolver.resolve(&self.cal, speed);
        self.motion.set_target_logical(target);
        self.motion.update(now_us, speed)
    }

    /// Kick off the homing sequence; it runs across subsequent ticks.
    pub fn start_homing(&mut self) {
        let now_us = self.sensor.now_us();
        self.motion.start_homing(now_us);
    }

    /// Shared hall-edge record, for wiring into an interrupt callback.
    pub fn hall_capture(&self) -> Arc<HallCapture> {
        self.sensor.capture()
    }

    /// Microseconds since startup; the unit `HallCapture::on_edge` expects.
    pub fn now_us(&self) -> u64 {
        self.sensor.now_us()
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        self.resolver.set_mode(mode);
    }

    pub fn set_erg_target(&mut self, watts: u16) {
        self.resolver.set_erg_target(watts);
    }

    pub fn set_sim_params(&mut self, params: SimParams) {
        self.resolver.set_sim_params(params);
    }

    pub fn set_manual_hold(&mut self, logical_pos: i32) {
        self.resolver.set_manual_hold(logical_pos);
    }

    pub fn clear_manual_hold(&mut self) {
        self.resolver.clear_manual_hold();
    }

    pub fn set_resistance_level(&mut self, raw: u8) {
        self.resolver.set_resistance_level(raw);
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.cal
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationStore {
        &mut self.cal
    }

    pub fn speed_mph(&self) -> f32 {
        self.sensor.speed_mph()
    }

    /// Load idle curve and tables from the settings store, if one was
    /// configured. Missing data falls back to defaults.
    pub fn load_settings(&mut self) -> Result<()> {
        let store = self.store.as_mut().ok_or_else(|| {
            eyre::Report::new(TrainerError::State("no settings store configured".into()))
        })?;
        self.cal.load(store);
        Ok(())
    }

    /// Persist idle curve and tables to the settings store.
    pub fn save_settings(&mut self) -> Result<()> {
        let store = self.store.as_mut().ok_or_else(|| {
            eyre::Report::new(TrainerError::State("no settings store configured".into()))
        })?;
        self.cal.save_idle(store)?;
        self.cal.save_tables(store)?;
        Ok(())
    }

    /// De-energize the motor (best-effort, for shutdown paths).
    pub fn stop(&mut self) {
        self.motion.stop();
    }

    pub fn snapshot(&self) -> Snapshot {
        let pos = self.motion.position_logical();
        let speed = self.sensor.speed_mph();
        let power = self
            .cal
            .power_watts(f64::from(speed), f64::from(pos))
            .clamp(0.0, POWER_CLAMP_W);
        Snapshot {
            logical_pos: pos,
            logical_target: self.motion.target_logical(),
            mode: self.resolver.mode(),
            enabled: self.motion.is_enabled(),
            manual_hold: self.resolver.manual_hold(),
            homing: self.motion.homing_status(),
            homing_failed: self.motion.homing_failed(),
            speed_mph: speed,
            power_w: power.round() as u16,
        }
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Trainer`. All fields are validated on `build()`.
pub struct TrainerBuilder<D, L> {
    driver: Option<Box<dyn StepDriver>>,
    limit: Option<Box<dyn LimitSwitch>>,
    motion: Option<MotionCfg>,
    sensor: Option<SensorCfg>,
    calibration: Option<CalibrationStore>,
    store: Option<Box<dyn SettingsStore>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _d: PhantomData<D>,
    _l: PhantomData<L>,
}

impl Default for TrainerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            driver: None,
            limit: None,
            motion: None,
            sensor: None,
            calibration: None,
            store: None,
            clock: None,
            _d: PhantomData,
            _l: PhantomData,
        }
    }
}

/// Validate configuration and construct the `Trainer`.
///
/// The single source of truth for validation, used by both
/// `TrainerBuilder::try_build()` and `build()`.
fn validate_and_build(
    driver: Box<dyn StepDriver>,
    limit: Box<dyn LimitSwitch>,
    motion: MotionCfg,
    sensor: SensorCfg,
    calibration: CalibrationStore,
    store: Option<Box<dyn SettingsStore>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<Trainer> {
    if motion.phys_max_steps <= 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "phys_max_steps must be > 0",
        )));
    }
    if motion.min_sps <= 0.0 || motion.max_sps < motion.min_sps {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "step rate clamp must satisfy 0 < min <= max",
        )));
    }
    if motion.run_sps <= 0.0 || motion.jog_sps <= 0.0 || motion.ramp_start_sps <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "step rates must be > 0",
        )));
    }
    if motion.ramp_accel_sps2 <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "ramp_accel_sps2 must be > 0",
        )));
    }
    if motion.off_deadband_logical > motion.on_deadband_logical {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "off deadband must not exceed on deadband",
        )));
    }
    if motion.speed_enable_mph < motion.speed_disable_mph {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "speed enable threshold must be >= disable threshold",
        )));
    }
    if sensor.pulses_per_rev == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "pulses_per_rev must be > 0",
        )));
    }
    if sensor.roller_diameter_in <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "roller_diameter_in must be > 0",
        )));
    }
    if sensor.filter_tau_s <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "filter_tau_s must be > 0",
        )));
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };

    let capture = Arc::new(HallCapture::from_cfg(&sensor));
    let speed_sensor = SpeedSensor::new(capture, sensor, clock);
    let motion_ctl = MotionController::new(driver, limit, motion);

    Ok(Trainer {
        sensor: speed_sensor,
        resolver: TargetResolver::new(),
        cal: calibration,
        motion: motion_ctl,
        store,
    })
}

impl<D, L> TrainerBuilder<D, L> {
    /// Fallible build available in any type-state; returns a detailed
    /// error for missing pieces.
    pub fn try_build(self) -> Result<Trainer> {
        let driver = self
            .driver
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDriver))?;
        let limit = self
            .limit
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLimitSwitch))?;
        validate_and_build(
            driver,
            limit,
            self.motion.unwrap_or_default(),
            self.sensor.unwrap_or_default(),
            self.calibration.unwrap_or_default(),
            self.store,
            self.clock,
        )
    }
}

/// Chainable setters that do not affect type-state.
impl<D, L> TrainerBuilder<D, L> {
    pub fn with_motion_cfg(mut self, cfg: MotionCfg) -> Self {
        self.motion = Some(cfg);
        self
    }

    pub fn with_sensor_cfg(mut self, cfg: SensorCfg) -> Self {
        self.sensor = Some(cfg);
        self
    }

    pub fn with_calibration(mut self, cal: CalibrationStore) -> Self {
        self.calibration = Some(cal);
        self
    }

    pub fn with_settings_store(mut self, store: impl SettingsStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Provide a custom clock implementation; defaults to
    /// `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<L> TrainerBuilder<Missing, L> {
    pub fn with_step_driver(self, driver: impl StepDriver + 'static) -> TrainerBuilder<Set, L> {
        TrainerBuilder {
            driver: Some(Box::new(driver)),
            limit: self.limit,
            motion: self.motion,
            sensor: self.sensor,
            calibration: self.calibration,
            store: self.store,
            clock: self.clock,
            _d: PhantomData,
            _l: PhantomData,
        }
    }
}

impl<D> TrainerBuilder<D, Missing> {
    pub fn with_limit_switch(self, limit: impl LimitSwitch + 'static) -> TrainerBuilder<D, Set> {
        TrainerBuilder {
            driver: self.driver,
            limit: Some(Box::new(limit)),
            motion: self.motion,
            sensor: self.sensor,
            calibration: self.calibration,
            store: self.store,
            clock: self.clock,
            _d: PhantomData,
            _l: PhantomData,
        }
    }
}

impl TrainerBuilder<Set, Set> {
    /// Infallible-signature build for the fully-specified type-state;
    /// still validates configuration.
    pub fn build(self) -> Result<Trainer> {
        self.try_build()
    }
}
