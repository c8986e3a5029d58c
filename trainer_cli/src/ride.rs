//! Command implementations: simulated ride, homing run, table lookup and
//! self-check. All run against the bench rig in virtual time, so they are
//! deterministic and finish instantly.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use trainer_core::units::mph_to_rpm;
use trainer_core::{
    ControlMode, HomingStatus, MotionCfg, SensorCfg, SimParams, Snapshot, Trainer, TrainerError,
};
use trainer_hardware::{FileStore, sim_rig};
use trainer_traits::ManualClock;

use crate::cli::{RideMode, TableName};

/// Virtual tick period for all simulated runs.
const TICK_US: u64 = 1000;

/// Cap on a homing run in virtual time; generous against the config
/// timeouts, it only guards the loop itself.
const HOMING_CAP_US: u64 = 120 * 1_000_000;

fn mode_name(mode: ControlMode) -> &'static str {
    match mode {
        ControlMode::Idle => "idle",
        ControlMode::Erg => "erg",
        ControlMode::Sim => "sim",
    }
}

fn homing_name(h: HomingStatus) -> &'static str {
    match h {
        HomingStatus::Inactive => "inactive",
        HomingStatus::InProgress => "in_progress",
        HomingStatus::Failed => "failed",
    }
}

fn print_snapshot(snap: &Snapshot, t_ms: u64, json: bool) {
    if json {
        let line = serde_json::json!({
            "t_ms": t_ms,
            "pos": snap.logical_pos,
            "target": snap.logical_target,
            "mode": mode_name(snap.mode),
            "enabled": snap.enabled,
            "homing": homing_name(snap.homing),
            "speed_mph": snap.speed_mph,
            "power_w": snap.power_w,
        });
        println!("{line}");
    } else {
        println!(
            "t={:>6}ms pos={:>4} target={:>4} mode={} enabled={} speed={:.1}mph power={}W",
            t_ms,
            snap.logical_pos,
            snap.logical_target,
            mode_name(snap.mode),
            snap.enabled,
            snap.speed_mph,
            snap.power_w,
        );
    }
}

fn build_sim_trainer(
    cfg: &trainer_config::Config,
    start_steps: i64,
    settings_dir: Option<&PathBuf>,
) -> eyre::Result<(Trainer, ManualClock)> {
    let motion: MotionCfg = (&cfg.motion).into();
    let sensor: SensorCfg = (&cfg.sensor).into();
    let (driver, limit) = sim_rig(start_steps);
    let clock = ManualClock::new();

    let mut builder = Trainer::builder()
        .with_step_driver(driver)
        .with_limit_switch(limit)
        .with_motion_cfg(motion)
        .with_sensor_cfg(sensor)
        .with_clock(Box::new(clock.clone()));
    if let Some(dir) = settings_dir {
        let store = FileStore::open(dir).wrap_err("open settings store")?;
        builder = builder.with_settings_store(store);
    }

    let mut trainer = builder.build()?;
    if settings_dir.is_some() {
        trainer.load_settings()?;
    }
    if let Some(curve) = &cfg.idle_curve {
        trainer.calibration_mut().idle = curve.into();
    }
    Ok((trainer, clock))
}

/// Drive ticks until homing leaves `InProgress`; errors if it failed.
fn home_to_completion(trainer: &mut Trainer, clock: &ManualClock) -> eyre::Result<()> {
    trainer.start_homing();
    let mut elapsed = 0;
    loop {
        clock.advance_us(TICK_US);
        elapsed += TICK_US;
        trainer.tick()?;
        match trainer.snapshot().homing {
            HomingStatus::InProgress => {}
            HomingStatus::Inactive => return Ok(()),
            HomingStatus::Failed => {
                return Err(eyre::Report::new(TrainerError::State(
                    "homing failed".into(),
                )));
            }
        }
        if elapsed > HOMING_CAP_US {
            return Err(eyre::Report::new(TrainerError::State(
                "homing did not terminate".into(),
            )));
        }
    }
}

fn apply_mode(trainer: &mut Trainer, mode: RideMode, watts: Option<u16>, grade: Option<f32>) {
    match mode {
        RideMode::Idle => trainer.set_mode(ControlMode::Idle),
        RideMode::Erg => trainer.set_erg_target(watts.unwrap_or(200)),
        RideMode::Sim => {
            let grade = grade.unwrap_or(2.0);
            trainer.set_sim_params(SimParams {
                grade_hundredths: (grade * 100.0).round() as i16,
                ..SimParams::default()
            });
        }
    }
}

/// Ride on the real rig: hall edges arrive from the sensor interrupt and
/// the loop runs in wall-clock time.
#[cfg(all(feature = "hardware", target_os = "linux"))]
#[allow(clippy::too_many_arguments)]
fn run_ride_hw(
    cfg: &trainer_config::Config,
    duration_s: u64,
    mode: RideMode,
    watts: Option<u16>,
    grade: Option<f32>,
    report_ms: u64,
    settings_dir: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<()> {
    use trainer_hardware::gpio::{GpioLimitSwitch, GpioStepDriver, HallEdgePin};

    let motion: MotionCfg = (&cfg.motion).into();
    let sensor: SensorCfg = (&cfg.sensor).into();
    let driver = GpioStepDriver::new(
        cfg.pins.motor_step,
        cfg.pins.motor_dir,
        cfg.pins.motor_en,
        true,
    )?;
    let limit = GpioLimitSwitch::new(cfg.pins.limit_in, cfg.hardware.limit_active_low)?;

    let mut builder = Trainer::builder()
        .with_step_driver(driver)
        .with_limit_switch(limit)
        .with_motion_cfg(motion)
        .with_sensor_cfg(sensor);
    if let Some(dir) = settings_dir.as_ref() {
        let store = FileStore::open(dir).wrap_err("open settings store")?;
        builder = builder.with_settings_store(store);
    }
    let mut trainer = builder.build()?;
    if settings_dir.is_some() {
        trainer.load_settings()?;
    }
    if let Some(curve) = &cfg.idle_curve {
        trainer.calibration_mut().idle = curve.into();
    }

    // The interrupt epoch and the sensor epoch are taken microseconds
    // apart; the constant skew is far below the edge intervals measured.
    let capture = trainer.hall_capture();
    let epoch = std::time::Instant::now();
    let _hall = HallEdgePin::new(cfg.pins.hall_in, cfg.hardware.hall_falling_edge, move || {
        capture.on_edge(epoch.elapsed().as_micros() as u64);
    })?;

    apply_mode(&mut trainer, mode, watts, grade);
    trainer.start_homing();
    tracing::info!(?mode, "hardware ride started");

    let mut next_report_us = trainer.now_us();
    let end_us = trainer.now_us() + duration_s * 1_000_000;
    while trainer.now_us() < end_us && !shutdown.load(Ordering::SeqCst) {
        trainer.tick()?;
        let now = trainer.now_us();
        if now >= next_report_us {
            print_snapshot(&trainer.snapshot(), now / 1000, json);
            next_report_us = now + report_ms * 1000;
        }
        std::thread::sleep(std::time::Duration::from_micros(TICK_US));
    }

    print_snapshot(&trainer.snapshot(), trainer.now_us() / 1000, json);
    if settings_dir.is_some() {
        trainer.save_settings()?;
    }
    trainer.stop();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn run_ride(
    cfg: &trainer_config::Config,
    duration_s: u64,
    speed_mph: f32,
    mode: RideMode,
    watts: Option<u16>,
    grade: Option<f32>,
    report_ms: u64,
    settings_dir: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<()> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let _ = speed_mph; // the real wheel sets the pace
        return run_ride_hw(
            cfg,
            duration_s,
            mode,
            watts,
            grade,
            report_ms,
            settings_dir,
            shutdown,
            json,
        );
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        run_ride_sim(
            cfg,
            duration_s,
            speed_mph,
            mode,
            watts,
            grade,
            report_ms,
            settings_dir,
            shutdown,
            json,
        )
    }
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
#[allow(clippy::too_many_arguments)]
fn run_ride_sim(
    cfg: &trainer_config::Config,
    duration_s: u64,
    speed_mph: f32,
    mode: RideMode,
    watts: Option<u16>,
    grade: Option<f32>,
    report_ms: u64,
    settings_dir: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<()> {
    let (mut trainer, clock) = build_sim_trainer(cfg, 300, settings_dir.as_ref())?;

    // Synthesized hall cadence for the requested wheel speed.
    let rpm = mph_to_rpm(speed_mph, cfg.sensor.roller_diameter_in);
    let pulses_per_sec = rpm / 60.0 * f32::from(cfg.sensor.pulses_per_rev);
    let edge_interval_us = if pulses_per_sec > 0.0 {
        (1_000_000.0 / pulses_per_sec) as u64
    } else {
        u64::MAX
    };

    apply_mode(&mut trainer, mode, watts, grade);

    home_to_completion(&mut trainer, &clock)?;
    tracing::info!(speed_mph, ?mode, "ride started");

    let capture = trainer.hall_capture();
    let mut next_edge_us = trainer.now_us() + edge_interval_us;
    let mut next_report_us = trainer.now_us();
    let end_us = trainer.now_us() + duration_s * 1_000_000;

    while trainer.now_us() < end_us && !shutdown.load(Ordering::SeqCst) {
        clock.advance_us(TICK_US);
        let now = trainer.now_us();
        while next_edge_us <= now {
            capture.on_edge(next_edge_us);
            next_edge_us += edge_interval_us;
        }
        trainer.tick()?;
        if now >= next_report_us {
            print_snapshot(&trainer.snapshot(), now / 1000, json);
            next_report_us = now + report_ms * 1000;
        }
    }

    print_snapshot(&trainer.snapshot(), trainer.now_us() / 1000, json);
    if settings_dir.is_some() {
        trainer.save_settings()?;
    }
    trainer.stop();
    Ok(())
}

pub fn run_home(cfg: &trainer_config::Config, start_steps: i64, json: bool) -> eyre::Result<()> {
    let (mut trainer, clock) = build_sim_trainer(cfg, start_steps, None)?;
    home_to_completion(&mut trainer, &clock)?;
    let snap = trainer.snapshot();
    if json {
        println!(
            "{}",
            serde_json::json!({ "homed": true, "pos": snap.logical_pos })
        );
    } else {
        println!("homed at logical position {}", snap.logical_pos);
    }
    Ok(())
}

pub fn run_lookup(table: TableName, speed: f64, at: f64, json: bool) -> eyre::Result<()> {
    let cal = trainer_core::CalibrationStore::new();
    let (name, value) = match table {
        TableName::Power => ("power_w", cal.power_watts(speed, at)),
        TableName::Erg => ("position", cal.erg_position(speed, at)),
        TableName::Sim => ("position", cal.sim_position(speed, at)),
    };
    if json {
        println!(
            "{}",
            serde_json::json!({ "speed_mph": speed, "at": at, name: value })
        );
    } else {
        println!("{name} = {value}");
    }
    Ok(())
}

pub fn run_self_check(cfg: &trainer_config::Config, json: bool) -> eyre::Result<()> {
    let (mut trainer, clock) = build_sim_trainer(cfg, 10, None)?;
    clock.advance_us(TICK_US);
    trainer.tick()?;
    if json {
        println!("{}", serde_json::json!({ "ok": true }));
    } else {
        println!("ok");
    }
    Ok(())
}
