use trainer_core::mocks::{MemoryStore, SimLimitSwitch, SimStepDriver};
use trainer_core::{ControlMode, HomingStatus, SimParams, Trainer};
use trainer_traits::ManualClock;

const TICK_US: u64 = 1000;

// Hall cadence for roughly 10 mph: 10 mph is ~1034 roller rpm, which at
// 6 pulses/rev is ~103 pulses/sec.
const EDGE_INTERVAL_US: u64 = 9670;

fn sim_trainer() -> (Trainer, SimLimitSwitch, ManualClock) {
    let driver = SimStepDriver::new();
    let limit = SimLimitSwitch::new();
    let clock = ManualClock::new();
    let trainer = Trainer::builder()
        .with_step_driver(driver)
        .with_limit_switch(limit.clone())
        .with_settings_store(MemoryStore::new())
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("build trainer");
    (trainer, limit, clock)
}

/// Script the limit switch through a full homing run.
fn home(trainer: &mut Trainer, limit: &SimLimitSwitch, clock: &ManualClock) {
    trainer.start_homing();
    let mut ticks = 0u32;
    while trainer.snapshot().homing == HomingStatus::InProgress {
        clock.advance_us(TICK_US);
        if ticks == 100 {
            limit.set_pressed(true);
        }
        if ticks == 160 {
            limit.set_pressed(false);
        }
        trainer.tick().unwrap();
        ticks += 1;
        assert!(ticks < 50_000, "homing never terminated");
    }
    assert_eq!(trainer.snapshot().logical_pos, 0);
}

/// Run `n` ticks while injecting hall edges at the ride cadence.
fn ride_ticks(trainer: &mut Trainer, clock: &ManualClock, n: u32, next_edge_us: &mut u64) {
    let capture = trainer.hall_capture();
    for _ in 0..n {
        clock.advance_us(TICK_US);
        let now = trainer.now_us();
        while *next_edge_us <= now {
            capture.on_edge(*next_edge_us);
            *next_edge_us += EDGE_INTERVAL_US;
        }
        trainer.tick().unwrap();
    }
}

#[test]
fn erg_ride_settles_on_the_table_position() {
    let (mut trainer, limit, clock) = sim_trainer();
    home(&mut trainer, &limit, &clock);

    trainer.set_erg_target(200);
    let mut next_edge = trainer.now_us();

    // Let the speed estimate converge, then the carriage chase the target.
    ride_ticks(&mut trainer, &clock, 12_000, &mut next_edge);

    let snap = trainer.snapshot();
    assert_eq!(snap.mode, ControlMode::Erg);
    assert!(
        (snap.speed_mph - 10.0).abs() < 0.5,
        "speed {}",
        snap.speed_mph
    );
    // ERG table at (10 mph, 200 W) is 442; allow the deadband.
    assert!(
        (snap.logical_pos - 442).abs() <= 12,
        "pos {}",
        snap.logical_pos
    );
    assert!(snap.power_w > 0);
}

#[test]
fn manual_hold_overrides_erg_until_cleared() {
    let (mut trainer, limit, clock) = sim_trainer();
    home(&mut trainer, &limit, &clock);

    trainer.set_erg_target(200);
    trainer.set_manual_hold(700);
    let mut next_edge = trainer.now_us();
    ride_ticks(&mut trainer, &clock, 12_000, &mut next_edge);
    let snap = trainer.snapshot();
    assert_eq!(snap.manual_hold, Some(700));
    assert!((snap.logical_pos - 700).abs() <= 12, "pos {}", snap.logical_pos);

    trainer.clear_manual_hold();
    ride_ticks(&mut trainer, &clock, 8_000, &mut next_edge);
    let snap = trainer.snapshot();
    assert_eq!(snap.manual_hold, None);
    assert!((snap.logical_pos - 442).abs() <= 12, "pos {}", snap.logical_pos);
}

#[test]
fn sim_mode_grade_drives_the_carriage() {
    let (mut trainer, limit, clock) = sim_trainer();
    home(&mut trainer, &limit, &clock);

    // 5 % grade as hundredths, the head-unit encoding.
    trainer.set_sim_params(SimParams {
        grade_hundredths: 500,
        ..SimParams::default()
    });
    let mut next_edge = trainer.now_us();
    ride_ticks(&mut trainer, &clock, 12_000, &mut next_edge);

    let snap = trainer.snapshot();
    assert_eq!(snap.mode, ControlMode::Sim);
    // SIM table near (10 mph, 5 %) sits midway between 500 and 667.
    assert!(
        snap.logical_pos > 500 && snap.logical_pos < 650,
        "pos {}",
        snap.logical_pos
    );
}

#[test]
fn stopped_wheel_keeps_the_motor_released() {
    let (mut trainer, limit, clock) = sim_trainer();
    home(&mut trainer, &limit, &clock);

    trainer.set_erg_target(200);
    // No hall edges at all: resolved speed stays zero.
    for _ in 0..3000 {
        clock.advance_us(TICK_US);
        trainer.tick().unwrap();
    }
    let snap = trainer.snapshot();
    assert!(!snap.enabled);
    assert_eq!(snap.speed_mph, 0.0);
}

#[test]
fn settings_round_trip_through_the_store() {
    let (mut trainer, _limit, _clock) = sim_trainer();

    trainer.calibration_mut().idle.b = 11.0;
    trainer.calibration_mut().erg_table_mut().set(2, 3, 555.0);
    trainer.save_settings().expect("save");

    // Wipe in-memory state, then load back.
    trainer.calibration_mut().reset_idle();
    trainer.calibration_mut().erg_table_mut().reset();
    trainer.load_settings().expect("load");

    assert_eq!(trainer.calibration().idle.b, 11.0);
    assert_eq!(trainer.calibration().erg_table().get(2, 3), Some(555.0));
}
