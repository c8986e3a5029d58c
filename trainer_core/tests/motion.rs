use trainer_core::mocks::{SimLimitSwitch, SimStepDriver};
use trainer_core::{HomingStatus, MotionCfg, MotionController};

const TICK_US: u64 = 1000;
const RIDING_MPH: f32 = 10.0;

fn rig() -> (
    MotionController<SimStepDriver, SimLimitSwitch>,
    SimStepDriver,
    SimLimitSwitch,
) {
    let driver = SimStepDriver::new();
    let limit = SimLimitSwitch::new();
    let ctl = MotionController::new(driver.clone(), limit.clone(), MotionCfg::default());
    (ctl, driver, limit)
}

/// Run the homing sequence by scripting the switch: seek finds it after
/// 100 ticks, it releases once the final back-off is under way.
fn home(
    ctl: &mut MotionController<SimStepDriver, SimLimitSwitch>,
    limit: &SimLimitSwitch,
    now: &mut u64,
) {
    ctl.start_homing(*now);
    let mut ticks = 0u32;
    while ctl.homing_status() == HomingStatus::InProgress {
        *now += TICK_US;
        if ticks == 100 {
            limit.set_pressed(true);
        }
        if ticks == 160 {
            limit.set_pressed(false);
        }
        ctl.update(*now, 0.0).unwrap();
        ticks += 1;
        assert!(ticks < 50_000, "homing never terminated");
    }
    assert!(ctl.is_homed());
    assert_eq!(ctl.position_logical(), 0);
}

fn run_ticks(
    ctl: &mut MotionController<SimStepDriver, SimLimitSwitch>,
    now: &mut u64,
    n: u32,
    speed: f32,
) {
    for _ in 0..n {
        *now += TICK_US;
        ctl.update(*now, speed).unwrap();
    }
}

#[test]
fn reaches_target_within_deadband_and_stops() {
    let (mut ctl, driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 8000, RIDING_MPH);

    let pos = ctl.position_logical();
    assert!((pos - 500).abs() <= 6, "stopped at {pos}");

    // Settled: no further pulses.
    let before = driver.snapshot().pulses;
    run_ticks(&mut ctl, &mut now, 200, RIDING_MPH);
    assert_eq!(driver.snapshot().pulses, before);
}

#[test]
fn small_target_jitter_inside_deadband_is_ignored() {
    let (mut ctl, driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 8000, RIDING_MPH);
    let before = driver.snapshot().pulses;

    // Nudges below the on-deadband must not restart motion.
    for jitter in [505, 495, 503, 498] {
        ctl.set_target_logical(jitter);
        run_ticks(&mut ctl, &mut now, 100, RIDING_MPH);
    }
    assert_eq!(driver.snapshot().pulses, before);
}

#[test]
fn direction_reverses_to_chase_a_lower_target() {
    let (mut ctl, _driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(600);
    run_ticks(&mut ctl, &mut now, 9000, RIDING_MPH);
    assert!((ctl.position_logical() - 600).abs() <= 6);

    ctl.set_target_logical(100);
    run_ticks(&mut ctl, &mut now, 9000, RIDING_MPH);
    assert!((ctl.position_logical() - 100).abs() <= 6);
}

#[test]
fn slow_wheel_disables_after_holdoff() {
    let (mut ctl, driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 2000, RIDING_MPH);
    assert!(ctl.is_enabled());

    // Below 2.0 mph for longer than the 800 ms holdoff.
    run_ticks(&mut ctl, &mut now, 900, 1.0);
    assert!(!ctl.is_enabled());

    // Between the thresholds: still inhibited.
    run_ticks(&mut ctl, &mut now, 200, 2.1);
    assert!(!ctl.is_enabled());

    // Above the enable threshold motion resumes.
    run_ticks(&mut ctl, &mut now, 2000, 2.4);
    assert!(ctl.is_enabled());
}

#[test]
fn brief_speed_dip_does_not_disable() {
    let (mut ctl, _driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 2000, RIDING_MPH);

    // 300 ms under the disable threshold, then recovery.
    run_ticks(&mut ctl, &mut now, 300, 1.5);
    assert!(ctl.is_enabled());
    run_ticks(&mut ctl, &mut now, 100, RIDING_MPH);
    assert!(ctl.is_enabled());
}

#[test]
fn holding_current_cuts_after_idle_timeout() {
    let (mut ctl, _driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 3000, RIDING_MPH);
    // Still chasing the target: energized.
    assert!(ctl.is_enabled());

    // Finish the move, then sit at target past the 1.5 s idle-off window.
    run_ticks(&mut ctl, &mut now, 5000, RIDING_MPH);
    assert!((ctl.position_logical() - 500).abs() <= 6);
    assert!(!ctl.is_enabled());
}

#[test]
fn pending_rehome_keeps_the_motor_energized() {
    let (mut ctl, _driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 500, RIDING_MPH);
    assert!(ctl.position_logical() > 20);
    assert!(ctl.is_enabled());

    // Limit trip with the wheel stopped: the forced enable of the
    // pending recovery must win over the speed gate and idle-off.
    limit.set_pressed(true);
    run_ticks(&mut ctl, &mut now, 1000, 0.0);
    assert_eq!(ctl.homing_status(), HomingStatus::Inactive);
    assert!(ctl.is_enabled());
}

#[test]
fn error_between_deadbands_keeps_holding_current() {
    let (mut ctl, _driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 4000, RIDING_MPH);
    assert!((ctl.position_logical() - 500).abs() <= 6);
    assert!(ctl.is_enabled());

    // Nudge the target so the error sits between the off and on bands:
    // too small to move, too large to count as settled. The idle-off
    // timer must keep restarting and the motor must stay energized.
    ctl.set_target_logical(ctl.position_logical() + 10);
    run_ticks(&mut ctl, &mut now, 3000, RIDING_MPH);
    assert!(ctl.is_enabled());
}

#[test]
fn limit_trip_away_from_home_waits_out_the_cooldown() {
    let (mut ctl, _driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    // Move far enough from the switch that a press means lost steps.
    ctl.set_target_logical(500);
    run_ticks(&mut ctl, &mut now, 500, RIDING_MPH);
    assert!(ctl.position_logical() > 20);

    // Phantom switch hit shortly after homing: inside the 2 s cooldown,
    // the re-home is scheduled but must not start yet.
    limit.set_pressed(true);
    run_ticks(&mut ctl, &mut now, 50, RIDING_MPH);
    assert_eq!(ctl.homing_status(), HomingStatus::Inactive);

    // Once the cooldown since the last home elapses, it fires.
    run_ticks(&mut ctl, &mut now, 2000, RIDING_MPH);
    assert_eq!(ctl.homing_status(), HomingStatus::InProgress);
}

#[test]
fn target_is_clamped_to_logical_range() {
    let (mut ctl, _driver, limit) = rig();
    let mut now = 0;
    home(&mut ctl, &limit, &mut now);

    ctl.set_target_logical(4000);
    assert_eq!(ctl.target_logical(), 1000);
    ctl.set_target_logical(-50);
    assert_eq!(ctl.target_logical(), 0);
}
