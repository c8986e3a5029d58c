use std::sync::Arc;

use trainer_core::{HallCapture, SensorCfg, SpeedSensor};
use trainer_traits::ManualClock;

// 20 ms between pulses at 6 pulses/rev = 500 rpm on the roller,
// about 4.83 mph with the 3.25 in diameter.
const EDGE_INTERVAL_US: u64 = 20_000;
const EXPECTED_MPH: f32 = 4.834;

fn sensor_rig() -> (SpeedSensor, Arc<HallCapture>, ManualClock) {
    let cfg = SensorCfg::default();
    let capture = Arc::new(HallCapture::from_cfg(&cfg));
    let clock = ManualClock::new();
    let sensor = SpeedSensor::new(Arc::clone(&capture), cfg, Arc::new(clock.clone()));
    (sensor, capture, clock)
}

#[test]
fn steady_cadence_converges_to_wheel_speed() {
    let (mut sensor, capture, clock) = sensor_rig();

    // 5 s of steady edges with an update per edge.
    for _ in 0..250 {
        clock.advance_us(EDGE_INTERVAL_US);
        capture.on_edge(sensor.now_us());
        sensor.update();
    }

    let mph = sensor.speed_mph();
    assert!(
        (mph - EXPECTED_MPH).abs() < 0.05,
        "speed {mph} did not converge to {EXPECTED_MPH}"
    );
}

#[test]
fn first_edge_alone_reads_zero() {
    let (mut sensor, capture, clock) = sensor_rig();

    clock.advance_us(10_000);
    capture.on_edge(sensor.now_us());
    assert_eq!(sensor.update(), 0.0);

    // Second edge establishes an interval.
    clock.advance_us(EDGE_INTERVAL_US);
    capture.on_edge(sensor.now_us());
    assert!(sensor.update() > 0.0);
}

#[test]
fn dropout_decays_to_zero() {
    let (mut sensor, capture, clock) = sensor_rig();

    for _ in 0..100 {
        clock.advance_us(EDGE_INTERVAL_US);
        capture.on_edge(sensor.now_us());
        sensor.update();
    }
    assert!(sensor.speed_mph() > 1.0);

    // Wheel stops: no edges for longer than the dropout window.
    clock.advance_us(1_100_000);
    sensor.update();
    // The raw reading is zero; the filter needs a few more updates to bleed off.
    for _ in 0..20 {
        clock.advance_us(500_000);
        sensor.update();
    }
    assert!(sensor.speed_mph() < 0.2);
}

#[test]
fn chatter_within_holdoff_does_not_inflate_speed() {
    let (mut sensor, capture, clock) = sensor_rig();

    for _ in 0..100 {
        clock.advance_us(EDGE_INTERVAL_US);
        let now = sensor.now_us();
        capture.on_edge(now);
        // Bounce 1 ms after the real edge, inside the holdoff window.
        capture.on_edge(now + 1000);
        sensor.update();
    }

    let mph = sensor.speed_mph();
    assert!(
        (mph - EXPECTED_MPH).abs() < 0.05,
        "bounced edges skewed speed to {mph}"
    );
}
