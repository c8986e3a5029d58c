//! Engineering-unit conversions shared across the engine.
//!
//! Logical position is the resistance scale 0..=1000; physical position is
//! the actuator's native microstep count. The mapping is linear and rounded,
//! so round-trips are bounded by the scale ratio but not lossless.

/// Logical resistance scale bounds.
pub const LOGICAL_MIN: i32 = 0;
pub const LOGICAL_MAX: i32 = 1000;

/// Default physical travel in microsteps (870 full steps x 8).
pub const DEFAULT_PHYS_MAX_STEPS: i32 = 6960;

pub const MICROS_PER_SEC: u64 = 1_000_000;

const INCHES_PER_MILE: f32 = 63_360.0;
const MINUTES_PER_HOUR: f32 = 60.0;

/// Integer division rounded to nearest, ties away from zero.
#[inline]
fn div_round_nearest_i64(num: i64, den: i64) -> i64 {
    debug_assert!(den > 0, "div_round_nearest_i64: denominator must be > 0");
    if num >= 0 {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    }
}

/// Map a logical position onto physical steps: `logical * phys_max / 1000`,
/// rounded. Input is clamped to the logical range first.
#[inline]
pub fn logical_to_steps(logical: i32, phys_max: i32) -> i32 {
    let l = logical.clamp(LOGICAL_MIN, LOGICAL_MAX);
    div_round_nearest_i64(i64::from(l) * i64::from(phys_max), i64::from(LOGICAL_MAX)) as i32
}

/// Inverse mapping; clamps to the physical range first. Not guaranteed to
/// round-trip losslessly with `logical_to_steps`.
#[inline]
pub fn steps_to_logical(steps: i32, phys_max: i32) -> i32 {
    let s = steps.clamp(0, phys_max);
    div_round_nearest_i64(i64::from(s) * i64::from(LOGICAL_MAX), i64::from(phys_max)) as i32
}

/// mph per RPM for a given roller diameter in inches.
#[inline]
fn rpm_to_mph_factor(roller_diameter_in: f32) -> f32 {
    (roller_diameter_in * core::f32::consts::PI * MINUTES_PER_HOUR) / INCHES_PER_MILE
}

/// Roller RPM to road speed. Non-positive input yields zero.
#[inline]
pub fn rpm_to_mph(rpm: f32, roller_diameter_in: f32) -> f32 {
    if rpm <= 0.0 {
        return 0.0;
    }
    rpm * rpm_to_mph_factor(roller_diameter_in)
}

/// Road speed to roller RPM; exact inverse of `rpm_to_mph` for positive input.
#[inline]
pub fn mph_to_rpm(mph: f32, roller_diameter_in: f32) -> f32 {
    if mph <= 0.0 {
        return 0.0;
    }
    mph / rpm_to_mph_factor(roller_diameter_in)
}

/// Convert a step rate to a pulse interval in microseconds, clamping the
/// rate into `[min_sps, max_sps]` to avoid pathological intervals.
#[inline]
pub fn sps_to_interval_us(sps: f32, min_sps: f32, max_sps: f32) -> u64 {
    let s = sps.clamp(min_sps, max_sps);
    (MICROS_PER_SEC as f32 / s + 0.5) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_extremes_map_to_physical_extremes() {
        assert_eq!(logical_to_steps(0, DEFAULT_PHYS_MAX_STEPS), 0);
        assert_eq!(
            logical_to_steps(1000, DEFAULT_PHYS_MAX_STEPS),
            DEFAULT_PHYS_MAX_STEPS
        );
        assert_eq!(steps_to_logical(0, DEFAULT_PHYS_MAX_STEPS), 0);
        assert_eq!(
            steps_to_logical(DEFAULT_PHYS_MAX_STEPS, DEFAULT_PHYS_MAX_STEPS),
            1000
        );
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        assert_eq!(logical_to_steps(-5, DEFAULT_PHYS_MAX_STEPS), 0);
        assert_eq!(
            logical_to_steps(20_000, DEFAULT_PHYS_MAX_STEPS),
            DEFAULT_PHYS_MAX_STEPS
        );
        assert_eq!(steps_to_logical(-1, DEFAULT_PHYS_MAX_STEPS), 0);
    }

    #[test]
    fn conversions_are_symmetric() {
        let rpm = 312.5_f32;
        let mph = rpm_to_mph(rpm, 3.25);
        let back = mph_to_rpm(mph, 3.25);
        assert!((back - rpm).abs() < 1e-3);
        assert_eq!(rpm_to_mph(-1.0, 3.25), 0.0);
        assert_eq!(mph_to_rpm(0.0, 3.25), 0.0);
    }

    #[test]
    fn interval_clamps_speed_range() {
        // 2500 sps -> 400 us
        assert_eq!(sps_to_interval_us(2500.0, 50.0, 5000.0), 400);
        // Below min clamps to 50 sps -> 20 ms
        assert_eq!(sps_to_interval_us(1.0, 50.0, 5000.0), 20_000);
        // Above max clamps to 5000 sps -> 200 us
        assert_eq!(sps_to_interval_us(1e9, 50.0, 5000.0), 200);
    }
}
