//! Hall-sensor speed acquisition.
//!
//! `HallCapture` is the interrupt-side record: the edge callback performs a
//! short locked update and never blocks beyond it, and the main loop takes a
//! consistent (timestamp, interval) snapshot under the same lock — reading
//! the fields individually could pair an old interval with a new timestamp
//! and produce a bogus rate. On a hosted target the lock stands in for the
//! masked-interrupt critical section.
//!
//! `SpeedSensor` is the main-loop side: rate computation with a 1 s dropout
//! to zero, time-step-dependent EMA smoothing, and mph conversion.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use trainer_traits::clock::Clock;

use crate::config::SensorCfg;
use crate::units::{MICROS_PER_SEC, rpm_to_mph};

#[derive(Debug, Default)]
struct CaptureState {
    /// Timestamp of the last accepted edge (us since sensor epoch); 0 = none yet.
    last_edge_us: u64,
    /// Interval between the last two accepted edges; 0 until two edges seen.
    interval_us: u64,
    /// Cumulative accepted edge count.
    edges: u32,
}

/// Shared edge recorder fed from interrupt context.
#[derive(Debug)]
pub struct HallCapture {
    holdoff_us: u64,
    min_interval_us: u64,
    state: Mutex<CaptureState>,
}

impl HallCapture {
    pub fn new(holdoff_us: u64, min_interval_us: u64) -> Self {
        Self {
            holdoff_us,
            min_interval_us,
            state: Mutex::new(CaptureState::default()),
        }
    }

    pub fn from_cfg(cfg: &SensorCfg) -> Self {
        Self::new(cfg.holdoff_us, cfg.min_interval_us)
    }

    /// Record one sensor edge at `now_us`. Edges inside the holdoff window
    /// after the previous accepted edge, or closer than the minimum valid
    /// interval, are rejected (contact bounce).
    pub fn on_edge(&self, now_us: u64) {
        let Ok(mut st) = self.state.lock() else {
            return;
        };
        if st.last_edge_us != 0 {
            let since = now_us.saturating_sub(st.last_edge_us);
            if since < self.holdoff_us {
                return;
            }
            if since < self.min_interval_us {
                return;
            }
            st.interval_us = since;
        }
        st.last_edge_us = now_us;
        st.edges = st.edges.wrapping_add(1);
    }

    /// Consistent (last-edge timestamp, interval) pair.
    pub fn snapshot(&self) -> (u64, u64) {
        self.state
            .lock()
            .map(|st| (st.last_edge_us, st.interval_us))
            .unwrap_or((0, 0))
    }

    pub fn edge_count(&self) -> u32 {
        self.state.lock().map(|st| st.edges).unwrap_or(0)
    }
}

/// Main-loop speed estimator. Owns the smoothed value; everything else
/// reads it through `speed_mph()`.
pub struct SpeedSensor {
    capture: Arc<HallCapture>,
    cfg: SensorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    rpm_filtered: f32,
    last_filter_us: Option<u64>,
    speed_mph: f32,
}

impl SpeedSensor {
    pub fn new(
        capture: Arc<HallCapture>,
        cfg: SensorCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            capture,
            cfg,
            clock,
            epoch,
            rpm_filtered: 0.0,
            last_filter_us: None,
            speed_mph: 0.0,
        }
    }

    /// The shared capture record, for wiring into an interrupt callback.
    pub fn capture(&self) -> Arc<HallCapture> {
        Arc::clone(&self.capture)
    }

    /// Microseconds since the sensor epoch; the unit `on_edge` expects.
    pub fn now_us(&self) -> u64 {
        self.clock.us_since(self.epoch)
    }

    /// Poll the capture record, refresh the smoothed RPM and speed.
    /// Returns the new speed in mph. Missing or stale data degrades to
    /// zero; this never fails.
    pub fn update(&mut self) -> f32 {
        let now_us = self.clock.us_since(self.epoch);
        let raw_rpm = self.read_rpm(now_us);
        let rpm = self.filter_rpm(raw_rpm, now_us);
        self.speed_mph = rpm_to_mph(rpm, self.cfg.roller_diameter_in);
        self.speed_mph
    }

    pub fn speed_mph(&self) -> f32 {
        self.speed_mph
    }

    pub fn rpm(&self) -> f32 {
        self.rpm_filtered
    }

    fn read_rpm(&self, now_us: u64) -> f32 {
        let (last, interval) = self.capture.snapshot();
        if last == 0 || interval == 0 {
            return 0.0;
        }
        if now_us.saturating_sub(last) > self.cfg.dropout_us {
            // Stopped for over a second
            return 0.0;
        }
        let pps = MICROS_PER_SEC as f32 / interval as f32;
        let rps = pps / f32::from(self.cfg.pulses_per_rev);
        rps * 60.0
    }

    fn filter_rpm(&mut self, raw: f32, now_us: u64) -> f32 {
        let Some(prev_us) = self.last_filter_us else {
            // First sample seeds the filter directly
            self.last_filter_us = Some(now_us);
            self.rpm_filtered = raw;
            return raw;
        };
        let dt = now_us.saturating_sub(prev_us) as f32 / MICROS_PER_SEC as f32;
        self.last_filter_us = Some(now_us);

        let alpha = dt / (self.cfg.filter_tau_s + dt);
        self.rpm_filtered = alpha * raw + (1.0 - alpha) * self.rpm_filtered;
        self.rpm_filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdoff_rejects_chatter() {
        let cap = HallCapture::new(3000, 1500);
        cap.on_edge(10_000);
        cap.on_edge(11_000); // inside holdoff
        cap.on_edge(12_000); // inside holdoff
        assert_eq!(cap.edge_count(), 1);
        cap.on_edge(30_000);
        assert_eq!(cap.edge_count(), 2);
        assert_eq!(cap.snapshot(), (30_000, 20_000));
    }

    #[test]
    fn first_edge_produces_no_interval() {
        let cap = HallCapture::new(3000, 1500);
        cap.on_edge(5_000);
        assert_eq!(cap.snapshot(), (5_000, 0));
    }
}
