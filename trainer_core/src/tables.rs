//! Calibration tables and bilinear interpolation.
//!
//! Three independent 2-D grids share one lookup algorithm but differ in
//! axes and out-of-range policy:
//!
//! - Power: (speed mph, logical position) -> watts; out of range -> 0
//! - ERG:   (speed mph, target watts) -> position; out of range -> 0
//! - SIM:   (speed mph, grade %) -> position; grade is clamped into range,
//!   an out-of-range speed falls back to mid-scale (a grade command must
//!   always resolve to *some* position)
//!
//! Cell values are user-editable and persist as fixed-size f64-LE blobs;
//! axis arrays are fixed. A stored blob of the wrong size is silently
//! ignored and the defaults retained.

use trainer_traits::SettingsStore;

use crate::units::{LOGICAL_MAX, LOGICAL_MIN};

// Axes (monotonically ascending, never empty).
pub const POWER_SPEED_AXIS: [f64; 7] = [0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 50.0];
pub const POWER_POS_AXIS: [f64; 5] = [0.0, 250.0, 500.0, 750.0, 1000.0];

pub const ERG_SPEED_AXIS: [f64; 7] = [0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 50.0];
pub const ERG_WATTS_AXIS: [f64; 9] = [
    0.0, 100.0, 150.0, 200.0, 250.0, 300.0, 400.0, 600.0, 1000.0,
];

pub const SIM_SPEED_AXIS: [f64; 8] = [0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 50.0];
pub const SIM_GRADE_AXIS: [f64; 7] = [-4.0, 0.0, 2.0, 4.0, 6.0, 8.0, 10.0];

/// Returned for a SIM lookup whose speed is outside the axis range.
pub const SIM_SPEED_FALLBACK_POS: f64 = 500.0;

// Default matrices, [speed][other-axis], from bench calibration runs.
const DEFAULT_POWER_TABLE: [[f64; 5]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [52.0, 68.0, 80.0, 102.0, 124.0],
    [117.0, 143.0, 217.0, 280.0, 343.0],
    [188.0, 246.0, 383.0, 490.0, 597.0],
    [265.0, 380.0, 580.0, 732.0, 884.0],
    [349.0, 544.0, 806.0, 1006.0, 1206.0],
    [861.0, 1806.0, 2388.0, 2856.0, 3324.0],
];

const DEFAULT_ERG_TABLE: [[f64; 9]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 739.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0, 1000.0],
    [0.0, 0.0, 212.0, 442.0, 651.0, 841.0, 1000.0, 1000.0, 1000.0],
    [0.0, 0.0, 0.0, 70.0, 198.0, 322.0, 560.0, 996.0, 1000.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 79.0, 238.0, 552.0, 1000.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 67.0, 285.0, 745.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 26.0],
];

const DEFAULT_SIM_TABLE: [[f64; 7]; 8] = [
    [0.0, 167.0, 333.0, 500.0, 667.0, 833.0, 1000.0],
    [0.0, 167.0, 333.0, 500.0, 667.0, 833.0, 1000.0],
    [0.0, 167.0, 333.0, 500.0, 667.0, 833.0, 1000.0],
    [0.0, 167.0, 333.0, 500.0, 667.0, 833.0, 1000.0],
    [0.0, 167.0, 333.0, 500.0, 667.0, 833.0, 1000.0],
    [167.0, 333.0, 500.0, 677.0, 834.0, 1000.0, 1000.0],
    [333.0, 500.0, 677.0, 834.0, 1000.0, 1000.0, 1000.0],
    [500.0, 500.0, 677.0, 834.0, 1000.0, 1000.0, 1000.0],
];

// Settings-store keys (original NVS layout).
pub const KEY_POWER_TABLE: &str = "powerTbl";
pub const KEY_ERG_TABLE: &str = "ergTbl";
pub const KEY_SIM_TABLE: &str = "simTbl";
pub const KEY_IDLE_A: &str = "idleA";
pub const KEY_IDLE_B: &str = "idleB";
pub const KEY_IDLE_C: &str = "idleC";
pub const KEY_IDLE_D: &str = "idleD";

/// What a lookup does when a query coordinate leaves the axis range.
#[derive(Debug, Clone, Copy)]
pub enum OorPolicy {
    /// Either coordinate out of range returns 0 (out-of-range signal).
    Zero,
    /// Clamp the second coordinate into range; an out-of-range first
    /// coordinate returns `x_default` instead.
    ClampY { x_default: f64 },
}

/// One named 2-D calibration grid with its axes and range policy.
#[derive(Debug, Clone)]
pub struct CalTable {
    name: &'static str,
    xs: &'static [f64],
    ys: &'static [f64],
    values: Vec<f64>,
    defaults: Vec<f64>,
    policy: OorPolicy,
}

/// Largest index i such that axis[i] <= q, capped at len-2 so the cell
/// (i, i+1) always exists. Axes are tiny, a backward scan is fine.
fn cell_index(axis: &[f64], q: f64) -> usize {
    for i in (0..axis.len() - 1).rev() {
        if q >= axis[i] {
            return i;
        }
    }
    0
}

impl CalTable {
    fn new(
        name: &'static str,
        xs: &'static [f64],
        ys: &'static [f64],
        defaults: Vec<f64>,
        policy: OorPolicy,
    ) -> Self {
        debug_assert_eq!(defaults.len(), xs.len() * ys.len());
        Self {
            name,
            xs,
            ys,
            values: defaults.clone(),
            defaults,
            policy,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn rows(&self) -> usize {
        self.xs.len()
    }
    pub fn cols(&self) -> usize {
        self.ys.len()
    }
    pub fn x_axis(&self) -> &[f64] {
        self.xs
    }
    pub fn y_axis(&self) -> &[f64] {
        self.ys
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows() && col < self.cols() {
            Some(self.values[row * self.cols() + col])
        } else {
            None
        }
    }

    /// Edit one cell; out-of-range indices are ignored. Returns whether
    /// the write landed.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> bool {
        if row < self.rows() && col < self.cols() {
            let cols = self.cols();
            self.values[row * cols + col] = value;
            true
        } else {
            false
        }
    }

    /// Restore the hard-coded default matrix.
    pub fn reset(&mut self) {
        self.values.copy_from_slice(&self.defaults);
        tracing::info!(table = self.name, "calibration table reset to defaults");
    }

    /// Bilinear interpolation at (x, y) under this table's range policy.
    pub fn lookup(&self, x: f64, y: f64) -> f64 {
        let (x, y) = match self.policy {
            OorPolicy::Zero => {
                if x < self.xs[0] || x > self.xs[self.xs.len() - 1] {
                    tracing::debug!(table = self.name, x, "lookup x out of range");
                    return 0.0;
                }
                if y < self.ys[0] || y > self.ys[self.ys.len() - 1] {
                    tracing::debug!(table = self.name, y, "lookup y out of range");
                    return 0.0;
                }
                (x, y)
            }
            OorPolicy::ClampY { x_default } => {
                if x < self.xs[0] || x > self.xs[self.xs.len() - 1] {
                    tracing::debug!(table = self.name, x, "lookup x out of range");
                    return x_default;
                }
                (x, y.clamp(self.ys[0], self.ys[self.ys.len() - 1]))
            }
        };

        let xi = cell_index(self.xs, x);
        let yi = cell_index(self.ys, y);

        let (x1, x2) = (self.xs[xi], self.xs[xi + 1]);
        let (y1, y2) = (self.ys[yi], self.ys[yi + 1]);

        let cols = self.cols();
        let q11 = self.values[xi * cols + yi];
        let q12 = self.values[xi * cols + yi + 1];
        let q21 = self.values[(xi + 1) * cols + yi];
        let q22 = self.values[(xi + 1) * cols + yi + 1];

        // Interpolate in x, then in y
        let fxy1 = ((x2 - x) / (x2 - x1)) * q11 + ((x - x1) / (x2 - x1)) * q21;
        let fxy2 = ((x2 - x) / (x2 - x1)) * q12 + ((x - x1) / (x2 - x1)) * q22;
        ((y2 - y) / (y2 - y1)) * fxy1 + ((y - y1) / (y2 - y1)) * fxy2
    }

    /// Serialize cell values as a fixed-size f64-LE blob (row-major).
    pub fn to_blob(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * 8);
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Load cell values from a blob. A size mismatch leaves the current
    /// values untouched and returns false (stale persisted layout).
    pub fn load_blob(&mut self, blob: &[u8]) -> bool {
        if blob.len() != self.values.len() * 8 {
            return false;
        }
        for (i, chunk) in blob.chunks_exact(8).enumerate() {
            let arr: [u8; 8] = match chunk.try_into() {
                Ok(a) => a,
                Err(_) => return false,
            };
            self.values[i] = f64::from_le_bytes(arr);
        }
        true
    }
}

/// Cubic idle-position curve: pos = a + b*v + c*v^2 + d*v^3, with the
/// speed clamped to [0, 50] mph and the result clamped to the logical range.
#[derive(Debug, Clone, Copy)]
pub struct IdleCurve {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Default for IdleCurve {
    fn default() -> Self {
        Self {
            a: 0.0,
            b: 8.0,
            c: 0.5,
            d: 0.0,
        }
    }
}

impl IdleCurve {
    pub fn position_for(&self, speed_mph: f32) -> i32 {
        let v = if speed_mph.is_finite() {
            speed_mph.clamp(0.0, 50.0)
        } else {
            0.0
        };
        let pos = self.a + self.b * v + self.c * v * v + self.d * v * v * v;
        (pos.round() as i32).clamp(LOGICAL_MIN, LOGICAL_MAX)
    }
}

/// Owns the three calibration tables and the idle curve; the single source
/// of truth for every position/power lookup.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    power: CalTable,
    erg: CalTable,
    sim: CalTable,
    pub idle: IdleCurve,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationStore {
    pub fn new() -> Self {
        let power_defaults: Vec<f64> = DEFAULT_POWER_TABLE.iter().flatten().copied().collect();
        let erg_defaults: Vec<f64> = DEFAULT_ERG_TABLE.iter().flatten().copied().collect();
        let sim_defaults: Vec<f64> = DEFAULT_SIM_TABLE.iter().flatten().copied().collect();
        Self {
            power: CalTable::new(
                "power",
                &POWER_SPEED_AXIS,
                &POWER_POS_AXIS,
                power_defaults,
                OorPolicy::Zero,
            ),
            erg: CalTable::new(
                "erg",
                &ERG_SPEED_AXIS,
                &ERG_WATTS_AXIS,
                erg_defaults,
                OorPolicy::Zero,
            ),
            sim: CalTable::new(
                "sim",
                &SIM_SPEED_AXIS,
                &SIM_GRADE_AXIS,
                sim_defaults,
                OorPolicy::ClampY {
                    x_default: SIM_SPEED_FALLBACK_POS,
                },
            ),
            idle: IdleCurve::default(),
        }
    }

    /// Estimated power in watts at (speed, logical position).
    pub fn power_watts(&self, speed_mph: f64, logical_pos: f64) -> f64 {
        self.power.lookup(speed_mph, logical_pos)
    }

    /// ERG-mode position for (speed, target watts).
    pub fn erg_position(&self, speed_mph: f64, target_watts: f64) -> f64 {
        self.erg.lookup(speed_mph, target_watts)
    }

    /// SIM-mode position for (speed, grade %). Grade is clamped into the
    /// axis range; an out-of-range speed yields mid-scale.
    pub fn sim_position(&self, speed_mph: f64, grade_percent: f64) -> f64 {
        self.sim.lookup(speed_mph, grade_percent)
    }

    pub fn power_table(&self) -> &CalTable {
        &self.power
    }
    pub fn power_table_mut(&mut self) -> &mut CalTable {
        &mut self.power
    }
    pub fn erg_table(&self) -> &CalTable {
        &self.erg
    }
    pub fn erg_table_mut(&mut self) -> &mut CalTable {
        &mut self.erg
    }
    pub fn sim_table(&self) -> &CalTable {
        &self.sim
    }
    pub fn sim_table_mut(&mut self) -> &mut CalTable {
        &mut self.sim
    }

    /// Load idle-curve coefficients and tables from the settings store.
    /// Absent keys or wrongly-sized blobs fall back to defaults; never fails.
    pub fn load(&mut self, store: &mut dyn SettingsStore) {
        let defaults = IdleCurve::default();
        self.idle.a = store.get_f32(KEY_IDLE_A).unwrap_or(defaults.a);
        self.idle.b = store.get_f32(KEY_IDLE_B).unwrap_or(defaults.b);
        self.idle.c = store.get_f32(KEY_IDLE_C).unwrap_or(defaults.c);
        self.idle.d = store.get_f32(KEY_IDLE_D).unwrap_or(defaults.d);

        for (key, table) in [
            (KEY_POWER_TABLE, &mut self.power),
            (KEY_ERG_TABLE, &mut self.erg),
            (KEY_SIM_TABLE, &mut self.sim),
        ] {
            match store.get_blob(key) {
                Some(blob) if table.load_blob(&blob) => {
                    tracing::info!(table = table.name(), "calibration table loaded");
                }
                Some(blob) => {
                    tracing::warn!(
                        table = table.name(),
                        len = blob.len(),
                        "stored table size mismatch, keeping defaults"
                    );
                }
                None => {}
            }
        }
    }

    /// Persist the idle-curve coefficients.
    pub fn save_idle(&self, store: &mut dyn SettingsStore) -> eyre::Result<()> {
        for (key, v) in [
            (KEY_IDLE_A, self.idle.a),
            (KEY_IDLE_B, self.idle.b),
            (KEY_IDLE_C, self.idle.c),
            (KEY_IDLE_D, self.idle.d),
        ] {
            store
                .put_f32(key, v)
                .map_err(|e| eyre::eyre!("save {key}: {e}"))?;
        }
        Ok(())
    }

    /// Persist all three tables as opaque blobs.
    pub fn save_tables(&self, store: &mut dyn SettingsStore) -> eyre::Result<()> {
        for (key, table) in [
            (KEY_POWER_TABLE, &self.power),
            (KEY_ERG_TABLE, &self.erg),
            (KEY_SIM_TABLE, &self.sim),
        ] {
            store
                .put_blob(key, &table.to_blob())
                .map_err(|e| eyre::eyre!("save {key}: {e}"))?;
        }
        Ok(())
    }

    /// Restore the idle curve to compile-time defaults.
    pub fn reset_idle(&mut self) {
        self.idle = IdleCurve::default();
        tracing::info!("idle curve reset to defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_points_are_exact() {
        let store = CalibrationStore::new();
        assert_eq!(store.power_watts(15.0, 750.0), 490.0);
        assert_eq!(store.erg_position(10.0, 200.0), 442.0);
        assert_eq!(store.sim_position(25.0, 4.0), 677.0);
    }

    #[test]
    fn axis_maxima_are_inclusive() {
        let store = CalibrationStore::new();
        assert_eq!(store.power_watts(50.0, 1000.0), 3324.0);
        assert_eq!(store.erg_position(50.0, 1000.0), 26.0);
    }

    #[test]
    fn cell_index_scans_backward() {
        assert_eq!(cell_index(&POWER_SPEED_AXIS, 0.0), 0);
        assert_eq!(cell_index(&POWER_SPEED_AXIS, 7.2), 1);
        assert_eq!(cell_index(&POWER_SPEED_AXIS, 50.0), 5);
    }

    #[test]
    fn blob_round_trip_preserves_edits() {
        let mut store = CalibrationStore::new();
        assert!(store.power_table_mut().set(1, 1, 99.5));
        let blob = store.power_table().to_blob();
        let mut other = CalibrationStore::new();
        assert!(other.power_table_mut().load_blob(&blob));
        assert_eq!(other.power_table().get(1, 1), Some(99.5));
    }

    #[test]
    fn wrong_size_blob_is_ignored() {
        let mut store = CalibrationStore::new();
        assert!(!store.power_table_mut().load_blob(&[0u8; 16]));
        assert_eq!(store.power_watts(15.0, 750.0), 490.0);
    }
}
