//! In-memory hardware doubles for tests and the simulated CLI mode.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use trainer_traits::{LimitSwitch, SettingsStore, StepDriver};

/// Observable driver state shared with the test body.
#[derive(Debug, Default, Clone)]
pub struct DriverState {
    pub enabled: bool,
    pub forward: bool,
    pub pulses: u64,
}

/// Step driver that records every call instead of toggling pins.
#[derive(Debug, Clone, Default)]
pub struct SimStepDriver {
    state: Arc<Mutex<DriverState>>,
}

impl SimStepDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for asserting on driver activity from outside.
    pub fn state(&self) -> Arc<Mutex<DriverState>> {
        Arc::clone(&self.state)
    }

    pub fn snapshot(&self) -> DriverState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl StepDriver for SimStepDriver {
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut s) = self.state.lock() {
            s.forward = forward;
        }
        Ok(())
    }

    fn pulse(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut s) = self.state.lock() {
            s.pulses += 1;
        }
        Ok(())
    }

    fn set_enabled(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut s) = self.state.lock() {
            s.enabled = on;
        }
        Ok(())
    }
}

/// Limit switch whose state the test flips through a shared flag.
#[derive(Debug, Clone, Default)]
pub struct SimLimitSwitch {
    pressed: Arc<AtomicBool>,
}

impl SimLimitSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.pressed)
    }

    pub fn set_pressed(&self, pressed: bool) {
        self.pressed.store(pressed, Ordering::SeqCst);
    }
}

impl LimitSwitch for SimLimitSwitch {
    fn is_pressed(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.pressed.load(Ordering::SeqCst))
    }
}

/// Volatile key/value settings store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get_blob(&mut self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).cloned()
    }

    fn put_blob(
        &mut self,
        key: &str,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.blobs.insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }
}
