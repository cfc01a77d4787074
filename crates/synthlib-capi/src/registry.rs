//! Open-device registry.
//!
//! C callers address instruments by serial number (USB) or by the IP
//! address string they connected with (Ethernet). The registry maps that
//! key to the open driver. The lock is held only for lookups and inserts,
//! never across instrument IO.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use synthlib_core::{Error, Result, Synthesizer};

type Devices = HashMap<String, Arc<dyn Synthesizer>>;

static DEVICES: OnceLock<Mutex<Devices>> = OnceLock::new();

fn devices() -> MutexGuard<'static, Devices> {
    DEVICES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn normalize(key: &str) -> &str {
    key.trim()
}

/// Register an open device, replacing any previous entry for `key`.
/// Returns the replaced device so the caller can close it.
pub fn insert(key: &str, synth: Arc<dyn Synthesizer>) -> Option<Arc<dyn Synthesizer>> {
    devices().insert(normalize(key).to_string(), synth)
}

/// Look up an open device.
pub fn get(key: &str) -> Result<Arc<dyn Synthesizer>> {
    devices()
        .get(normalize(key))
        .cloned()
        .ok_or(Error::NotConnected)
}

pub fn contains(key: &str) -> bool {
    devices().contains_key(normalize(key))
}

pub fn remove(key: &str) -> Option<Arc<dyn Synthesizer>> {
    devices().remove(normalize(key))
}

/// Remove every device, returning them for shutdown.
pub fn drain() -> Vec<(String, Arc<dyn Synthesizer>)> {
    devices().drain().collect()
}

