//! Key-value protocol shared with the robot.
//!
//! Both sides read and write the same keys in a `TargetTracking` table. The
//! integer state codes are fixed by the robot code and must not change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

pub const TARGET_TABLE_NAME: &str = "TargetTracking";
/// Decision state, a number: 1 hot, 2 not hot, 3 unknown.
pub const STATE_KEY: &str = "goal_hot";
/// Set by the robot while its decision window is open.
pub const WINDOW_ACTIVE_KEY: &str = "auto_vision";
/// Frame acquisition switch, default on.
pub const ENABLE_CAMERA_KEY: &str = "enable_camera";

/// Debounced goal state reported to the robot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Hot,
    NotHot,
    #[default]
    Unknown,
}

impl Decision {
    /// Wire code stored under [`STATE_KEY`].
    pub const fn code(self) -> i32 {
        match self {
            Decision::Hot => 1,
            Decision::NotHot => 2,
            Decision::Unknown => 3,
        }
    }

    /// Decode a wire code; anything unrecognized reads as `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Decision::Hot,
            2 => Decision::NotHot,
            _ => Decision::Unknown,
        }
    }

    /// Whether reporting this decision closes the window.
    pub const fn is_terminal(self) -> bool {
        match self {
            Decision::Hot | Decision::NotHot => true,
            Decision::Unknown => false,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Hot => "HOT",
            Decision::NotHot => "NOT HOT",
            Decision::Unknown => "UNKNOWN",
        })
    }
}

/// A string-keyed store shared with a remote peer.
///
/// Reads of missing keys return `None`; callers supply the defaults.
pub trait KeyValueStore: Send + Sync {
    fn get_number(&self, key: &str) -> Option<f64>;
    fn put_number(&self, key: &str, value: f64);
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn put_bool(&self, key: &str, value: bool);
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Value {
    Number(f64),
    Bool(bool),
}

/// In-process [`KeyValueStore`], used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
    }

    fn put(&self, key: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_owned(), value);
    }
}

impl KeyValueStore for MemoryStore {
    fn get_number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(v) => Some(v),
            Value::Bool(_) => None,
        }
    }

    fn put_number(&self, key: &str, value: f64) {
        self.put(key, Value::Number(value));
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(v) => Some(v),
            Value::Number(_) => None,
        }
    }

    fn put_bool(&self, key: &str, value: bool) {
        self.put(key, Value::Bool(value));
    }
}

/// Typed view of the target tracking keys over any [`KeyValueStore`].
pub struct TargetTable<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for TargetTable<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore + ?Sized> TargetTable<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Publish the startup values: state unknown, camera enabled.
    pub fn init(&self) {
        self.set_state(Decision::Unknown);
        self.set_camera_enabled(true);
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn state(&self) -> Decision {
        self.store
            .get_number(STATE_KEY)
            .map(|v| Decision::from_code(v.round() as i32))
            .unwrap_or_default()
    }

    pub fn set_state(&self, decision: Decision) {
        self.store.put_number(STATE_KEY, decision.code() as f64);
    }

    pub fn is_window_active(&self) -> bool {
        self.store.get_bool(WINDOW_ACTIVE_KEY).unwrap_or(false)
    }

    pub fn set_window_active(&self, active: bool) {
        self.store.put_bool(WINDOW_ACTIVE_KEY, active);
    }

    pub fn is_camera_enabled(&self) -> bool {
        self.store.get_bool(ENABLE_CAMERA_KEY).unwrap_or(true)
    }

    pub fn set_camera_enabled(&self, enabled: bool) {
        self.store.put_bool(ENABLE_CAMERA_KEY, enabled);
    }
}
