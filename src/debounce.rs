use std::collections::HashMap;
use std::hash::Hash;

pub const ADD_WINDOW_MS: i64 = 500;
pub const COMPLETION_WINDOW_MS: i64 = 1000;
pub const DELETE_WINDOW_MS: i64 = 1000;

/// Last-action timestamp guard. An action is let through when at least
/// `window_ms` has passed since the previous accepted action.
#[derive(Debug, Clone)]
pub struct Debounce {
    window_ms: i64,
    last: Option<i64>,
}

impl Debounce {
    pub fn new(window_ms: i64) -> Self {
        Self { window_ms, last: None }
    }

    pub fn try_fire(&mut self, now_ms: i64) -> bool {
        if let Some(last) = self.last {
            if now_ms - last < self.window_ms {
                return false;
            }
        }
        self.last = Some(now_ms);
        true
    }
}

/// Same as [`Debounce`], tracked independently per key.
#[derive(Debug, Clone)]
pub struct KeyedDebounce<K> {
    window_ms: i64,
    last: HashMap<K, i64>,
}

impl<K: Eq + Hash> KeyedDebounce<K> {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            last: HashMap::new(),
        }
    }

    pub fn try_fire(&mut self, key: K, now_ms: i64) -> bool {
        match self.last.get(&key) {
            Some(last) if now_ms - last < self.window_ms => false,
            _ => {
                self.last.insert(key, now_ms);
                true
            }
        }
    }

    pub fn forget(&mut self, key: &K) {
        self.last.remove(key);
    }

    /// Carries the last-fire time of `from` over to `to`.
    pub fn rekey(&mut self, from: &K, to: K) {
        if let Some(last) = self.last.remove(from) {
            self.last.insert(to, last);
        }
    }
}
