use std::collections::HashMap;

/// Remembers when each skill last fired. Timestamps are seconds since the
/// Unix epoch, supplied by the caller.
pub trait CooldownStore {
    fn last_fired(&self, skill_id: &str) -> Option<u64>;
    fn mark_fired(&mut self, skill_id: &str, at: u64);
}

/// Process-local store. Each hook invocation starts empty.
#[derive(Debug, Default)]
pub struct MemoryCooldowns {
    fired: HashMap<String, u64>,
}

impl MemoryCooldowns {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CooldownStore for MemoryCooldowns {
    fn last_fired(&self, skill_id: &str) -> Option<u64> {
        self.fired.get(skill_id).copied()
    }

    fn mark_fired(&mut self, skill_id: &str, at: u64) {
        self.fired.insert(skill_id.to_string(), at);
    }
}

/// True while `skill_id` is still inside its cooldown window.
pub fn cooling_down(store: &dyn CooldownStore, skill_id: &str, window: u64, now: u64) -> bool {
    window > 0
        && store
            .last_fired(skill_id)
            .is_some_and(|at| now.saturating_sub(at) < window)
}
