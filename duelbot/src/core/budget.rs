//! Per-tick action budget.

/// Counter reset every scheduling tick and decremented per attempted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    limit: u32,
    remaining: u32,
}

impl TickBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    pub fn reset(&mut self) {
        self.remaining = self.limit;
    }

    /// Take one unit. Returns false when the budget is exhausted.
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn used(&self) -> u32 {
        self.limit - self.remaining
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
