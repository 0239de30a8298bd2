use crate::constants::gas::{MEMORY, MEMORY_QUAD_DIVISOR};

/// The gas meter of one call frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gas {
    limit: u64,
    remaining: u64,
    refunded: i64,
}

impl Gas {
    /// Creates a meter with `limit` gas available.
    pub const fn new(limit: u64) -> Self {
        Self { limit, remaining: limit, refunded: 0 }
    }

    /// Creates a meter with nothing left to spend.
    pub const fn new_spent(limit: u64) -> Self {
        Self { limit, remaining: 0, refunded: 0 }
    }

    /// The gas the frame started with.
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// The gas left to spend.
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// The gas spent so far.
    pub const fn spent(&self) -> u64 {
        self.limit - self.remaining
    }

    /// The accumulated refund. Can be negative inside a frame (EIP-2200).
    pub const fn refunded(&self) -> i64 {
        self.refunded
    }

    /// Spends `cost`. Returns `false`, leaving the meter untouched, if not enough gas is left.
    #[must_use]
    pub fn record_cost(&mut self, cost: u64) -> bool {
        match self.remaining.checked_sub(cost) {
            Some(remaining) => {
                self.remaining = remaining;
                true
            }
            None => false,
        }
    }

    /// Gives back gas that a child frame did not use.
    pub fn erase_cost(&mut self, returned: u64) {
        self.remaining += returned;
    }

    /// Spends everything that is left.
    pub fn spend_all(&mut self) {
        self.remaining = 0;
    }

    /// Adds to the refund counter.
    pub fn record_refund(&mut self, refund: i64) {
        self.refunded += refund;
    }

    /// Caps the refund at `spent / quotient` (EIP-3529).
    pub fn set_final_refund(&mut self, quotient: u64) {
        let max = (self.spent() / quotient) as i64;
        self.refunded = self.refunded.clamp(0, max);
    }
}

/// The total cost of a memory of `words` words: `3 * words + words^2 / 512`.
pub const fn memory_cost(words: u64) -> u64 {
    MEMORY.saturating_mul(words).saturating_add(words.saturating_mul(words) / MEMORY_QUAD_DIVISOR)
}

/// The number of 32-byte words needed to hold `len` bytes.
pub const fn num_words(len: u64) -> u64 {
    len.div_ceil(32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cost_never_underflows() {
        let mut gas = Gas::new(10);
        assert!(gas.record_cost(7));
        assert!(!gas.record_cost(4));
        assert_eq!(gas.remaining(), 3);
        assert!(gas.record_cost(3));
        assert_eq!(gas.remaining(), 0);
        assert_eq!(gas.spent(), 10);
    }

    #[test]
    fn test_memory_cost() {
        assert_eq!(memory_cost(0), 0);
        assert_eq!(memory_cost(1), 3);
        // 32 words: 96 + 1024 / 512
        assert_eq!(memory_cost(32), 98);
        assert_eq!(num_words(33), 2);
    }

    #[test]
    fn test_final_refund_is_capped() {
        let mut gas = Gas::new(100_000);
        assert!(gas.record_cost(50_000));
        gas.record_refund(24_000);
        gas.set_final_refund(5);
        assert_eq!(gas.refunded(), 10_000);
    }
}
