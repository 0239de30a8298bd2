use alloy_primitives::U256;

use super::Control;
use crate::{constants::limits::STACK_LIMIT, HaltReason};

/// The operand stack of a call frame, bounded at 1024 words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    data: Vec<U256>,
}

impl Stack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self { data: Vec::with_capacity(STACK_LIMIT) }
    }

    /// The number of words on the stack.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The words on the stack, bottom first.
    pub fn data(&self) -> &[U256] {
        &self.data
    }

    /// Pushes a word.
    pub fn push(&mut self, value: U256) -> Result<(), Control> {
        if self.data.len() == STACK_LIMIT {
            return Err(Control::Halt(HaltReason::StackOverflow));
        }
        self.data.push(value);
        Ok(())
    }

    /// Pops a word.
    pub fn pop(&mut self) -> Result<U256, Control> {
        self.data.pop().ok_or(Control::Halt(HaltReason::StackUnderflow))
    }

    /// Pops `N` words, top first.
    pub fn popn<const N: usize>(&mut self) -> Result<[U256; N], Control> {
        if self.data.len() < N {
            return Err(Control::Halt(HaltReason::StackUnderflow));
        }
        let mut out = [U256::ZERO; N];
        for slot in &mut out {
            *slot = self.data.pop().unwrap_or_default();
        }
        Ok(out)
    }

    /// Returns the word `n` positions below the top.
    pub fn peek(&self, n: usize) -> Option<U256> {
        self.data.len().checked_sub(n + 1).map(|index| self.data[index])
    }

    /// Returns a mutable reference to the top word.
    pub fn top_mut(&mut self) -> Result<&mut U256, Control> {
        self.data.last_mut().ok_or(Control::Halt(HaltReason::StackUnderflow))
    }

    /// Duplicates the `n`-th word (1-based) onto the top.
    pub fn dup(&mut self, n: usize) -> Result<(), Control> {
        let value = self.peek(n - 1).ok_or(Control::Halt(HaltReason::StackUnderflow))?;
        self.push(value)
    }

    /// Swaps the top with the word `n` positions below it.
    pub fn swap(&mut self, n: usize) -> Result<(), Control> {
        let len = self.data.len();
        if len <= n {
            return Err(Control::Halt(HaltReason::StackUnderflow));
        }
        self.data.swap(len - 1, len - 1 - n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_and_underflow() {
        let mut stack = Stack::new();
        assert!(matches!(stack.pop(), Err(Control::Halt(HaltReason::StackUnderflow))));
        for i in 0..STACK_LIMIT {
            stack.push(U256::from(i)).unwrap();
        }
        assert!(matches!(stack.push(U256::ZERO), Err(Control::Halt(HaltReason::StackOverflow))));
    }

    #[test]
    fn test_popn_dup_swap() {
        let mut stack = Stack::new();
        for i in 1..=3u64 {
            stack.push(U256::from(i)).unwrap();
        }
        stack.dup(3).unwrap();
        assert_eq!(stack.peek(0), Some(U256::from(1)));
        stack.swap(1).unwrap();
        let Ok([a, b]) = stack.popn() else { panic!("underflow") };
        assert_eq!((a, b), (U256::from(3), U256::from(1)));
        assert!(stack.popn::<3>().is_err());
    }
}
