use std::sync::Arc;

use revm_bytecode::opcode::{JUMPDEST, PUSH1, PUSH32};

/// The valid jump destinations of a piece of code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpTable(Arc<[bool]>);

impl JumpTable {
    /// Scans `code`, skipping `PUSH` immediates.
    pub fn analyze(code: &[u8]) -> Self {
        let mut valid = vec![false; code.len()];
        let mut pc = 0;
        while pc < code.len() {
            let opcode = code[pc];
            if opcode == JUMPDEST {
                valid[pc] = true;
            } else if (PUSH1..=PUSH32).contains(&opcode) {
                pc += (opcode - PUSH1 + 1) as usize;
            }
            pc += 1;
        }
        Self(valid.into())
    }

    /// Returns `true` if `pc` is a `JUMPDEST` outside of push data.
    pub fn is_valid(&self, pc: usize) -> bool {
        self.0.get(pc).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revm_bytecode::opcode::{PUSH2, STOP};

    #[test]
    fn test_jumpdest_inside_push_data_is_invalid() {
        let code = [PUSH2, JUMPDEST, JUMPDEST, JUMPDEST, STOP];
        let table = JumpTable::analyze(&code);
        assert!(!table.is_valid(1));
        assert!(!table.is_valid(2));
        assert!(table.is_valid(3));
        assert!(!table.is_valid(4));
        assert!(!table.is_valid(100));
    }
}
