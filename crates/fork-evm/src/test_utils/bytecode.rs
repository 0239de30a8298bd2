use alloy_primitives::{Address, Bytes, U256};
use revm_bytecode::opcode::{
    CALL, CODECOPY, DUP1, MSTORE, PUSH0, PUSH2, RETURN, REVERT, SLOAD, SSTORE,
};

/// A builder for assembling EVM bytecode.
#[derive(Debug, Default, Clone)]
pub struct BytecodeBuilder {
    code: Vec<u8>,
}

impl BytecodeBuilder {
    /// Build the bytecode.
    pub fn build(self) -> Bytes {
        self.code.into()
    }

    /// Get the length of the bytecode.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Check if the bytecode is empty.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Append a single opcode or byte.
    pub fn append(mut self, opcode: u8) -> Self {
        self.code.push(opcode);
        self
    }

    /// Append a series of opcodes or bytes.
    pub fn append_many(mut self, items: impl IntoIterator<Item = u8>) -> Self {
        self.code.extend(items);
        self
    }

    /// Append the smallest PUSH of `bytes`. Empty bytes become `PUSH0`.
    pub fn push_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        assert!(bytes.len() <= 32, "cannot push {} bytes", bytes.len());
        self.code.push(PUSH0 + bytes.len() as u8);
        self.code.extend_from_slice(bytes);
        self
    }

    /// Append a PUSH of `number` with leading zero bytes stripped.
    pub fn push_number(self, number: impl Into<u128>) -> Self {
        self.push_u256(U256::from(number.into()))
    }

    /// Append a PUSH20 of `address`.
    pub fn push_address(self, address: Address) -> Self {
        self.push_bytes(address)
    }

    /// Append a PUSH of `value` with leading zero bytes stripped.
    pub fn push_u256(self, value: U256) -> Self {
        let bytes = value.to_be_bytes::<32>();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        self.push_bytes(&bytes[skip..])
    }

    /// Store `bytes`, right-padded to whole words, at memory `offset`.
    pub fn mstore(mut self, offset: usize, bytes: impl AsRef<[u8]>) -> Self {
        for (i, chunk) in bytes.as_ref().chunks(32).enumerate() {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            self = self.push_bytes(word).push_number((offset + i * 32) as u64).append(MSTORE);
        }
        self
    }

    /// Store `value` at storage `slot`.
    pub fn sstore(self, slot: u64, value: U256) -> Self {
        self.push_u256(value).push_number(slot).append(SSTORE)
    }

    /// Push the value of storage `slot`.
    pub fn sload(self, slot: u64) -> Self {
        self.push_number(slot).append(SLOAD)
    }

    /// `CALL` `address` with all remaining gas, `value` and no call data. Pushes the success
    /// flag.
    pub fn call(self, address: Address, value: U256) -> Self {
        self.append_many([PUSH0, PUSH0, PUSH0, PUSH0])
            .push_u256(value)
            .push_address(address)
            .append(revm_bytecode::opcode::GAS)
            .append(CALL)
    }

    /// Append a REVERT with empty return data.
    pub fn revert(self) -> Self {
        self.append_many([PUSH0, PUSH0, REVERT])
    }

    /// Append a REVERT returning `data`.
    pub fn revert_with_data(self, data: impl AsRef<[u8]>) -> Self {
        let len = data.as_ref().len() as u64;
        self.mstore(0, data).push_number(len).append(PUSH0).append(REVERT)
    }

    /// Append a RETURN with empty return data.
    pub fn return_empty(self) -> Self {
        self.append_many([PUSH0, PUSH0, RETURN])
    }

    /// Append a RETURN of `data`.
    pub fn return_with_data(self, data: impl AsRef<[u8]>) -> Self {
        let len = data.as_ref().len() as u64;
        self.mstore(0, data).push_number(len).append(PUSH0).append(RETURN)
    }

    /// Return the word on top of the stack.
    pub fn return_top(self) -> Self {
        self.append_many([PUSH0, MSTORE]).push_number(32u8).append_many([PUSH0, RETURN])
    }

    /// Turn the assembled code into a constructor that deploys `runtime`.
    pub fn into_init_code(self, runtime: impl AsRef<[u8]>) -> Bytes {
        let runtime = runtime.as_ref();
        // PUSH2 len, DUP1, PUSH2 offset, PUSH0, CODECOPY, PUSH0, RETURN
        let offset = self.len() + 11;
        assert!(offset + runtime.len() <= u16::MAX as usize, "init code too large");
        let (len, offset) = (runtime.len() as u16, offset as u16);
        self.append(PUSH2)
            .append_many(len.to_be_bytes())
            .append(DUP1)
            .append(PUSH2)
            .append_many(offset.to_be_bytes())
            .append_many([PUSH0, CODECOPY, PUSH0, RETURN])
            .append_many(runtime.iter().copied())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revm_bytecode::opcode::{PUSH32, STOP};

    #[test]
    fn test_push_strips_leading_zeros() {
        let code = BytecodeBuilder::default().push_number(0u8).push_number(0x1234u16).build();
        assert_eq!(code.as_ref(), &[PUSH0, PUSH2, 0x12, 0x34]);
        let code = BytecodeBuilder::default().push_u256(U256::MAX).build();
        assert_eq!(code[0], PUSH32);
        assert_eq!(code.len(), 33);
    }

    #[test]
    fn test_init_code_layout() {
        let init = BytecodeBuilder::default().into_init_code([STOP]);
        assert_eq!(init.len(), 12);
        assert_eq!(&init[..4], &[PUSH2, 0x00, 0x01, DUP1]);
        assert_eq!(&init[5..7], &[0x00, 0x0b]);
        assert_eq!(init[11], STOP);
    }
}
