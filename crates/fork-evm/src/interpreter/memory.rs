/// The byte-addressable, word-aligned memory of a call frame.
///
/// Memory only grows; expansion is charged by the interpreter before calling `resize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Creates an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The size in bytes, always a multiple of 32.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing was ever touched.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grows the memory to `new_len` bytes, zero filled.
    pub fn resize(&mut self, new_len: usize) {
        if new_len > self.data.len() {
            self.data.resize(new_len, 0);
        }
    }

    /// Returns `len` bytes starting at `offset`. The range must have been resized to.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Copies `data` into memory at `offset`.
    pub fn set(&mut self, offset: usize, data: &[u8]) {
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Copies `len` bytes of `data` starting at `data_offset` into memory at `offset`,
    /// zero-filling past the end of `data`.
    pub fn set_data(&mut self, offset: usize, data_offset: usize, len: usize, data: &[u8]) {
        let target = &mut self.data[offset..offset + len];
        let available = data.len().saturating_sub(data_offset).min(len);
        if available > 0 {
            target[..available].copy_from_slice(&data[data_offset..data_offset + available]);
        }
        target[available..].fill(0);
    }

    /// Copies `len` bytes within memory (`MCOPY`).
    pub fn copy(&mut self, dst: usize, src: usize, len: usize) {
        self.data.copy_within(src..src + len, dst);
    }

    /// The whole memory.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
