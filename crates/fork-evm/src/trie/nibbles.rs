use std::fmt;

/// A path through the trie, one nibble (half-byte) per element.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nibbles(Vec<u8>);

impl Nibbles {
    /// Splits every byte of `key` into its high and low nibble.
    pub fn unpack(key: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(key.len() * 2);
        for byte in key {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0f);
        }
        Self(nibbles)
    }

    /// Wraps a slice that already holds one nibble per element.
    pub fn from_nibbles(nibbles: &[u8]) -> Self {
        debug_assert!(nibbles.iter().all(|n| *n < 16), "nibble out of range");
        Self(nibbles.to_vec())
    }

    /// Returns `prefix` followed by `self`.
    pub fn prepend(&self, prefix: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(prefix.len() + self.0.len());
        nibbles.extend_from_slice(prefix);
        nibbles.extend_from_slice(&self.0);
        Self(nibbles)
    }

    /// The number of nibbles in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the empty path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The nibbles as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Packs pairs of nibbles back into bytes. The path must have an even length.
    pub fn pack(&self) -> Vec<u8> {
        debug_assert!(self.0.len() % 2 == 0, "cannot pack an odd-length path");
        self.0.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
    }

    /// Encodes the path with the hex-prefix encoding used by leaf and extension nodes.
    ///
    /// The first nibble carries two flags: bit 1 marks a leaf, bit 0 an odd-length path. An
    /// odd path stores its first nibble next to the flags, an even path pads with zero.
    pub fn encode_hex_prefix(&self, is_leaf: bool) -> Vec<u8> {
        let flag = if is_leaf { 0x20 } else { 0x00 };
        let mut out = Vec::with_capacity(self.0.len() / 2 + 1);
        let rest = if self.0.len() % 2 == 1 {
            out.push(flag | 0x10 | self.0[0]);
            &self.0[1..]
        } else {
            out.push(flag);
            &self.0[..]
        };
        out.extend(rest.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]));
        out
    }
}

impl fmt::Debug for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nibbles(0x")?;
        for n in &self.0 {
            write!(f, "{n:x}")?;
        }
        f.write_str(")")
    }
}

/// Length of the longest common prefix of two nibble paths.
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_and_pack() {
        let nibbles = Nibbles::unpack(&[0x12, 0xab]);
        assert_eq!(nibbles.as_slice(), &[1, 2, 0xa, 0xb]);
        assert_eq!(nibbles.pack(), vec![0x12, 0xab]);
    }

    #[test]
    fn test_hex_prefix_encoding() {
        // Examples from the yellow paper appendix C.
        assert_eq!(Nibbles::from_nibbles(&[1, 2, 3, 4, 5]).encode_hex_prefix(false), [0x11, 0x23, 0x45]);
        assert_eq!(Nibbles::from_nibbles(&[0, 1, 2, 3, 4, 5]).encode_hex_prefix(false), [0x00, 0x01, 0x23, 0x45]);
        assert_eq!(Nibbles::from_nibbles(&[0xf, 1, 0xc, 0xb, 8]).encode_hex_prefix(true), [0x3f, 0x1c, 0xb8]);
        assert_eq!(Nibbles::from_nibbles(&[0, 0xf, 1, 0xc, 0xb, 8]).encode_hex_prefix(true), [0x20, 0x0f, 0x1c, 0xb8]);
        assert_eq!(Nibbles::default().encode_hex_prefix(true), [0x20]);
    }

    #[test]
    fn test_common_prefix_len() {
        assert_eq!(common_prefix_len(&[1, 2, 3], &[1, 2, 4]), 2);
        assert_eq!(common_prefix_len(&[1, 2], &[1, 2, 4]), 2);
        assert_eq!(common_prefix_len(&[], &[1]), 0);
    }
}
