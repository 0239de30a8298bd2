//! Hex loading utilities

use std::io::Read;

use alloy_primitives::{hex, Bytes};

use super::Result;

/// Loads hex-encoded bytes from an argument or, failing that, a file. A file named `-` is read
/// from stdin. Returns `None` if neither is given.
pub fn load_hex(arg: Option<&str>, file: Option<&str>) -> Result<Option<Bytes>> {
    let text = match (arg, file) {
        (Some(arg), _) => arg.to_string(),
        (None, Some("-")) => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Ok(None),
    };
    decode_hex(&text).map(Some)
}

/// Decodes a hex string with an optional `0x` prefix. Surrounding whitespace is ignored.
pub fn decode_hex(s: &str) -> Result<Bytes> {
    Ok(hex::decode(s.trim())?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex(" 0x6001\n").unwrap().as_ref(), &[0x60, 0x01]);
        assert_eq!(decode_hex("6001").unwrap().as_ref(), &[0x60, 0x01]);
        assert!(decode_hex("").unwrap().is_empty());
        assert!(decode_hex("0x600").is_err());
    }

    #[test]
    fn test_argument_wins_over_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "0x02").unwrap();
        let path = file.path().to_str().unwrap();

        assert_eq!(load_hex(Some("0x01"), Some(path)).unwrap().unwrap().as_ref(), &[1]);
        assert_eq!(load_hex(None, Some(path)).unwrap().unwrap().as_ref(), &[2]);
        assert_eq!(load_hex(None, None).unwrap(), None);
    }
}
