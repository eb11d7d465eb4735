//! Utility functions for titlekit

use std::env;
use std::str::FromStr;

/// Read and parse an environment variable, falling back to `default` when it
/// is unset or does not parse
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Render a NUL-padded fixed-width field as a string
pub fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Parse a hex string of exactly `N` bytes
pub fn parse_hex_array<const N: usize>(s: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(s.trim()).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::{c_str, env_or, parse_hex_array};

    #[test]
    fn test_c_str_stops_at_nul() {
        assert_eq!(c_str(b"d2x-v11\0\0\0"), "d2x-v11");
        assert_eq!(c_str(b"full"), "full");
        assert_eq!(c_str(b"\0junk"), "");
    }

    #[test]
    fn test_parse_hex_array_checks_length() {
        assert_eq!(parse_hex_array::<2>("beef"), Some([0xbe, 0xef]));
        assert_eq!(parse_hex_array::<2>("beefee"), None);
        assert_eq!(parse_hex_array::<2>("zz"), None);
    }

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("TITLEKIT_TEST_UNSET_VARIABLE", 7u32), 7);
    }
}
