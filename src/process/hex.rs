//! Hexadecimal address parsing for `/proc/<pid>/maps` range tokens.
//!
//! The legacy alphabet accepts the letters `a` through `h` (case-insensitive)
//! in addition to the decimal digits, which is what the range tokenizer has
//! always done. `g` and `h` are not hex digits, so the strict alphabet is
//! available for deployments that want them rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accepted letter range for hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HexAlphabet {
    /// `0-9`, `a-h` (case-insensitive). `g` and `h` decode as 16 and 17.
    #[default]
    Legacy,
    /// `0-9`, `a-f` (case-insensitive).
    Strict,
}

impl HexAlphabet {
    fn max_letter(self) -> u8 {
        match self {
            HexAlphabet::Legacy => b'h',
            HexAlphabet::Strict => b'f',
        }
    }
}

impl FromStr for HexAlphabet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(HexAlphabet::Legacy),
            "strict" => Ok(HexAlphabet::Strict),
            other => Err(format!(
                "Invalid hex_alphabet '{}', expected 'legacy' or 'strict'",
                other
            )),
        }
    }
}

impl fmt::Display for HexAlphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexAlphabet::Legacy => f.write_str("legacy"),
            HexAlphabet::Strict => f.write_str("strict"),
        }
    }
}

/// Parses a hex token, with an optional `0x`/`0X` prefix.
///
/// Returns `None` if any character falls outside the alphabet. Accumulation
/// wraps on overflow, so tokens longer than 16 digits keep their low bits.
pub fn parse_hex(token: &str, alphabet: HexAlphabet) -> Option<u64> {
    let bytes = token.as_bytes();
    let digits = match bytes {
        [b'0', x, ..] if x.eq_ignore_ascii_case(&b'x') => &bytes[2..],
        _ => bytes,
    };

    let max_letter = alphabet.max_letter();
    let mut value: u64 = 0;
    for &b in digits {
        let n = match b.to_ascii_lowercase() {
            d @ b'0'..=b'9' => d - b'0',
            l @ b'a'..=b'z' if l <= max_letter => l - b'a' + 10,
            _ => return None,
        };
        value = value.wrapping_mul(16).wrapping_add(u64::from(n));
    }
    Some(value)
}

/// Zero-on-error form of [`parse_hex`].
///
/// A zero result is ambiguous with a literal `0` token; callers that need to
/// tell the two apart use [`parse_hex`].
pub fn hex_to_u64(token: &str, alphabet: HexAlphabet) -> u64 {
    parse_hex(token, alphabet).unwrap_or(0)
}
