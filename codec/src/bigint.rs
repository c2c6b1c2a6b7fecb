//! Arbitrary-precision integer value type plus its lex encoding (§4.1).
//!
//! Lex form: a one-byte sign prefix (`0x00` negative, `0x01` zero, `0x02`
//! positive), then the big-endian magnitude length-prefixed with
//! [`crate::len_prefix`], then the magnitude bytes themselves (with every
//! byte XORed when negative, so bigger negative magnitudes sort first).

use crate::error::{CodecError, Result};
use crate::len_prefix::{read_len_prefix, write_len_prefix};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigInt {
    negative: bool,
    /// Big-endian magnitude, no leading zero bytes; empty means zero.
    magnitude: Vec<u8>,
}

impl BigInt {
    pub fn zero() -> Self {
        BigInt { negative: false, magnitude: Vec::new() }
    }

    pub fn from_magnitude(negative: bool, mut magnitude: Vec<u8>) -> Self {
        while magnitude.first() == Some(&0) {
            magnitude.remove(0);
        }
        if magnitude.is_empty() {
            BigInt::zero()
        } else {
            BigInt { negative, magnitude }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }
}

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        if v == 0 {
            return BigInt::zero();
        }
        let negative = v < 0;
        let mag = v.unsigned_abs();
        let bytes = mag.to_be_bytes();
        let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        BigInt { negative, magnitude: bytes[first_nonzero..].to_vec() }
    }
}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_negative(), other.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .magnitude
                .len()
                .cmp(&other.magnitude.len())
                .then_with(|| self.magnitude.cmp(&other.magnitude)),
            (true, true) => other
                .magnitude
                .len()
                .cmp(&self.magnitude.len())
                .then_with(|| other.magnitude.cmp(&self.magnitude)),
        }
    }
}

pub fn encode_lex(v: &BigInt, out: &mut Vec<u8>) {
    if v.is_zero() {
        out.push(0x01);
        return;
    }
    out.push(if v.negative { 0x00 } else { 0x02 });
    write_len_prefix(v.magnitude.len() as u32, out);
    let start = out.len();
    out.extend_from_slice(&v.magnitude);
    if v.negative {
        for b in &mut out[start..] {
            *b ^= 0xFF;
        }
    }
}

pub fn decode_lex(buf: &[u8]) -> Result<(BigInt, usize)> {
    let sign = *buf.first().ok_or(CodecError::MalformedEncoding("bigint: empty buffer"))?;
    match sign {
        0x01 => Ok((BigInt::zero(), 1)),
        0x00 | 0x02 => {
            let negative = sign == 0x00;
            let (len, len_consumed) = read_len_prefix(&buf[1..])?;
            let start = 1 + len_consumed;
            let end = start + len as usize;
            if buf.len() < end {
                return Err(CodecError::MalformedEncoding("bigint: magnitude truncated"));
            }
            let mut magnitude = buf[start..end].to_vec();
            if negative {
                for b in &mut magnitude {
                    *b ^= 0xFF;
                }
            }
            Ok((BigInt::from_magnitude(negative, magnitude), end))
        }
        _ => Err(CodecError::MalformedEncoding("bigint: invalid sign prefix")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_order() {
        let values: Vec<BigInt> = [i128::MIN / 2, -1_000_000, -1, 0, 1, 1_000_000, i128::MAX / 2]
            .into_iter()
            .map(BigInt::from)
            .collect();
        let mut encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|v| {
                let mut out = Vec::new();
                encode_lex(v, &mut out);
                out
            })
            .collect();
        for (i, enc) in encoded.iter().enumerate() {
            let (decoded, consumed) = decode_lex(enc).unwrap();
            assert_eq!(&decoded, &values[i]);
            assert_eq!(consumed, enc.len());
        }
        let mut expected = values.clone();
        expected.sort();
        encoded.sort();
        let decoded_sorted: Vec<BigInt> = encoded.iter().map(|e| decode_lex(e).unwrap().0).collect();
        assert_eq!(decoded_sorted, expected);
    }
}
