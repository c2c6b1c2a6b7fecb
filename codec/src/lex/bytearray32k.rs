//! Base-32768 variable-length byte-array codec (§4.1).
//!
//! The input is treated as a bitstream processed 15 bits at a time. Each
//! 15-bit digit becomes two content bytes `(a+32, b+32)` with
//! `a = digit/192`, `b = digit%192`; since `a <= 170` and `b <= 191`, every
//! content byte lands in `32..=223`, strictly above the `0..31` terminator
//! zone, so the decoder can always tell content from terminator by value
//! alone. The final byte is a terminator in `0..=15`: `0` marks an empty
//! field, otherwise it is the bit count (`1..=15`) actually occupied in the
//! last digit, with the rest zero-padded.

use crate::error::{CodecError, Result};

fn bits_at(input: &[u8], bit_offset: usize, nbits: usize) -> u32 {
    let mut val: u32 = 0;
    for i in 0..nbits {
        let bit_idx = bit_offset + i;
        let byte_idx = bit_idx / 8;
        let bit_in_byte = 7 - (bit_idx % 8);
        let bit = if byte_idx < input.len() {
            (input[byte_idx] >> bit_in_byte) & 1
        } else {
            0
        };
        val = (val << 1) | bit as u32;
    }
    val
}

pub fn encode(input: &[u8]) -> Vec<u8> {
    let total_bits = input.len() * 8;
    let mut out = Vec::new();
    if total_bits == 0 {
        out.push(0);
        return out;
    }
    let groups = (total_bits + 14) / 15;
    let residual = total_bits - (groups - 1) * 15;
    out.reserve(groups * 2 + 1);
    for g in 0..groups {
        let digit = bits_at(input, g * 15, 15);
        let a = digit / 192;
        let b = digit % 192;
        out.push((a + 32) as u8);
        out.push((b + 32) as u8);
    }
    out.push(residual as u8);
    out
}

/// Decodes from the start of `buf`, returning the decoded bytes and the
/// number of input bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(Vec<u8>, usize)> {
    let term_idx = buf
        .iter()
        .position(|&b| b < 32)
        .ok_or(CodecError::MalformedEncoding("base-32768: no terminator byte found"))?;
    if term_idx % 2 != 0 {
        return Err(CodecError::MalformedEncoding("base-32768: terminator at odd offset"));
    }
    let terminator = buf[term_idx];
    let consumed = term_idx + 1;
    if term_idx == 0 {
        if terminator != 0 {
            return Err(CodecError::MalformedEncoding("base-32768: empty field must terminate with 0"));
        }
        return Ok((Vec::new(), consumed));
    }
    if terminator == 0 || terminator > 15 {
        return Err(CodecError::MalformedEncoding("base-32768: residual bit count out of range"));
    }
    let groups = term_idx / 2;
    let residual = terminator as usize;
    let total_bits = (groups - 1) * 15 + residual;

    let mut bits: Vec<u8> = Vec::with_capacity(groups * 15);
    for g in 0..groups {
        let a = buf[2 * g] as u32 - 32;
        let b = buf[2 * g + 1] as u32 - 32;
        let digit = a * 192 + b;
        for i in (0..15).rev() {
            bits.push(((digit >> i) & 1) as u8);
        }
    }
    bits.truncate(total_bits);

    debug_assert_eq!(total_bits % 8, 0, "base-32768 decode produced a non-byte-aligned length");
    let mut out = vec![0u8; total_bits / 8];
    for (i, bit) in bits.iter().enumerate() {
        if *bit != 0 {
            out[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    Ok((out, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty() {
        let (decoded, consumed) = decode(&encode(&[])).unwrap();
        assert_eq!(decoded, Vec::<u8>::new());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn round_trip_scenario_b() {
        let input = [0x00u8, 0x01, 0x02, 0x03];
        let encoded = encode(&input);
        let (decoded, consumed) = decode(&encoded).unwrap();
        assert_eq!(decoded, input.to_vec());
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn round_trip_various_lengths() {
        for len in 0..40 {
            let input: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let encoded = encode(&input);
            assert!(encoded.iter().all(|&b| b >= 32 || b == *encoded.last().unwrap()));
            let (decoded, consumed) = decode(&encoded).unwrap();
            assert_eq!(decoded, input);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn terminator_is_lexicographically_smaller_than_content() {
        let encoded = encode(b"hello world, this is a longer field to exercise full groups");
        let term = *encoded.last().unwrap();
        assert!(term < 32);
        for &b in &encoded[..encoded.len() - 1] {
            assert!(b >= 32);
        }
    }

    #[test]
    fn prefix_ordering_matches_content_ordering() {
        // Shorter field whose content is a byte-prefix of a longer one must
        // still sort first, because the terminator byte is always < 32.
        let short = encode(b"ab");
        let long = encode(b"abc");
        assert!(short < long);
    }
}
