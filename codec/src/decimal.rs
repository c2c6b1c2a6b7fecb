//! Arbitrary-precision decimal value type plus its lex encoding (§4.1).
//!
//! A decimal is normalized to `sign * 0.d1d2...dn * 10^exponent` with
//! `d1 != 0` (zero is a separate case). The header byte picks one of the
//! eight cases in the spec's table; the derivation below keeps every case
//! on a single monotone function of the base-1000 exponent so the whole
//! header range sorts correctly without per-case special logic:
//!
//! - negative numbers: `header = 64 - exp1000` for `exp1000` in `-61..=62`
//!   (covering `0x02..=0x7D`), spilling to `0x01`/`0x7E` with a 4-byte
//!   field outside that range.
//! - positive numbers: `header = exp1000 + 191` for the same range
//!   (`0x82..=0xFD`), spilling to `0xFE`/`0x81`.
//!
//! Both spill cases store `exp1000` (negated and bias-flipped for the
//! negative side, matching the fixed-width signed-int rule in
//! [`crate::lex::fixed`]) so the 4-byte field stays order-preserving.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};

const SMALL_MIN: i32 = -61;
const SMALL_MAX: i32 = 62;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigDecimal {
    /// `-1` or `1`; meaningless (but stored) when `digits` is empty.
    pub sign: i8,
    /// Decimal digits `0..=9`, `digits[0] != 0` when nonempty.
    pub digits: Vec<u8>,
    /// `value = sign * 0.digits * 10^exponent`.
    pub exponent: i32,
    /// Originally declared scale, preserved for zero's round-trip.
    pub scale: i32,
}

impl BigDecimal {
    pub fn zero(scale: i32) -> Self {
        BigDecimal { sign: 1, digits: Vec::new(), exponent: 0, scale }
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Constructs `unscaled * 10^-scale`, normalizing away leading zeros.
    pub fn from_parts(unscaled: i128, scale: i32) -> Self {
        if unscaled == 0 {
            return BigDecimal::zero(scale);
        }
        let sign: i8 = if unscaled < 0 { -1 } else { 1 };
        let s = unscaled.unsigned_abs().to_string();
        let digits: Vec<u8> = s.bytes().map(|b| b - b'0').collect();
        let exponent = digits.len() as i32 - scale;
        BigDecimal { sign, digits, exponent, scale }
    }

    fn exp1000_groups(&self) -> (i32, Vec<u16>) {
        debug_assert!(!self.is_zero());
        let r = (-self.exponent).rem_euclid(3);
        let mut padded: Vec<u8> = std::iter::repeat(0).take(r as usize).chain(self.digits.iter().copied()).collect();
        while padded.len() % 3 != 0 {
            padded.push(0);
        }
        let new_exp = self.exponent + r;
        let exp1000 = new_exp / 3;
        let groups = padded
            .chunks(3)
            .map(|c| c[0] as u16 * 100 + c[1] as u16 * 10 + c[2] as u16)
            .collect();
        (exp1000, groups)
    }

    /// Number of real (non-padding) digits in the last base-1000 group,
    /// `1..=3`. Used so decode can drop the zero padding appended to
    /// complete the final group.
    fn last_group_real_digits(&self) -> u8 {
        let r = (-self.exponent).rem_euclid(3) as usize;
        let total = r + self.digits.len();
        let rem = total % 3;
        if rem == 0 { 3 } else { rem as u8 }
    }
}

fn biased(x: i32) -> u32 {
    (x as u32) ^ 0x8000_0000
}

fn unbiased(x: u32) -> i32 {
    (x ^ 0x8000_0000) as i32
}

struct BitWriter {
    bytes: Vec<u8>,
    cur: u32,
    nbits: u32,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { bytes: Vec::new(), cur: 0, nbits: 0 }
    }
    fn push(&mut self, value: u32, width: u32) {
        self.cur = (self.cur << width) | value;
        self.nbits += width;
        while self.nbits >= 8 {
            let shift = self.nbits - 8;
            self.bytes.push((self.cur >> shift) as u8);
            self.nbits -= 8;
            self.cur &= (1 << self.nbits) - 1;
        }
    }
    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.bytes.push((self.cur << (8 - self.nbits)) as u8);
        }
        self.bytes
    }
}

struct BitReader<'a> {
    buf: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        BitReader { buf, bit_pos: 0 }
    }
    fn read(&mut self, width: usize) -> Result<u32> {
        let mut val = 0u32;
        for _ in 0..width {
            let byte_idx = self.bit_pos / 8;
            let bit_in_byte = 7 - (self.bit_pos % 8);
            let bit = *self
                .buf
                .get(byte_idx)
                .ok_or(CodecError::MalformedEncoding("decimal: digit stream truncated"))?;
            val = (val << 1) | ((bit >> bit_in_byte) & 1) as u32;
            self.bit_pos += 1;
        }
        Ok(val)
    }
    /// Bytes consumed so far, rounding the partial final byte up.
    fn bytes_consumed(&self) -> usize {
        (self.bit_pos + 7) / 8
    }
}

pub fn encode_lex(v: &BigDecimal, out: &mut Vec<u8>) {
    if v.is_zero() {
        out.push(if v.sign < 0 { 0x7F } else { 0x80 });
        out.extend_from_slice(&biased(v.scale).to_be_bytes());
        return;
    }
    let negative = v.sign < 0;
    let (exp1000, groups) = v.exp1000_groups();

    if negative {
        if exp1000 > SMALL_MAX {
            out.push(0x01);
            out.extend_from_slice(&biased(-exp1000).to_be_bytes());
        } else if exp1000 < SMALL_MIN {
            out.push(0x7E);
            out.extend_from_slice(&biased(-exp1000).to_be_bytes());
        } else {
            out.push((64 - exp1000) as u8);
        }
    } else if exp1000 > SMALL_MAX {
        out.push(0xFE);
        out.extend_from_slice(&biased(exp1000).to_be_bytes());
    } else if exp1000 < SMALL_MIN {
        out.push(0x81);
        out.extend_from_slice(&biased(exp1000).to_be_bytes());
    } else {
        out.push((exp1000 + 191) as u8);
    }

    let mut codes: Vec<u16> = groups.iter().map(|&g| g + 12).collect();
    codes.push(v.last_group_real_digits() as u16); // 1, 2, or 3 -- in the 0..11 reserved zone

    let mut writer = BitWriter::new();
    for code in &codes {
        let c = if negative { 1023 - *code } else { *code };
        writer.push(c as u32, 10);
    }
    out.extend_from_slice(&writer.finish());
}

pub fn decode_lex(buf: &[u8]) -> Result<(BigDecimal, usize)> {
    let header = *buf.first().ok_or(CodecError::MalformedEncoding("decimal: empty buffer"))?;
    match header {
        0x7F | 0x80 => {
            if buf.len() < 5 {
                return Err(CodecError::MalformedEncoding("decimal: zero scale truncated"));
            }
            let scale = unbiased(u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]));
            let sign: i8 = if header == 0x7F { -1 } else { 1 };
            Ok((BigDecimal { sign, digits: Vec::new(), exponent: 0, scale }, 5))
        }
        0x00 | 0xFF => Err(CodecError::MalformedEncoding("decimal: null sentinel has no value form")),
        _ => {
            let negative = header < 0x7F;
            let (exp1000, header_len) = if header == 0x01 || header == 0x7E {
                let e = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
                (-unbiased(e), 5)
            } else if header == 0x81 || header == 0xFE {
                let e = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
                (unbiased(e), 5)
            } else if negative {
                (64 - header as i32, 1)
            } else {
                (header as i32 - 191, 1)
            };

            let mut reader = BitReader::new(&buf[header_len..]);
            let mut groups: Vec<u16> = Vec::new();
            let terminator_real_digits: u8;
            loop {
                let raw = reader.read(10)?;
                let code = if negative { 1023 - raw } else { raw };
                if (12..=1011).contains(&code) {
                    groups.push((code - 12) as u16);
                } else {
                    if !(1..=3).contains(&code) {
                        return Err(CodecError::MalformedEncoding("decimal: invalid terminator code"));
                    }
                    terminator_real_digits = code as u8;
                    break;
                }
            }
            let consumed = header_len + reader.bytes_consumed();

            let mut digits: Vec<u8> = Vec::with_capacity(groups.len() * 3);
            for g in &groups {
                digits.push((g / 100) as u8);
                digits.push((g / 10 % 10) as u8);
                digits.push((g % 10) as u8);
            }
            // Drop the zero padding appended to complete the last group.
            let drop_end = 3 - terminator_real_digits as usize;
            digits.truncate(digits.len() - drop_end);
            // Drop leading zero padding inserted to align to a group-of-3
            // boundary; each one removed shifts the decimal point by one
            // place, so it must come back out of the exponent too.
            let mut leading_removed = 0i32;
            while digits.first() == Some(&0) {
                digits.remove(0);
                leading_removed += 1;
            }
            let exponent = exp1000 * 3 - leading_removed;
            let sign: i8 = if negative { -1 } else { 1 };
            Ok((BigDecimal { sign, digits, exponent, scale: exponent }, consumed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(v: &BigDecimal) -> Vec<u8> {
        let mut out = Vec::new();
        encode_lex(v, &mut out);
        out
    }

    #[test]
    fn scenario_c_strictly_increasing() {
        let values = [
            BigDecimal::from_parts(-25, 1),      // -2.5
            BigDecimal::from_parts(-1, 0),        // -1
            BigDecimal::zero(0),                  // 0
            BigDecimal::from_parts(25, 2),        // 0.25
            BigDecimal::from_parts(1, 0),         // 1
            BigDecimal::from_parts(100, 0),       // 100
            BigDecimal::from_parts(1, -308),      // 1e308
        ];
        let encoded: Vec<Vec<u8>> = values.iter().map(enc).collect();
        for w in encoded.windows(2) {
            assert!(w[0] < w[1], "{:?} should sort before {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn round_trip_values() {
        for (unscaled, scale) in [(-25i128, 1i32), (-1, 0), (25, 2), (1, 0), (100, 0), (1, -308), (123456, 3)] {
            let v = BigDecimal::from_parts(unscaled, scale);
            let (decoded, consumed) = decode_lex(&enc(&v)).unwrap();
            assert_eq!(consumed, enc(&v).len());
            assert_eq!(decoded.sign, v.sign);
            assert_eq!(decoded.digits, v.digits);
            assert_eq!(decoded.exponent, v.exponent);
        }
    }

    #[test]
    fn round_trip_zero() {
        let v = BigDecimal::zero(2);
        let (decoded, _) = decode_lex(&enc(&v)).unwrap();
        assert!(decoded.is_zero());
        assert_eq!(decoded.scale, 2);
    }
}
