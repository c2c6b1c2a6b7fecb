//! Plain (value-side) encoding (§4.1 "Plain rules" / §3 "Encoded value").
//!
//! Fixed-width primitives are written in their natural big-endian form --
//! no sign-bit or descending tricks, since plain form never needs to be
//! byte-comparable. Variable-length content (strings, byte arrays, big
//! integers, big decimals, arrays) is length-prefixed with
//! [`crate::len_prefix`].

use crate::bigint;
use crate::decimal;
use crate::error::{CodecError, Result};
use crate::len_prefix::{read_len_prefix, write_len_prefix};
use crate::types::{ColumnType, Value};

pub fn encode_non_null(value: &Value, ty: &ColumnType, out: &mut Vec<u8>) -> Result<()> {
    match (ty, value) {
        (ColumnType::Bool, Value::Bool(v)) => out.push(if *v { 1 } else { 0 }),
        (ColumnType::U8, Value::U8(v)) => out.push(*v),
        (ColumnType::I8, Value::I8(v)) => out.push(*v as u8),
        (ColumnType::U16, Value::U16(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (ColumnType::I16, Value::I16(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (ColumnType::U32, Value::U32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (ColumnType::I32, Value::I32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (ColumnType::U64, Value::U64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (ColumnType::I64, Value::I64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (ColumnType::F32, Value::F32(v)) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
        (ColumnType::F64, Value::F64(v)) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
        (ColumnType::BigInt, Value::BigInt(v)) => {
            let mut inner = Vec::new();
            bigint::encode_lex(v, &mut inner);
            write_len_prefix(inner.len() as u32, out);
            out.extend_from_slice(&inner);
        }
        (ColumnType::BigDecimal, Value::BigDecimal(v)) => {
            let mut inner = Vec::new();
            decimal::encode_lex(v, &mut inner);
            write_len_prefix(inner.len() as u32, out);
            out.extend_from_slice(&inner);
        }
        (ColumnType::Char, Value::Char(c)) => {
            let mut buf = [0u8; 4];
            let s = c.encode_utf8(&mut buf);
            write_len_prefix(s.len() as u32, out);
            out.extend_from_slice(s.as_bytes());
        }
        (ColumnType::Utf8, Value::Utf8(s)) => {
            write_len_prefix(s.len() as u32, out);
            out.extend_from_slice(s.as_bytes());
        }
        (ColumnType::Bytes, Value::Bytes(b)) => {
            write_len_prefix(b.len() as u32, out);
            out.extend_from_slice(b);
        }
        (ColumnType::Array(elem_ty), Value::Array(items)) => {
            write_len_prefix(items.len() as u32, out);
            for item in items {
                encode_non_null(item, elem_ty, out)?;
            }
        }
        _ => return Err(CodecError::UnsupportedConversion { from: "Value", to: "column type" }),
    }
    Ok(())
}

/// Encodes one value column: a leading null-header byte only for
/// non-primitive nullable columns (§3: primitives are never nullable
/// unless boxed).
pub fn encode(value: &Value, ty: &ColumnType, nullable: bool, out: &mut Vec<u8>) -> Result<()> {
    let needs_null_header = nullable && !ty.is_primitive();
    if needs_null_header {
        out.push(if value.is_null() { 0 } else { 1 });
        if value.is_null() {
            return Ok(());
        }
    } else if value.is_null() {
        return Err(CodecError::MalformedEncoding("null value for a column with no null header"));
    }
    encode_non_null(value, ty, out)
}

pub fn decode(buf: &[u8], ty: &ColumnType, nullable: bool) -> Result<(Value, usize)> {
    let needs_null_header = nullable && !ty.is_primitive();
    if needs_null_header {
        let marker = *buf.first().ok_or(CodecError::MalformedEncoding("plain decode: empty buffer"))?;
        if marker == 0 {
            return Ok((Value::Null, 1));
        }
        let (value, n) = decode_non_null(&buf[1..], ty)?;
        return Ok((value, n + 1));
    }
    decode_non_null(buf, ty)
}

fn decode_non_null(buf: &[u8], ty: &ColumnType) -> Result<(Value, usize)> {
    match ty {
        ColumnType::Bool => Ok((Value::Bool(*buf.first().ok_or(CodecError::MalformedEncoding("plain: truncated bool"))? != 0), 1)),
        ColumnType::U8 => Ok((Value::U8(*buf.first().ok_or(CodecError::MalformedEncoding("plain: truncated u8"))?), 1)),
        ColumnType::I8 => Ok((Value::I8(*buf.first().ok_or(CodecError::MalformedEncoding("plain: truncated i8"))? as i8), 1)),
        ColumnType::U16 => read_be(buf, 2).map(|(b, n)| (Value::U16(u16::from_be_bytes(b[..2].try_into().unwrap())), n)),
        ColumnType::I16 => read_be(buf, 2).map(|(b, n)| (Value::I16(i16::from_be_bytes(b[..2].try_into().unwrap())), n)),
        ColumnType::U32 => read_be(buf, 4).map(|(b, n)| (Value::U32(u32::from_be_bytes(b[..4].try_into().unwrap())), n)),
        ColumnType::I32 => read_be(buf, 4).map(|(b, n)| (Value::I32(i32::from_be_bytes(b[..4].try_into().unwrap())), n)),
        ColumnType::U64 => read_be(buf, 8).map(|(b, n)| (Value::U64(u64::from_be_bytes(b[..8].try_into().unwrap())), n)),
        ColumnType::I64 => read_be(buf, 8).map(|(b, n)| (Value::I64(i64::from_be_bytes(b[..8].try_into().unwrap())), n)),
        ColumnType::F32 => read_be(buf, 4).map(|(b, n)| (Value::F32(f32::from_bits(u32::from_be_bytes(b[..4].try_into().unwrap()))), n)),
        ColumnType::F64 => read_be(buf, 8).map(|(b, n)| (Value::F64(f64::from_bits(u64::from_be_bytes(b[..8].try_into().unwrap()))), n)),
        ColumnType::BigInt => {
            let (len, lp) = read_len_prefix(buf)?;
            let start = lp;
            let end = start + len as usize;
            let (v, _) = bigint::decode_lex(&buf[start..end])?;
            Ok((Value::BigInt(v), end))
        }
        ColumnType::BigDecimal => {
            let (len, lp) = read_len_prefix(buf)?;
            let start = lp;
            let end = start + len as usize;
            let (v, _) = decimal::decode_lex(&buf[start..end])?;
            Ok((Value::BigDecimal(v), end))
        }
        ColumnType::Char => {
            let (len, lp) = read_len_prefix(buf)?;
            let start = lp;
            let end = start + len as usize;
            let s = std::str::from_utf8(&buf[start..end]).map_err(|_| CodecError::MalformedEncoding("plain: char not utf-8"))?;
            let c = s.chars().next().ok_or(CodecError::MalformedEncoding("plain: empty char"))?;
            Ok((Value::Char(c), end))
        }
        ColumnType::Utf8 => {
            let (len, lp) = read_len_prefix(buf)?;
            let start = lp;
            let end = start + len as usize;
            if buf.len() < end {
                return Err(CodecError::MalformedEncoding("plain: utf8 truncated"));
            }
            let s = String::from_utf8(buf[start..end].to_vec()).map_err(|_| CodecError::MalformedEncoding("plain: invalid utf-8"))?;
            Ok((Value::Utf8(s), end))
        }
        ColumnType::Bytes => {
            let (len, lp) = read_len_prefix(buf)?;
            let start = lp;
            let end = start + len as usize;
            if buf.len() < end {
                return Err(CodecError::MalformedEncoding("plain: bytes truncated"));
            }
            Ok((Value::Bytes(buf[start..end].to_vec()), end))
        }
        ColumnType::Array(elem_ty) => {
            let (count, lp) = read_len_prefix(buf)?;
            let mut offset = lp;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (v, n) = decode_non_null(&buf[offset..], elem_ty)?;
                items.push(v);
                offset += n;
            }
            Ok((Value::Array(items), offset))
        }
    }
}

fn read_be(buf: &[u8], n: usize) -> Result<(&[u8], usize)> {
    if buf.len() < n {
        return Err(CodecError::MalformedEncoding("plain: truncated fixed-width field"));
    }
    Ok((&buf[..n], n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    #[test]
    fn round_trip_primitives() {
        let cases = [
            (Value::Bool(true), ColumnType::Bool),
            (Value::I32(-12345), ColumnType::I32),
            (Value::F64(3.5), ColumnType::F64),
            (Value::Utf8("hello".into()), ColumnType::Utf8),
            (Value::Bytes(vec![1, 2, 3]), ColumnType::Bytes),
        ];
        for (v, ty) in cases {
            let mut out = Vec::new();
            encode(&v, &ty, false, &mut out).unwrap();
            let (decoded, consumed) = decode(&out, &ty, false).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, out.len());
        }
    }

    #[test]
    fn nullable_non_primitive_round_trips_null() {
        let ty = ColumnType::Utf8;
        let mut out = Vec::new();
        encode(&Value::Null, &ty, true, &mut out).unwrap();
        let (decoded, consumed) = decode(&out, &ty, true).unwrap();
        assert_eq!(decoded, Value::Null);
        assert_eq!(consumed, 1);
    }
}
