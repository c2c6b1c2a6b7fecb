//! §3 "Encoded value": schema-version prefix plus the ordered list of
//! plain-encoded value columns.

use crate::error::{CodecError, Result};
use crate::plain;
use crate::types::{ColumnDescriptor, Value};

/// `None` means a non-evolvable (embedded) row type: no prefix at all, per
/// §3 ("schema version 0 denotes a non-evolvable row type with no
/// prefix"). `Some(v)` writes `v` as a 1-byte short form (`1..=127`) or a
/// 4-byte long form with the high bit set (up to ~2^31).
pub fn write_schema_version(version: Option<u32>, out: &mut Vec<u8>) -> Result<()> {
    match version {
        None => Ok(()),
        Some(v) if v <= 0x7F => {
            out.push(v as u8);
            Ok(())
        }
        Some(v) if v <= 0x7FFF_FFFF => {
            out.extend_from_slice(&(v | 0x8000_0000).to_be_bytes());
            Ok(())
        }
        Some(v) => Err(CodecError::UnknownSchemaVersion(v)),
    }
}

/// Reads a schema version prefix. Callers that know the row type is
/// embedded should not call this at all.
pub fn read_schema_version(buf: &[u8]) -> Result<(u32, usize)> {
    let b0 = *buf.first().ok_or(CodecError::MalformedEncoding("value: empty buffer"))?;
    if b0 & 0x80 == 0 {
        Ok((b0 as u32, 1))
    } else {
        if buf.len() < 4 {
            return Err(CodecError::MalformedEncoding("value: truncated schema version"));
        }
        let v = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Ok((v & 0x7FFF_FFFF, 4))
    }
}

/// Encodes value columns in the given (version-dependent) order.
pub fn encode_value_columns(columns: &[ColumnDescriptor], values: &[Value], out: &mut Vec<u8>) -> Result<()> {
    if columns.len() != values.len() {
        return Err(CodecError::MalformedEncoding("value: column/value count mismatch"));
    }
    for (col, val) in columns.iter().zip(values.iter()) {
        plain::encode(val, &col.type_code, col.nullable, out)?;
    }
    Ok(())
}

/// Decodes value columns in the given order, returning the values and the
/// number of bytes consumed.
pub fn decode_value_columns(columns: &[ColumnDescriptor], buf: &[u8]) -> Result<(Vec<Value>, usize)> {
    let mut offset = 0;
    let mut values = Vec::with_capacity(columns.len());
    for col in columns {
        let (v, n) = plain::decode(&buf[offset..], &col.type_code, col.nullable)?;
        values.push(v);
        offset += n;
    }
    Ok((values, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    #[test]
    fn schema_version_round_trips_both_forms() {
        for v in [0u32, 1, 127, 128, 1_000_000] {
            let mut out = Vec::new();
            write_schema_version(Some(v), &mut out).unwrap();
            let (decoded, consumed) = read_schema_version(&out).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, out.len());
        }
    }

    #[test]
    fn embedded_row_type_has_no_prefix() {
        let mut out = Vec::new();
        write_schema_version(None, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn round_trips_value_columns() {
        let columns = vec![
            ColumnDescriptor::value("name", ColumnType::Utf8, false, 0),
            ColumnDescriptor::value("age", ColumnType::I32, true, 1),
        ];
        let values = vec![Value::Utf8("ada".into()), Value::Null];
        let mut out = Vec::new();
        encode_value_columns(&columns, &values, &mut out).unwrap();
        let (decoded, consumed) = decode_value_columns(&columns, &out).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, out.len());
    }
}
