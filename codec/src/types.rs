use serde::{Deserialize, Serialize};

/// One of the scalar or array column types a row may declare.
///
/// Mirrors the type-code list in §3: integers are split by width and
/// signedness because their lex encodings differ (sign-bit XOR only
/// applies to signed widths).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    BigInt,
    BigDecimal,
    Utf8,
    Char,
    Bytes,
    Array(Box<ColumnType>),
}

impl ColumnType {
    /// `true` for types with a fixed on-wire width in lex form (no length prefix).
    pub fn is_fixed_width(&self) -> bool {
        matches!(
            self,
            ColumnType::Bool
                | ColumnType::U8
                | ColumnType::I8
                | ColumnType::U16
                | ColumnType::I16
                | ColumnType::U32
                | ColumnType::I32
                | ColumnType::U64
                | ColumnType::I64
                | ColumnType::F32
                | ColumnType::F64
        )
    }

    pub fn is_primitive(&self) -> bool {
        self.is_fixed_width()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    Low,
    High,
}

/// Essential attributes of a column descriptor, per §3.
///
/// Direction and null placement are only meaningful when the column
/// participates in a key; value-only columns carry `Direction::Asc` /
/// `NullsOrder::Low` as inert defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_code: ColumnType,
    pub nullable: bool,
    pub direction: Direction,
    pub nulls: NullsOrder,
    pub ordinal: u32,
}

impl ColumnDescriptor {
    pub fn key(
        name: impl Into<String>,
        type_code: ColumnType,
        direction: Direction,
        nulls: NullsOrder,
        ordinal: u32,
    ) -> Self {
        ColumnDescriptor {
            name: name.into(),
            type_code,
            nullable: false,
            direction,
            nulls,
            ordinal,
        }
    }

    pub fn value(name: impl Into<String>, type_code: ColumnType, nullable: bool, ordinal: u32) -> Self {
        ColumnDescriptor {
            name: name.into(),
            type_code,
            nullable,
            direction: Direction::Asc,
            nulls: NullsOrder::Low,
            ordinal,
        }
    }
}

/// A decoded scalar or array value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    BigInt(crate::bigint::BigInt),
    BigDecimal(crate::decimal::BigDecimal),
    Utf8(String),
    Char(char),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}
