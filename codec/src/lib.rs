//! Order-preserving binary codec for the relational table layer (C1).
//!
//! Two forms exist for every column type: [`lex`] (order-preserving, used
//! in keys) and [`plain`] (length-prefixed, used in values). [`value_codec`]
//! adds the schema-version prefix that wraps a row's plain-encoded value
//! columns.

pub mod bigint;
pub mod decimal;
pub mod error;
pub mod len_prefix;
pub mod lex;
pub mod plain;
pub mod types;
pub mod value_codec;

pub use bigint::BigInt;
pub use decimal::BigDecimal;
pub use error::{CodecError, Result};
pub use types::{ColumnDescriptor, ColumnType, Direction, NullsOrder, Value};
