//! One-way column kind inference and width narrowing.

use crate::error::{Result, StorageError};

use super::{Column, Complex128, Complex64, Kind, Value};

/// Assigns kinds to unset columns from the first non-null value seen.
///
/// An empty `columns` is first sized to the tuple. Untyped literals in
/// `values` are canonicalized in place on every call; a column kind, once
/// set, is never changed.
pub fn infer(values: &mut [Value], columns: &mut Vec<Column>) {
    if columns.is_empty() {
        columns.extend((0..values.len()).map(Column::untyped));
    }

    for (value, column) in values.iter_mut().zip(columns.iter_mut()) {
        if value.is_null() {
            continue;
        }
        value.canonicalize();
        if column.kind.is_none() {
            column.kind = value.kind();
        }
    }
}

/// Converts a value to the declared kind.
///
/// Integer and float narrowing truncates like an `as` cast; there is no
/// overflow check. `Null` passes through unchanged.
pub fn narrow(value: Value, kind: Kind) -> Result<Value> {
    let wide = widen(value);
    let narrowed = match (wide, kind) {
        (Value::Null, _) => Value::Null,
        (Value::Bool(v), Kind::Bool) => Value::Bool(v),
        (Value::Int64(v), Kind::Int8) => Value::Int8(v as i8),
        (Value::Int64(v), Kind::Int16) => Value::Int16(v as i16),
        (Value::Int64(v), Kind::Int32) => Value::Int32(v as i32),
        (Value::Int64(v), Kind::Int64) => Value::Int64(v),
        (Value::Uint64(v), Kind::Uint8) => Value::Uint8(v as u8),
        (Value::Uint64(v), Kind::Uint16) => Value::Uint16(v as u16),
        (Value::Uint64(v), Kind::Uint32) => Value::Uint32(v as u32),
        (Value::Uint64(v), Kind::Uint64) => Value::Uint64(v),
        (Value::Float64(v), Kind::Float32) => Value::Float32(v as f32),
        (Value::Float64(v), Kind::Float64) => Value::Float64(v),
        (Value::Complex128(v), Kind::Complex64) => {
            Value::Complex64(Complex64::new(v.re as f32, v.im as f32))
        }
        (Value::Complex128(v), Kind::Complex128) => Value::Complex128(v),
        (Value::String(v), Kind::String) => Value::String(v),
        (other, kind) => {
            return Err(StorageError::TypeMismatch {
                expected: kind.name().to_string(),
                got: other.kind_name().to_string(),
            })
        }
    };
    Ok(narrowed)
}

/// Narrows the value at each typed column's `index`.
///
/// Columns past the end of `values` are skipped: tuples in one store may be
/// shorter than the tuple the columns were sized from.
pub fn enforce(values: &mut [Value], columns: &[Column]) -> Result<()> {
    for column in columns {
        let (Some(kind), Some(slot)) = (column.kind, values.get_mut(column.index)) else {
            continue;
        };
        let value = std::mem::replace(slot, Value::Null);
        *slot = narrow(value, kind)?;
    }
    Ok(())
}

/// Brings a value to the canonical width its encoding uses.
pub(crate) fn widen(value: Value) -> Value {
    match value {
        Value::Int8(v) => Value::Int64(v.into()),
        Value::Int16(v) => Value::Int64(v.into()),
        Value::Int32(v) | Value::IdealRune(v) => Value::Int64(v.into()),
        Value::IdealInt(v) => Value::Int64(v),
        Value::Uint8(v) => Value::Uint64(v.into()),
        Value::Uint16(v) => Value::Uint64(v.into()),
        Value::Uint32(v) => Value::Uint64(v.into()),
        Value::IdealUint(v) => Value::Uint64(v),
        Value::Float32(v) => Value::Float64(v.into()),
        Value::IdealFloat(v) => Value::Float64(v),
        Value::Complex64(v) => Value::Complex128(Complex128::new(v.re.into(), v.im.into())),
        Value::IdealComplex(v) => Value::Complex128(v),
        other => other,
    }
}
