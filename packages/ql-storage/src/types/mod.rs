//! Scalar values, scalar kinds and column descriptors.

mod infer;

pub use infer::{enforce, infer, narrow};
pub(crate) use infer::widen;

use std::fmt;

/// Single-precision complex number.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex64 {
    pub re: f32,
    pub im: f32,
}

/// Double-precision complex number.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex128 {
    pub re: f64,
    pub im: f64,
}

impl Complex64 {
    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

impl Complex128 {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// Concrete scalar kind a column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
}

impl Kind {
    /// Returns the lowercase kind name.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int8 => "int8",
            Kind::Int16 => "int16",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Uint8 => "uint8",
            Kind::Uint16 => "uint16",
            Kind::Uint32 => "uint32",
            Kind::Uint64 => "uint64",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::Complex64 => "complex64",
            Kind::Complex128 => "complex128",
            Kind::String => "string",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar field value.
///
/// The `Ideal*` variants are untyped literals. They never reach disk in that
/// form: encoding and inference turn them into their canonical concrete kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Complex64(Complex64),
    Complex128(Complex128),
    String(String),
    IdealInt(i64),
    IdealRune(i32),
    IdealUint(u64),
    IdealFloat(f64),
    IdealComplex(Complex128),
}

impl Value {
    /// Concrete kind of this value after canonicalizing untyped literals.
    ///
    /// Returns `None` for `Null`.
    pub fn kind(&self) -> Option<Kind> {
        let kind = match self {
            Value::Null => return None,
            Value::Bool(_) => Kind::Bool,
            Value::Int8(_) => Kind::Int8,
            Value::Int16(_) => Kind::Int16,
            Value::Int32(_) | Value::IdealRune(_) => Kind::Int32,
            Value::Int64(_) | Value::IdealInt(_) => Kind::Int64,
            Value::Uint8(_) => Kind::Uint8,
            Value::Uint16(_) => Kind::Uint16,
            Value::Uint32(_) => Kind::Uint32,
            Value::Uint64(_) | Value::IdealUint(_) => Kind::Uint64,
            Value::Float32(_) => Kind::Float32,
            Value::Float64(_) | Value::IdealFloat(_) => Kind::Float64,
            Value::Complex64(_) => Kind::Complex64,
            Value::Complex128(_) | Value::IdealComplex(_) => Kind::Complex128,
            Value::String(_) => Kind::String,
        };
        Some(kind)
    }

    /// Human-readable kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::IdealInt(_) => "ideal int",
            Value::IdealRune(_) => "ideal rune",
            Value::IdealUint(_) => "ideal uint",
            Value::IdealFloat(_) => "ideal float",
            Value::IdealComplex(_) => "ideal complex",
            other => other.kind().map(Kind::name).unwrap_or("null"),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Replaces an untyped literal by its smallest lossless concrete kind.
    pub fn canonicalize(&mut self) {
        let concrete = match *self {
            Value::IdealInt(v) => Value::Int64(v),
            Value::IdealRune(v) => Value::Int32(v),
            Value::IdealUint(v) => Value::Uint64(v),
            Value::IdealFloat(v) => Value::Float64(v),
            Value::IdealComplex(v) => Value::Complex128(v),
            _ => return,
        };
        *self = concrete;
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Column descriptor: field position plus declared or inferred kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Zero-based position of the field in the record
    pub index: usize,
    /// Kind, `None` until declared or inferred
    pub kind: Option<Kind>,
}

impl Column {
    pub fn new(index: usize, kind: Kind) -> Self {
        Self {
            index,
            kind: Some(kind),
        }
    }

    pub fn untyped(index: usize) -> Self {
        Self { index, kind: None }
    }
}
