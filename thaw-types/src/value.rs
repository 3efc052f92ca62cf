//! Width-preserving scalar values plus untyped literals.
//!
//! [`Value`] is what crosses the operator boundary inside output rows, so it
//! keeps the exact element width of the column it came from. [`Literal`]
//! captures qualifier constants before the planner knows the concrete column
//! type; coercion is deferred until classification.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use thaw_result::{Error, Result};

use crate::ElementType;

/// A single non-null scalar with its storage width preserved.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(Arc<str>),
    Bool(bool),
}

impl Value {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Int32(_) => ElementType::Int32,
            Value::Int64(_) => ElementType::Int64,
            Value::Float32(_) => ElementType::Float32,
            Value::Float64(_) => ElementType::Float64,
            Value::Str(_) => ElementType::Utf8,
            Value::Bool(_) => ElementType::Bool,
        }
    }

    /// Read element `index` out of an Arrow array, `None` for null.
    pub fn from_array(array: &ArrayRef, index: usize) -> Result<Option<Value>> {
        if array.is_null(index) {
            return Ok(None);
        }
        let value = match array.data_type() {
            DataType::Int32 => {
                let arr = downcast::<Int32Array>(array)?;
                Value::Int32(arr.value(index))
            }
            DataType::Int64 => {
                let arr = downcast::<Int64Array>(array)?;
                Value::Int64(arr.value(index))
            }
            DataType::Float32 => {
                let arr = downcast::<Float32Array>(array)?;
                Value::Float32(arr.value(index))
            }
            DataType::Float64 => {
                let arr = downcast::<Float64Array>(array)?;
                Value::Float64(arr.value(index))
            }
            DataType::Utf8 => {
                let arr = downcast::<StringArray>(array)?;
                Value::Str(Arc::from(arr.value(index)))
            }
            DataType::Boolean => {
                let arr = downcast::<BooleanArray>(array)?;
                Value::Bool(arr.value(index))
            }
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "unsupported array type {other:?} for scalar extraction"
                )));
            }
        };
        Ok(Some(value))
    }

    /// Build a one-element Arrow array holding this value, typed as `ty`.
    pub fn to_singleton_array(value: Option<&Value>, ty: ElementType) -> Result<ArrayRef> {
        let array: ArrayRef = match ty {
            ElementType::Int32 => Arc::new(Int32Array::from(vec![as_i32(value)?])),
            ElementType::Int64 => Arc::new(Int64Array::from(vec![as_i64(value)?])),
            ElementType::Float32 => Arc::new(Float32Array::from(vec![as_f32(value)?])),
            ElementType::Float64 => Arc::new(Float64Array::from(vec![as_f64(value)?])),
            ElementType::Utf8 => Arc::new(StringArray::from(vec![as_str(value)?])),
            ElementType::Bool => Arc::new(BooleanArray::from(vec![as_bool(value)?])),
        };
        Ok(array)
    }

    pub fn format_display(&self) -> String {
        match self {
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Float32(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Str(v) => format!("'{v}'"),
            Value::Bool(v) => v.to_string(),
        }
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Internal("array downcast disagreed with its data type".into()))
}

fn as_i32(value: Option<&Value>) -> Result<Option<i32>> {
    match value {
        None => Ok(None),
        Some(Value::Int32(v)) => Ok(Some(*v)),
        Some(other) => Err(type_mismatch("int32", other)),
    }
}

fn as_i64(value: Option<&Value>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(Value::Int64(v)) => Ok(Some(*v)),
        Some(other) => Err(type_mismatch("int64", other)),
    }
}

fn as_f32(value: Option<&Value>) -> Result<Option<f32>> {
    match value {
        None => Ok(None),
        Some(Value::Float32(v)) => Ok(Some(*v)),
        Some(other) => Err(type_mismatch("float32", other)),
    }
}

fn as_f64(value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(Value::Float64(v)) => Ok(Some(*v)),
        Some(other) => Err(type_mismatch("float64", other)),
    }
}

fn as_str(value: Option<&Value>) -> Result<Option<&str>> {
    match value {
        None => Ok(None),
        Some(Value::Str(v)) => Ok(Some(v.as_ref())),
        Some(other) => Err(type_mismatch("utf8", other)),
    }
}

fn as_bool(value: Option<&Value>) -> Result<Option<bool>> {
    match value {
        None => Ok(None),
        Some(Value::Bool(v)) => Ok(Some(*v)),
        Some(other) => Err(type_mismatch("bool", other)),
    }
}

fn type_mismatch(expected: &str, got: &Value) -> Error {
    Error::InvalidArgumentError(format!(
        "expected {expected} value, got {:?}",
        got.element_type()
    ))
}

/// A qualifier constant that has not yet been coerced to a column type.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    /// Coerce into a [`Value`] of the given column type. `Ok(None)` is SQL
    /// NULL; a literal that cannot represent the column type is an error.
    pub fn to_value(&self, ty: ElementType) -> Result<Option<Value>> {
        match (self, ty) {
            (Literal::Null, _) => Ok(None),
            (Literal::Int(v), ElementType::Int32) => {
                let narrowed = i32::try_from(*v).map_err(|_| {
                    Error::InvalidArgumentError(format!("literal {v} out of range for int32"))
                })?;
                Ok(Some(Value::Int32(narrowed)))
            }
            (Literal::Int(v), ElementType::Int64) => Ok(Some(Value::Int64(*v))),
            (Literal::Int(v), ElementType::Float32) => Ok(Some(Value::Float32(*v as f32))),
            (Literal::Int(v), ElementType::Float64) => Ok(Some(Value::Float64(*v as f64))),
            (Literal::Float(v), ElementType::Float32) => Ok(Some(Value::Float32(*v as f32))),
            (Literal::Float(v), ElementType::Float64) => Ok(Some(Value::Float64(*v))),
            (Literal::Str(v), ElementType::Utf8) => Ok(Some(Value::Str(Arc::from(v.as_str())))),
            (Literal::Bool(v), ElementType::Bool) => Ok(Some(Value::Bool(*v))),
            (lit, ty) => Err(Error::InvalidArgumentError(format!(
                "literal {lit:?} is not coercible to {ty:?}"
            ))),
        }
    }

    pub fn format_display(&self) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Int(v) => v.to_string(),
            Literal::Float(v) => v.to_string(),
            Literal::Str(v) => format!("'{v}'"),
            Literal::Bool(v) => v.to_string(),
        }
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(v as i64)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}
