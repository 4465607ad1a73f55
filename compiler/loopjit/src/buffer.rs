//! Call arguments and results.
//!
//! Buffers are owned by the caller and passed by mutable reference; a
//! kernel rewrites them in place and never takes ownership.

use std::fmt;

use loopjit_eval::Value;
pub use loopjit_eval::{Buffer, BufferData, Element, ShapeError};
use loopjit_ir::{ArgType, ElemType};

/// A typed scalar argument or result.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn elem_type(self) -> ElemType {
        match self {
            Scalar::I32(_) => ElemType::I32,
            Scalar::I64(_) => ElemType::I64,
            Scalar::F32(_) => ElemType::F32,
            Scalar::F64(_) => ElemType::F64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::I32(n) => f64::from(n),
            Scalar::I64(n) => n as f64,
            Scalar::F32(x) => f64::from(x),
            Scalar::F64(x) => x,
        }
    }

    pub(crate) fn to_value(self) -> Value {
        match self {
            Scalar::I32(n) => Value::Int(i64::from(n)),
            Scalar::I64(n) => Value::Int(n),
            Scalar::F32(x) => Value::Float(f64::from(x)),
            Scalar::F64(x) => Value::Float(x),
        }
    }

    /// Narrow an interpreter value to `elem`; `None` for buffers.
    pub(crate) fn from_value(value: Value, elem: ElemType) -> Option<Scalar> {
        Some(match value.coerce_elem(elem).ok()? {
            Value::Int(n) if elem == ElemType::I32 => Scalar::I32(n as i32),
            Value::Int(n) => Scalar::I64(n),
            Value::Float(x) if elem == ElemType::F32 => Scalar::F32(x as f32),
            Value::Float(x) => Scalar::F64(x),
            Value::Buffer(_) => return None,
        })
    }

    /// Parse `text` as a value of type `elem`.
    pub fn parse(elem: ElemType, text: &str) -> Option<Scalar> {
        let text = text.trim();
        Some(match elem {
            ElemType::I32 => Scalar::I32(text.parse().ok()?),
            ElemType::I64 => Scalar::I64(text.parse().ok()?),
            ElemType::F32 => Scalar::F32(text.parse().ok()?),
            ElemType::F64 => Scalar::F64(text.parse().ok()?),
        })
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::I32(n) => write!(f, "{n}"),
            Scalar::I64(n) => write!(f, "{n}"),
            Scalar::F32(x) => write!(f, "{x:?}"),
            Scalar::F64(x) => write!(f, "{x:?}"),
        }
    }
}

macro_rules! scalar_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Scalar {
            fn from(value: $ty) -> Self {
                Scalar::$variant(value)
            }
        }

        impl From<$ty> for Arg<'_> {
            fn from(value: $ty) -> Self {
                Arg::Scalar(Scalar::$variant(value))
            }
        }
    };
}

scalar_from!(i32, I32);
scalar_from!(i64, I64);
scalar_from!(f32, F32);
scalar_from!(f64, F64);

/// One argument of a specialized call.
#[derive(Debug)]
pub enum Arg<'a> {
    Array(&'a mut Buffer),
    Scalar(Scalar),
}

impl Arg<'_> {
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::Array(buffer) => ArgType::Array(buffer.array_type()),
            Arg::Scalar(scalar) => ArgType::Scalar(scalar.elem_type()),
        }
    }
}

impl<'a> From<&'a mut Buffer> for Arg<'a> {
    fn from(buffer: &'a mut Buffer) -> Self {
        Arg::Array(buffer)
    }
}

impl From<Scalar> for Arg<'_> {
    fn from(scalar: Scalar) -> Self {
        Arg::Scalar(scalar)
    }
}

/// What a kernel returned.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Output {
    Void,
    Scalar(Scalar),
    /// The buffer passed as argument `param`, rewritten in place.
    Buffer { param: usize },
}

impl Output {
    pub fn as_scalar(self) -> Option<Scalar> {
        match self {
            Output::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Void => f.write_str("void"),
            Output::Scalar(scalar) => write!(f, "{scalar}"),
            Output::Buffer { param } => write!(f, "buffer argument {param}"),
        }
    }
}

/// Interpreter view of an argument list.
pub(crate) struct BoundArgs<'s> {
    pub buffers: Vec<&'s mut Buffer>,
    pub values: Vec<Value>,
    /// Argument position of each buffer slot.
    pub params: Vec<usize>,
}

pub(crate) fn bind_args<'s>(args: &'s mut [Arg<'_>]) -> BoundArgs<'s> {
    let mut bound = BoundArgs {
        buffers: Vec::new(),
        values: Vec::with_capacity(args.len()),
        params: Vec::new(),
    };
    for (position, arg) in args.iter_mut().enumerate() {
        match arg {
            Arg::Array(buffer) => {
                bound.values.push(Value::Buffer(bound.buffers.len()));
                bound.buffers.push(&mut **buffer);
                bound.params.push(position);
            }
            Arg::Scalar(scalar) => bound.values.push(scalar.to_value()),
        }
    }
    bound
}
