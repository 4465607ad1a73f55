//! Caller-owned buffers.

use loopjit_ir::{ArrayType, ElemType};
use smallvec::SmallVec;

use crate::error::EvalError;
use crate::value::Value;

/// Contiguous element storage of one element type.
#[derive(Clone, Debug, PartialEq)]
pub enum BufferData {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl BufferData {
    pub fn elem_type(&self) -> ElemType {
        match self {
            BufferData::I32(_) => ElemType::I32,
            BufferData::I64(_) => ElemType::I64,
            BufferData::F32(_) => ElemType::F32,
            BufferData::F64(_) => ElemType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BufferData::I32(v) => v.len(),
            BufferData::I64(v) => v.len(),
            BufferData::F32(v) => v.len(),
            BufferData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn zeros(elem: ElemType, len: usize) -> Self {
        match elem {
            ElemType::I32 => BufferData::I32(vec![0; len]),
            ElemType::I64 => BufferData::I64(vec![0; len]),
            ElemType::F32 => BufferData::F32(vec![0.0; len]),
            ElemType::F64 => BufferData::F64(vec![0.0; len]),
        }
    }
}

/// Rust element types that can back a [`Buffer`].
pub trait Element: Copy + sealed::Sealed {
    const ELEM: ElemType;

    fn wrap(data: Vec<Self>) -> BufferData;
    fn slice(data: &BufferData) -> Option<&[Self]>;
}

mod sealed {
    pub trait Sealed {}
}

macro_rules! element {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const ELEM: ElemType = ElemType::$variant;

            fn wrap(data: Vec<Self>) -> BufferData {
                BufferData::$variant(data)
            }

            fn slice(data: &BufferData) -> Option<&[Self]> {
                match data {
                    BufferData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

element!(i32, I32);
element!(i64, I64);
element!(f32, F32);
element!(f64, F64);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("shape {shape:?} needs {expected} elements, data has {found}")]
pub struct ShapeError {
    pub shape: Vec<usize>,
    pub expected: usize,
    pub found: usize,
}

/// A caller-owned, shaped, contiguous buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    shape: SmallVec<[usize; 4]>,
    data: BufferData,
}

impl Buffer {
    /// One-dimensional buffer over `data`.
    pub fn from_vec<T: Element>(data: Vec<T>) -> Self {
        Buffer {
            shape: SmallVec::from_slice(&[data.len()]),
            data: T::wrap(data),
        }
    }

    pub fn with_shape<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self, ShapeError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ShapeError {
                shape: shape.to_vec(),
                expected,
                found: data.len(),
            });
        }
        Ok(Buffer {
            shape: SmallVec::from_slice(shape),
            data: T::wrap(data),
        })
    }

    pub fn zeros(elem: ElemType, shape: &[usize]) -> Self {
        Buffer {
            shape: SmallVec::from_slice(shape),
            data: BufferData::zeros(elem, shape.iter().product()),
        }
    }

    pub fn elem_type(&self) -> ElemType {
        self.data.elem_type()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn array_type(&self) -> ArrayType {
        ArrayType::new(self.elem_type(), &self.shape)
    }

    pub fn data(&self) -> &BufferData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut BufferData {
        &mut self.data
    }

    /// Typed view; `None` when `T` is not the element type.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Elements widened to `f64`, for comparisons across element types.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            BufferData::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            BufferData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            BufferData::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            BufferData::F64(v) => v.clone(),
        }
    }

    pub fn load(&self, index: i64) -> Result<Value, EvalError> {
        let i = self.check(index)?;
        Ok(match &self.data {
            BufferData::I32(v) => Value::Int(i64::from(v[i])),
            BufferData::I64(v) => Value::Int(v[i]),
            BufferData::F32(v) => Value::Float(f64::from(v[i])),
            BufferData::F64(v) => Value::Float(v[i]),
        })
    }

    /// Store `value`, converted to the element type.
    pub fn store(&mut self, index: i64, value: Value) -> Result<(), EvalError> {
        let i = self.check(index)?;
        let value = value.coerce_elem(self.elem_type())?;
        match (&mut self.data, value) {
            (BufferData::I32(v), Value::Int(n)) => v[i] = n as i32,
            (BufferData::I64(v), Value::Int(n)) => v[i] = n,
            (BufferData::F32(v), Value::Float(x)) => v[i] = x as f32,
            (BufferData::F64(v), Value::Float(x)) => v[i] = x,
            (_, other) => {
                return Err(EvalError::TypeMismatch {
                    expected: "element",
                    found: other.type_name(),
                })
            }
        }
        Ok(())
    }

    fn check(&self, index: i64) -> Result<usize, EvalError> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.len())
            .ok_or(EvalError::OutOfBounds {
                index,
                len: self.len(),
            })
    }
}
