use loopjit_ir::{BinaryOp, CType, ElemType};

use crate::error::EvalError;

/// A runtime value.
///
/// Buffers are never copied: `Buffer(slot)` refers to the buffer passed at
/// position `slot` of the outermost call.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Buffer(usize),
}

impl Value {
    pub const fn type_name(self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Buffer(_) => "buffer",
        }
    }

    /// Numeric value as `f64`; `None` for buffers.
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(n as f64),
            Value::Float(x) => Some(x),
            Value::Buffer(_) => None,
        }
    }

    pub fn as_int(self) -> Result<i64, EvalError> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(EvalError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_buffer(self) -> Result<usize, EvalError> {
        match self {
            Value::Buffer(slot) => Ok(slot),
            other => Err(EvalError::TypeMismatch {
                expected: "buffer",
                found: other.type_name(),
            }),
        }
    }

    fn number(self) -> Result<Num, EvalError> {
        match self {
            Value::Int(n) => Ok(Num::Int(n)),
            Value::Float(x) => Ok(Num::Float(x)),
            Value::Buffer(_) => Err(EvalError::TypeMismatch {
                expected: "number",
                found: "buffer",
            }),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
        match (lhs.number()?, rhs.number()?) {
            (Num::Int(a), Num::Int(b)) => int_binary(op, a, b).map(Value::Int),
            (a, b) => {
                let (a, b) = (a.to_f64(), b.to_f64());
                Ok(Value::Float(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Rem => a % b,
                }))
            }
        }
    }

    pub fn neg(self) -> Result<Value, EvalError> {
        Ok(match self.number()? {
            Num::Int(n) => Value::Int(n.wrapping_neg()),
            Num::Float(x) => Value::Float(-x),
        })
    }

    /// Convert for storage into an element of type `elem`.
    pub fn coerce_elem(self, elem: ElemType) -> Result<Value, EvalError> {
        Ok(match (self.number()?, elem) {
            (Num::Int(n), ElemType::I32) => Value::Int(i64::from(n as i32)),
            (Num::Float(x), ElemType::I32) => Value::Int(i64::from(x as i32)),
            (Num::Int(n), ElemType::I64) => Value::Int(n),
            (Num::Float(x), ElemType::I64) => Value::Int(x as i64),
            (Num::Int(n), ElemType::F32) => Value::Float(f64::from(n as f32)),
            (Num::Float(x), ElemType::F32) => Value::Float(f64::from(x as f32)),
            (Num::Int(n), ElemType::F64) => Value::Float(n as f64),
            (Num::Float(x), ElemType::F64) => Value::Float(x),
        })
    }

    /// Convert for storage into a slot declared with `ty`.
    pub fn coerce(self, ty: CType) -> Result<Value, EvalError> {
        match ty {
            CType::Index => self.coerce_elem(ElemType::I64),
            CType::Scalar(elem) => self.coerce_elem(elem),
            CType::Pointer(_) => self.as_buffer().map(Value::Buffer),
            CType::Void => Err(EvalError::TypeMismatch {
                expected: "void",
                found: self.type_name(),
            }),
        }
    }
}

#[derive(Copy, Clone)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<i64, EvalError> {
    match op {
        BinaryOp::Add => Ok(a.wrapping_add(b)),
        BinaryOp::Sub => Ok(a.wrapping_sub(b)),
        BinaryOp::Mul => Ok(a.wrapping_mul(b)),
        BinaryOp::Div if b == 0 => Err(EvalError::DivisionByZero),
        BinaryOp::Div => Ok(a.wrapping_div(b)),
        BinaryOp::Rem if b == 0 => Err(EvalError::DivisionByZero),
        BinaryOp::Rem => Ok(a.wrapping_rem(b)),
    }
}
