//! Element and C types.
//!
//! [`ElemType`] is the element type of a buffer or the type of a scalar
//! argument; it is part of the specialization key. [`CType`] is what a
//! declaration carries once the lowering passes have typed it.

use std::fmt;

use smallvec::SmallVec;

/// Element type of a contiguous buffer or a scalar argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElemType {
    I32,
    I64,
    F32,
    F64,
}

impl ElemType {
    pub const ALL: [ElemType; 4] = [ElemType::I32, ElemType::I64, ElemType::F32, ElemType::F64];

    /// C spelling of the type (`<stdint.h>` names for integers).
    pub const fn c_name(self) -> &'static str {
        match self {
            ElemType::I32 => "int32_t",
            ElemType::I64 => "int64_t",
            ElemType::F32 => "float",
            ElemType::F64 => "double",
        }
    }

    /// Short name used in signatures and on the command line.
    pub const fn short_name(self) -> &'static str {
        match self {
            ElemType::I32 => "i32",
            ElemType::I64 => "i64",
            ElemType::F32 => "f32",
            ElemType::F64 => "f64",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.short_name() == name)
    }

    /// Size of one element in bytes.
    pub const fn byte_width(self) -> usize {
        match self {
            ElemType::I32 | ElemType::F32 => 4,
            ElemType::I64 | ElemType::F64 => 8,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, ElemType::F32 | ElemType::F64)
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Type attached to a typed declaration in the target fragment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CType {
    /// Loop counter type.
    Index,
    /// Scalar of the given element type.
    Scalar(ElemType),
    /// Pointer to the first element of a contiguous buffer.
    Pointer(ElemType),
    Void,
}

impl CType {
    pub fn c_name(self) -> String {
        match self {
            CType::Index => "int64_t".to_owned(),
            CType::Scalar(elem) => elem.c_name().to_owned(),
            CType::Pointer(elem) => format!("{}*", elem.c_name()),
            CType::Void => "void".to_owned(),
        }
    }

    /// Element type of a scalar or pointer, `None` for `Index`/`Void`.
    pub const fn elem(self) -> Option<ElemType> {
        match self {
            CType::Scalar(elem) | CType::Pointer(elem) => Some(elem),
            CType::Index | CType::Void => None,
        }
    }

    #[inline]
    pub const fn is_pointer(self) -> bool {
        matches!(self, CType::Pointer(_))
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.c_name())
    }
}

/// Element type and exact shape of a buffer argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub elem: ElemType,
    pub shape: SmallVec<[usize; 4]>,
}

impl ArrayType {
    pub fn new(elem: ElemType, shape: &[usize]) -> Self {
        ArrayType {
            elem,
            shape: SmallVec::from_slice(shape),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements: the product of all dimensions.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.elem)?;
        for (i, dim) in self.shape.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}

/// Type of one argument of a specialized call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgType {
    Array(ArrayType),
    Scalar(ElemType),
}

impl ArgType {
    pub fn elem(&self) -> ElemType {
        match self {
            ArgType::Array(array) => array.elem,
            ArgType::Scalar(elem) => *elem,
        }
    }

    /// Type of the entry-function parameter receiving this argument.
    pub fn c_type(&self) -> CType {
        match self {
            ArgType::Array(array) => CType::Pointer(array.elem),
            ArgType::Scalar(elem) => CType::Scalar(*elem),
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self {
            ArgType::Array(array) => Some(array),
            ArgType::Scalar(_) => None,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Array(array) => fmt::Display::fmt(array, f),
            ArgType::Scalar(elem) => fmt::Display::fmt(elem, f),
        }
    }
}
