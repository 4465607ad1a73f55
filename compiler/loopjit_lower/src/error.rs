use loopjit_ir::CType;

use crate::op::FunctionalOp;

/// Why a function could not be lowered.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error("{op} requires lambda to be specialized")]
    NotALambda { op: FunctionalOp },

    #[error("{op} takes {expected} arguments, found {found}")]
    Arity {
        op: FunctionalOp,
        expected: usize,
        found: usize,
    },

    #[error("{op} needs a function of {expected} parameters, but `{lambda}` takes {found}")]
    LambdaArity {
        op: FunctionalOp,
        lambda: String,
        expected: usize,
        found: usize,
    },

    #[error("{op} over an empty buffer has no initial element")]
    EmptyReduce { op: FunctionalOp },

    #[error("operand of {op} is not a known buffer: {operand}")]
    UnknownBuffer { op: FunctionalOp, operand: String },

    #[error("operand of {op} must name a buffer for inline lowering, found {operand}")]
    UnsupportedOperand { op: FunctionalOp, operand: String },

    #[error("{op} operands differ: {left} vs {right}")]
    ShapeMismatch {
        op: FunctionalOp,
        left: String,
        right: String,
    },

    #[error("{lambda} captures `{name}` from the enclosing function")]
    CapturedVariable { lambda: String, name: String },

    #[error("{lambda} calls `{name}`, which is not a lifted function")]
    UnknownCallee { lambda: String, name: String },

    #[error("{lambda} declares parameter `{name}` more than once")]
    DuplicateParam { lambda: String, name: String },

    #[error("`{function}` takes {expected} parameters, but {found} argument types were given")]
    ParamCount {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("`{name}` is not defined")]
    UnknownSymbol { name: String },

    #[error("operator `{op}` cannot be applied to `{ty}`")]
    InvalidOperand { op: &'static str, ty: CType },

    #[error("`{name}` is declared as `{declared}` but assigned a `{found}`")]
    AssignMismatch {
        name: String,
        declared: CType,
        found: CType,
    },

    #[error("`{function}` returns both `{first}` and `{second}`")]
    ReturnMismatch {
        function: String,
        first: CType,
        second: CType,
    },

    #[error("lowering left the tree inconsistent: {message}")]
    Invariant { message: String },
}

impl LowerError {
    /// The operation whose lowering failed, if any.
    pub fn op(&self) -> Option<FunctionalOp> {
        match self {
            LowerError::NotALambda { op }
            | LowerError::Arity { op, .. }
            | LowerError::LambdaArity { op, .. }
            | LowerError::EmptyReduce { op }
            | LowerError::UnknownBuffer { op, .. }
            | LowerError::UnsupportedOperand { op, .. }
            | LowerError::ShapeMismatch { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Pipeline step that produced the error.
    pub fn stage(&self) -> &'static str {
        match self {
            LowerError::CapturedVariable { .. }
            | LowerError::UnknownCallee { .. }
            | LowerError::DuplicateParam { .. } => "lift",
            LowerError::ParamCount { .. }
            | LowerError::UnknownSymbol { .. }
            | LowerError::InvalidOperand { .. }
            | LowerError::AssignMismatch { .. }
            | LowerError::ReturnMismatch { .. } => "typing",
            LowerError::Invariant { .. } => "validate",
            _ => "lower",
        }
    }
}
