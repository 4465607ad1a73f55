/// Runtime failure of the interpreter.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("`{name}` is not defined")]
    UnknownVariable { name: String },

    #[error("no function or macro named `{name}`")]
    UnknownFunction { name: String },

    #[error("`{name}` takes {expected} arguments, found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("expected a {expected}, found a {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("index {index} out of bounds for buffer of {len} elements")]
    OutOfBounds { index: i64, len: usize },

    #[error("{op} over an empty buffer")]
    EmptyReduce { op: &'static str },

    #[error("elementwise operands have {left} and {right} elements")]
    LengthMismatch { left: usize, right: usize },

    #[error("buffer slot {slot} was not passed to this call")]
    UnknownBuffer { slot: usize },

    #[error("{kind} node cannot be evaluated")]
    Unsupported { kind: &'static str },

    #[error("{kind} node is not a top-level declaration")]
    NotADeclaration { kind: &'static str },

    #[error("`{name}` is defined twice")]
    DuplicateDefinition { name: String },

    #[error("call depth exceeded {limit}")]
    CallDepth { limit: usize },
}
