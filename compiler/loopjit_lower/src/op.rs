use std::fmt;

/// A recognized high-level operation.
///
/// Calls are matched by the bare callee name returned by [`name`](Self::name).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FunctionalOp {
    /// `map(f, A)`: `A[i] = f(A[i])`, result is `A`.
    Map,
    /// `reduce(f, A)`: left fold seeded with `A[0]`, result is the accumulator.
    Reduce,
    /// `elementwise(f, A, B)`: `A[i] = f(A[i], B[i])`, result is `A`.
    Elementwise,
}

impl FunctionalOp {
    /// Pass order used by the pipeline.
    pub const ORDER: [FunctionalOp; 3] = [
        FunctionalOp::Map,
        FunctionalOp::Reduce,
        FunctionalOp::Elementwise,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            FunctionalOp::Map => "map",
            FunctionalOp::Reduce => "reduce",
            FunctionalOp::Elementwise => "elementwise",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|op| op.name() == name)
    }

    /// Number of call arguments, the function included.
    pub const fn arity(self) -> usize {
        self.buffer_operands() + 1
    }

    /// Number of parameters the lifted function must take.
    pub const fn lambda_arity(self) -> usize {
        match self {
            FunctionalOp::Map => 1,
            FunctionalOp::Reduce | FunctionalOp::Elementwise => 2,
        }
    }

    pub const fn buffer_operands(self) -> usize {
        match self {
            FunctionalOp::Map | FunctionalOp::Reduce => 1,
            FunctionalOp::Elementwise => 2,
        }
    }

    /// Whether the result is the (rewritten in place) first buffer operand.
    pub const fn yields_buffer(self) -> bool {
        !matches!(self, FunctionalOp::Reduce)
    }
}

impl fmt::Display for FunctionalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
