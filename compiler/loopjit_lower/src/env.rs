use loopjit_ir::{ArgType, ArrayType, Node, Param};
use rustc_hash::FxHashMap;

use crate::error::LowerError;
use crate::op::FunctionalOp;

/// Types known to the lowering passes.
///
/// Seeded from the entry parameters and the argument types of one call;
/// extended with the results of generated functions and with locals
/// assigned from buffer-valued or scalar-valued expressions.
#[derive(Clone, Debug, Default)]
pub struct BufferTypes {
    vars: FxHashMap<String, ArgType>,
    results: FxHashMap<String, ArgType>,
}

impl BufferTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind each parameter of `function` to the argument type at the same
    /// position.
    pub fn for_params(function: &str, params: &[Param], args: &[ArgType]) -> Result<Self, LowerError> {
        if params.len() != args.len() {
            return Err(LowerError::ParamCount {
                function: function.to_owned(),
                expected: params.len(),
                found: args.len(),
            });
        }
        let mut env = Self::new();
        for (param, ty) in params.iter().zip(args) {
            env.bind(param.name.clone(), ty.clone());
        }
        Ok(env)
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: ArgType) {
        self.vars.insert(name.into(), ty);
    }

    /// Record the result type of a generated function.
    pub fn bind_result(&mut self, function: impl Into<String>, ty: ArgType) {
        self.results.insert(function.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&ArgType> {
        self.vars.get(name)
    }

    pub fn result(&self, function: &str) -> Option<&ArgType> {
        self.results.get(function)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Type of the value `node` evaluates to, when it is a buffer or a
    /// scalar produced by a recognized operation.
    ///
    /// Recognized calls not yet lowered are typed structurally from their
    /// first buffer operand.
    pub fn type_of(&self, node: &Node) -> Option<ArgType> {
        match node {
            Node::Symbol(sym) => self.vars.get(&sym.name).cloned(),
            Node::Call { args, .. } => {
                let name = node.callee_name()?;
                if let Some(ty) = self.results.get(name) {
                    return Some(ty.clone());
                }
                let op = FunctionalOp::from_name(name)?;
                let operand = self.buffer_of(args.get(1)?)?;
                Some(if op.yields_buffer() {
                    ArgType::Array(operand)
                } else {
                    ArgType::Scalar(operand.elem)
                })
            }
            Node::Composite(composite) => self.type_of(&composite.result),
            _ => None,
        }
    }

    pub fn buffer_of(&self, node: &Node) -> Option<ArrayType> {
        match self.type_of(node)? {
            ArgType::Array(array) => Some(array),
            ArgType::Scalar(_) => None,
        }
    }
}
