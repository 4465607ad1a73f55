//! Functional lowering.
//!
//! One [`LoweringPass`] rewrites every call to one [`FunctionalOp`] into an
//! explicit counting loop over the operand buffers. The trip count is the
//! element count of the operand's [`ArrayType`], fixed at specialization
//! time.
//!
//! Loop shapes, for a lifted function `f` and `n` elements:
//!
//! ```text
//! map          for (i = 0; i < n; ++i) A[i] = f(A[i]);
//! elementwise  for (i = 0; i < n; ++i) A[i] = f(A[i], B[i]);
//! reduce       acc = A[0]; for (i = 1; i < n; ++i) acc = f(acc, A[i]);
//! ```
//!
//! With [`LoweringStyle::Outlined`] the loop goes into a generated function
//! (`map_0(A)`) and the call is replaced by a call to it. With
//! [`LoweringStyle::Inline`] the call becomes a [`Composite`] holding the
//! loop and naming the result (the buffer, or the accumulator for reduce);
//! [`fix_up`](crate::fixup::fix_up) later hoists the loop into statement
//! position.

use loopjit_ir::{
    fold_children, fold_nodes, ArgType, ArrayType, CType, Composite, Folder, FunctionDef,
    MacroDef, Node, Param,
};

use crate::env::BufferTypes;
use crate::error::LowerError;
use crate::names::NameGen;
use crate::op::FunctionalOp;

/// Where the generated loop lives.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoweringStyle {
    /// One generated function per lowered call.
    #[default]
    Outlined,
    /// Loop statements placed directly in the entry function.
    Inline,
}

impl LoweringStyle {
    pub const fn name(self) -> &'static str {
        match self {
            LoweringStyle::Outlined => "outlined",
            LoweringStyle::Inline => "inline",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "outlined" => Some(LoweringStyle::Outlined),
            "inline" => Some(LoweringStyle::Inline),
            _ => None,
        }
    }
}

/// Parameter names of generated functions, by operand position.
const BUFFER_PARAMS: [&str; 2] = ["A", "B"];

/// Lowers every call to one operation.
pub struct LoweringPass<'a> {
    op: FunctionalOp,
    style: LoweringStyle,
    env: &'a mut BufferTypes,
    names: &'a mut NameGen,
    lifted: &'a [MacroDef],
    generated: &'a mut Vec<FunctionDef>,
    lowered: usize,
}

impl<'a> LoweringPass<'a> {
    pub fn new(
        op: FunctionalOp,
        style: LoweringStyle,
        env: &'a mut BufferTypes,
        names: &'a mut NameGen,
        lifted: &'a [MacroDef],
        generated: &'a mut Vec<FunctionDef>,
    ) -> Self {
        LoweringPass {
            op,
            style,
            env,
            names,
            lifted,
            generated,
            lowered: 0,
        }
    }

    /// Lower a statement list, returning it with every call to this pass's
    /// operation replaced.
    pub fn run(mut self, nodes: Vec<Node>) -> Result<Vec<Node>, LowerError> {
        let nodes = fold_nodes(&mut self, nodes)?;
        tracing::debug!(
            op = %self.op,
            style = self.style.name(),
            lowered = self.lowered,
            "lowering pass finished"
        );
        Ok(nodes)
    }

    fn lower_call(&mut self, args: Vec<Node>) -> Result<Node, LowerError> {
        let op = self.op;
        if args.len() != op.arity() {
            return Err(LowerError::Arity {
                op,
                expected: op.arity(),
                found: args.len(),
            });
        }

        let mut args = args.into_iter();
        let func = self.lifted_function(args.next())?;

        // Statements of already lowered inline operands run first.
        let mut hoisted = Vec::new();
        let operands: Vec<Node> = args
            .map(|arg| match arg {
                Node::Composite(Composite { stmts, result }) => {
                    hoisted.extend(stmts);
                    *result
                }
                other => other,
            })
            .collect();

        let ty = self.operand_type(&operands[0])?;
        if op == FunctionalOp::Elementwise {
            let other = self.operand_type(&operands[1])?;
            if other != ty {
                return Err(LowerError::ShapeMismatch {
                    op,
                    left: ty.to_string(),
                    right: other.to_string(),
                });
            }
        }
        if op == FunctionalOp::Reduce && ty.is_empty() {
            return Err(LowerError::EmptyReduce { op });
        }

        tracing::trace!(op = %op, function = %func, ty = %ty, "lowering call");
        let lowered = match self.style {
            LoweringStyle::Outlined => self.outline(&func, &ty, operands),
            LoweringStyle::Inline => self.inline(&func, &ty, operands)?,
        };
        self.lowered += 1;

        if hoisted.is_empty() {
            return Ok(lowered);
        }
        Ok(match lowered {
            Node::Composite(Composite { stmts, result }) => {
                hoisted.extend(stmts);
                Node::Composite(Composite {
                    stmts: hoisted,
                    result,
                })
            }
            other => Node::Composite(Composite {
                stmts: hoisted,
                result: Box::new(other),
            }),
        })
    }

    /// The first argument must name a lifted unit of the right arity.
    fn lifted_function(&self, arg: Option<Node>) -> Result<String, LowerError> {
        let op = self.op;
        let Some(Node::Symbol(sym)) = arg else {
            return Err(LowerError::NotALambda { op });
        };
        let unit = self
            .lifted
            .iter()
            .find(|unit| unit.name == sym.name)
            .ok_or(LowerError::NotALambda { op })?;
        if unit.params.len() != op.lambda_arity() {
            return Err(LowerError::LambdaArity {
                op,
                lambda: sym.name,
                expected: op.lambda_arity(),
                found: unit.params.len(),
            });
        }
        Ok(sym.name)
    }

    fn operand_type(&self, operand: &Node) -> Result<ArrayType, LowerError> {
        self.env
            .buffer_of(operand)
            .ok_or_else(|| LowerError::UnknownBuffer {
                op: self.op,
                operand: describe(operand),
            })
    }

    fn outline(&mut self, func: &str, ty: &ArrayType, operands: Vec<Node>) -> Node {
        let op = self.op;
        let name = self.names.function(op);
        let buffers = &BUFFER_PARAMS[..op.buffer_operands()];
        let params = buffers
            .iter()
            .map(|buffer| Param::typed(*buffer, CType::Pointer(ty.elem)))
            .collect();
        let n = trip_count(ty);

        let (body, ret, result) = if op.yields_buffer() {
            let body = vec![
                element_loop("i", n, func, buffers),
                Node::ret(Some(Node::sym(buffers[0]))),
            ];
            (body, CType::Pointer(ty.elem), ArgType::Array(ty.clone()))
        } else {
            let acc = self.names.accumulator();
            let body = vec![
                seed(&acc, ty, buffers[0]),
                fold_loop("i", n, func, buffers[0], &acc),
                Node::ret(Some(Node::sym(acc))),
            ];
            (body, CType::Scalar(ty.elem), ArgType::Scalar(ty.elem))
        };

        self.env.bind_result(name.clone(), result);
        self.generated.push(FunctionDef {
            name: name.clone(),
            params,
            ret: Some(ret),
            body,
        });
        Node::call(name, operands)
    }

    fn inline(&mut self, func: &str, ty: &ArrayType, operands: Vec<Node>) -> Result<Node, LowerError> {
        let mut buffers = Vec::with_capacity(operands.len());
        for operand in &operands {
            match operand.as_symbol() {
                Some(name) => buffers.push(name),
                None => {
                    return Err(LowerError::UnsupportedOperand {
                        op: self.op,
                        operand: describe(operand),
                    })
                }
            }
        }
        let var = self.loop_var();
        let n = trip_count(ty);

        let (stmts, result) = if self.op.yields_buffer() {
            (vec![element_loop(&var, n, func, &buffers)], buffers[0].to_owned())
        } else {
            let acc = self.names.accumulator();
            self.env.bind(acc.clone(), ArgType::Scalar(ty.elem));
            let stmts = vec![
                seed(&acc, ty, buffers[0]),
                fold_loop(&var, n, func, buffers[0], &acc),
            ];
            (stmts, acc)
        };
        Ok(Node::Composite(Composite {
            stmts,
            result: Box::new(Node::sym(result)),
        }))
    }

    /// Loop counter name that does not shadow a variable of the function.
    fn loop_var(&self) -> String {
        let mut var = "i".to_owned();
        let mut suffix = 0;
        while self.env.is_bound(&var) {
            var = format!("i_{suffix}");
            suffix += 1;
        }
        var
    }

    /// Track locals assigned a buffer or a reduction result.
    fn observe_assign(&mut self, target: &Node, value: &Node) {
        let Node::Symbol(sym) = target else {
            return;
        };
        if self.env.is_bound(&sym.name) {
            return;
        }
        if let Some(ty) = self.env.type_of(value) {
            self.env.bind(sym.name.clone(), ty);
        }
    }
}

impl Folder for LoweringPass<'_> {
    type Error = LowerError;

    fn fold_node(&mut self, node: Node) -> Result<Node, LowerError> {
        match fold_children(self, node)? {
            Node::Call { callee, args } if callee.as_symbol() == Some(self.op.name()) => {
                self.lower_call(args)
            }
            Node::Assign { target, value } => {
                self.observe_assign(&target, &value);
                Ok(Node::Assign { target, value })
            }
            other => Ok(other),
        }
    }
}

fn trip_count(ty: &ArrayType) -> Node {
    Node::int(i64::try_from(ty.len()).unwrap_or(i64::MAX))
}

/// `for (var = 0; var < n; ++var) B0[var] = f(B0[var], B1[var], ...);`
fn element_loop(var: &str, n: Node, func: &str, buffers: &[&str]) -> Node {
    let element = |buffer: &str| Node::index(Node::sym(buffer), Node::sym(var));
    let call = Node::call(func, buffers.iter().map(|buffer| element(*buffer)).collect());
    Node::for_range(var, Node::int(0), n, vec![Node::assign(element(buffers[0]), call)])
}

/// `for (var = 1; var < n; ++var) acc = f(acc, buffer[var]);`
fn fold_loop(var: &str, n: Node, func: &str, buffer: &str, acc: &str) -> Node {
    let step = Node::call(
        func,
        vec![Node::sym(acc), Node::index(Node::sym(buffer), Node::sym(var))],
    );
    Node::for_range(var, Node::int(1), n, vec![Node::assign(Node::sym(acc), step)])
}

/// `elem acc = buffer[0];`
fn seed(acc: &str, ty: &ArrayType, buffer: &str) -> Node {
    Node::assign(
        Node::decl(acc, CType::Scalar(ty.elem)),
        Node::index(Node::sym(buffer), Node::int(0)),
    )
}

fn describe(node: &Node) -> String {
    match (node.as_symbol(), node.callee_name()) {
        (Some(name), _) => format!("`{name}`"),
        (_, Some(callee)) => format!("call to `{callee}`"),
        _ => format!("{} expression", node.kind_name()),
    }
}
