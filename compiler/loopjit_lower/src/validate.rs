//! Post-lowering checks.
//!
//! After the pipeline no lambda, no call to a recognized operation and no
//! composite may be left anywhere in the entry body or the generated
//! functions. A violation is a bug in the passes, reported as
//! [`LowerError::Invariant`].

use loopjit_ir::{walk_node, FunctionDef, Node, NodeCounter, Visitor};

use crate::error::LowerError;
use crate::op::FunctionalOp;

/// Check the entry body and every generated function.
pub fn validate(body: &[Node], generated: &[FunctionDef]) -> Result<(), LowerError> {
    let roots = body
        .iter()
        .chain(generated.iter().flat_map(|func| func.body.iter()));
    let mut counter = NodeCounter::new();
    let mut ops = UnloweredCalls::default();
    for node in roots {
        counter.visit_node(node);
        ops.visit_node(node);
    }

    let lambdas = counter.get("lambda");
    let composites = counter.get("composite");
    if lambdas == 0 && composites == 0 && ops.first.is_none() {
        return Ok(());
    }

    let mut problems = Vec::new();
    if lambdas > 0 {
        problems.push(format!("{lambdas} lambda(s) left unlifted"));
    }
    if let Some(op) = ops.first {
        problems.push(format!("{} call(s) to `{op}` left unlowered", ops.count));
    }
    if composites > 0 {
        problems.push(format!("{composites} composite(s) left unhoisted"));
    }
    Err(LowerError::Invariant {
        message: problems.join(", "),
    })
}

#[derive(Default)]
struct UnloweredCalls {
    first: Option<FunctionalOp>,
    count: usize,
}

impl Visitor for UnloweredCalls {
    fn visit_node(&mut self, node: &Node) {
        if let Some(op) = node.callee_name().and_then(FunctionalOp::from_name) {
            self.first.get_or_insert(op);
            self.count += 1;
        }
        walk_node(self, node);
    }
}
