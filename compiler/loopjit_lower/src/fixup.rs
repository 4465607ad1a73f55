//! Hoisting of inline composites.
//!
//! Inline lowering leaves [`Composite`] nodes in expression position
//! (`return <loop; accumulator_0>`). C has no statement expressions, so
//! every composite's statements are moved in front of the statement that
//! contains it, in evaluation order, and the composite is replaced by its
//! result reference. A composite that is itself a statement is flattened
//! and its result dropped. Blocks are flattened into the enclosing list.
//!
//! An operand evaluated before a buffer write in the same expression
//! (`a[0] + <loop over a; accumulator_0>`, or `a[0] + reduce_0(map_0(a))`
//! where C leaves operand order unspecified) would otherwise read the
//! buffer after it was written. Such operands are spilled into a fresh
//! local (`temp_0 = a[0];`) ahead of the write. Writes are composites and
//! calls to generated functions returning a buffer. Literals and plain
//! symbols need no spill: a write only touches buffer elements and its own
//! accumulator.

use std::convert::Infallible;

use loopjit_ir::{fold_children, walk_node, CType, Composite, Folder, FunctionDef, Node, Visitor};
use rustc_hash::FxHashSet;

use crate::names::NameGen;

/// Rewrite a statement list so that no [`Composite`] or nested block is left.
///
/// `generated` are the loop functions the statements may call.
pub fn fix_up(stmts: Vec<Node>, generated: &[FunctionDef], names: &mut NameGen) -> Vec<Node> {
    let mut fixer = Fixer {
        writers: generated
            .iter()
            .filter(|func| func.ret.is_some_and(CType::is_pointer))
            .map(|func| func.name.as_str())
            .collect(),
        names,
    };
    let mut out = Vec::with_capacity(stmts.len());
    fixer.stmts(stmts, &mut out);
    out
}

struct Fixer<'a> {
    /// Generated functions that write their first buffer.
    writers: FxHashSet<&'a str>,
    names: &'a mut NameGen,
}

impl Fixer<'_> {
    fn stmts(&mut self, stmts: Vec<Node>, out: &mut Vec<Node>) {
        for stmt in stmts {
            match stmt {
                Node::Block(inner) => self.stmts(inner, out),
                Node::Composite(Composite { stmts, result }) => {
                    self.stmts(stmts, out);
                    let result = self.hoist(*result, out);
                    if matches!(result, Node::Call { .. }) {
                        out.push(result);
                    }
                }
                Node::For(mut lp) => {
                    lp.body = self.block(lp.body);
                    out.push(Node::For(lp));
                }
                Node::Function(mut def) => {
                    def.body = self.block(def.body);
                    out.push(Node::Function(def));
                }
                other => {
                    let other = self.hoist(other, out);
                    out.push(other);
                }
            }
        }
    }

    fn block(&mut self, stmts: Vec<Node>) -> Vec<Node> {
        let mut out = Vec::with_capacity(stmts.len());
        self.stmts(stmts, &mut out);
        out
    }

    fn hoist(&mut self, node: Node, out: &mut Vec<Node>) -> Node {
        Hoister { fixer: self, out }.fold(node)
    }

    fn writes(&self, node: &Node) -> bool {
        let mut finder = WriteFinder {
            writers: &self.writers,
            found: false,
        };
        finder.visit_node(node);
        finder.found
    }
}

/// Replaces composites inside one statement, emitting their statements.
struct Hoister<'f, 'a> {
    fixer: &'f mut Fixer<'a>,
    out: &'f mut Vec<Node>,
}

impl Hoister<'_, '_> {
    fn fold(&mut self, node: Node) -> Node {
        match self.fold_node(node) {
            Ok(node) => node,
            Err(never) => match never {},
        }
    }

    /// Fold an operand that runs before a write, pinning its value.
    fn spill(&mut self, node: Node) -> Node {
        let node = self.fold(node);
        if matches!(node, Node::Literal(_) | Node::Symbol(_)) {
            return node;
        }
        let temp = self.fixer.names.temporary();
        self.out.push(Node::assign(Node::sym(temp.clone()), node));
        Node::sym(temp)
    }

    /// Fold call arguments left to right, spilling every argument that
    /// precedes the last one holding a write.
    fn args(&mut self, args: Vec<Node>) -> Vec<Node> {
        let last = args.iter().rposition(|arg| self.fixer.writes(arg));
        args.into_iter()
            .enumerate()
            .map(|(i, arg)| match last {
                Some(last) if i < last => self.spill(arg),
                _ => self.fold(arg),
            })
            .collect()
    }
}

impl Folder for Hoister<'_, '_> {
    type Error = Infallible;

    fn fold_node(&mut self, node: Node) -> Result<Node, Infallible> {
        match node {
            Node::Composite(Composite { stmts, result }) => {
                self.fixer.stmts(stmts, self.out);
                self.fold_node(*result)
            }
            Node::Binary { op, lhs, rhs } if self.fixer.writes(&rhs) => {
                let lhs = self.spill(*lhs);
                let rhs = self.fold(*rhs);
                Ok(Node::binary(op, lhs, rhs))
            }
            Node::Index { base, index } if self.fixer.writes(&index) => {
                let base = self.spill(*base);
                let index = self.fold(*index);
                Ok(Node::index(base, index))
            }
            Node::Call { callee, args } if args.iter().any(|arg| self.fixer.writes(arg)) => {
                let args = self.args(args);
                Ok(Node::Call { callee, args })
            }
            other => fold_children(self, other),
        }
    }
}

/// Looks for a composite or a call to a writing generated function.
struct WriteFinder<'w, 'a> {
    writers: &'w FxHashSet<&'a str>,
    found: bool,
}

impl Visitor for WriteFinder<'_, '_> {
    fn visit_node(&mut self, node: &Node) {
        if self.found {
            return;
        }
        let writes = match node {
            Node::Composite(_) => true,
            _ => node
                .callee_name()
                .is_some_and(|name| self.writers.contains(name)),
        };
        if writes {
            self.found = true;
        } else {
            walk_node(self, node);
        }
    }
}
