//! Tree traversal.
//!
//! [`Visitor`] borrows the tree; override [`Visitor::visit_node`] and call
//! [`walk_node`] to continue into children.
//!
//! [`Folder`] consumes the tree and rebuilds it. The default
//! [`Folder::fold_node`] calls [`fold_children`], which folds every child
//! first and then reassembles the parent, so an override that calls
//! `fold_children` before inspecting the node sees already rewritten
//! children (post-order).

use rustc_hash::FxHashMap;

use crate::node::{Composite, ForLoop, FunctionDef, Lambda, MacroDef, Node};

/// Read-only traversal.
pub trait Visitor {
    fn visit_node(&mut self, node: &Node) {
        walk_node(self, node);
    }
}

/// Visit every direct child of `node`, in evaluation order.
pub fn walk_node<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) {
    match node {
        Node::Literal(_) | Node::Symbol(_) => {}
        Node::Unary { operand, .. } => visitor.visit_node(operand),
        Node::Binary { lhs, rhs, .. } => {
            visitor.visit_node(lhs);
            visitor.visit_node(rhs);
        }
        Node::Call { callee, args } => {
            visitor.visit_node(callee);
            for arg in args {
                visitor.visit_node(arg);
            }
        }
        Node::Index { base, index } => {
            visitor.visit_node(base);
            visitor.visit_node(index);
        }
        Node::Lambda(Lambda { body, .. }) | Node::Define(MacroDef { body, .. }) => {
            visitor.visit_node(body);
        }
        Node::Assign { target, value } => {
            visitor.visit_node(target);
            visitor.visit_node(value);
        }
        Node::For(ForLoop {
            start, end, body, ..
        }) => {
            visitor.visit_node(start);
            visitor.visit_node(end);
            for stmt in body {
                visitor.visit_node(stmt);
            }
        }
        Node::Return(value) => {
            if let Some(value) = value {
                visitor.visit_node(value);
            }
        }
        Node::Function(FunctionDef { body, .. }) | Node::Block(body) => {
            for stmt in body {
                visitor.visit_node(stmt);
            }
        }
        Node::Composite(Composite { stmts, result }) => {
            for stmt in stmts {
                visitor.visit_node(stmt);
            }
            visitor.visit_node(result);
        }
    }
}

/// Owning, bottom-up rewrite.
pub trait Folder {
    type Error;

    fn fold_node(&mut self, node: Node) -> Result<Node, Self::Error> {
        fold_children(self, node)
    }
}

/// Fold a statement list in order.
pub fn fold_nodes<F: Folder + ?Sized>(folder: &mut F, nodes: Vec<Node>) -> Result<Vec<Node>, F::Error> {
    nodes.into_iter().map(|node| folder.fold_node(node)).collect()
}

fn fold_boxed<F: Folder + ?Sized>(folder: &mut F, node: Box<Node>) -> Result<Box<Node>, F::Error> {
    folder.fold_node(*node).map(Box::new)
}

/// Fold every child of `node` and reassemble it.
pub fn fold_children<F: Folder + ?Sized>(folder: &mut F, node: Node) -> Result<Node, F::Error> {
    Ok(match node {
        leaf @ (Node::Literal(_) | Node::Symbol(_)) => leaf,
        Node::Unary { op, operand } => Node::Unary {
            op,
            operand: fold_boxed(folder, operand)?,
        },
        Node::Binary { op, lhs, rhs } => {
            let lhs = fold_boxed(folder, lhs)?;
            let rhs = fold_boxed(folder, rhs)?;
            Node::Binary { op, lhs, rhs }
        }
        Node::Call { callee, args } => {
            let callee = fold_boxed(folder, callee)?;
            let args = fold_nodes(folder, args)?;
            Node::Call { callee, args }
        }
        Node::Index { base, index } => {
            let base = fold_boxed(folder, base)?;
            let index = fold_boxed(folder, index)?;
            Node::Index { base, index }
        }
        Node::Lambda(Lambda { params, body }) => Node::Lambda(Lambda {
            params,
            body: fold_boxed(folder, body)?,
        }),
        Node::Define(MacroDef { name, params, body }) => Node::Define(MacroDef {
            name,
            params,
            body: fold_boxed(folder, body)?,
        }),
        Node::Assign { target, value } => {
            let target = fold_boxed(folder, target)?;
            let value = fold_boxed(folder, value)?;
            Node::Assign { target, value }
        }
        Node::For(ForLoop {
            var,
            start,
            end,
            body,
        }) => {
            let start = fold_boxed(folder, start)?;
            let end = fold_boxed(folder, end)?;
            let body = fold_nodes(folder, body)?;
            Node::For(ForLoop {
                var,
                start,
                end,
                body,
            })
        }
        Node::Return(value) => Node::Return(match value {
            Some(value) => Some(fold_boxed(folder, value)?),
            None => None,
        }),
        Node::Function(mut def) => {
            def.body = fold_nodes(folder, def.body)?;
            Node::Function(def)
        }
        Node::Block(body) => Node::Block(fold_nodes(folder, body)?),
        Node::Composite(Composite { stmts, result }) => {
            let stmts = fold_nodes(folder, stmts)?;
            let result = fold_boxed(folder, result)?;
            Node::Composite(Composite { stmts, result })
        }
    })
}

/// Counts nodes by [`Node::kind_name`].
#[derive(Debug, Default)]
pub struct NodeCounter {
    counts: FxHashMap<&'static str, usize>,
}

impl NodeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every node in `nodes`, including the roots.
    pub fn count_all<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let mut counter = Self::new();
        for node in nodes {
            counter.visit_node(node);
        }
        counter
    }

    pub fn get(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl Visitor for NodeCounter {
    fn visit_node(&mut self, node: &Node) {
        *self.counts.entry(node.kind_name()).or_insert(0) += 1;
        walk_node(self, node);
    }
}
