//! Node model for the loopjit specializer.
//!
//! One tree type, [`Node`], represents both the captured source fragment
//! (calls, lambdas, assignments, returns) and the generated target fragment
//! (typed declarations, counting loops, buffer indexing, lifted macros).
//! Every pass in `loopjit_lower` consumes and produces this tree, and the
//! [`CEmitter`] renders it to C99 text.
//!
//! # Ownership
//!
//! Children are owned exclusively (`Box`/`Vec`). Rewrites consume a subtree
//! and return a new owned one; the only relation between nodes that is not
//! ownership is [`Node::Symbol`], which refers to a function, macro or
//! variable by name.
//!
//! # Traversal
//!
//! - [`Visitor`] walks a borrowed tree (analysis, validation, counting).
//! - [`Folder`] consumes a tree and rebuilds it bottom-up (rewrites).

mod emit;
mod node;
mod span;
mod types;
mod visit;

pub use emit::{CEmitter, EmitError};
pub use node::{
    BinaryOp, Composite, ForLoop, FunctionDef, Lambda, Literal, MacroDef, Node, Param, Symbol,
    UnaryOp,
};
pub use span::Span;
pub use types::{ArgType, ArrayType, CType, ElemType};
pub use visit::{fold_children, fold_nodes, walk_node, Folder, NodeCounter, Visitor};
