//! Source-to-loop lowering for the loopjit specializer.
//!
//! A captured function goes through a fixed pipeline:
//!
//! 1. **Lambda lifting** ([`lift`]) replaces every anonymous function literal
//!    with a reference to a named macro unit (`LAMBDA_<n>`).
//! 2. **Functional lowering** ([`lower`]) runs one pass per
//!    [`FunctionalOp`], in [`FunctionalOp::ORDER`], turning each
//!    `map`/`reduce`/`elementwise` call into an explicit counting loop sized
//!    from the argument [`ArrayType`](loopjit_ir::ArrayType)s.
//! 3. **Fix-up** ([`fixup`]) hoists the statements of inline composites out
//!    of expression position.
//! 4. **Validation** ([`validate`]) checks that nothing high-level is left.
//! 5. **Entry typing** ([`entry`]) gives the entry function concrete
//!    parameter, local and return types.
//!
//! [`Pipeline::run`] drives all five and returns a [`LoweredProgram`].
//!
//! # Determinism
//!
//! All generated names come from a [`NameGen`] owned by one pipeline run,
//! so the same function and argument types always lower to the same tree.

pub mod entry;
mod env;
mod error;
pub mod fixup;
pub mod lift;
pub mod lower;
mod names;
mod op;
mod pipeline;
pub mod validate;

pub use env::BufferTypes;
pub use error::LowerError;
pub use lift::{lift, LambdaLifter};
pub use lower::{LoweringPass, LoweringStyle};
pub use names::NameGen;
pub use op::FunctionalOp;
pub use pipeline::{LoweredProgram, Pipeline};
