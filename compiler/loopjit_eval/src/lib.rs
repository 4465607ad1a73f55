//! Interpreter for loopjit programs.
//!
//! [`Machine`] executes both kinds of tree the specializer deals with:
//!
//! - the captured source function, where `map`, `reduce` and `elementwise`
//!   are built-in operations applied to lambda literals, and
//! - the lowered translation unit, made of lifted macros, generated loop
//!   functions and the typed entry function.
//!
//! Running both on the same input is how the lowering is checked against
//! the high-level semantics, and the lowered form is what the reference
//! toolchain executes.
//!
//! Arithmetic follows C: integer operands stay integral, mixed operands
//! promote to floating point, and every store into a buffer element or a
//! typed local converts to the destination type.

mod error;
mod machine;
mod memory;
mod value;

pub use error::EvalError;
pub use machine::{Machine, MAX_CALL_DEPTH};
pub use memory::{Buffer, BufferData, Element, ShapeError};
pub use value::Value;
