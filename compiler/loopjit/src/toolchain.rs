//! Toolchains: turn an assembled unit into something callable.
//!
//! Two tiers implement [`Toolchain`]:
//!
//! - [`InterpToolchain`] executes the unit with the `loopjit_eval`
//!   interpreter. Always available; the reference tier for tests.
//! - [`CcToolchain`] compiles the unit with the system C compiler and runs
//!   it as a separate process.
//!
//! Both check unit symbols at compile time and argument types at every
//! invocation, so a kernel is never handed arguments its signature does
//! not describe.

mod cc;
mod interp;

pub use cc::{CcToolchain, NativeKernel};
pub use interp::{InterpKernel, InterpToolchain};

use std::fmt;

use loopjit_eval::EvalError;
use loopjit_ir::ArgType;

use crate::assemble::{Assembly, EntryPoint};
use crate::buffer::{Arg, Output};

/// Compiles assembled units.
pub trait Toolchain: Send + Sync {
    /// Short tier name for logs (`interp`, `cc`).
    fn name(&self) -> &'static str;

    fn compile(&self, assembly: &Assembly) -> Result<Box<dyn Kernel>, ToolchainError>;
}

/// A compiled, invocable entry point.
pub trait Kernel: Send + Sync {
    /// Run the entry point. Buffer arguments are updated in place.
    fn invoke(&self, args: &mut [Arg<'_>]) -> Result<Output, InvokeError>;
}

// --- Error Types ---

/// Error type for toolchain compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainError {
    /// Compiler executable not found.
    CompilerNotFound { compiler: String, message: String },
    /// Compiler invocation failed.
    CompileFailed {
        compiler: String,
        exit_code: Option<i32>,
        stderr: String,
        command: String,
    },
    /// The unit calls names it does not define.
    Unresolved { names: Vec<String> },
    /// The unit's declarations could not be loaded.
    Definition(EvalError),
    /// I/O error while staging the unit.
    Io { message: String },
}

impl fmt::Display for ToolchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompilerNotFound { compiler, message } => {
                write!(f, "C compiler '{compiler}' not found: {message}")
            }
            Self::CompileFailed {
                compiler,
                exit_code,
                stderr,
                command,
            } => {
                write!(f, "compiling with '{compiler}' failed")?;
                if let Some(code) = exit_code {
                    write!(f, " (exit code {code})")?;
                }
                if !stderr.is_empty() {
                    write!(f, "\n\nCompiler stderr:\n{stderr}")?;
                }
                write!(f, "\n\nCommand: {command}")
            }
            Self::Unresolved { names } => {
                write!(f, "unresolved symbols: {}", names.join(", "))
            }
            Self::Definition(err) => write!(f, "invalid translation unit: {err}"),
            Self::Io { message } => write!(f, "I/O error during compilation: {message}"),
        }
    }
}

impl std::error::Error for ToolchainError {}

/// Error type for kernel invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("`{entry}` takes {expected} arguments, found {found}")]
    Arity {
        entry: String,
        expected: usize,
        found: usize,
    },
    #[error("argument {index} has type {found}, kernel expects {expected}")]
    Signature {
        index: usize,
        expected: ArgType,
        found: ArgType,
    },
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("I/O error during invocation: {message}")]
    Io { message: String },
    #[error("kernel process failed{}: {stderr}", exit_suffix(*exit_code))]
    RunFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("malformed kernel result: {message}")]
    Protocol { message: String },
}

fn exit_suffix(code: Option<i32>) -> String {
    code.map(|code| format!(" (exit code {code})"))
        .unwrap_or_default()
}

impl From<std::io::Error> for InvokeError {
    fn from(err: std::io::Error) -> Self {
        InvokeError::Io {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ToolchainError {
    fn from(err: std::io::Error) -> Self {
        ToolchainError::Io {
            message: err.to_string(),
        }
    }
}

/// Check `args` against the argument types the entry point was lowered for.
///
/// Shapes must match exactly: trip counts are baked into the unit, so a
/// buffer of any other extent would be under- or over-run.
pub(crate) fn check_args(entry: &EntryPoint, args: &[Arg<'_>]) -> Result<(), InvokeError> {
    if args.len() != entry.args.len() {
        return Err(InvokeError::Arity {
            entry: entry.name.clone(),
            expected: entry.args.len(),
            found: args.len(),
        });
    }
    for (index, (arg, expected)) in args.iter().zip(&entry.args).enumerate() {
        let found = arg.arg_type();
        if found != *expected {
            return Err(InvokeError::Signature {
                index,
                expected: expected.clone(),
                found,
            });
        }
    }
    Ok(())
}
