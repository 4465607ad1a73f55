//! loopjit: a just-in-time specializer for array pipelines.
//!
//! A function written against three high-level operations,
//!
//! ```text
//! fn sum_array(a) {
//!     map(|x| x * 2, a);
//!     elementwise(|x, y| x + y, a, a);
//!     return reduce(|x, y| x + y, map(|x| x / 4, a));
//! }
//! ```
//!
//! is specialized on every call to the exact element types and shapes of
//! its arguments. The lambdas become C macros, each operation becomes a
//! counting loop of known trip count, and the resulting translation unit is
//! compiled by a [`Toolchain`] and cached per [`TypeSignature`].
//!
//! # Crates
//!
//! | crate           | role                                           |
//! |-----------------|------------------------------------------------|
//! | `loopjit_ir`    | node model, traversal, C emitter               |
//! | `loopjit_parse` | source fragment parser                         |
//! | `loopjit_lower` | lifting, lowering passes, fix-up, typing       |
//! | `loopjit_eval`  | interpreter, caller buffers                    |
//! | `loopjit`       | signatures, cache, assembly, toolchains, CLI   |
//!
//! # Debugging
//!
//! - `RUST_LOG=loopjit=debug` enables structured logs (see [`init_tracing`]).
//! - `LOOPJIT_DEBUG_C=1` prints every assembled translation unit to stderr.

use std::sync::Once;

pub mod assemble;
pub mod buffer;
pub mod cache;
pub mod commands;
pub mod config;
pub mod signature;
pub mod specializer;
pub mod toolchain;

pub use assemble::{AssembleError, Assembly, EntryPoint, TranslationUnit};
pub use buffer::{Arg, Buffer, BufferData, Output, Scalar};
pub use cache::{CacheStats, SpecializationCache};
pub use config::{CcConfig, JitConfig};
pub use loopjit_lower::LoweringStyle;
pub use signature::TypeSignature;
pub use specializer::{CompiledKernel, SpecializeError, Specializer};
pub use toolchain::{
    CcToolchain, InterpToolchain, InvokeError, Kernel, Toolchain, ToolchainError,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debugging.
///
/// Call this early in main to enable tracing output. Respects `RUST_LOG` env var.
///
/// Example:
/// ```bash
/// RUST_LOG=loopjit=debug loopjit run pipeline.lj --arg f64[16]
/// RUST_LOG=loopjit_lower=trace cargo test -p loopjit
/// ```
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Whether `LOOPJIT_DEBUG_C` asks for assembled C to be dumped.
pub fn debug_c_enabled() -> bool {
    std::env::var("LOOPJIT_DEBUG_C").is_ok_and(|value| !value.is_empty() && value != "0")
}
