//! The specializer front door.
//!
//! ```text
//! call(args)
//!   └─ TypeSignature::derive(args)
//!        └─ cache hit? ──yes──► invoke
//!             │ no
//!             ▼
//!        Pipeline::run ─► assemble ─► Toolchain::compile ─► cache ─► invoke
//! ```
//!
//! The captured function is never modified; every signature is lowered
//! from the same source tree.

use std::sync::Arc;

use loopjit_ir::FunctionDef;
use loopjit_lower::{LowerError, LoweringStyle, Pipeline};
use loopjit_parse::ParseError;
use rayon::prelude::*;

use crate::assemble::{assemble, AssembleError, Assembly, EntryPoint};
use crate::buffer::{Arg, Output};
use crate::cache::{CacheStats, SpecializationCache};
use crate::config::JitConfig;
use crate::signature::TypeSignature;
use crate::toolchain::{InvokeError, Kernel, Toolchain, ToolchainError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecializeError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Lower(#[from] LowerError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    #[error("`{function}` takes {expected} arguments, found {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },
}

impl SpecializeError {
    /// Which step failed.
    pub fn stage(&self) -> &'static str {
        match self {
            SpecializeError::Parse(_) => "parse",
            SpecializeError::Lower(err) => err.stage(),
            SpecializeError::Assemble(_) => "assemble",
            SpecializeError::Toolchain(_) => "compile",
            SpecializeError::Invoke(_) => "invoke",
            SpecializeError::Arity { .. } => "signature",
        }
    }
}

/// One compiled specialization.
pub struct CompiledKernel {
    pub signature: TypeSignature,
    pub entry: EntryPoint,
    /// The C translation unit the kernel was compiled from.
    pub source: String,
    kernel: Box<dyn Kernel>,
}

impl CompiledKernel {
    pub fn invoke(&self, args: &mut [Arg<'_>]) -> Result<Output, InvokeError> {
        self.kernel.invoke(args)
    }
}

impl std::fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("signature", &self.signature)
            .field("entry", &self.entry)
            .field("source_bytes", &self.source.len())
            .finish_non_exhaustive()
    }
}

/// A captured function plus its per-signature specializations.
pub struct Specializer {
    func: FunctionDef,
    pipeline: Pipeline,
    toolchain: Arc<dyn Toolchain>,
    cache: SpecializationCache<CompiledKernel>,
}

impl Specializer {
    pub fn new(func: FunctionDef, toolchain: Arc<dyn Toolchain>) -> Self {
        Specializer {
            func,
            pipeline: Pipeline::default(),
            toolchain,
            cache: SpecializationCache::new(),
        }
    }

    /// Parse `source` and capture the function it defines.
    pub fn from_source(source: &str, toolchain: Arc<dyn Toolchain>) -> Result<Self, SpecializeError> {
        Ok(Self::new(loopjit_parse::parse_function(source)?, toolchain))
    }

    /// Apply the lowering settings of `config`.
    #[must_use]
    pub fn with_config(self, config: &JitConfig) -> Self {
        self.with_style(config.style)
    }

    /// Switch lowering style. Drops every cached specialization.
    #[must_use]
    pub fn with_style(mut self, style: LoweringStyle) -> Self {
        self.pipeline = Pipeline::new(style);
        self.cache.clear();
        self
    }

    pub fn function(&self) -> &FunctionDef {
        &self.func
    }

    pub fn style(&self) -> LoweringStyle {
        self.pipeline.style()
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// Run the function on `args`, specializing on first use of their
    /// signature.
    pub fn call(&self, args: &mut [Arg<'_>]) -> Result<Output, SpecializeError> {
        let signature = TypeSignature::derive(args);
        let kernel = self.specialize(&signature)?;
        Ok(kernel.invoke(args)?)
    }

    /// Compiled kernel for `signature`, building it on a cache miss.
    pub fn specialize(&self, signature: &TypeSignature) -> Result<Arc<CompiledKernel>, SpecializeError> {
        self.check_arity(signature)?;
        self.cache.get_or_build(signature, || self.build(signature))
    }

    /// Lower and assemble without compiling or caching.
    pub fn translation_unit(&self, signature: &TypeSignature) -> Result<Assembly, SpecializeError> {
        self.check_arity(signature)?;
        let program = self.pipeline.run(&self.func, signature.args())?;
        Ok(assemble(&program)?)
    }

    /// Build every signature in `signatures`, in parallel.
    pub fn prewarm(&self, signatures: &[TypeSignature]) -> Result<(), SpecializeError> {
        signatures
            .par_iter()
            .try_for_each(|signature| self.specialize(signature).map(drop))
    }

    /// Forget the specialization for `signature`.
    pub fn invalidate(&self, signature: &TypeSignature) -> bool {
        self.cache.invalidate(signature)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn check_arity(&self, signature: &TypeSignature) -> Result<(), SpecializeError> {
        let expected = self.func.params.len();
        if signature.len() == expected {
            return Ok(());
        }
        Err(SpecializeError::Arity {
            function: self.func.name.clone(),
            expected,
            found: signature.len(),
        })
    }

    fn build(&self, signature: &TypeSignature) -> Result<CompiledKernel, SpecializeError> {
        let assembly = self.translation_unit(signature)?;
        if crate::debug_c_enabled() {
            eprintln!("// {} ({signature})\n{}", assembly.entry.name, assembly.source);
        }
        let kernel = self.toolchain.compile(&assembly)?;
        tracing::debug!(
            function = %self.func.name,
            signature = %signature,
            toolchain = self.toolchain.name(),
            "specialized"
        );
        Ok(CompiledKernel {
            signature: signature.clone(),
            entry: assembly.entry,
            source: assembly.source,
            kernel,
        })
    }
}
