//! Specializer configuration.
//!
//! Defaults can be overridden from the environment with
//! [`JitConfig::from_env`]:
//!
//! | variable         | effect                                   |
//! |------------------|------------------------------------------|
//! | `LOOPJIT_STYLE`  | `outlined` (default) or `inline`         |
//! | `LOOPJIT_CC`     | C compiler for the native tier           |
//! | `LOOPJIT_CFLAGS` | whitespace-separated compiler flags      |

use loopjit_lower::LoweringStyle;

/// Native compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcConfig {
    /// Compiler executable, looked up on `PATH`.
    pub compiler: String,
    /// Flags passed before `-o`.
    pub flags: Vec<String>,
}

impl Default for CcConfig {
    fn default() -> Self {
        Self {
            compiler: "cc".to_string(),
            flags: vec!["-O2".to_string(), "-std=c99".to_string()],
        }
    }
}

impl CcConfig {
    /// Set the compiler executable.
    #[must_use]
    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    /// Replace the compiler flags.
    #[must_use]
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }
}

/// Configuration for a [`Specializer`](crate::Specializer).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitConfig {
    /// How functional calls are lowered.
    pub style: LoweringStyle,
    pub cc: CcConfig,
}

impl JitConfig {
    #[must_use]
    pub fn with_style(mut self, style: LoweringStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_cc(mut self, cc: CcConfig) -> Self {
        self.cc = cc;
        self
    }

    /// Defaults overridden by `LOOPJIT_*` variables.
    ///
    /// An unrecognized `LOOPJIT_STYLE` is ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(style) = lookup("LOOPJIT_STYLE") {
            match LoweringStyle::from_name(style.trim()) {
                Some(style) => config.style = style,
                None => tracing::warn!(value = %style, "ignoring unknown LOOPJIT_STYLE"),
            }
        }
        if let Some(compiler) = lookup("LOOPJIT_CC").filter(|cc| !cc.trim().is_empty()) {
            config.cc.compiler = compiler.trim().to_string();
        }
        if let Some(flags) = lookup("LOOPJIT_CFLAGS") {
            config.cc.flags = flags.split_whitespace().map(str::to_string).collect();
        }
        config
    }
}
