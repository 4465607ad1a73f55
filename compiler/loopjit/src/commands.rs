//! Command handlers for the `loopjit` CLI.
//!
//! Each handler has a pure core (`emit_source`, `run_source`) that returns
//! the text to print, and a file-level wrapper (`emit_file`, `run_file`)
//! that reads the input, prints, and exits non-zero on failure.

use std::fmt::Write as _;
use std::sync::Arc;

use loopjit_ir::{ArgType, ArrayType, ElemType};
use loopjit_parse::ParseError;

use crate::buffer::{Arg, Buffer, Output, Scalar, ShapeError};
use crate::config::JitConfig;
use crate::signature::TypeSignature;
use crate::specializer::{SpecializeError, Specializer};
use crate::toolchain::{CcToolchain, InterpToolchain, Toolchain};

/// Buffers longer than this are elided in `run` output.
const PRINT_LIMIT: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },
    /// Already rendered with source context.
    #[error("{rendered}")]
    Parse { rendered: String },
    #[error(transparent)]
    Specialize(#[from] SpecializeError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("C compiler '{compiler}' is not available")]
    NoCompiler { compiler: String },
}

/// Whether a run executes in the interpreter or natively.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Tier {
    #[default]
    Interp,
    Native,
}

fn toolchain(tier: Tier, config: &JitConfig) -> Result<Arc<dyn Toolchain>, CommandError> {
    match tier {
        Tier::Interp => Ok(Arc::new(InterpToolchain)),
        Tier::Native => {
            let cc = CcToolchain::new(config.cc.clone());
            if !cc.is_available() {
                return Err(CommandError::NoCompiler {
                    compiler: config.cc.compiler.clone(),
                });
            }
            Ok(Arc::new(cc))
        }
    }
}

fn specializer(
    path: &str,
    source: &str,
    toolchain: Arc<dyn Toolchain>,
    config: &JitConfig,
) -> Result<Specializer, CommandError> {
    match Specializer::from_source(source, toolchain) {
        Ok(jit) => Ok(jit.with_config(config)),
        Err(SpecializeError::Parse(err)) => Err(CommandError::Parse {
            rendered: render_parse_error(path, source, &err),
        }),
        Err(err) => Err(err.into()),
    }
}

/// The translation unit `source` assembles to for `signature`.
pub fn emit_source(
    path: &str,
    source: &str,
    signature: &TypeSignature,
    config: &JitConfig,
) -> Result<String, CommandError> {
    let jit = specializer(path, source, Arc::new(InterpToolchain), config)?;
    Ok(jit.translation_unit(signature)?.source)
}

/// Run `source` on ramp data of the given signature and describe the
/// result and every buffer argument afterwards.
pub fn run_source(
    path: &str,
    source: &str,
    signature: &TypeSignature,
    config: &JitConfig,
    tier: Tier,
) -> Result<String, CommandError> {
    let jit = specializer(path, source, toolchain(tier, config)?, config)?;

    let mut buffers = Vec::new();
    let mut scalars = Vec::new();
    for arg in signature.args() {
        match arg {
            ArgType::Array(ty) => buffers.push(ramp(ty)?),
            ArgType::Scalar(elem) => scalars.push(unit_scalar(*elem)),
        }
    }

    let output = {
        let mut buffer_iter = buffers.iter_mut();
        let mut scalar_iter = scalars.iter().copied();
        let mut args = Vec::with_capacity(signature.len());
        for arg in signature.args() {
            let next = match arg {
                ArgType::Array(_) => buffer_iter.next().map(Arg::Array),
                ArgType::Scalar(_) => scalar_iter.next().map(Arg::Scalar),
            };
            args.extend(next);
        }
        jit.call(&mut args)?
    };

    let names: Vec<&str> = jit.function().params.iter().map(|p| p.name.as_str()).collect();
    let mut text = String::new();
    let _ = writeln!(text, "result: {}", describe_output(output, &names));
    let mut buffers = buffers.iter();
    for (name, arg) in names.iter().zip(signature.args()) {
        let ArgType::Array(ty) = arg else { continue };
        if let Some(buffer) = buffers.next() {
            let _ = writeln!(text, "{name}: {ty} = {}", format_values(&buffer.to_f64_vec()));
        }
    }
    Ok(text)
}

fn describe_output(output: Output, names: &[&str]) -> String {
    match output {
        Output::Buffer { param } => match names.get(param) {
            Some(name) => format!("buffer `{name}`"),
            None => output.to_string(),
        },
        other => other.to_string(),
    }
}

/// Buffer of type `ty` holding `0, 1, 2, ...`.
pub fn ramp(ty: &ArrayType) -> Result<Buffer, ShapeError> {
    let n = ty.len();
    match ty.elem {
        ElemType::I32 => Buffer::with_shape(&ty.shape, (0..n).map(|i| i as i32).collect()),
        ElemType::I64 => Buffer::with_shape(&ty.shape, (0..n).map(|i| i as i64).collect()),
        ElemType::F32 => Buffer::with_shape(&ty.shape, (0..n).map(|i| i as f32).collect()),
        ElemType::F64 => Buffer::with_shape(&ty.shape, (0..n).map(|i| i as f64).collect()),
    }
}

fn unit_scalar(elem: ElemType) -> Scalar {
    match elem {
        ElemType::I32 => Scalar::I32(1),
        ElemType::I64 => Scalar::I64(1),
        ElemType::F32 => Scalar::F32(1.0),
        ElemType::F64 => Scalar::F64(1.0),
    }
}

fn format_values(values: &[f64]) -> String {
    let shown: Vec<String> = values.iter().take(PRINT_LIMIT).map(|v| format!("{v}")).collect();
    if values.len() > PRINT_LIMIT {
        format!("[{}, ... ({} more)]", shown.join(", "), values.len() - PRINT_LIMIT)
    } else {
        format!("[{}]", shown.join(", "))
    }
}

/// Render a parse error with a source snippet.
pub fn render_parse_error(path: &str, source: &str, err: &ParseError) -> String {
    use ariadne::{Color, Config, Label, Report, ReportKind, Source};

    let range = err.span().to_range();
    let message = err.to_string();
    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, path, range.start)
        .with_config(Config::default().with_color(false))
        .with_message(&message)
        .with_label(Label::new((path, range)).with_message(&message).with_color(Color::Red))
        .finish()
        .write((path, Source::from(source)), &mut out);
    match written {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => format!("error: {message}"),
    }
}

fn read_file(path: &str) -> Result<String, CommandError> {
    std::fs::read_to_string(path).map_err(|e| CommandError::Io {
        path: path.to_owned(),
        message: e.to_string(),
    })
}

fn finish(result: Result<String, CommandError>) {
    match result {
        Ok(text) => print!("{text}"),
        Err(err) => {
            match &err {
                CommandError::Specialize(inner) => eprintln!("error[{}]: {inner}", inner.stage()),
                other => eprintln!("error: {other}"),
            }
            std::process::exit(1);
        }
    }
}

/// `loopjit emit`: print the translation unit for `signature`.
pub fn emit_file(path: &str, signature: &TypeSignature, config: &JitConfig) {
    finish(read_file(path).and_then(|source| emit_source(path, &source, signature, config)));
}

/// `loopjit run`: execute on ramp data and print the result.
pub fn run_file(path: &str, signature: &TypeSignature, config: &JitConfig, tier: Tier) {
    finish(read_file(path).and_then(|source| run_source(path, &source, signature, config, tier)));
}
