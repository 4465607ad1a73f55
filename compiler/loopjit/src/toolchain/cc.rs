//! Native tier: compile the unit with the system C compiler.
//!
//! The unit is compiled together with a generated `main` into a standalone
//! executable. Each invocation runs that executable once:
//!
//! - buffer arguments travel as files of raw native-endian elements, read
//!   before the call and written back after it;
//! - scalar arguments travel as decimal text on the command line;
//! - the result comes back on stdout as `void`, `param N` (the entry
//!   returned buffer argument `N`) or a decimal scalar.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use loopjit_ir::{CEmitter, CType, ElemType};
use tempfile::TempDir;

use super::{check_args, InvokeError, Kernel, Toolchain, ToolchainError};
use crate::assemble::{Assembly, EntryPoint, UNIT_NAME};
use crate::buffer::{Arg, BufferData, Output, Scalar};
use crate::config::CcConfig;

#[derive(Clone, Debug, Default)]
pub struct CcToolchain {
    config: CcConfig,
}

impl CcToolchain {
    pub fn new(config: CcConfig) -> Self {
        CcToolchain { config }
    }

    pub fn config(&self) -> &CcConfig {
        &self.config
    }

    /// Whether the configured compiler can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.compiler)
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }
}

impl Toolchain for CcToolchain {
    fn name(&self) -> &'static str {
        "cc"
    }

    fn compile(&self, assembly: &Assembly) -> Result<Box<dyn Kernel>, ToolchainError> {
        let dir = tempfile::Builder::new().prefix("loopjit-").tempdir()?;
        let source_path = dir.path().join(format!("{UNIT_NAME}.c"));
        let binary = dir.path().join(UNIT_NAME);

        let mut source = assembly.source.clone();
        source.push_str(&harness(&assembly.entry));
        fs::write(&source_path, &source)?;

        let compiler = &self.config.compiler;
        let mut command = Command::new(compiler);
        command
            .args(&self.config.flags)
            .arg("-o")
            .arg(&binary)
            .arg(&source_path);
        let rendered = render_command(&command);
        tracing::debug!(command = %rendered, "compiling translation unit");

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolchainError::CompilerNotFound {
                    compiler: compiler.clone(),
                    message: e.to_string(),
                }
            } else {
                ToolchainError::Io {
                    message: e.to_string(),
                }
            }
        })?;
        if !output.status.success() {
            return Err(ToolchainError::CompileFailed {
                compiler: compiler.clone(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                command: rendered,
            });
        }

        Ok(Box::new(NativeKernel {
            entry: assembly.entry.clone(),
            binary,
            dir,
        }))
    }
}

fn render_command(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A compiled executable plus the directory that owns it.
#[derive(Debug)]
pub struct NativeKernel {
    entry: EntryPoint,
    binary: PathBuf,
    dir: TempDir,
}

impl Kernel for NativeKernel {
    fn invoke(&self, args: &mut [Arg<'_>]) -> Result<Output, InvokeError> {
        check_args(&self.entry, args)?;
        let call_dir = tempfile::Builder::new()
            .prefix("call-")
            .tempdir_in(self.dir.path())?;

        let mut command = Command::new(&self.binary);
        let mut files = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            match arg {
                Arg::Array(buffer) => {
                    let path = call_dir.path().join(format!("arg_{index}.bin"));
                    fs::write(&path, encode(buffer.data()))?;
                    command.arg(&path);
                    files.push((index, path));
                }
                Arg::Scalar(scalar) => {
                    command.arg(scalar.to_string());
                }
            }
        }

        let output = command.output()?;
        if !output.status.success() {
            return Err(InvokeError::RunFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        for (index, path) in files {
            let bytes = fs::read(&path)?;
            if let Some(Arg::Array(buffer)) = args.get_mut(index) {
                decode_into(buffer.data_mut(), &bytes)?;
            }
        }
        parse_result(&self.entry, &String::from_utf8_lossy(&output.stdout))
    }
}

fn encode(data: &BufferData) -> Vec<u8> {
    match data {
        BufferData::I32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        BufferData::I64(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        BufferData::F32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        BufferData::F64(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
    }
}

macro_rules! fill_from_bytes {
    ($elems:expr, $bytes:expr, $ty:ty) => {{
        const WIDTH: usize = std::mem::size_of::<$ty>();
        for (elem, chunk) in $elems.iter_mut().zip($bytes.chunks_exact(WIDTH)) {
            let mut raw = [0u8; WIDTH];
            raw.copy_from_slice(chunk);
            *elem = <$ty>::from_ne_bytes(raw);
        }
    }};
}

fn decode_into(data: &mut BufferData, bytes: &[u8]) -> Result<(), InvokeError> {
    let expected = data.len() * data.elem_type().byte_width();
    if bytes.len() != expected {
        return Err(InvokeError::Protocol {
            message: format!("buffer came back with {} bytes, expected {expected}", bytes.len()),
        });
    }
    match data {
        BufferData::I32(v) => fill_from_bytes!(v, bytes, i32),
        BufferData::I64(v) => fill_from_bytes!(v, bytes, i64),
        BufferData::F32(v) => fill_from_bytes!(v, bytes, f32),
        BufferData::F64(v) => fill_from_bytes!(v, bytes, f64),
    }
    Ok(())
}

fn parse_result(entry: &EntryPoint, stdout: &str) -> Result<Output, InvokeError> {
    let text = stdout.trim();
    let malformed = || InvokeError::Protocol {
        message: format!("unexpected kernel output `{text}` for {}", entry.ret),
    };
    match entry.ret {
        CType::Void if text == "void" => Ok(Output::Void),
        CType::Pointer(_) => {
            let param = text
                .strip_prefix("param ")
                .and_then(|n| n.parse().ok())
                .ok_or_else(malformed)?;
            Ok(Output::Buffer { param })
        }
        CType::Scalar(elem) => Scalar::parse(elem, text)
            .map(Output::Scalar)
            .ok_or_else(malformed),
        CType::Index => Scalar::parse(ElemType::I64, text)
            .map(Output::Scalar)
            .ok_or_else(malformed),
        CType::Void => Err(malformed()),
    }
}

/// `main` that loads arguments, calls the entry point and reports.
fn harness(entry: &EntryPoint) -> String {
    let mut out = CEmitter::new();
    out.newline();
    out.emit_include("stdio.h");
    out.emit_include("stdlib.h");
    out.newline();

    out.writeln("static void* loopjit_load(const char* path, long* size) {");
    out.indent();
    out.writeln("FILE* f = fopen(path, \"rb\");");
    out.writeln("if (!f) { perror(path); exit(2); }");
    out.writeln("fseek(f, 0, SEEK_END);");
    out.writeln("*size = ftell(f);");
    out.writeln("fseek(f, 0, SEEK_SET);");
    out.writeln("void* data = malloc(*size > 0 ? (size_t)*size : 1);");
    out.writeln("if (!data || fread(data, 1, (size_t)*size, f) != (size_t)*size) { perror(path); exit(2); }");
    out.writeln("fclose(f);");
    out.writeln("return data;");
    out.dedent();
    out.writeln("}");
    out.newline();

    out.writeln("static void loopjit_store(const char* path, const void* data, long size) {");
    out.indent();
    out.writeln("FILE* f = fopen(path, \"wb\");");
    out.writeln("if (!f || fwrite(data, 1, (size_t)size, f) != (size_t)size) { perror(path); exit(2); }");
    out.writeln("fclose(f);");
    out.dedent();
    out.writeln("}");
    out.newline();

    let argc = entry.params.len() + 1;
    out.writeln("int main(int argc, char** argv) {");
    out.indent();
    out.writeln(&format!(
        "if (argc != {argc}) {{ fprintf(stderr, \"expected {} arguments\\n\", argc - 1); return 2; }}",
        argc - 1
    ));

    let mut call_args = Vec::with_capacity(entry.params.len());
    for (index, (_, ty)) in entry.params.iter().enumerate() {
        let argv = format!("argv[{}]", index + 1);
        let name = format!("arg_{index}");
        match ty {
            CType::Pointer(_) => {
                out.writeln(&format!("long size_{index};"));
                out.writeln(&format!(
                    "{ty} {name} = ({ty})loopjit_load({argv}, &size_{index});"
                ));
            }
            CType::Scalar(elem) if elem.is_float() => {
                out.writeln(&format!("{ty} {name} = ({ty})strtod({argv}, NULL);"));
            }
            _ => {
                out.writeln(&format!("{ty} {name} = ({ty})strtoll({argv}, NULL, 10);"));
            }
        }
        call_args.push(name);
    }

    let call = format!("{}({})", entry.name, call_args.join(", "));
    if entry.ret == CType::Void {
        out.writeln(&format!("{call};"));
    } else {
        out.writeln(&format!("{} result = {call};", entry.ret));
    }

    let pointers: Vec<usize> = entry
        .params
        .iter()
        .enumerate()
        .filter(|(_, (_, ty))| ty.is_pointer())
        .map(|(index, _)| index)
        .collect();
    for &index in &pointers {
        out.writeln(&format!(
            "loopjit_store(argv[{}], arg_{index}, size_{index});",
            index + 1
        ));
    }

    match entry.ret {
        CType::Void => out.writeln("printf(\"void\\n\");"),
        CType::Pointer(_) => {
            out.writeln("int param = -1;");
            for &index in &pointers {
                out.writeln(&format!(
                    "if ((const void*)result == (const void*)arg_{index}) param = {index};"
                ));
            }
            out.writeln("if (param < 0) { fprintf(stderr, \"result aliases no argument\\n\"); return 3; }");
            out.writeln("printf(\"param %d\\n\", param);");
        }
        CType::Scalar(elem) if elem.is_float() => {
            out.writeln("printf(\"%.17g\\n\", (double)result);");
        }
        CType::Scalar(_) | CType::Index => {
            out.writeln("printf(\"%lld\\n\", (long long)result);");
        }
    }
    out.writeln("return 0;");
    out.dedent();
    out.writeln("}");
    out.take_output()
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use loopjit_ir::{ArgType, ArrayType};

    use super::*;

    fn entry(params: &[(&str, CType)], ret: CType) -> EntryPoint {
        let args = params
            .iter()
            .map(|(_, ty)| match *ty {
                CType::Pointer(elem) => ArgType::Array(ArrayType::new(elem, &[4])),
                CType::Scalar(elem) => ArgType::Scalar(elem),
                CType::Index => ArgType::Scalar(ElemType::I64),
                CType::Void => unreachable!("void parameter"),
            })
            .collect();
        EntryPoint {
            name: "kernel".into(),
            params: params.iter().map(|(n, t)| ((*n).to_owned(), *t)).collect(),
            ret,
            args,
        }
    }

    #[test]
    fn bytes_round_trip_through_native_layout() {
        let original = BufferData::F64(vec![1.5, -2.0, 1e300]);
        let bytes = encode(&original);
        assert_eq!(bytes.len(), 24);
        let mut decoded = BufferData::zeros(ElemType::F64, 3);
        decode_into(&mut decoded, &bytes).unwrap();
        assert_eq!(decoded, original);

        let mut short = BufferData::zeros(ElemType::I32, 4);
        assert!(matches!(
            decode_into(&mut short, &bytes[..8]),
            Err(InvokeError::Protocol { .. })
        ));
    }

    #[test]
    fn result_protocol() {
        let scalar = entry(&[("a", CType::Pointer(ElemType::F64))], CType::Scalar(ElemType::F64));
        assert_eq!(
            parse_result(&scalar, "190\n").unwrap(),
            Output::Scalar(Scalar::F64(190.0))
        );
        let pointer = entry(&[("a", CType::Pointer(ElemType::I32))], CType::Pointer(ElemType::I32));
        assert_eq!(parse_result(&pointer, "param 0\n").unwrap(), Output::Buffer { param: 0 });
        assert!(parse_result(&pointer, "garbage").is_err());
        let void = entry(&[], CType::Void);
        assert_eq!(parse_result(&void, "void").unwrap(), Output::Void);
    }

    #[test]
    fn harness_loads_and_stores_every_buffer() {
        let text = harness(&entry(
            &[
                ("a", CType::Pointer(ElemType::F64)),
                ("n", CType::Scalar(ElemType::I64)),
            ],
            CType::Pointer(ElemType::F64),
        ));
        assert!(text.contains("double* arg_0 = (double*)loopjit_load(argv[1], &size_0);"));
        assert!(text.contains("int64_t arg_1 = (int64_t)strtoll(argv[2], NULL, 10);"));
        assert!(text.contains("double* result = kernel(arg_0, arg_1);"));
        assert!(text.contains("loopjit_store(argv[1], arg_0, size_0);"));
        assert!(text.contains("if ((const void*)result == (const void*)arg_0) param = 0;"));
        assert!(!text.contains("size_1"));
    }

    #[test]
    fn missing_compiler_is_reported() {
        let toolchain = CcToolchain::new(CcConfig::default().with_compiler("loopjit-no-such-cc"));
        assert!(!toolchain.is_available());
        let assembly = Assembly {
            unit: crate::assemble::TranslationUnit {
                name: UNIT_NAME.into(),
                includes: vec![],
                decls: vec![],
            },
            entry: entry(&[], CType::Void),
            source: String::new(),
        };
        let Err(err) = toolchain.compile(&assembly) else {
            panic!("compiled without a compiler");
        };
        assert!(matches!(err, ToolchainError::CompilerNotFound { .. }), "{err}");
    }
}
