//! Translation unit assembly.
//!
//! A lowered program becomes one C unit laid out as:
//!
//! 1. `#include` lines
//! 2. lifted `#define` units, in lifting order
//! 3. generated loop functions, in generation order
//! 4. the specialized entry function
//!
//! Every later declaration only refers to earlier ones, so the unit needs
//! no forward declarations.

use loopjit_ir::{ArgType, CEmitter, CType, EmitError, Node};
use loopjit_lower::LoweredProgram;

/// Name every assembled unit is compiled under.
pub const UNIT_NAME: &str = "generated";

const INCLUDES: &[&str] = &["stdint.h"];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error("entry function `{function}` is not fully typed")]
    UntypedEntry { function: String },
    #[error("entry function `{function}` has {params} parameters but was lowered for {args} arguments")]
    ArgCount {
        function: String,
        params: usize,
        args: usize,
    },
}

/// Callable surface of an assembled unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub params: Vec<(String, CType)>,
    pub ret: CType,
    /// Exact argument types, shapes included, the unit was lowered for.
    pub args: Vec<ArgType>,
}

impl EntryPoint {
    /// C prototype, e.g. `double sum_array(double* a)`.
    pub fn prototype(&self) -> String {
        let params = if self.params.is_empty() {
            "void".to_owned()
        } else {
            self.params
                .iter()
                .map(|(name, ty)| format!("{ty} {name}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("{} {}({params})", self.ret, self.name)
    }

    /// Position of the parameter a returned pointer aliases, by name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|(param, _)| param == name)
    }
}

/// Ordered top-level declarations of one unit.
#[derive(Clone, Debug, PartialEq)]
pub struct TranslationUnit {
    pub name: String,
    pub includes: Vec<String>,
    pub decls: Vec<Node>,
}

impl TranslationUnit {
    pub fn to_c(&self) -> Result<String, EmitError> {
        let mut emitter = CEmitter::new();
        for header in &self.includes {
            emitter.emit_include(header);
        }
        emitter.newline();
        for decl in &self.decls {
            emitter.emit_decl(decl)?;
        }
        Ok(emitter.take_output())
    }

    /// Name of every function the unit defines.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.decls.iter().filter_map(|decl| match decl {
            Node::Function(def) => Some(def.name.as_str()),
            _ => None,
        })
    }
}

/// A unit together with its rendered source and entry point.
#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    pub unit: TranslationUnit,
    pub entry: EntryPoint,
    pub source: String,
}

pub fn assemble(program: &LoweredProgram) -> Result<Assembly, AssembleError> {
    let entry = entry_point(program)?;

    let mut decls =
        Vec::with_capacity(program.lifted.len() + program.generated.len() + 1);
    decls.extend(program.lifted.iter().cloned().map(Node::Define));
    decls.extend(program.generated.iter().cloned().map(Node::Function));
    decls.push(Node::Function(program.entry.clone()));

    let unit = TranslationUnit {
        name: UNIT_NAME.to_owned(),
        includes: INCLUDES.iter().map(|&header| header.to_owned()).collect(),
        decls,
    };
    let source = unit.to_c()?;
    tracing::debug!(
        unit = %unit.name,
        entry = %entry.name,
        decls = unit.decls.len(),
        bytes = source.len(),
        "assembled translation unit"
    );
    Ok(Assembly {
        unit,
        entry,
        source,
    })
}

fn entry_point(program: &LoweredProgram) -> Result<EntryPoint, AssembleError> {
    let entry = &program.entry;
    let untyped = || AssembleError::UntypedEntry {
        function: entry.name.clone(),
    };
    let params = entry
        .params
        .iter()
        .map(|param| param.ty.map(|ty| (param.name.clone(), ty)).ok_or_else(untyped))
        .collect::<Result<Vec<_>, _>>()?;
    if params.len() != program.args.len() {
        return Err(AssembleError::ArgCount {
            function: entry.name.clone(),
            params: params.len(),
            args: program.args.len(),
        });
    }
    Ok(EntryPoint {
        name: entry.name.clone(),
        params,
        ret: entry.ret.ok_or_else(untyped)?,
        args: program.args.clone(),
    })
}
