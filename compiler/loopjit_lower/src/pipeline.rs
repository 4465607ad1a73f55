use loopjit_ir::{ArgType, FunctionDef, MacroDef, NodeCounter};

use crate::entry::type_entry;
use crate::env::BufferTypes;
use crate::error::LowerError;
use crate::fixup::fix_up;
use crate::lift::lift;
use crate::lower::{LoweringPass, LoweringStyle};
use crate::names::NameGen;
use crate::op::FunctionalOp;
use crate::validate::validate;

/// Result of lowering one function for one argument-type list.
#[derive(Clone, Debug, PartialEq)]
pub struct LoweredProgram {
    /// The rewritten, fully typed entry function.
    pub entry: FunctionDef,
    /// Lifted lambdas, in lifting order.
    pub lifted: Vec<MacroDef>,
    /// Generated loop functions, in generation order (empty when inline).
    pub generated: Vec<FunctionDef>,
    /// Argument types the program was specialized for.
    pub args: Vec<ArgType>,
}

/// The fixed lowering sequence: lift, map, reduce, elementwise, fix-up,
/// validate, type.
#[derive(Copy, Clone, Debug, Default)]
pub struct Pipeline {
    style: LoweringStyle,
}

impl Pipeline {
    pub fn new(style: LoweringStyle) -> Self {
        Pipeline { style }
    }

    pub fn style(&self) -> LoweringStyle {
        self.style
    }

    /// Lower `func` for a call with arguments of types `args`.
    ///
    /// `func` is left untouched; the same source can be lowered for any
    /// number of signatures.
    pub fn run(&self, func: &FunctionDef, args: &[ArgType]) -> Result<LoweredProgram, LowerError> {
        let mut env = BufferTypes::for_params(&func.name, &func.params, args)?;
        let mut names = NameGen::new();

        let (mut body, lifted) = lift(func.body.clone(), &mut names)?;
        tracing::debug!(function = %func.name, lifted = lifted.len(), "lifted lambdas");

        let mut generated = Vec::new();
        for op in FunctionalOp::ORDER {
            body = LoweringPass::new(op, self.style, &mut env, &mut names, &lifted, &mut generated)
                .run(body)?;
        }

        let body = fix_up(body, &generated, &mut names);
        validate(&body, &generated)?;

        let entry = type_entry(
            FunctionDef {
                name: func.name.clone(),
                params: func.params.clone(),
                ret: None,
                body,
            },
            args,
            &lifted,
            &generated,
        )?;

        tracing::debug!(
            function = %entry.name,
            style = self.style.name(),
            generated = generated.len(),
            nodes = NodeCounter::count_all(&entry.body).total(),
            "lowered function"
        );
        Ok(LoweredProgram {
            entry,
            lifted,
            generated,
            args: args.to_vec(),
        })
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
