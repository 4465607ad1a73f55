//! Reference tier: run the unit in the interpreter.

use loopjit_eval::Machine;
use loopjit_ir::CType;

use super::{check_args, InvokeError, Kernel, Toolchain, ToolchainError};
use crate::assemble::{Assembly, EntryPoint};
use crate::buffer::{bind_args, Arg, Output, Scalar};

#[derive(Copy, Clone, Debug, Default)]
pub struct InterpToolchain;

impl InterpToolchain {
    pub fn new() -> Self {
        InterpToolchain
    }
}

impl Toolchain for InterpToolchain {
    fn name(&self) -> &'static str {
        "interp"
    }

    fn compile(&self, assembly: &Assembly) -> Result<Box<dyn Kernel>, ToolchainError> {
        let machine =
            Machine::from_decls(&assembly.unit.decls).map_err(ToolchainError::Definition)?;
        let names = machine.unresolved();
        if !names.is_empty() {
            return Err(ToolchainError::Unresolved { names });
        }
        tracing::debug!(entry = %assembly.entry.name, "loaded unit into interpreter");
        Ok(Box::new(InterpKernel {
            machine,
            entry: assembly.entry.clone(),
        }))
    }
}

/// A unit loaded into a [`Machine`].
#[derive(Debug)]
pub struct InterpKernel {
    machine: Machine,
    entry: EntryPoint,
}

impl Kernel for InterpKernel {
    fn invoke(&self, args: &mut [Arg<'_>]) -> Result<Output, InvokeError> {
        check_args(&self.entry, args)?;
        let mut bound = bind_args(args);
        let result = self
            .machine
            .call(&self.entry.name, &mut bound.buffers, &bound.values)?;

        match (self.entry.ret, result) {
            (CType::Void, _) | (_, None) => Ok(Output::Void),
            (CType::Pointer(_), Some(value)) => {
                let slot = value.as_buffer()?;
                let param = bound.params.get(slot).copied().ok_or_else(|| InvokeError::Protocol {
                    message: format!("returned buffer slot {slot} was not an argument"),
                })?;
                Ok(Output::Buffer { param })
            }
            (CType::Index, Some(value)) => Ok(Output::Scalar(Scalar::I64(value.as_int()?))),
            (CType::Scalar(elem), Some(value)) => Scalar::from_value(value, elem)
                .map(Output::Scalar)
                .ok_or_else(|| InvokeError::Protocol {
                    message: format!(
                        "`{}` returned a {} for {elem}",
                        self.entry.name,
                        value.type_name()
                    ),
                }),
        }
    }
}
