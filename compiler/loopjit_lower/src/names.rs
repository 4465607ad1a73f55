use crate::op::FunctionalOp;

/// Fresh-name source for one pipeline run.
///
/// Lambda names share one counter; generated loop functions have one
/// counter per operation (`map_0`, `reduce_0`, `map_1`); reduction
/// accumulators and spill temporaries have their own.
#[derive(Clone, Debug, Default)]
pub struct NameGen {
    lambdas: u32,
    functions: [u32; 3],
    accumulators: u32,
    temporaries: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lambda(&mut self) -> String {
        let name = format!("LAMBDA_{}", self.lambdas);
        self.lambdas += 1;
        name
    }

    pub fn function(&mut self, op: FunctionalOp) -> String {
        let slot = match op {
            FunctionalOp::Map => 0,
            FunctionalOp::Reduce => 1,
            FunctionalOp::Elementwise => 2,
        };
        let name = format!("{}_{}", op.name(), self.functions[slot]);
        self.functions[slot] += 1;
        name
    }

    pub fn accumulator(&mut self) -> String {
        let name = format!("accumulator_{}", self.accumulators);
        self.accumulators += 1;
        name
    }

    pub fn temporary(&mut self) -> String {
        let name = format!("temp_{}", self.temporaries);
        self.temporaries += 1;
        name
    }

    /// Number of lambdas named so far.
    pub fn lambda_count(&self) -> u32 {
        self.lambdas
    }
}
