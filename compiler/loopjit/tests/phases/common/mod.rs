//! Shared test utilities for phase tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use loopjit::assemble::Assembly;
use loopjit::{
    Arg, Buffer, InterpToolchain, Kernel, Output, Scalar, Specializer, Toolchain, ToolchainError,
};
use loopjit_eval::{Machine, Value};

pub const SUM_ARRAY: &str = "
fn sum_array(a) {
    map(|x| x * 2, a);
    elementwise(|x, y| x + y, a, a);
    return reduce(|x, y| x + y, map(|x| x / 4, a));
}";

/// Interpreter tier that counts compilations.
#[derive(Default)]
pub struct Counting {
    compiles: AtomicUsize,
}

impl Counting {
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl Toolchain for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn compile(&self, assembly: &Assembly) -> Result<Box<dyn Kernel>, ToolchainError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        InterpToolchain.compile(assembly)
    }
}

/// Specializer over `source` with a counting interpreter tier.
pub fn counted(source: &str) -> (Specializer, Arc<Counting>) {
    let counting = Arc::new(Counting::default());
    let jit = Specializer::from_source(source, counting.clone()).unwrap();
    (jit, counting)
}

pub fn ramp(shape: &[usize]) -> Buffer {
    let len = shape.iter().product::<usize>();
    Buffer::with_shape(shape, (0..len).map(|i| i as f64).collect()).unwrap()
}

/// Run the unlowered source directly: the reference semantics.
pub fn interpret(source: &str, args: &mut [Arg<'_>]) -> Output {
    let func = loopjit_parse::parse_function(source).unwrap();
    let name = func.name.clone();
    let ret_is_buffer_param = |value: Value, slots: &[usize]| match value {
        Value::Buffer(slot) => Some(Output::Buffer { param: slots[slot] }),
        _ => None,
    };

    let mut machine = Machine::new();
    machine.define_function(func).unwrap();

    let mut slots = Vec::new();
    let mut values = Vec::new();
    let mut buffers: Vec<&mut Buffer> = Vec::new();
    for (position, arg) in args.iter_mut().enumerate() {
        match arg {
            Arg::Array(buffer) => {
                values.push(Value::Buffer(buffers.len()));
                buffers.push(&mut **buffer);
                slots.push(position);
            }
            Arg::Scalar(Scalar::I32(n)) => values.push(Value::Int(i64::from(*n))),
            Arg::Scalar(Scalar::I64(n)) => values.push(Value::Int(*n)),
            Arg::Scalar(Scalar::F32(x)) => values.push(Value::Float(f64::from(*x))),
            Arg::Scalar(Scalar::F64(x)) => values.push(Value::Float(*x)),
        }
    }

    match machine.call(&name, &mut buffers, &values).unwrap() {
        None => Output::Void,
        Some(value) => ret_is_buffer_param(value, &slots).unwrap_or_else(|| match value {
            Value::Int(n) => Output::Scalar(Scalar::I64(n)),
            Value::Float(x) => Output::Scalar(Scalar::F64(x)),
            Value::Buffer(_) => unreachable!(),
        }),
    }
}

/// Compare two outputs by numeric value, ignoring scalar width.
pub fn same_output(left: Output, right: Output) -> bool {
    match (left, right) {
        (Output::Scalar(a), Output::Scalar(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}
