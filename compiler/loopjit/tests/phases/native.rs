//! The system C compiler tier. Every test returns early without `cc`.

use std::sync::Arc;

use loopjit::{
    Arg, Buffer, CcConfig, CcToolchain, LoweringStyle, Output, Scalar, Specializer, ToolchainError,
    SpecializeError,
};

use crate::common::{interpret, ramp, same_output, SUM_ARRAY};

fn native() -> Option<Arc<CcToolchain>> {
    let cc = CcToolchain::new(CcConfig::default());
    if cc.is_available() {
        Some(Arc::new(cc))
    } else {
        eprintln!("skipping: no C compiler on PATH");
        None
    }
}

#[test]
fn sum_array_natively() {
    let Some(cc) = native() else { return };
    for style in [LoweringStyle::Outlined, LoweringStyle::Inline] {
        let jit = Specializer::from_source(SUM_ARRAY, cc.clone())
            .unwrap()
            .with_style(style);
        let mut a = ramp(&[2, 10]);
        let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
        assert_eq!(out, Output::Scalar(Scalar::F64(190.0)));
        assert_eq!(a, ramp(&[2, 10]));

        // Second call reuses the compiled executable.
        let mut b = ramp(&[2, 10]);
        jit.call(&mut [Arg::Array(&mut b)]).unwrap();
        assert_eq!(jit.cache_stats().builds, 1);
    }
}

#[test]
fn scalar_arguments_and_buffer_results() {
    let Some(cc) = native() else { return };
    let source = "fn shift(k, a) { return map(|x| x - 7, a); }";
    let jit = Specializer::from_source(source, cc).unwrap();

    let mut a = Buffer::from_vec(vec![10i32, 20, 30]);
    let mut expected = a.clone();
    let reference = interpret(
        source,
        &mut [Arg::Scalar(Scalar::I64(5)), Arg::Array(&mut expected)],
    );
    let out = jit
        .call(&mut [Arg::Scalar(Scalar::I64(5)), Arg::Array(&mut a)])
        .unwrap();
    assert_eq!(out, Output::Buffer { param: 1 });
    assert!(same_output(out, reference));
    assert_eq!(a.as_slice::<i32>(), Some(&[3, 13, 23][..]));
    assert_eq!(a, expected);
}

#[test]
fn float32_reduction() {
    let Some(cc) = native() else { return };
    let jit = Specializer::from_source("fn total(a) { return reduce(|x, y| x + y, a); }", cc).unwrap();
    let mut a = Buffer::from_vec(vec![0.5f32, 1.5, 2.0]);
    let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
    assert_eq!(out, Output::Scalar(Scalar::F32(4.0)));
}

#[test]
fn broken_compiler_flags_surface_stderr() {
    let Some(_) = native() else { return };
    let cc = CcToolchain::new(CcConfig::default().with_flags(["-definitely-not-a-flag"]));
    let jit = Specializer::from_source(SUM_ARRAY, Arc::new(cc)).unwrap();
    let err = jit.call(&mut [Arg::Array(&mut ramp(&[4]))]).unwrap_err();
    let SpecializeError::Toolchain(ToolchainError::CompileFailed { stderr, command, .. }) = &err else {
        panic!("expected a compile failure, got {err}");
    };
    assert!(!stderr.is_empty());
    assert!(command.contains("-definitely-not-a-flag"));
    assert_eq!(err.stage(), "compile");
    assert_eq!(jit.cache_stats().entries, 0);
}
