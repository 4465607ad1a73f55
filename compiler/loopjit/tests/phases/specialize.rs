//! Lifting, lowering and composition through the public front door.

use std::sync::Arc;

use loopjit::{
    Arg, Buffer, LoweringStyle, Output, Scalar, SpecializeError, Specializer, TypeSignature,
};
use loopjit_ir::{Node, NodeCounter};
use loopjit_lower::{LowerError, Pipeline};
use pretty_assertions::assert_eq;

use crate::common::{counted, interpret, ramp, same_output, Counting, SUM_ARRAY};

fn both_styles(source: &str, run: impl Fn(&Specializer)) {
    for style in [LoweringStyle::Outlined, LoweringStyle::Inline] {
        let (jit, _) = counted(source);
        run(&jit.with_style(style));
    }
}

#[test]
fn map_doubles_every_element() {
    both_styles("fn f(a) { return map(|x| x * 2, a); }", |jit| {
        let mut a = Buffer::from_vec(vec![1.0f64, 2.0, 3.0, 4.0]);
        let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
        assert_eq!(out, Output::Buffer { param: 0 });
        assert_eq!(a.as_slice::<f64>(), Some(&[2.0, 4.0, 6.0, 8.0][..]));
    });
}

#[test]
fn reduce_sums() {
    both_styles("fn f(a) { return reduce(|x, y| x + y, a); }", |jit| {
        let mut a = Buffer::from_vec(vec![1i64, 2, 3, 4]);
        let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
        assert_eq!(out, Output::Scalar(Scalar::I64(10)));
        assert_eq!(a.as_slice::<i64>(), Some(&[1, 2, 3, 4][..]));
    });
}

#[test]
fn elementwise_adds_into_first_operand() {
    both_styles("fn f(a, b) { elementwise(|x, y| x + y, a, b); }", |jit| {
        let mut a = Buffer::from_vec(vec![1.0f64, 2.0, 3.0]);
        let mut b = Buffer::from_vec(vec![4.0f64, 5.0, 6.0]);
        let out = jit.call(&mut [Arg::Array(&mut a), Arg::Array(&mut b)]).unwrap();
        assert_eq!(out, Output::Void);
        assert_eq!(a.as_slice::<f64>(), Some(&[5.0, 7.0, 9.0][..]));
        assert_eq!(b.as_slice::<f64>(), Some(&[4.0, 5.0, 6.0][..]));
    });
}

#[test]
fn lowered_agrees_with_source_on_sum_array() {
    let mut expected_buffer = ramp(&[2, 10]);
    let expected = interpret(SUM_ARRAY, &mut [Arg::Array(&mut expected_buffer)]);
    assert!(same_output(expected, Output::Scalar(Scalar::F64(190.0))));

    both_styles(SUM_ARRAY, |jit| {
        let mut a = ramp(&[2, 10]);
        let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
        assert!(same_output(out, expected), "{out} vs {expected}");
        assert_eq!(a, expected_buffer);
    });
}

#[test]
fn lifting_leaves_no_lambdas() {
    let func = loopjit_parse::parse_function(SUM_ARRAY).unwrap();
    let sig: TypeSignature = "f64[2x10]".parse().unwrap();
    for style in [LoweringStyle::Outlined, LoweringStyle::Inline] {
        let program = Pipeline::new(style).run(&func, sig.args()).unwrap();
        let nodes = program
            .entry
            .body
            .iter()
            .chain(program.generated.iter().flat_map(|f| f.body.iter()));
        let counter = NodeCounter::count_all(nodes);
        assert_eq!(counter.get("lambda"), 0);
        assert_eq!(counter.get("composite"), 0);
        assert_eq!(program.lifted.len(), 4);
    }
    // The captured function itself is untouched.
    assert_eq!(NodeCounter::count_all(&func.body).get("lambda"), 4);
}

#[test]
fn composition_hoists_map_before_reduce() {
    let (jit, _) = counted("fn f(a) { return reduce(|x, y| x + y, map(|x| x / 4, a)); }");
    let jit = jit.with_style(LoweringStyle::Inline);
    let sig: TypeSignature = "f64[2x10]".parse().unwrap();
    let unit = jit.translation_unit(&sig).unwrap();

    let map_loop = unit.source.find("a[i] = LAMBDA_1(a[i]);").unwrap();
    let seed = unit.source.find("double accumulator_0 = a[0];").unwrap();
    let fold = unit
        .source
        .find("accumulator_0 = LAMBDA_0(accumulator_0, a[i]);")
        .unwrap();
    assert!(map_loop < seed && seed < fold);
    assert_eq!(unit.source.matches("i < 20;").count(), 2);

    let Some(Node::Function(entry)) = unit.unit.decls.last() else {
        panic!("entry function must come last");
    };
    let kinds: Vec<&str> = entry.body.iter().map(Node::kind_name).collect();
    assert_eq!(kinds, vec!["for", "assign", "for", "return"]);
}

#[test]
fn captured_variable_is_rejected() {
    let (jit, counting) = counted("fn f(a, k) { return map(|x| x * k, a); }");
    let mut a = ramp(&[3]);
    let err = jit
        .call(&mut [Arg::Array(&mut a), Arg::Scalar(Scalar::F64(2.0))])
        .unwrap_err();
    assert_eq!(
        err,
        SpecializeError::Lower(LowerError::CapturedVariable {
            lambda: "LAMBDA_0".into(),
            name: "k".into()
        })
    );
    assert_eq!(err.stage(), "lift");
    assert_eq!(counting.compiles(), 0);
}

#[test]
fn shape_mismatch_is_rejected() {
    let (jit, _) = counted("fn f(a, b) { elementwise(|x, y| x + y, a, b); }");
    let mut a = ramp(&[3]);
    let mut b = ramp(&[4]);
    let err = jit
        .call(&mut [Arg::Array(&mut a), Arg::Array(&mut b)])
        .unwrap_err();
    assert!(matches!(
        err,
        SpecializeError::Lower(LowerError::ShapeMismatch { .. })
    ));
}

#[test]
fn zero_length_reduce_never_compiles() {
    let counting = Arc::new(Counting::default());
    for style in [LoweringStyle::Outlined, LoweringStyle::Inline] {
        let jit = Specializer::from_source(
            "fn f(a) { return reduce(|x, y| x + y, a); }",
            counting.clone(),
        )
        .unwrap()
        .with_style(style);
        let mut empty = Buffer::from_vec(Vec::<i32>::new());
        let err = jit.call(&mut [Arg::Array(&mut empty)]).unwrap_err();
        assert_eq!(err.stage(), "lower");
    }
    assert_eq!(counting.compiles(), 0);
}

#[test]
fn specialized_kernel_only_accepts_its_own_shape() {
    let (jit, counting) = counted("fn total(a) { return reduce(|x, y| x + y, a); }");
    let signature: TypeSignature = "f64[4]".parse().unwrap();
    let kernel = jit.specialize(&signature).unwrap();

    let mut longer = Buffer::from_vec(vec![1.0f64; 8]);
    let err = kernel.invoke(&mut [Arg::Array(&mut longer)]).unwrap_err();
    assert!(matches!(err, loopjit::InvokeError::Signature { index: 0, .. }), "{err}");

    let mut exact = Buffer::from_vec(vec![1.0f64; 4]);
    assert_eq!(
        kernel.invoke(&mut [Arg::Array(&mut exact)]).unwrap(),
        Output::Scalar(Scalar::F64(4.0))
    );

    // The front door specializes per shape instead of reusing the f64[4] kernel.
    let mut longer = Buffer::from_vec(vec![1.0f64; 8]);
    assert_eq!(
        jit.call(&mut [Arg::Array(&mut longer)]).unwrap(),
        Output::Scalar(Scalar::F64(8.0))
    );
    assert_eq!(counting.compiles(), 2);
}

#[test]
fn read_before_hoisted_loop_sees_original_values() {
    let source = "fn f(a) { return a[0] + reduce(|x, y| x + y, map(|x| x * 10, a)); }";
    let start = || Buffer::from_vec(vec![1.0f64, 2.0, 3.0]);
    let mut expected_buffer = start();
    let expected = interpret(source, &mut [Arg::Array(&mut expected_buffer)]);
    assert!(same_output(expected, Output::Scalar(Scalar::F64(61.0))));

    both_styles(source, |jit| {
        let mut a = start();
        let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
        assert!(same_output(out, expected), "{} style: {out} vs {expected}", jit.style().name());
        assert_eq!(a, expected_buffer);
    });

    let sig: TypeSignature = "f64[3]".parse().unwrap();
    let (jit, _) = counted(source);
    let inline = jit.with_style(LoweringStyle::Inline).translation_unit(&sig).unwrap();
    let spill = inline.source.find("double temp_0 = a[0];").unwrap();
    let map_loop = inline.source.find("a[i] = LAMBDA_1(a[i]);").unwrap();
    assert!(spill < map_loop);

    // C leaves the order of `+` operands open, so the outlined call is pinned too.
    let (jit, _) = counted(source);
    let outlined = jit.translation_unit(&sig).unwrap();
    assert!(outlined.source.contains("double temp_0 = a[0];"));
    assert!(outlined.source.contains("return (temp_0 + reduce_0(map_0(a)));"));
}

#[test]
fn local_changing_numeric_kind_is_rejected() {
    let (jit, counting) = counted("fn f() { x = 1; x = 2.5; return x; }");
    let err = jit.call(&mut []).unwrap_err();
    assert!(
        matches!(err, SpecializeError::Lower(LowerError::AssignMismatch { ref name, .. }) if name == "x"),
        "{err}"
    );
    assert_eq!(err.stage(), "typing");
    assert_eq!(counting.compiles(), 0);
}
