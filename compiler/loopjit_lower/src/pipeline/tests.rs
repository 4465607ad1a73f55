use loopjit_ir::{ArrayType, CType, ElemType, Node, NodeCounter};
use pretty_assertions::assert_eq;

use super::*;

const SUM_ARRAY: &str = "
fn sum_array(a) {
    map(|x| x * 2, a);
    elementwise(|x, y| x + y, a, a);
    return reduce(|x, y| x + y, map(|x| x / 4, a));
}";

fn source(text: &str) -> FunctionDef {
    match loopjit_parse::parse_function(text) {
        Ok(func) => func,
        Err(err) => panic!("parse failed: {err}"),
    }
}

fn f64s(shape: &[usize]) -> Vec<ArgType> {
    vec![ArgType::Array(ArrayType::new(ElemType::F64, shape))]
}

#[test]
fn outlined_sum_array() {
    let program = Pipeline::default()
        .run(&source(SUM_ARRAY), &f64s(&[2, 10]))
        .unwrap();

    let lifted: Vec<&str> = program.lifted.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(lifted, vec!["LAMBDA_0", "LAMBDA_1", "LAMBDA_2", "LAMBDA_3"]);

    let generated: Vec<&str> = program.generated.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(generated, vec!["map_0", "map_1", "reduce_0", "elementwise_0"]);

    assert_eq!(
        program.entry.body,
        vec![
            Node::call("map_0", vec![Node::sym("a")]),
            Node::call("elementwise_0", vec![Node::sym("a"), Node::sym("a")]),
            Node::ret(Some(Node::call(
                "reduce_0",
                vec![Node::call("map_1", vec![Node::sym("a")])]
            ))),
        ]
    );
    assert_eq!(program.entry.ret, Some(CType::Scalar(ElemType::F64)));
}

#[test]
fn inline_sum_array_hoists_map_before_reduce() {
    let program = Pipeline::new(LoweringStyle::Inline)
        .run(&source(SUM_ARRAY), &f64s(&[2, 10]))
        .unwrap();
    assert!(program.generated.is_empty());

    let kinds: Vec<&str> = program.entry.body.iter().map(Node::kind_name).collect();
    // map loop; elementwise loop; inner map loop, seed, reduce loop; return.
    assert_eq!(kinds, vec!["for", "for", "for", "assign", "for", "return"]);

    let loops: Vec<&Node> = program
        .entry
        .body
        .iter()
        .filter(|stmt| matches!(stmt, Node::For(_)))
        .collect();
    let Node::For(inner_map) = loops[2] else {
        unreachable!()
    };
    let Node::For(reduce) = loops[3] else {
        unreachable!()
    };
    assert_eq!(*inner_map.end, Node::int(20));
    assert_eq!(*reduce.start, Node::int(1));
    assert_eq!(*reduce.end, Node::int(20));
    assert_eq!(
        program.entry.body[5],
        Node::ret(Some(Node::sym("accumulator_0")))
    );

    let counter = NodeCounter::count_all(&program.entry.body);
    assert_eq!(counter.get("composite"), 0);
    assert_eq!(counter.get("lambda"), 0);
}

#[test]
fn identical_inputs_lower_identically() {
    let func = source(SUM_ARRAY);
    let args = f64s(&[7]);
    for style in [LoweringStyle::Outlined, LoweringStyle::Inline] {
        let first = Pipeline::new(style).run(&func, &args).unwrap();
        let second = Pipeline::new(style).run(&func, &args).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn element_count_follows_signature() {
    let func = source("fn f(a) { return reduce(|x, y| x + y, a); }");
    let small = Pipeline::default().run(&func, &f64s(&[3])).unwrap();
    let large = Pipeline::default().run(&func, &f64s(&[4, 5])).unwrap();
    let end = |program: &LoweredProgram| match &program.generated[0].body[1] {
        Node::For(lp) => (*lp.end).clone(),
        other => panic!("expected loop, got {other:?}"),
    };
    assert_eq!(end(&small), Node::int(3));
    assert_eq!(end(&large), Node::int(20));
}

#[test]
fn zero_length_reduce_fails() {
    let func = source("fn f(a) { return reduce(|x, y| x + y, a); }");
    let err = Pipeline::default().run(&func, &f64s(&[0])).unwrap_err();
    assert_eq!(
        err,
        LowerError::EmptyReduce {
            op: FunctionalOp::Reduce
        }
    );
}

#[test]
fn zero_length_map_is_a_no_op_loop() {
    let func = source("fn f(a) { map(|x| x + 1, a); }");
    let program = Pipeline::default().run(&func, &f64s(&[0])).unwrap();
    assert_eq!(program.entry.ret, Some(CType::Void));
}

#[test]
fn source_function_is_untouched() {
    let func = source(SUM_ARRAY);
    let before = func.clone();
    Pipeline::default().run(&func, &f64s(&[4])).unwrap();
    assert_eq!(func, before);
}

#[test]
fn argument_count_must_match() {
    let func = source(SUM_ARRAY);
    let err = Pipeline::default().run(&func, &[]).unwrap_err();
    assert!(matches!(err, LowerError::ParamCount { expected: 1, found: 0, .. }));
}

#[test]
fn scalar_parameters_pass_through() {
    let func = source("fn scale(a, k) { a[0] = a[0] * k; return reduce(|x, y| x + y, a); }");
    let args = vec![
        ArgType::Array(ArrayType::new(ElemType::I64, &[4])),
        ArgType::Scalar(ElemType::I64),
    ];
    let program = Pipeline::default().run(&func, &args).unwrap();
    assert_eq!(
        program.entry.params[1].ty,
        Some(CType::Scalar(ElemType::I64))
    );
    assert_eq!(program.entry.ret, Some(CType::Scalar(ElemType::I64)));
}
