use pretty_assertions::assert_eq;

use loopjit_ir::{BinaryOp, Node, Param, Span};

use crate::{parse_function, ParseError};

#[test]
fn parses_functional_pipeline() {
    let func = parse_function(
        "fn sum_array(a) {
            map(|x| x * 2, a);
            return reduce(|x, y| x + y, map(|x| x / 4, a));
        }",
    )
    .unwrap();

    assert_eq!(func.name, "sum_array");
    assert_eq!(func.params, vec![Param::untyped("a")]);
    assert_eq!(func.ret, None);
    assert_eq!(
        func.body,
        vec![
            Node::call(
                "map",
                vec![
                    Node::lambda(
                        vec!["x".into()],
                        Node::binary(BinaryOp::Mul, Node::sym("x"), Node::int(2))
                    ),
                    Node::sym("a"),
                ]
            ),
            Node::ret(Some(Node::call(
                "reduce",
                vec![
                    Node::lambda(
                        vec!["x".into(), "y".into()],
                        Node::binary(BinaryOp::Add, Node::sym("x"), Node::sym("y"))
                    ),
                    Node::call(
                        "map",
                        vec![
                            Node::lambda(
                                vec!["x".into()],
                                Node::binary(BinaryOp::Div, Node::sym("x"), Node::int(4))
                            ),
                            Node::sym("a"),
                        ]
                    ),
                ]
            ))),
        ]
    );
}

#[test]
fn precedence_and_associativity() {
    let func = parse_function("fn f(a) { return a - 1 - 2 * 3; }").unwrap();
    let expected = Node::binary(
        BinaryOp::Sub,
        Node::binary(BinaryOp::Sub, Node::sym("a"), Node::int(1)),
        Node::binary(BinaryOp::Mul, Node::int(2), Node::int(3)),
    );
    assert_eq!(func.body, vec![Node::ret(Some(expected))]);
}

#[test]
fn negative_literals_fold() {
    let func = parse_function("fn f(a) { return -2.5 * -a; }").unwrap();
    let expected = Node::binary(BinaryOp::Mul, Node::float(-2.5), Node::neg(Node::sym("a")));
    assert_eq!(func.body, vec![Node::ret(Some(expected))]);
}

#[test]
fn assignment_targets() {
    let func = parse_function("fn f(a, b) { b = a; a[0] = 1; return; }").unwrap();
    assert_eq!(
        func.body,
        vec![
            Node::assign(Node::sym("b"), Node::sym("a")),
            Node::assign(Node::index(Node::sym("a"), Node::int(0)), Node::int(1)),
            Node::ret(None),
        ]
    );
}

#[test]
fn call_result_is_not_assignable() {
    let err = parse_function("fn f(a) { g(a) = 1; }").unwrap_err();
    assert_eq!(
        err,
        ParseError::InvalidAssignTarget {
            span: Span::new(10, 11)
        }
    );
}

#[test]
fn missing_semicolon_reports_found_token() {
    let err = parse_function("fn f(a) { return a }").unwrap_err();
    assert_eq!(
        err,
        ParseError::UnexpectedToken {
            expected: "`;`",
            found: "}".into(),
            span: Span::new(19, 20),
        }
    );
}

#[test]
fn unterminated_body() {
    let err = parse_function("fn f(a) { map(|x| x, a);").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedEof { expected: "`}`", .. }));
}

#[test]
fn trailing_input_after_function() {
    let err = parse_function("fn f(a) { } fn g() { }").unwrap_err();
    assert_eq!(err, ParseError::TrailingInput { span: Span::new(12, 14) });
}

#[test]
fn integer_overflow_is_reported() {
    let err = parse_function("fn f() { return 99999999999999999999; }").unwrap_err();
    assert!(matches!(err, ParseError::InvalidLiteral { .. }));
}
