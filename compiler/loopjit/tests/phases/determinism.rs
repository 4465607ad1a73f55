//! Property tests: deterministic assembly and lowered-vs-source agreement.

#![allow(
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use loopjit::{Arg, Buffer, LoweringStyle, TypeSignature};
use loopjit_ir::{ArgType, ArrayType, ElemType};
use proptest::prelude::*;

use crate::common::{counted, interpret, same_output, SUM_ARRAY};

const TWO_BUFFERS: &str = "
fn combine(a, b) {
    elementwise(|x, y| x * y - x, a, b);
    map(|x| x + 3, b);
    return reduce(|x, y| x + y, a);
}";

fn elem_strategy() -> impl Strategy<Value = ElemType> {
    prop::sample::select(ElemType::ALL.to_vec())
}

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..6, 1..4)
}

fn style_strategy() -> impl Strategy<Value = LoweringStyle> {
    prop_oneof![Just(LoweringStyle::Outlined), Just(LoweringStyle::Inline)]
}

fn buffer(elem: ElemType, values: &[i16]) -> Buffer {
    match elem {
        ElemType::I32 => Buffer::from_vec(values.iter().map(|&v| i32::from(v)).collect()),
        ElemType::I64 => Buffer::from_vec(values.iter().map(|&v| i64::from(v)).collect()),
        ElemType::F32 => Buffer::from_vec(values.iter().map(|&v| f32::from(v)).collect()),
        ElemType::F64 => Buffer::from_vec(values.iter().map(|&v| f64::from(v)).collect()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn same_signature_same_unit(
        elem in elem_strategy(),
        shape in shape_strategy(),
        style in style_strategy(),
    ) {
        let sig = TypeSignature::new([ArgType::Array(ArrayType::new(elem, &shape))]);
        let (first, _) = counted(SUM_ARRAY);
        let (second, _) = counted(SUM_ARRAY);
        let first = first.with_style(style).translation_unit(&sig).unwrap();
        let second = second.with_style(style).translation_unit(&sig).unwrap();
        prop_assert_eq!(&first.source, &second.source);
        prop_assert_eq!(first.entry, second.entry);
    }

    #[test]
    fn lowered_matches_source(
        elem in elem_strategy(),
        style in style_strategy(),
        pairs in prop::collection::vec((-50i16..50, -50i16..50), 1..24),
    ) {
        let left: Vec<i16> = pairs.iter().map(|p| p.0).collect();
        let right: Vec<i16> = pairs.iter().map(|p| p.1).collect();

        let (mut ref_a, mut ref_b) = (buffer(elem, &left), buffer(elem, &right));
        let expected = interpret(
            TWO_BUFFERS,
            &mut [Arg::Array(&mut ref_a), Arg::Array(&mut ref_b)],
        );

        let (jit, _) = counted(TWO_BUFFERS);
        let jit = jit.with_style(style);
        let (mut a, mut b) = (buffer(elem, &left), buffer(elem, &right));
        let out = jit.call(&mut [Arg::Array(&mut a), Arg::Array(&mut b)]).unwrap();

        prop_assert!(same_output(out, expected), "{} vs {}", out, expected);
        prop_assert_eq!(a, ref_a);
        prop_assert_eq!(b, ref_b);
    }
}
