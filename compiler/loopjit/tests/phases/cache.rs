//! Per-signature caching under concurrency.

use std::sync::Barrier;

use loopjit::{Arg, Buffer, Output, Scalar, TypeSignature};

use crate::common::{counted, ramp, SUM_ARRAY};

const THREADS: usize = 8;

#[test]
fn concurrent_first_calls_compile_once() {
    let (jit, counting) = counted(SUM_ARRAY);
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                let mut a = ramp(&[2, 10]);
                barrier.wait();
                let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
                assert_eq!(out, Output::Scalar(Scalar::F64(190.0)));
            });
        }
    });

    assert_eq!(counting.compiles(), 1);
    let stats = jit.cache_stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.hits, (THREADS - 1) as u64);
}

#[test]
fn concurrent_distinct_signatures_each_compile_once() {
    let (jit, counting) = counted(SUM_ARRAY);
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let jit = &jit;
            let barrier = &barrier;
            scope.spawn(move || {
                // Two threads per length.
                let len = 4 + t / 2;
                let mut a = Buffer::from_vec((0..len).map(|i| i as i64 * 4).collect());
                barrier.wait();
                let out = jit.call(&mut [Arg::Array(&mut a)]).unwrap();
                let expected: i64 = (0..len as i64).map(|i| i * 4).sum();
                assert_eq!(out, Output::Scalar(Scalar::I64(expected)));
            });
        }
    });

    assert_eq!(counting.compiles(), THREADS / 2);
    assert_eq!(jit.cache_stats().entries, THREADS / 2);
}

#[test]
fn failed_build_is_retried() {
    let (jit, counting) = counted("fn f(a) { return reduce(|x, y| x + y, a); }");
    let empty: TypeSignature = "f64[0]".parse().unwrap();
    assert!(jit.specialize(&empty).is_err());
    assert!(jit.specialize(&empty).is_err());
    let stats = jit.cache_stats();
    assert_eq!((stats.failures, stats.builds, stats.entries), (2, 0, 0));
    assert_eq!(counting.compiles(), 0);
}

#[test]
fn shared_kernel_is_reused_across_buffers() {
    let (jit, _) = counted(SUM_ARRAY);
    let sig: TypeSignature = "f64[2x10]".parse().unwrap();
    let first = jit.specialize(&sig).unwrap();
    let second = jit.specialize(&sig).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.signature, sig);

    // Same signature, different contents.
    let mut ones = Buffer::with_shape(&[2, 10], vec![4.0f64; 20]).unwrap();
    let out = first.invoke(&mut [Arg::Array(&mut ones)]).unwrap();
    assert_eq!(out, Output::Scalar(Scalar::F64(80.0)));
}
