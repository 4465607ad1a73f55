use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;

use loopjit_ir::{ArgType, ArrayType, ElemType};

use super::*;

fn sig(len: usize) -> TypeSignature {
    TypeSignature::new([ArgType::Array(ArrayType::new(ElemType::F64, &[len]))])
}

#[test]
fn builds_once_then_hits() {
    let cache: SpecializationCache<String> = SpecializationCache::new();
    let first = cache
        .get_or_build(&sig(4), || Ok::<_, ()>("four".to_owned()))
        .unwrap();
    let second = cache
        .get_or_build(&sig(4), || -> Result<String, ()> { panic!("rebuilt") })
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            builds: 1,
            failures: 0,
            entries: 1
        }
    );
}

#[test]
fn distinct_shapes_are_distinct_entries() {
    let cache: SpecializationCache<usize> = SpecializationCache::new();
    cache.get_or_build(&sig(4), || Ok::<_, ()>(4)).unwrap();
    cache.get_or_build(&sig(8), || Ok::<_, ()>(8)).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(*cache.get(&sig(8)).unwrap(), 8);
    assert!(cache.get(&sig(16)).is_none());
}

#[test]
fn failures_are_not_cached() {
    let cache: SpecializationCache<usize> = SpecializationCache::new();
    let err = cache.get_or_build(&sig(1), || Err::<usize, _>("boom"));
    assert_eq!(err.unwrap_err(), "boom");
    assert!(!cache.contains(&sig(1)));

    let value = cache.get_or_build(&sig(1), || Ok::<_, &str>(1)).unwrap();
    assert_eq!(*value, 1);
    let stats = cache.stats();
    assert_eq!((stats.builds, stats.failures), (1, 1));
}

#[test]
fn invalidate_forces_rebuild() {
    let cache: SpecializationCache<usize> = SpecializationCache::new();
    cache.get_or_build(&sig(2), || Ok::<_, ()>(1)).unwrap();
    assert!(cache.invalidate(&sig(2)));
    assert!(!cache.invalidate(&sig(2)));
    let rebuilt = cache.get_or_build(&sig(2), || Ok::<_, ()>(2)).unwrap();
    assert_eq!(*rebuilt, 2);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn invalidate_waits_for_running_build() {
    let cache: SpecializationCache<usize> = SpecializationCache::new();
    let started = Barrier::new(2);
    let finished = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            cache
                .get_or_build(&sig(3), || {
                    started.wait();
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    finished.store(true, Ordering::SeqCst);
                    Ok::<_, ()>(3)
                })
                .unwrap();
        });

        started.wait();
        assert!(cache.invalidate(&sig(3)));
        assert!(finished.load(Ordering::SeqCst));
    });

    assert!(!cache.contains(&sig(3)));
    let builds = AtomicUsize::new(0);
    cache
        .get_or_build(&sig(3), || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(30)
        })
        .unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().builds, 2);
}

#[test]
fn concurrent_first_calls_build_once() {
    const THREADS: usize = 8;
    let cache: SpecializationCache<usize> = SpecializationCache::new();
    let builds = AtomicUsize::new(0);
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                let value = cache
                    .get_or_build(&sig(10), || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok::<_, ()>(10)
                    })
                    .unwrap();
                assert_eq!(*value, 10);
            });
        }
    });

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    let stats = cache.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.hits, (THREADS - 1) as u64);
}
