//! Concurrent access to the membership cache and checker.

use rangeguard::cache::{CacheConfig, ManualClock, MembershipCache};
use rangeguard::{Context, IpChecker, RangeRegistry, ReloadableChecker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 16;

#[test]
fn test_concurrent_miss_computes_once() {
    let cache = Arc::new(MembershipCache::new(CacheConfig::default()));
    let fetches = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let fetches = fetches.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_fetch(&Context::background(), "203.0.113.10", || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    true
                })
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_early_refresh_computes_once() {
    let clock = Arc::new(ManualClock::new());
    let config = CacheConfig::default()
        .ttl(Duration::from_secs(600))
        .early_refresh(Duration::from_secs(60));
    let cache = Arc::new(MembershipCache::with_clock(config, clock.clone()));

    cache.get_or_fetch(&Context::background(), "10.0.0.1", || true);
    clock.advance(Duration::from_secs(570));

    let fetches = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let fetches = fetches.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_fetch(&Context::background(), "10.0.0.1", || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    true
                })
            })
        })
        .collect();

    for handle in handles {
        // Either the stale value or the refreshed one; both are `true`.
        assert!(handle.join().unwrap());
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().refreshes, 1);
}

#[test]
fn test_concurrent_expiry_computes_once() {
    let clock = Arc::new(ManualClock::new());
    let config = CacheConfig::default()
        .ttl(Duration::from_secs(600))
        .early_refresh(Duration::from_secs(60));
    let cache = Arc::new(MembershipCache::with_clock(config, clock.clone()));

    cache.get_or_fetch(&Context::background(), "10.0.0.1", || true);
    clock.advance(Duration::from_secs(601));

    let fetches = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let fetches = fetches.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_fetch(&Context::background(), "10.0.0.1", || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    false
                })
            })
        })
        .collect();

    for handle in handles {
        // The expired `true` must never be served.
        assert!(!handle.join().unwrap());
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_many_threads_many_keys() {
    let registry = RangeRegistry::new().with_group("crawlers", ["203.0.113.0/24", "2001:db8::/32"]);
    let checker = Arc::new(
        IpChecker::with_config(
            &["crawlers", "10.0.0.0/8"],
            &["10.0.0.7"],
            &registry,
            CacheConfig::with_capacity(1024),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let checker = checker.clone();
            thread::spawn(move || {
                let ctx = Context::background();
                for i in 0..2000u32 {
                    let last = (i + t) % 256;
                    assert!(!checker.req_allowed(&ctx, &format!("203.0.113.{}", last)));
                    assert!(checker.req_allowed(&ctx, &format!("192.0.2.{}", last)));
                    assert!(!checker.req_allowed(&ctx, &format!("2001:db8::{:x}", i)));
                    assert!(checker.req_allowed(&ctx, "10.0.0.7"));
                    assert!(!checker.req_allowed(&ctx, "::ffff:10.0.0.8"));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(checker.cache_stats().hits > 0);
}

#[test]
fn test_reload_under_load() {
    let checker = Arc::new(ReloadableChecker::new(
        IpChecker::new(&["10.0.0.0/8"], &[] as &[&str]).unwrap(),
    ));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let checker = checker.clone();
            thread::spawn(move || {
                let ctx = Context::background();
                for _ in 0..5000 {
                    // Blocked by every configuration used below.
                    assert!(!checker.req_allowed(&ctx, "10.1.1.1"));
                    assert!(checker.req_allowed(&ctx, "8.8.8.8"));
                }
            })
        })
        .collect();

    for i in 0..20 {
        let ranges: &[&str] = if i % 2 == 0 {
            &["10.1.0.0/16"]
        } else {
            &["10.0.0.0/8", "192.0.2.0/24"]
        };
        checker.reload(IpChecker::new(ranges, &[] as &[&str]).unwrap());
    }

    for handle in readers {
        handle.join().unwrap();
    }
    assert_eq!(checker.generation(), 20);
}
