//! Page cache behavior over simulated time.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stick_kernel::cache::{page_key, ManualClock, PAGE_SUFFIX};
use stick_kernel::config::{parse_config, CacheEngine};
use stick_kernel::dispatch::{Handler, Kernel, Reply};
use stick_kernel::http::response::http_date;
use stick_kernel::lifecycle::build_kernel_with_clock;

use common::{body, kernel_at};

fn counted_home(clock: Arc<ManualClock>) -> (Kernel, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut kernel = kernel_at(clock);
    kernel
        .route_with(
            "GET home /a",
            Handler::from_fn(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::Text("home page".into()))
            }),
            60,
            0,
        )
        .unwrap();
    (kernel, calls)
}

#[test]
fn test_cached_page_lifecycle() {
    let clock = Arc::new(ManualClock::new(0));
    let (kernel, calls) = counted_home(clock.clone());

    let ex = kernel.mock("GET /a", &[], &[], None).unwrap();
    assert_eq!(body(&ex), "home page");
    assert_eq!(ex.header_value("cache-control"), Some("max-age=60"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.set(30);
    let ex = kernel.mock("GET /a", &[], &[], None).unwrap();
    assert_eq!(body(&ex), "home page");
    assert_eq!(ex.header_value("cache-control"), Some("max-age=30"));
    assert_eq!(ex.header_value("expires"), Some(http_date(60).as_str()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.set(70);
    let ex = kernel.mock("GET /a", &[], &[], None).unwrap();
    assert_eq!(body(&ex), "home page");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_alias_mock_shares_cache_entry() {
    let clock = Arc::new(ManualClock::new(0));
    let (kernel, calls) = counted_home(clock);

    kernel.mock("GET home", &[], &[], None).unwrap();
    kernel.mock("GET /a", &[], &[], None).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_conditional_get() {
    let clock = Arc::new(ManualClock::new(1_000));
    let (kernel, calls) = counted_home(clock.clone());
    kernel.mock("GET /a", &[], &[], None).unwrap();

    clock.set(1_030);
    let since = http_date(1_000);
    let ex = kernel
        .mock("GET /a", &[], &[("If-Modified-Since", &since)], None)
        .unwrap();
    assert_eq!(ex.code(), 304);
    assert_eq!(body(&ex), "");

    // Too old for the route ttl: the cached page is sent in full.
    let stale = http_date(900);
    let ex = kernel
        .mock("GET /a", &[], &[("If-Modified-Since", &stale)], None)
        .unwrap();
    assert_eq!(ex.code(), 200);
    assert_eq!(body(&ex), "home page");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_errors_and_empty_bodies_not_cached() {
    let clock = Arc::new(ManualClock::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut kernel = kernel_at(clock);
    kernel
        .route_with(
            "GET /empty",
            Handler::from_fn(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::Empty)
            }),
            60,
            0,
        )
        .unwrap();

    kernel.mock("GET /empty", &[], &[], None).unwrap();
    kernel.mock("GET /empty", &[], &[], None).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(kernel.cache().get(&page_key("GET", "/empty")).is_none());
}

#[test]
fn test_post_never_cached() {
    let clock = Arc::new(ManualClock::new(0));
    let mut kernel = kernel_at(clock);
    kernel
        .route_with("POST /form", Handler::from_fn(|_, _| Ok(Reply::Text("saved".into()))), 60, 0)
        .unwrap();

    let ex = kernel.mock("POST /form", &[], &[], None).unwrap();
    assert_eq!(ex.header_value("pragma"), Some("no-cache"));
    assert!(kernel.cache().get(&page_key("POST", "/form")).is_none());
}

#[test]
fn test_folder_cache_survives_kernel_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = parse_config(
        r#"
        [[routes]]
        route = "GET /cached"
        body = "from config"
        ttl = 60
        "#,
    )
    .unwrap();
    config.cache.engine = CacheEngine::Folder;
    config.cache.dir = Some(dir.path().display().to_string());

    let clock = Arc::new(ManualClock::new(0));
    let kernel = build_kernel_with_clock(&config, clock.clone()).unwrap();
    kernel.mock("GET /cached", &[], &[], None).unwrap();

    let rebuilt = build_kernel_with_clock(&config, clock.clone()).unwrap();
    let record = rebuilt.cache().get(&page_key("GET", "/cached")).unwrap();
    assert_eq!(record.body, "from config");

    clock.set(10);
    let ex = rebuilt.mock("GET /cached", &[], &[], None).unwrap();
    assert_eq!(ex.header_value("cache-control"), Some("max-age=50"));
    assert_eq!(rebuilt.cache().reset(PAGE_SUFFIX), 1);
}
