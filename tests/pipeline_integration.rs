use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;

use rfplaybook::cache::normalize;
use rfplaybook::{
    CacheKey, ClearScope, DeviceProfile, DiskCache, Error, LoadOutcome, LoadQueue, LoadQueueConfig,
    LoadRequest, Playbook, RenderContext, Renderer, RendererConfig, Rgba, Scenario, ScenarioLayout,
    SerialDispatcher, Size, SnapshotFormat, View, ViewSlot,
};

fn device() -> DeviceProfile {
    DeviceProfile::new("Gallery", Size::new(40.0, 30.0))
}

fn counted(name: &str, renders: &Arc<AtomicUsize>) -> Scenario {
    let renders = renders.clone();
    Scenario::new(name, ScenarioLayout::fill(), move |_: &RenderContext| {
        renders.fetch_add(1, Ordering::SeqCst);
        View::color(Rgba::rgb(255, 0, 0))
    })
}

fn queue(dir: &std::path::Path, config: LoadQueueConfig) -> LoadQueue {
    let renderer = Renderer::new(RendererConfig::default()).unwrap();
    let cache = DiskCache::new(dir, "thumbnails", SnapshotFormat::Png);
    LoadQueue::new(renderer, cache, config).unwrap()
}

fn fast() -> LoadQueueConfig {
    LoadQueueConfig { debounce: Duration::from_millis(10), ..Default::default() }
}

#[test]
fn cache_store_load_and_scoped_clear() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::new(dir.path(), "c", SnapshotFormat::Png);
    let phone = CacheKey::new("Buttons", "Primary", &device(), 1.0);
    let tablet = CacheKey::new("Buttons", "Primary", &DeviceProfile::new("Tablet", Size::new(1.0, 1.0)), 1.0);

    assert!(cache.load(&phone).is_none());
    cache.store(b"phone", &phone).unwrap();
    cache.store(b"tablet", &tablet).unwrap();
    assert_eq!(cache.load(&phone).unwrap(), b"phone");

    cache.clear(ClearScope::Device(&phone));
    assert!(cache.load(&phone).is_none());
    assert_eq!(cache.load(&tablet).unwrap(), b"tablet");

    cache.clear(ClearScope::All);
    assert!(!cache.directory().exists());
}

#[test]
fn names_that_normalize_alike_share_an_entry() {
    assert_eq!(normalize("Feed: v1.2"), normalize("Feed_ v1_2"));

    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::new(dir.path(), "c", SnapshotFormat::Png);
    let a = CacheKey::new("Screens", "Feed: v1.2", &device(), 1.0);
    let b = CacheKey::new("Screens", "Feed_ v1_2", &device(), 1.0);
    assert_eq!(cache.path_for(&a), cache.path_for(&b));

    cache.store(b"first", &a).unwrap();
    cache.store(b"second", &b).unwrap();
    assert_eq!(cache.load(&a).unwrap(), b"second");
}

#[tokio::test]
async fn miss_renders_and_caches_then_hits() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), fast());
    let renders = Arc::new(AtomicUsize::new(0));
    let scenario = counted("Card", &renders);

    let first = q.load_image(LoadRequest::new("Cards", scenario.clone(), device())).await;
    let image = first.image().expect("loaded");
    assert_eq!((image.width(), image.height()), (40, 30));
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    let key = CacheKey::new("Cards", "Card", &device(), 1.0);
    assert!(q.cache().path_for(&key).exists());

    let second = q.load_image(LoadRequest::new("Cards", scenario, device())).await;
    assert_eq!(second.image().expect("cached"), image);
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn corrupt_entry_is_replaced_by_a_fresh_render() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), fast());
    let renders = Arc::new(AtomicUsize::new(0));
    let key = CacheKey::new("Cards", "Card", &device(), 1.0);
    q.cache().store(b"definitely not a png", &key).unwrap();

    let outcome = q.load_image(LoadRequest::new("Cards", counted("Card", &renders), device())).await;
    assert!(matches!(outcome, LoadOutcome::Loaded(_)));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    let bytes = fs::read(q.cache().path_for(&key)).unwrap();
    assert!(rfplaybook::format::decode(&bytes).is_ok());
}

#[tokio::test]
async fn cancelled_load_resolves_immediately_and_never_renders() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), LoadQueueConfig { debounce: Duration::from_millis(100), ..Default::default() });
    let renders = Arc::new(AtomicUsize::new(0));

    let ticket = q.load_image(LoadRequest::new("Cards", counted("Cancelled", &renders), device()));
    ticket.cancel();
    assert!(matches!(ticket.await, LoadOutcome::Cancelled));

    let dropped = q.load_image(LoadRequest::new("Cards", counted("Dropped", &renders), device()));
    drop(dropped);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_handle_cancels_from_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), LoadQueueConfig { debounce: Duration::from_millis(100), ..Default::default() });
    let renders = Arc::new(AtomicUsize::new(0));

    let ticket = q.load_image(LoadRequest::new("Cards", counted("Remote", &renders), device()));
    let handle = ticket.cancel_handle();
    tokio::spawn(async move { handle.cancel() });
    assert!(matches!(ticket.await, LoadOutcome::Cancelled));
}

#[tokio::test]
async fn cancel_all_resolves_queued_loads_as_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), LoadQueueConfig { debounce: Duration::from_millis(300), ..Default::default() });
    let renders = Arc::new(AtomicUsize::new(0));

    let tickets: Vec<_> = ["One", "Two", "Three"]
        .iter()
        .map(|name| q.load_image(LoadRequest::new("Cards", counted(name, &renders), device())))
        .collect();
    tokio::time::sleep(Duration::from_millis(100)).await;
    q.cancel_all();

    let outcomes = tokio::time::timeout(Duration::from_secs(3), futures::future::join_all(tickets))
        .await
        .expect("queued loads still pending after cancel_all");
    for outcome in outcomes {
        assert!(matches!(outcome, LoadOutcome::Cancelled));
    }
    assert_eq!(renders.load(Ordering::SeqCst), 0);

    let after = q.load_image(LoadRequest::new("Cards", counted("Four", &renders), device()));
    let outcome = tokio::time::timeout(Duration::from_secs(3), after).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded(_)));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn content_filled_after_the_wait_sets_the_thumbnail_size() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), fast());
    let remote = Scenario::new("Remote", ScenarioLayout::compressed(), |ctx: &RenderContext| {
        let slot = ViewSlot::new(View::Empty);
        ctx.waiter.wait_for(Duration::from_secs(5));
        let (waiter, filled) = (ctx.waiter.clone(), slot.clone());
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            filled.set(View::rect(20.0, 10.0, Rgba::BLACK));
            waiter.fulfill();
        });
        View::Slot(slot)
    });

    let image = q.load_image(LoadRequest::new("Cards", remote, device())).await.image().expect("loaded");
    assert_eq!((image.width(), image.height()), (20, 10));
}

#[tokio::test]
async fn render_failures_are_reported_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), fast());

    let never_ready = Scenario::new("Spinner", ScenarioLayout::fill(), |ctx: &RenderContext| {
        ctx.waiter.wait_for(Duration::from_millis(30));
        View::color(Rgba::WHITE)
    });
    let outcome = q.load_image(LoadRequest::new("Loading", never_ready, device())).await;
    assert!(matches!(outcome, LoadOutcome::Failed(Error::NotReady { .. })));

    let empty = Scenario::new("Empty", ScenarioLayout::compressed(), |_: &RenderContext| View::Empty);
    let outcome = q.load_image(LoadRequest::new("Loading", empty, device())).await;
    assert!(matches!(outcome, LoadOutcome::Failed(Error::ZeroSizeLayout { .. })));
}

#[tokio::test]
async fn burst_is_followed_by_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoadQueueConfig {
        debounce: Duration::from_millis(50),
        burst_size: 3,
        cooldown: Duration::from_millis(150),
        ..Default::default()
    };
    let q = queue(dir.path(), config);
    let started: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

    let tickets: Vec<_> = (0..4)
        .map(|i| {
            let started = started.clone();
            let scenario = Scenario::new(format!("Tile {}", i), ScenarioLayout::fill(), move |_: &RenderContext| {
                started.lock().unwrap().push(Instant::now());
                View::color(Rgba::BLACK)
            });
            q.load_image(LoadRequest::new("Tiles", scenario, device()))
        })
        .collect();
    for outcome in futures::future::join_all(tickets).await {
        assert!(matches!(outcome, LoadOutcome::Loaded(_)));
    }

    let started = started.lock().unwrap();
    assert_eq!(started.len(), 4);
    assert!(started[3] - started[2] >= Duration::from_millis(150));
}

#[tokio::test]
async fn pre_render_clears_then_renders_first_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), LoadQueueConfig { pre_snapshot_count_limit: 2, ..fast() });
    let renders = Arc::new(AtomicUsize::new(0));

    let stale = CacheKey::new("Old", "Gone", &device(), 1.0);
    q.cache().store(b"stale", &stale).unwrap();

    let mut playbook = Playbook::new();
    playbook.add_scenarios("A", [counted("One", &renders), counted("Two", &renders)]);
    playbook.add_scenarios("B", [counted("Three", &renders)]);

    q.pre_render(&playbook, &device()).await;

    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert!(q.cache().load(&stale).is_none());
    assert!(q.cache().load(&CacheKey::new("A", "One", &device(), 1.0)).is_some());
    assert!(q.cache().load(&CacheKey::new("A", "Two", &device(), 1.0)).is_some());
    assert!(q.cache().load(&CacheKey::new("B", "Three", &device(), 1.0)).is_none());
}

#[tokio::test]
async fn render_now_bypasses_cache_and_stores() {
    let dir = tempfile::tempdir().unwrap();
    let q = queue(dir.path(), fast());
    let renders = Arc::new(AtomicUsize::new(0));
    let scenario = counted("Now", &renders);

    q.render_now(LoadRequest::new("Cards", scenario.clone(), device())).await.unwrap();
    q.render_now(LoadRequest::new("Cards", scenario, device())).await.unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert!(q.cache().load(&CacheKey::new("Cards", "Now", &device(), 1.0)).is_some());
}

#[tokio::test]
async fn debounced_dispatch_runs_survivors_in_order() {
    let interval = Duration::from_millis(40);
    let dispatcher = SerialDispatcher::new(interval, Handle::current());
    let ran: Arc<Mutex<Vec<(usize, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let ran = ran.clone();
            dispatcher.dispatch(async move {
                ran.lock().unwrap().push((i, Instant::now()));
            })
        })
        .collect();
    assert!(handles[2].cancel());
    assert!(handles[5].cancel());

    tokio::time::sleep(interval * 10).await;

    let ran = ran.lock().unwrap();
    let order: Vec<usize> = ran.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, vec![0, 1, 3, 4]);
    for pair in ran.windows(2) {
        assert!(pair[1].1 - pair[0].1 >= interval);
    }
}
