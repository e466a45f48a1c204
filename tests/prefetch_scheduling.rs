use std::sync::Arc;
use std::time::Duration;

use pagecache::test_utils::ScriptedRenderer;
use pagecache::{CacheConfig, CacheController, RenderParams, Settlement};

const WAIT: Duration = Duration::from_secs(5);

/// Single worker so render order is deterministic
fn serial_controller(renderer: &Arc<ScriptedRenderer>) -> CacheController {
    let config = CacheConfig {
        workers: 1,
        ..CacheConfig::default()
    };
    CacheController::new(renderer.clone(), RenderParams::new(800, 1.0), &config)
}

#[test]
fn neighbors_are_scheduled_nearest_first_alternating() {
    let renderer = Arc::new(ScriptedRenderer::new(20));
    renderer.hold(1);
    let cache = serial_controller(&renderer);

    let _busy = cache.preload(1);
    assert!(renderer.wait_started(1, WAIT));
    cache.preload_neighbors(10, 3);
    renderer.release(1);

    assert!(renderer.wait_total(7, WAIT));
    assert_eq!(renderer.order(), vec![1, 11, 9, 12, 8, 13, 7]);
}

#[test]
fn foreground_preempts_queued_background() {
    let renderer = Arc::new(ScriptedRenderer::new(20));
    renderer.hold(1);
    let cache = serial_controller(&renderer);

    let _busy = cache.preload(1);
    assert!(renderer.wait_started(1, WAIT));
    cache.preload_neighbors(10, 3);
    let wanted = cache.preload(15);
    renderer.release(1);

    assert_eq!(wanted.wait(), Settlement::Ready);
    assert!(renderer.wait_total(8, WAIT));
    assert_eq!(renderer.order(), vec![1, 15, 11, 9, 12, 8, 13, 7]);
}

#[test]
fn foreground_request_promotes_queued_prefetch() {
    let renderer = Arc::new(ScriptedRenderer::new(20));
    renderer.hold(1);
    let cache = serial_controller(&renderer);

    let _busy = cache.preload(1);
    assert!(renderer.wait_started(1, WAIT));
    cache.preload_neighbors(5, 2);
    let promoted = cache.preload(7);
    renderer.release(1);

    assert_eq!(promoted.wait(), Settlement::Ready);
    assert!(renderer.wait_total(5, WAIT));
    assert_eq!(renderer.order(), vec![1, 7, 6, 4, 3]);
    assert_eq!(renderer.calls(7), 1);
}

#[test]
fn running_prefetch_is_reused_and_committed() {
    let renderer = Arc::new(ScriptedRenderer::new(20));
    renderer.hold(6);
    let cache = serial_controller(&renderer);

    cache.preload_neighbors(5, 1);
    assert!(renderer.wait_started(6, WAIT));

    // the background render is already running; a foreground request joins it
    let joined = cache.preload(6);
    renderer.release(6);

    assert_eq!(joined.wait(), Settlement::Ready);
    assert!(cache.get(6).is_some());
    assert_eq!(renderer.calls(6), 1);
}

#[test]
fn queued_jobs_are_dropped_on_clear() {
    let renderer = Arc::new(ScriptedRenderer::new(20));
    renderer.hold(1);
    let cache = serial_controller(&renderer);

    let stale = cache.preload(1);
    assert!(renderer.wait_started(1, WAIT));
    cache.preload_neighbors(1, 3);
    cache.clear();
    renderer.release(1);

    assert_eq!(stale.wait(), Settlement::Discarded);
    assert_eq!(cache.preload(5).wait(), Settlement::Ready);
    assert_eq!(renderer.order(), vec![1, 5]);
    assert_eq!(cache.cached_pages(), vec![5]);
}
