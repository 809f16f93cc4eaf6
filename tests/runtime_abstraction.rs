//! Integration tests for async runtime abstraction

use archetype_loader::{
    AsyncSpawner, FnFetcher, LoadRequest, LoaderConfig, LoaderService, MockSpawner, ResourceKind,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn test_mock_spawner_integration() {
    let spawner = MockSpawner::blocking();

    let executed = Arc::new(AtomicBool::new(false));
    let executed_clone = Arc::clone(&executed);

    spawner.spawn(async move {
        executed_clone.store(true, Ordering::SeqCst);
    });

    // In blocking mode, should execute immediately
    assert!(executed.load(Ordering::SeqCst));
}

#[test]
fn test_spawner_trait_bound() {
    fn spawn_task<S: AsyncSpawner>(spawner: &S) {
        spawner.spawn(async {});
    }

    let spawner = MockSpawner::new();
    spawn_task(&spawner);
}

#[test]
fn test_dropped_tasks_leave_requests_unanswered() {
    let fetcher = FnFetcher::new([ResourceKind::Map], |request: LoadRequest| async move {
        Ok(request.locator)
    });
    let mut service = LoaderService::new(fetcher, MockSpawner::new(), LoaderConfig::new("maps"));
    let mut client = service.client();

    client.request(ResourceKind::Map, "e1m1.map").unwrap();
    assert_eq!(service.update(), 1);

    assert!(client.try_recv().is_none());
    assert!(service.cache().is_empty());
    assert_eq!(service.usage().active_keys(), 0);
}

#[cfg(feature = "runtime-tokio")]
#[test]
fn test_service_runs_on_explicit_tokio_handle() {
    use archetype_loader::TokioSpawner;

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let fetcher = FnFetcher::new([ResourceKind::Map], |request: LoadRequest| async move {
        Ok(request.locator.to_uppercase())
    });
    let mut service = LoaderService::new(
        fetcher,
        TokioSpawner::with_handle(runtime.handle().clone()),
        LoaderConfig::new("maps"),
    );
    let mut client = service.client();

    client.request(ResourceKind::Map, "e1m1.map").unwrap();
    service.update();

    let reply = runtime.block_on(client.recv()).unwrap();
    assert_eq!(*reply.result.unwrap().data, "E1M1.MAP");
}

#[cfg(feature = "runtime-tokio")]
#[tokio::test]
async fn test_run_loop_serves_until_clients_are_gone() {
    use archetype_loader::TokioSpawner;

    let fetcher = FnFetcher::new([ResourceKind::Font], |request: LoadRequest| async move {
        Ok(request.locator.len())
    });
    let service = LoaderService::new(fetcher, TokioSpawner::new(), LoaderConfig::new("fonts"));
    let mut client = service.client();
    let running = tokio::spawn(service.run());

    client.request(ResourceKind::Font, "mono.ttf").unwrap();
    let reply = client.recv().await.unwrap();
    assert_eq!(*reply.result.unwrap().data, 8);

    drop(client);
    running.await.unwrap();
}
