//! Proxy selection: list rotation order, rotation cache, failure policy

use catalog_scraper::cancel::CancellationToken;
use catalog_scraper::proxy::{ProxyError, ProxyProvider, ProxyRouter, ProxySettings, RotationProvider};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{response, MockTransport};

const ROTATION_URL: &str = "http://rotation.test/next";

fn counting_rotation() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(|_, index| {
        Ok(response(200, format!("10.0.0.{}:3128\n", index + 1)))
    }))
}

#[tokio::test]
async fn test_list_mode_cycles_in_order() {
    let settings = ProxySettings {
        mode: "list".into(),
        list: vec!["a.proxy:1".into(), " ".into(), "b.proxy:2".into(), "http://c.proxy:3".into()],
        ..Default::default()
    };
    let router = ProxyRouter::from_settings(&settings).unwrap().unwrap();
    let cancel = CancellationToken::new();

    let mut hosts = Vec::new();
    for _ in 0..4 {
        let url = router.resolve(&cancel).await.unwrap().unwrap();
        hosts.push(url.host_str().unwrap().to_string());
    }
    assert_eq!(hosts, ["a.proxy", "b.proxy", "c.proxy", "a.proxy"]);
}

#[tokio::test(start_paused = true)]
async fn test_rotation_address_is_cached_for_ttl() {
    let mock = counting_rotation();
    let provider = RotationProvider::with_transport(ROTATION_URL, Duration::from_secs(10), mock.clone()).unwrap();
    let cancel = CancellationToken::new();

    assert_eq!(provider.next(&cancel).await.unwrap(), "10.0.0.1:3128");
    tokio::time::advance(Duration::from_secs(9)).await;
    assert_eq!(provider.next(&cancel).await.unwrap(), "10.0.0.1:3128");
    assert_eq!(mock.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(provider.next(&cancel).await.unwrap(), "10.0.0.2:3128");
    assert_eq!(mock.calls(), 2);
    assert_eq!(mock.urls(), [ROTATION_URL, ROTATION_URL]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cache_misses_refresh_in_parallel() {
    let mock = Arc::new(
        MockTransport::new(|_, index| Ok(response(200, format!(r#"{{"proxy":"p{index}:8080"}}"#))))
            .with_delay(Duration::from_millis(200)),
    );
    let provider = Arc::new(
        RotationProvider::with_transport(ROTATION_URL, Duration::from_secs(10), mock.clone()).unwrap(),
    );

    let start = tokio::time::Instant::now();
    let mut tasks = Vec::new();
    for _ in 0..5 {
        let provider = provider.clone();
        tasks.push(tokio::spawn(async move { provider.next(&CancellationToken::new()).await }));
    }
    for task in tasks {
        let address = task.await.unwrap().unwrap();
        assert!(address.starts_with('p') && address.ends_with(":8080"), "{address}");
    }
    assert!(start.elapsed() < Duration::from_millis(400));
    assert_eq!(mock.max_in_flight(), mock.calls());

    // Whichever refresh stored last is now served from the cache.
    let calls = mock.calls();
    provider.next(&CancellationToken::new()).await.unwrap();
    assert_eq!(mock.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_failing_rotation_does_not_queue_concurrent_callers() {
    let mock = Arc::new(MockTransport::statuses(&[502]).with_delay(Duration::from_secs(1)));
    let provider = Arc::new(
        RotationProvider::with_transport(ROTATION_URL, Duration::from_secs(10), mock.clone()).unwrap(),
    );

    let start = tokio::time::Instant::now();
    let mut tasks = Vec::new();
    for _ in 0..5 {
        let provider = provider.clone();
        tasks.push(tokio::spawn(async move { provider.next(&CancellationToken::new()).await }));
    }
    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ProxyError::RotationStatus { status: 502, .. }), "{err:?}");
    }

    assert_eq!(mock.calls(), 5);
    assert!(start.elapsed() < Duration::from_secs(2), "callers waited {:?}", start.elapsed());
}

#[tokio::test]
async fn test_rotation_failure_fail_open_sends_direct() {
    let mock = Arc::new(MockTransport::statuses(&[502]));
    let provider = RotationProvider::with_transport(ROTATION_URL, Duration::from_secs(10), mock).unwrap();
    let router = ProxyRouter::new(ProxyProvider::Rotation(provider), true);

    assert!(router.fail_open());
    assert!(router.resolve(&CancellationToken::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rotation_failure_fail_closed_is_an_error() {
    let mock = Arc::new(MockTransport::new(|_, _| Ok(response(503, "  overloaded \n"))));
    let provider = RotationProvider::with_transport(ROTATION_URL, Duration::from_secs(10), mock).unwrap();
    let router = ProxyRouter::new(ProxyProvider::Rotation(provider), false);

    let err = router.resolve(&CancellationToken::new()).await.unwrap_err();
    assert!(
        matches!(&err, ProxyError::RotationStatus { status: 503, body } if body == "overloaded"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_empty_rotation_body_is_a_failure() {
    let mock = Arc::new(MockTransport::new(|_, _| Ok(response(200, "   "))));
    let provider = RotationProvider::with_transport(ROTATION_URL, Duration::from_secs(10), mock).unwrap();

    assert!(matches!(provider.next(&CancellationToken::new()).await, Err(ProxyError::Empty)));
}

#[tokio::test]
async fn test_cancellation_propagates_even_when_fail_open() {
    let settings = ProxySettings {
        mode: "list".into(),
        list: vec!["a.proxy:1".into()],
        fail_open: true,
        ..Default::default()
    };
    let router = ProxyRouter::from_settings(&settings).unwrap().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(router.resolve(&cancel).await, Err(ProxyError::Cancelled)));
}
