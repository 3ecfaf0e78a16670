//! Polling assertions and mock webhook helpers

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use wiremock::MockServer;

/// Poll `check` until it holds, panicking after about four seconds
pub async fn eventually<F, Fut>(description: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time: {}", description);
}

/// JSON bodies received on `route`, oldest first
pub async fn bodies(server: &MockServer, route: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == route)
        .filter_map(|request| serde_json::from_slice(&request.body).ok())
        .collect()
}

pub async fn request_count(server: &MockServer, route: &str) -> usize {
    bodies(server, route).await.len()
}
