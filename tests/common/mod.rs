// tests/common/mod.rs
//
// Shared fakes for integration tests: backend clients with fixed answers and a
// call counter, plus helpers to drive the router in-process.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use storage_stats_aggregator::sources::{BackendClient, ErrorKind, SourceResult, SourceStats};
use storage_stats_aggregator::{create_router, Aggregator, AppState, DynBackendClient, SnapshotCache};
use tower::ServiceExt as _;

const BODY_LIMIT: usize = 1024 * 1024;

pub struct FakeClient {
    pub name: &'static str,
    pub result: SourceResult,
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl FakeClient {
    pub fn ok(name: &'static str, body: Json) -> Self {
        Self::with_result(name, SourceResult::Ok(SourceStats::Passthrough(body)))
    }

    pub fn failing(name: &'static str, kind: ErrorKind, message: &str) -> Self {
        Self::with_result(name, SourceResult::err(kind, message))
    }

    pub fn with_result(name: &'static str, result: SourceResult) -> Self {
        Self {
            name,
            result,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl BackendClient for FakeClient {
    async fn fetch_stats(&self) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

pub fn state_with(clients: Vec<DynBackendClient>, ttl: Duration) -> AppState {
    AppState::new(SnapshotCache::new(Arc::new(Aggregator::new(clients)), ttl))
}

pub fn app_with(state: &AppState) -> Router {
    create_router(state.clone())
}

pub async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let (status, bytes) = send(app, "GET", uri).await;
    let v = serde_json::from_slice(&bytes).expect("json body");
    (status, v)
}

pub fn count(calls: &Arc<AtomicUsize>) -> usize {
    calls.load(Ordering::SeqCst)
}
