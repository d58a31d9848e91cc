//! Scripted in-process transport for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use iris_client::http::{
    ClientOptions, HttpClient, HttpClientBuilder, Method, RequestBody, Transport, WireRequest,
    WireResponse,
};
use iris_client::store::MemoryTokenStore;
use iris_client::HttpError;

/// What the scripted server answers.
pub enum Reply {
    Json(u16, Value),
    Empty(u16),
    Network,
}

/// One request as the transport saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub bearer: Option<String>,
    pub body: RequestBody,
    pub at: Instant,
}

type Handler = dyn Fn(&Call) -> Reply + Send + Sync;

pub struct MockTransport {
    handler: Box<Handler>,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&Call) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Self::with_latency(Duration::from_millis(10), handler)
    }

    pub fn with_latency(
        latency: Duration,
        handler: impl Fn(&Call) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            latency,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, HttpError> {
        let call = Call {
            method: request.method,
            path: request.url.path().to_string(),
            query: request.url.query().map(str::to_string),
            bearer: request.bearer.map(|t| t.as_str().to_string()),
            body: request.body,
            at: Instant::now(),
        };
        self.calls.lock().unwrap().push(call.clone());

        tokio::time::sleep(self.latency).await;

        match (self.handler)(&call) {
            Reply::Json(status, value) => Ok(WireResponse {
                status,
                body: serde_json::to_vec(&value).unwrap(),
            }),
            Reply::Empty(status) => Ok(WireResponse {
                status,
                body: Vec::new(),
            }),
            Reply::Network => Err(HttpError::Network("connection reset".into())),
        }
    }
}

pub fn json_body(call: &Call) -> Value {
    match &call.body {
        RequestBody::Json(value) => value.clone(),
        other => panic!("expected a JSON body, got {:?}", other),
    }
}

/// Client on the mock transport with an in-memory store.
pub fn builder(transport: Arc<MockTransport>) -> (HttpClientBuilder, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    let builder = HttpClient::builder(ClientOptions::default())
        .transport(transport)
        .token_store(store.clone());
    (builder, store)
}

pub fn client(transport: Arc<MockTransport>) -> (HttpClient, Arc<MemoryTokenStore>) {
    let (builder, store) = builder(transport);
    (builder.build().unwrap(), store)
}
