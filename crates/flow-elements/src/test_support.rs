//! Test harness for running single elements outside a flow

use std::sync::Arc;

use flow_engine::{
    BranchGates, Element, ElementDefinition, ElementFactory, ElementKind, EventEmitter,
    ExecutionContext, ExecutorExtensions, FlowConfig, FlowEvent, RecordingSink, Result, ValueMap,
};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::factory::BuiltinElements;

/// Runs elements with detached gates and a recording sink.
pub(crate) struct Harness {
    pub config: FlowConfig,
    pub extensions: ExecutorExtensions,
    pub sink: Arc<RecordingSink>,
    emitter: EventEmitter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(FlowConfig::default())
    }

    pub fn with_config(config: FlowConfig) -> Self {
        let sink = Arc::new(RecordingSink::new());
        Self {
            config,
            extensions: ExecutorExtensions::new(),
            emitter: EventEmitter::new(Some(sink.clone())),
            sink,
        }
    }

    /// Drop the sink so elements see a non-streaming run
    pub fn without_sink(mut self) -> Self {
        self.emitter = EventEmitter::detached();
        self
    }

    pub async fn run(&self, element: &mut dyn Element) -> Result<ValueMap> {
        let mut ctx = ExecutionContext::new(
            "test-flow",
            &self.config,
            &self.emitter,
            &self.extensions,
            BranchGates::detached(),
            false,
        );
        element.execute(&mut ctx).await
    }

    pub fn events_of(&self, event_type: &str) -> Vec<FlowEvent> {
        self.sink.events_of(event_type)
    }
}

/// Definition with the given parameters (a JSON object)
pub(crate) fn definition(id: &str, kind: ElementKind, params: Value) -> ElementDefinition {
    let mut def = ElementDefinition::new(id, kind);
    if let Value::Object(map) = params {
        def.params = map;
    }
    def
}

pub(crate) fn build(def: &ElementDefinition) -> Box<dyn Element> {
    let kind: ElementKind = def.element_type.parse().unwrap();
    BuiltinElements::new().build(kind, def).unwrap()
}

pub(crate) fn inputs(value: Value) -> ValueMap {
    match value {
        Value::Object(map) => map,
        _ => ValueMap::new(),
    }
}

/// Serve canned HTTP responses, one per connection, in order.
///
/// Returns the base URL and a handle resolving to the raw requests received.
pub(crate) async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);
            let response = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        requests
    });

    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let lower = line.to_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .and_then(|v| v.trim().parse::<usize>().ok())
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}
