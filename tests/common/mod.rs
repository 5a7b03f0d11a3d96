//! Shared fixtures: a recording `Resources` stub and request helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use jsonwebtoken::{EncodingKey, Header, encode};
use recall::middleware::{AccessEntry, AccessSink};
use recall::{App, AppState, BoxError, Config, Handler, Request, Resources, Response};

pub const SECRET: &str = "integration-secret";
pub const PEER: &str = "192.0.2.10:40000";

/// Records every collaborator call as `(handler, sessionId)`.
#[derive(Default)]
pub struct Recorder {
    pub calls: Mutex<Vec<(&'static str, String)>>,
    /// Collaborator that panics instead of answering.
    pub panic_in: Option<&'static str>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.calls.lock().unwrap().clone()
    }
}

fn recording(state: Arc<AppState<Recorder>>, name: &'static str) -> impl Handler {
    move |req: Request| {
        let state = Arc::clone(&state);
        async move {
            if state.resources.panic_in == Some(name) {
                panic!("{name} exploded");
            }
            let session = req.session_id().unwrap_or_default().to_owned();
            state.resources.calls.lock().unwrap().push((name, session.clone()));
            Response::json(format!(r#"{{"handler":"{name}","session":"{session}"}}"#).into_bytes())
        }
    }
}

type Shared = Arc<AppState<Recorder>>;

impl Resources for Recorder {
    fn get_session(state: Shared) -> impl Handler { recording(state, "get_session") }
    fn post_session(state: Shared) -> impl Handler { recording(state, "post_session") }
    fn get_memory(state: Shared) -> impl Handler { recording(state, "get_memory") }
    fn post_memory(state: Shared) -> impl Handler { recording(state, "post_memory") }
    fn delete_memory(state: Shared) -> impl Handler { recording(state, "delete_memory") }
    fn search_memory(state: Shared) -> impl Handler { recording(state, "search_memory") }
}

/// Keeps access entries in memory for assertions.
#[derive(Default)]
pub struct MemorySink(pub Mutex<Vec<AccessEntry>>);

impl MemorySink {
    pub fn entries(&self) -> Vec<AccessEntry> {
        self.0.lock().unwrap().clone()
    }
}

impl AccessSink for MemorySink {
    fn record(&self, entry: &AccessEntry) {
        self.0.lock().unwrap().push(entry.clone());
    }
}

pub struct Harness {
    pub app: App,
    pub state: Arc<AppState<Recorder>>,
    pub sink: Arc<MemorySink>,
}

pub fn config(auth_required: bool) -> Config {
    let mut config = Config::default();
    config.auth.required = auth_required;
    config.auth.secret = SECRET.to_owned();
    config
}

pub fn harness(config: Config, resources: Recorder) -> Harness {
    let state = Arc::new(AppState::new(config, resources));
    let sink = Arc::new(MemorySink::default());
    let app = App::new(Arc::clone(&state), sink.clone()).expect("valid config");
    Harness { app, state, sink }
}

pub fn token(claims: serde_json::Value) -> String {
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

pub struct Reply {
    pub status: u16,
    pub headers: http::HeaderMap,
    pub body: String,
}

impl Harness {
    pub async fn send(&self, method: &str, uri: &str, headers: &[(&str, &str)]) -> Reply {
        self.send_body(method, uri, headers, Full::new(Bytes::from_static(b"{}"))).await
    }

    pub async fn send_body<B>(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: B,
    ) -> Reply
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let mut builder = http::Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let req = builder.body(body).unwrap();
        let res = self.app.call(req, PEER.parse::<SocketAddr>().unwrap()).await;

        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        Reply { status, headers, body: String::from_utf8(body.to_vec()).unwrap() }
    }
}
