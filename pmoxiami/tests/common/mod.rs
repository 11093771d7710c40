//! Scripted in-process transport shared by the integration tests

#![allow(dead_code)]

use pmoxiami::{Transport, TransportResponse, XiamiError};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BOOTSTRAP: &str = "mtop.alimusic.music.songservice.getsongdetail";

/// One recorded GET
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, name: &str) -> &str {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    pub fn is_action(&self, action: &str) -> bool {
        self.url.contains(&format!("/h5/{}/1.0/", action))
    }

    /// Decodes `data` down to the inner `{header, model}` object
    pub fn request(&self) -> Value {
        let outer: Value = serde_json::from_str(self.param("data")).unwrap();
        serde_json::from_str(outer["requestStr"].as_str().unwrap()).unwrap()
    }
}

/// Answers calls from a fixed script, in order; an exhausted script is a
/// transport error
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<TransportResponse>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<TransportResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn action_calls(&self, action: &str) -> usize {
        self.calls().iter().filter(|c| c.is_action(action)).count()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn get(
        &self,
        url: &str,
        query: &[(&'static str, String)],
        _timeout: Duration,
    ) -> pmoxiami::Result<TransportResponse> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| XiamiError::Transport("connection refused".into()))
    }
}

/// Bootstrap answer: a non-JSON body and the token cookie
pub fn token_response(token: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        body: "<html>not json</html>".into(),
        cookies: vec![
            ("_m_h5_tk_enc".into(), "ENC".into()),
            ("_m_h5_tk".into(), format!("{}_1571824471000", token)),
        ],
    }
}

pub fn json_response(body: Value) -> TransportResponse {
    TransportResponse {
        status: 200,
        body: body.to_string(),
        cookies: Vec::new(),
    }
}

/// Envelope with `ret[0] = "<code>::<message>"` and `data.data`
pub fn envelope(code: &str, data: Value) -> TransportResponse {
    json_response(json!({
        "api": "mtop.alimusic",
        "ret": [format!("{}::调用成功", code)],
        "data": { "data": data },
        "v": "1.0"
    }))
}

pub fn success(data: Value) -> TransportResponse {
    envelope("SUCCESS", data)
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pmoxiami=debug")
        .with_test_writer()
        .try_init();
}
