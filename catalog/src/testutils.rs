use crate::errors::UpstreamError;
use crate::fetch::Fetch;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

pub const BASE: &str = "https://api.test";

/// In-memory upstream keyed by full request url. Unknown urls answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, Result<JsonValue, u16>>,
    session: bool,
    calls: Mutex<Vec<(String, bool)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self) -> Self {
        self.session = true;
        self
    }

    pub fn respond(mut self, url: &str, body: JsonValue) -> Self {
        self.responses.insert(url.to_string(), Ok(body));
        self
    }

    pub fn fail(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Err(status));
        self
    }

    /// Urls requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn authenticated_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, authenticated)| *authenticated)
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn get_json(&self, url: Url, authenticated: bool) -> Result<JsonValue, UpstreamError> {
        let key = url.to_string();
        self.calls
            .lock()
            .unwrap()
            .push((key.clone(), authenticated));

        match self.responses.get(&key) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(UpstreamError::Status {
                url: key,
                status: StatusCode::from_u16(*status).unwrap(),
            }),
            None => Err(UpstreamError::Status {
                url: key,
                status: StatusCode::NOT_FOUND,
            }),
        }
    }

    fn has_session(&self) -> bool {
        self.session
    }
}
