use crate::errors::UpstreamError;
use crate::metrics_defs::{UPSTREAM_REQUEST_DURATION, UPSTREAM_REQUESTS};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use serde_json::Value as JsonValue;
use shared::{counter, histogram};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

/// Issues GET requests against the upstream API.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches `url` and decodes the body as JSON. Non-2xx statuses are errors.
    ///
    /// `authenticated` requests carry the session credential when one is
    /// configured.
    async fn get_json(&self, url: Url, authenticated: bool) -> Result<JsonValue, UpstreamError>;

    /// Whether a session credential is configured.
    fn has_session(&self) -> bool;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    session_cookie: Option<String>,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        session_cookie: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(HttpFetcher {
            client,
            session_cookie: session_cookie.filter(|cookie| !cookie.is_empty()),
            timeout,
        })
    }

    async fn send(&self, url: &Url, authenticated: bool) -> Result<String, UpstreamError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json");

        if authenticated && let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|source| UpstreamError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|source| UpstreamError::Request {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_json(&self, url: Url, authenticated: bool) -> Result<JsonValue, UpstreamError> {
        let start = Instant::now();
        let result = timeout(self.timeout, self.send(&url, authenticated))
            .await
            .unwrap_or_else(|_| Err(UpstreamError::Timeout(url.to_string())));

        let outcome = match &result {
            Ok(_) => "ok",
            Err(UpstreamError::Timeout(_)) => "timeout",
            Err(UpstreamError::Status { .. }) => "status",
            Err(_) => "error",
        };
        counter!(UPSTREAM_REQUESTS, "outcome" => outcome).increment(1);
        histogram!(UPSTREAM_REQUEST_DURATION).record(start.elapsed().as_secs_f64());

        let body = result?;
        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn has_session(&self) -> bool {
        self.session_cookie.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(cookie: Option<&str>, timeout_ms: u64) -> HttpFetcher {
        HttpFetcher::new(
            "passport-test",
            cookie.map(String::from),
            Duration::from_millis(timeout_ms),
        )
        .unwrap()
    }

    fn url(server: &MockServer, path: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), path)).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/games"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": [1, 2]}"#))
            .mount(&mock_server)
            .await;

        let body = fetcher(None, 2000)
            .get_json(url(&mock_server, "/v1/games"), false)
            .await
            .unwrap();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_session_cookie_only_on_authenticated_requests() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("cookie", ".ROBLOSECURITY=secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": []}"#))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/public"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": []}"#))
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(Some(".ROBLOSECURITY=secret"), 2000);
        assert!(fetcher.has_session());
        fetcher
            .get_json(url(&mock_server, "/private"), true)
            .await
            .unwrap();
        fetcher
            .get_json(url(&mock_server, "/public"), false)
            .await
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let public = requests
            .iter()
            .find(|request| request.url.path() == "/public")
            .unwrap();
        assert!(public.headers.get("cookie").is_none());
    }

    #[tokio::test]
    async fn test_empty_cookie_means_no_session() {
        assert!(!fetcher(Some(""), 2000).has_session());
        assert!(!fetcher(None, 2000).has_session());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/disabled"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(None, 2000);

        let err = fetcher
            .get_json(url(&mock_server, "/disabled"), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Status { status, .. } if status == reqwest::StatusCode::FORBIDDEN
        ));
        assert!(err.to_string().contains("403"));

        let err = fetcher
            .get_json(url(&mock_server, "/garbage"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"data": []}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let err = fetcher(None, 50)
            .get_json(url(&mock_server, "/slow"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout(_)));
    }
}
