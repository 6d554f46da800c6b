//! Admin endpoints served on a separate listener from the public API.
//!
//! - `/health`: liveness, always `ok`
//! - `/ready`: `ok` once the readiness probe returns true, 503 before
use crate::http::{make_boxed_body, make_boxed_error_response};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::service::Service;
use http::{Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

pub struct AdminService<F, E> {
    is_ready: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self {
            is_ready,
            _error: PhantomData,
        }
    }
}

impl<F, E, B> Service<Request<B>> for AdminService<F, E>
where
    F: Fn() -> bool,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let is_ready = (self.is_ready)();
        let path = req.uri().path().to_owned();

        Box::pin(async move {
            let res = match path.as_str() {
                "/health" => Response::new(make_boxed_body("ok\n")),
                "/ready" => match is_ready {
                    true => Response::new(make_boxed_body("ok\n")),
                    false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
                },
                _ => make_boxed_error_response(StatusCode::NOT_FOUND),
            };
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn get(service: &AdminService<impl Fn() -> bool, std::io::Error>, path: &str) -> (StatusCode, Bytes) {
        let request = Request::builder().uri(path).body(()).unwrap();
        let response = service.call(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    #[tokio::test]
    async fn test_health_and_readiness() {
        let ready = Arc::new(AtomicBool::new(false));
        let probe = ready.clone();
        let service = AdminService::<_, std::io::Error>::new(move || probe.load(Ordering::Relaxed));

        let (status, body) = get(&service, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"ok\n");

        let (status, _) = get(&service, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        ready.store(true, Ordering::Relaxed);
        let (status, body) = get(&service, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"ok\n");

        let (status, _) = get(&service, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
