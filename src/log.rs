//! Per-request access logging.

use http::{Method, Request, Response, StatusCode};
use pin_project_lite::pin_project;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

/// One access log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    /// Request method.
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    /// Status code the client receives.
    pub status: StatusCode,
    /// Time from receiving the request to releasing the response head.
    pub duration: Duration,
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:?}",
            self.method,
            self.path,
            self.status.as_u16(),
            self.duration
        )
    }
}

/// Destination for access records.
pub trait AccessSink: Send + Sync + 'static {
    /// Receives the record for one completed request.
    fn record(&self, record: AccessRecord);
}

/// Emits access records as `tracing` events at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AccessSink for TracingSink {
    fn record(&self, record: AccessRecord) {
        tracing::info!(
            method = %record.method,
            path = %record.path,
            status = record.status.as_u16(),
            latency = ?record.duration,
            "{record}"
        );
    }
}

/// A Tower layer that logs one [`AccessRecord`] per request.
#[derive(Clone)]
pub struct AccessLogLayer {
    sink: Arc<dyn AccessSink>,
}

impl AccessLogLayer {
    /// Creates a layer logging through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(TracingSink)
    }

    /// Creates a layer handing records to `sink`.
    pub fn with_sink<K: AccessSink>(sink: K) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }
}

impl Default for AccessLogLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AccessLogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            sink: Arc::clone(&self.sink),
        }
    }
}

/// A Tower service that logs one [`AccessRecord`] per request.
#[derive(Clone)]
pub struct AccessLogService<S> {
    inner: S,
    sink: Arc<dyn AccessSink>,
}

impl<S: fmt::Debug> fmt::Debug for AccessLogService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AccessLogService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: fmt::Display,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = AccessLogFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let start = Instant::now();

        AccessLogFuture {
            inner: self.inner.call(req),
            sink: Arc::clone(&self.sink),
            method,
            path,
            start,
        }
    }
}

pin_project! {
    /// Future for access log service responses.
    pub struct AccessLogFuture<F> {
        #[pin]
        inner: F,
        sink: Arc<dyn AccessSink>,
        method: Method,
        path: String,
        start: Instant,
    }
}

impl<F, B, E> Future for AccessLogFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
    E: fmt::Display,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let result = match this.inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        let duration = this.start.elapsed();
        let method = std::mem::take(this.method);
        let path = std::mem::take(this.path);

        match &result {
            Ok(response) => this.sink.record(AccessRecord {
                method,
                path,
                status: response.status(),
                duration,
            }),
            Err(e) => tracing::error!(
                method = %method,
                path = %path,
                latency = ?duration,
                error = %e,
                "request failed"
            ),
        }

        Poll::Ready(result)
    }
}
