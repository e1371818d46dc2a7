use crate::assets::AssetStore;
use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use http_body_util::Full;
use std::convert::Infallible;
use std::future::{Ready, ready};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

const INDEX: &str = "index.html";
const NOT_FOUND_BODY: &str = "404 page not found\n";

/// A Tower service serving files out of an [`AssetStore`].
#[derive(Debug)]
pub struct StaticFiles<A> {
    assets: Arc<A>,
}

impl<A> StaticFiles<A> {
    /// Creates a service serving `assets`.
    pub fn new(assets: A) -> Self {
        Self {
            assets: Arc::new(assets),
        }
    }
}

impl<A> Clone for StaticFiles<A> {
    fn clone(&self) -> Self {
        Self {
            assets: Arc::clone(&self.assets),
        }
    }
}

impl<A: AssetStore> StaticFiles<A> {
    fn respond(&self, method: &Method, request_path: &str) -> Response<Full<Bytes>> {
        let Some(path) = clean_path(request_path) else {
            return not_found();
        };

        if path == INDEX || path.ends_with("/index.html") {
            let dir = &path[..path.len() - INDEX.len()];
            return redirect(&format!("/{dir}"));
        }

        let is_dir = path.is_empty() || request_path.ends_with('/');
        let lookup = if path.is_empty() {
            INDEX.to_owned()
        } else if is_dir {
            format!("{path}/{INDEX}")
        } else {
            path.clone()
        };

        match self.assets.get(&lookup) {
            Some(data) => serve_file(method, &lookup, data),
            None if !is_dir && self.assets.get(&format!("{path}/{INDEX}")).is_some() => {
                redirect(&format!("/{path}/"))
            }
            None => not_found(),
        }
    }
}

impl<A, B> Service<Request<B>> for StaticFiles<A>
where
    A: AssetStore,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        ready(Ok(self.respond(req.method(), req.uri().path())))
    }
}

/// Lexically cleans a request path into a store-relative path.
///
/// Empty and `.` segments are dropped and `..` pops a segment, never
/// climbing above the root. Returns `None` for paths not starting at `/`.
fn clean_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix('/')?;
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

fn content_type(path: &str) -> HeaderValue {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let value = if mime.type_() == mime_guess::mime::TEXT {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    };
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

fn serve_file(method: &Method, path: &str, data: Bytes) -> Response<Full<Bytes>> {
    let len = data.len();
    let body = if *method == Method::HEAD {
        Bytes::new()
    } else {
        data
    };

    let mut response = Response::new(Full::new(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type(path));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    response
}

fn not_found() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(NOT_FOUND_BODY.as_bytes())));
    *response.status_mut() = StatusCode::NOT_FOUND;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

fn redirect(location: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => not_found(),
    }
}
