use crate::body::CompressionBody;
use crate::codec::{CompressibleTypes, add_vary_accept_encoding};
use crate::pool::EncoderPool;
use bytes::{BufMut, Bytes, BytesMut};
use http::response::Parts;
use http::{HeaderMap, Response, header};
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Where a response stands with respect to its head being committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitState {
    /// No status has been committed yet.
    Uncommitted,
    /// The head went out as-is; the body is forwarded verbatim.
    PassThrough,
    /// The head is held back while the body is drained into memory.
    Buffering,
}

impl CommitState {
    /// Commits the response head, choosing a branch from `compressible`.
    ///
    /// Only the first commit transitions. Later calls are no-ops and return
    /// the state chosen the first time.
    pub(crate) fn commit(&mut self, compressible: bool) -> CommitState {
        if *self == CommitState::Uncommitted {
            *self = if compressible {
                CommitState::Buffering
            } else {
                CommitState::PassThrough
            };
        }
        *self
    }
}

pin_project! {
    /// Future for compression service responses.
    ///
    /// Resolves once the response head can be released: immediately for
    /// passthrough responses, after the whole body was buffered and
    /// compressed otherwise.
    pub struct ResponseFuture<F, B> {
        #[pin]
        inner: F,
        accepts_gzip: bool,
        types: CompressibleTypes,
        pool: Arc<EncoderPool>,
        state: CommitState,
        pending: Option<Pending<B>>,
    }
}

impl<F, B> ResponseFuture<F, B> {
    pub(crate) fn new(
        inner: F,
        accepts_gzip: bool,
        types: CompressibleTypes,
        pool: Arc<EncoderPool>,
    ) -> Self {
        Self {
            inner,
            accepts_gzip,
            types,
            pool,
            state: CommitState::Uncommitted,
            pending: None,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Output = Result<Response<CompressionBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        loop {
            if let Some(mut pending) = this.pending.take() {
                return match pending.poll_drain(cx) {
                    Poll::Pending => {
                        *this.pending = Some(pending);
                        Poll::Pending
                    }
                    Poll::Ready(Ok(())) => Poll::Ready(Ok(pending.flush(this.pool))),
                    Poll::Ready(Err(e)) => {
                        tracing::warn!(error = %e, "response body failed while buffering for gzip");
                        Poll::Ready(Ok(Response::from_parts(
                            pending.parts,
                            CompressionBody::errored(e),
                        )))
                    }
                };
            }

            let response = match this.inner.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(response)) => response,
            };

            if !*this.accepts_gzip {
                return Poll::Ready(Ok(response.map(CompressionBody::passthrough)));
            }

            let compressible = this.types.is_compressible(response.headers());
            match this.state.commit(compressible) {
                CommitState::Buffering => {
                    let (parts, body) = response.into_parts();
                    *this.pending = Some(Pending::new(parts, body));
                }
                _ => return Poll::Ready(Ok(response.map(CompressionBody::passthrough))),
            }
        }
    }
}

/// A response whose head is held back while its body is drained.
struct Pending<B> {
    parts: Parts,
    body: Pin<Box<B>>,
    buf: BytesMut,
    trailers: Option<HeaderMap>,
}

impl<B> Pending<B> {
    fn new(parts: Parts, body: B) -> Self {
        Self {
            parts,
            body: Box::pin(body),
            buf: BytesMut::new(),
            trailers: None,
        }
    }

    /// Appends body frames to the buffer until the body ends.
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.body.as_mut().poll_frame(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(io::Error::other(e.into()))),
                Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                    Ok(data) => self.buf.put(data),
                    Err(frame) => {
                        if let Ok(trailers) = frame.into_trailers() {
                            match &mut self.trailers {
                                Some(existing) => existing.extend(trailers),
                                None => self.trailers = Some(trailers),
                            }
                        }
                    }
                },
            }
        }
    }

    /// Compresses the buffered body and releases the response.
    fn flush(self, pool: &EncoderPool) -> Response<CompressionBody<B>> {
        let Pending {
            mut parts,
            buf,
            trailers,
            ..
        } = self;

        if buf.is_empty() {
            return Response::from_parts(parts, CompressionBody::buffered(Bytes::new(), trailers));
        }

        let mut compressed = Vec::new();
        let encoded = pool.acquire().encode(&buf, &mut compressed);

        let data = match encoded {
            Ok(()) => {
                parts.headers.insert(
                    header::CONTENT_ENCODING,
                    header::HeaderValue::from_static("gzip"),
                );
                // Compressed size is not known up front; never recompute it.
                parts.headers.remove(header::CONTENT_LENGTH);
                add_vary_accept_encoding(&mut parts.headers);
                Bytes::from(compressed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "gzip encoding failed, sending identity body");
                buf.freeze()
            }
        };

        Response::from_parts(parts, CompressionBody::buffered(data, trailers))
    }
}
