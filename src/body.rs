use bytes::{Buf, Bytes};
use http::HeaderMap;
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A response body produced by the compression layer.
    ///
    /// Either the inner body passed through untouched, or a fully buffered
    /// (and usually gzip encoded) payload released in one frame.
    #[project = CompressionBodyProj]
    #[allow(missing_docs)]
    pub enum CompressionBody<B> {
        /// Passthrough body without compression.
        Passthrough {
            #[pin]
            inner: B,
        },
        /// Body that was drained into memory before the head was released.
        Buffered {
            data: Option<Bytes>,
            trailers: Option<HeaderMap>,
        },
        /// The inner body failed while it was being buffered.
        Errored {
            error: Option<io::Error>,
        },
    }
}

impl<B> CompressionBody<B> {
    /// Creates a passthrough body without compression.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }

    /// Creates a body that yields `data` and then any trailers.
    pub fn buffered(data: Bytes, trailers: Option<HeaderMap>) -> Self {
        Self::Buffered {
            data: (!data.is_empty()).then_some(data),
            trailers,
        }
    }

    /// Creates a body whose first poll yields `error`.
    pub fn errored(error: io::Error) -> Self {
        Self::Errored { error: Some(error) }
    }
}

impl<B> Body for CompressionBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            CompressionBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(
                    frame.map_data(|mut data| data.copy_to_bytes(data.remaining()))
                ))),
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
            },
            CompressionBodyProj::Buffered { data, trailers } => {
                if let Some(data) = data.take() {
                    return Poll::Ready(Some(Ok(Frame::data(data))));
                }
                Poll::Ready(trailers.take().map(|t| Ok(Frame::trailers(t))))
            }
            CompressionBodyProj::Errored { error } => Poll::Ready(error.take().map(Err)),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CompressionBody::Passthrough { inner } => inner.is_end_stream(),
            CompressionBody::Buffered { data, trailers } => data.is_none() && trailers.is_none(),
            CompressionBody::Errored { error } => error.is_none(),
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            CompressionBody::Passthrough { inner } => inner.size_hint(),
            // Length is never recomputed for buffered payloads; the
            // transport falls back to chunked framing.
            _ => http_body::SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A test body that yields predefined frames.
    struct TestBody {
        frames: VecDeque<Frame<Bytes>>,
    }

    impl TestBody {
        fn new(frames: Vec<Frame<Bytes>>) -> Self {
            Self {
                frames: frames.into(),
            }
        }
    }

    impl Body for TestBody {
        type Data = Bytes;
        type Error = std::convert::Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            match self.frames.pop_front() {
                Some(frame) => Poll::Ready(Some(Ok(frame))),
                None => Poll::Ready(None),
            }
        }
    }

    fn poll_body<B: Body + Unpin>(body: &mut B) -> Option<Result<Frame<B::Data>, B::Error>> {
        let waker = std::task::Waker::noop();
        let mut cx = Context::from_waker(waker);
        match Pin::new(body).poll_frame(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => None,
        }
    }

    fn trailers() -> HeaderMap {
        let mut trailers = HeaderMap::new();
        trailers.insert("x-checksum", "abc123".parse().unwrap());
        trailers
    }

    #[test]
    fn test_passthrough_data() {
        let inner = TestBody::new(vec![Frame::data(Bytes::from("hello world"))]);
        let mut body = CompressionBody::passthrough(inner);

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert!(frame.is_data());
        assert_eq!(frame.into_data().unwrap(), Bytes::from("hello world"));

        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_passthrough_trailers() {
        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("data")),
            Frame::trailers(trailers()),
        ]);
        let mut body = CompressionBody::passthrough(inner);

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert!(frame.is_data());

        let frame = poll_body(&mut body).unwrap().unwrap();
        let received = frame.into_trailers().unwrap();
        assert_eq!(received.get("x-checksum").unwrap(), "abc123");

        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_passthrough_keeps_size_hint() {
        let body = CompressionBody::passthrough(http_body_util::Full::new(Bytes::from("12345")));
        assert_eq!(body.size_hint().exact(), Some(5));
    }

    #[test]
    fn test_buffered_data_then_trailers() {
        let mut body: CompressionBody<TestBody> =
            CompressionBody::buffered(Bytes::from("payload"), Some(trailers()));
        assert!(!body.is_end_stream());

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from("payload"));

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert!(frame.is_trailers());

        assert!(body.is_end_stream());
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_buffered_empty_is_end_stream() {
        let mut body: CompressionBody<TestBody> = CompressionBody::buffered(Bytes::new(), None);
        assert!(body.is_end_stream());
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_buffered_size_unknown() {
        let body: CompressionBody<TestBody> =
            CompressionBody::buffered(Bytes::from("payload"), None);
        assert_eq!(body.size_hint().exact(), None);
    }

    #[test]
    fn test_errored_yields_error_once() {
        let mut body: CompressionBody<TestBody> =
            CompressionBody::errored(io::Error::other("upstream reset"));
        let err = poll_body(&mut body).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "upstream reset");
        assert!(body.is_end_stream());
        assert!(poll_body(&mut body).is_none());
    }
}
