use crate::codec::CompressibleTypes;
use crate::pool::EncoderPool;
use crate::service::CompressionService;
use std::sync::Arc;
use tower::Layer;

/// A Tower layer that gzip-compresses HTTP response bodies.
///
/// Responses whose `Content-Type` is compressible are buffered in full,
/// compressed in one pass and released with `Content-Encoding: gzip`.
/// Everything else passes through untouched.
#[derive(Debug, Clone)]
pub struct CompressionLayer {
    types: CompressibleTypes,
    pool: Arc<EncoderPool>,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// Uses the default compressible types and the process-wide encoder pool.
    pub fn new() -> Self {
        Self {
            types: CompressibleTypes::default(),
            pool: EncoderPool::global(),
        }
    }

    /// Sets the MIME type prefixes eligible for compression.
    pub fn compressible_types(mut self, types: CompressibleTypes) -> Self {
        self.types = types;
        self
    }

    /// Sets the encoder pool shared by every service this layer creates.
    pub fn pool(mut self, pool: Arc<EncoderPool>) -> Self {
        self.pool = pool;
        self
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.types.clone(), Arc::clone(&self.pool))
    }
}
