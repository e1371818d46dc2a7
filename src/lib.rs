//! Static asset server with access logging and buffered gzip compression.
//!
//! The request pipeline is three Tower layers, outermost first:
//!
//! 1. [`AccessLogLayer`] records method, path, final status and latency.
//! 2. [`CompressionLayer`] buffers compressible responses and gzips them.
//! 3. [`StaticFiles`] serves files from an [`AssetStore`].
//!
//! # Example
//!
//! ```ignore
//! use gzip_asset_server::{AccessLogLayer, CompressionLayer, EmbeddedAssets, app};
//!
//! let service = app(EmbeddedAssets, CompressionLayer::new(), AccessLogLayer::new());
//! ```
//!
//! # Compression Rules
//!
//! A response is compressed only when:
//! - some `Accept-Encoding` request header contains `gzip`, and
//! - its `Content-Type` starts with one of the [`CompressibleTypes`] prefixes
//!   (`text/`, `application/json`, `application/javascript`,
//!   `application/xml`, `application/xhtml+xml`, `image/svg+xml` by default), and
//! - its body is not empty.
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - the whole body is buffered before the response head is released
//! - `Content-Encoding` header is set to `gzip`
//! - `Content-Length` header is removed (compressed size is unknown)
//! - `Vary` header includes `Accept-Encoding`

#![deny(missing_docs)]

mod assets;
mod body;
mod codec;
pub mod config;
mod error;
mod files;
mod future;
mod layer;
pub mod log;
mod pool;
pub mod server;
mod service;

pub use assets::{AssetStore, EmbeddedAssets, MemoryAssets};
pub use body::CompressionBody;
pub use codec::{CompressibleTypes, DEFAULT_COMPRESSIBLE_TYPES, accepts_gzip};
pub use error::{Error, Result};
pub use files::StaticFiles;
pub use future::ResponseFuture;
pub use layer::CompressionLayer;
pub use log::{AccessLogLayer, AccessLogService, AccessRecord, AccessSink, TracingSink};
pub use pool::{EncoderPool, GzipEncoder, PooledEncoder};
pub use service::CompressionService;

use tower::ServiceBuilder;

/// The full request pipeline over an asset store `A`.
pub type App<A> = AccessLogService<CompressionService<StaticFiles<A>>>;

/// Builds the pipeline: access log, then compression, then static files.
pub fn app<A: AssetStore>(
    assets: A,
    compression: CompressionLayer,
    access_log: AccessLogLayer,
) -> App<A> {
    ServiceBuilder::new()
        .layer(access_log)
        .layer(compression)
        .service(StaticFiles::new(assets))
}
