use flate2::{Compress, CompressError, Compression, Crc, FlushCompress, Status};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, LazyLock};

/// Default number of idle encoders kept by a pool.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Fixed gzip member header: magic, deflate, no flags, no mtime, unknown OS.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xff];

const MIN_SPARE_CAPACITY: usize = 1024;

static GLOBAL: LazyLock<Arc<EncoderPool>> = LazyLock::new(|| Arc::new(EncoderPool::default()));

/// A reusable gzip encoder.
///
/// Each call to [`encode`](GzipEncoder::encode) writes one complete gzip
/// member. The encoder must be [`reset`](GzipEncoder::reset) between
/// members; [`EncoderPool::acquire`] does that for you.
pub struct GzipEncoder {
    deflate: Compress,
    crc: Crc,
}

impl GzipEncoder {
    /// Creates an encoder at the given compression level.
    pub fn new(level: Compression) -> Self {
        Self {
            deflate: Compress::new(level, false),
            crc: Crc::new(),
        }
    }

    /// Discards all compression state from a previous member.
    pub fn reset(&mut self) {
        self.deflate.reset();
        self.crc.reset();
    }

    /// Compresses `input` as a single gzip member appended to `sink`.
    pub fn encode(&mut self, input: &[u8], sink: &mut Vec<u8>) -> Result<(), CompressError> {
        sink.reserve(GZIP_HEADER.len() + input.len() / 2 + MIN_SPARE_CAPACITY);
        sink.extend_from_slice(&GZIP_HEADER);
        self.crc.update(input);

        let start = self.deflate.total_in();
        loop {
            if sink.capacity() - sink.len() < MIN_SPARE_CAPACITY {
                sink.reserve(MIN_SPARE_CAPACITY);
            }
            let consumed = (self.deflate.total_in() - start) as usize;
            match self
                .deflate
                .compress_vec(&input[consumed..], sink, FlushCompress::Finish)?
            {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => continue,
            }
        }

        sink.extend_from_slice(&self.crc.sum().to_le_bytes());
        sink.extend_from_slice(&self.crc.amount().to_le_bytes());
        Ok(())
    }
}

impl std::fmt::Debug for GzipEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipEncoder")
            .field("total_in", &self.deflate.total_in())
            .field("total_out", &self.deflate.total_out())
            .finish()
    }
}

/// A concurrency-safe pool of reusable [`GzipEncoder`]s.
#[derive(Debug)]
pub struct EncoderPool {
    idle: Mutex<Vec<GzipEncoder>>,
    level: Compression,
    max_idle: usize,
}

impl EncoderPool {
    /// Creates an empty pool producing encoders at `level`.
    pub fn new(level: Compression) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            level,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }

    /// Sets how many idle encoders the pool keeps around.
    ///
    /// Encoders released while the pool is full are dropped.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Returns the process-wide pool.
    pub fn global() -> Arc<EncoderPool> {
        Arc::clone(&GLOBAL)
    }

    /// Takes an encoder out of the pool, creating one if none is idle.
    ///
    /// The encoder is always reset before it is handed out. It goes back
    /// to the pool when the returned guard is dropped.
    pub fn acquire(&self) -> PooledEncoder<'_> {
        let mut encoder = self
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| GzipEncoder::new(self.level));
        encoder.reset();
        PooledEncoder {
            pool: self,
            encoder: Some(encoder),
        }
    }

    /// Returns the number of idle encoders.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn release(&self, encoder: GzipEncoder) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(encoder);
        }
    }
}

impl Default for EncoderPool {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

/// An encoder on loan from an [`EncoderPool`].
#[derive(Debug)]
pub struct PooledEncoder<'a> {
    pool: &'a EncoderPool,
    encoder: Option<GzipEncoder>,
}

impl Deref for PooledEncoder<'_> {
    type Target = GzipEncoder;

    fn deref(&self) -> &GzipEncoder {
        // Only `Drop` takes the encoder out.
        self.encoder.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledEncoder<'_> {
    fn deref_mut(&mut self) -> &mut GzipEncoder {
        self.encoder.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledEncoder<'_> {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.pool.release(encoder);
        }
    }
}
