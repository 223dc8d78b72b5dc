//! Response buffering.
//!
//! Response validation needs the whole body before anything reaches the
//! client. The body is read into a [`PooledBuffer`] checked out from a
//! shared [`BufferPool`]; the buffer goes back to the pool when the guard is
//! dropped, on every exit path.
//!
//! ```
//! use kanon_middleware::buffer::BufferPool;
//!
//! let pool = BufferPool::new(4);
//! {
//!     let mut buf = pool.acquire();
//!     buf.extend_from_slice(b"{\"id\":1}");
//!     assert_eq!(pool.outstanding(), 1);
//! }
//! assert_eq!(pool.outstanding(), 0);
//! assert_eq!(pool.available(), 1);
//! ```

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode, Version};
use http_body_util::{BodyExt, Full};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::{full, Body, HandlerError, Response};

/// Default number of idle buffers kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Buffers that grew beyond this are not kept for reuse.
const MAX_RETAINED_BYTES: usize = 1024 * 1024;

/// A bounded free list of byte buffers.
///
/// Cloning is cheap and shares the same free list.
#[derive(Clone, Debug)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<BytesMut>>,
    capacity: usize,
    outstanding: AtomicUsize,
}

impl BufferPool {
    /// Creates a pool that keeps at most `capacity` idle buffers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(capacity)),
                capacity,
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Checks out an empty buffer.
    pub fn acquire(&self) -> PooledBuffer {
        let buf = self.inner.free.lock().pop().unwrap_or_default();
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        PooledBuffer {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of buffers currently checked out.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Number of idle buffers ready for reuse.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// A buffer checked out of a [`BufferPool`]. Returned on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: BytesMut,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        if buf.capacity() <= MAX_RETAINED_BYTES {
            let mut free = self.pool.free.lock();
            if free.len() < self.pool.capacity {
                free.push(buf);
            }
        }
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A downstream response held back for validation.
///
/// The only way to release the captured data to the client is
/// [`flush`](Self::flush), which consumes the value.
#[derive(Debug)]
pub struct BufferedResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: PooledBuffer,
    trailers: Option<HeaderMap>,
}

impl BufferedResponse {
    /// Reads `response` completely into `buffer`.
    ///
    /// Data frames go into the buffer, trailer frames are kept aside. A
    /// body error is returned as-is; the partial data is discarded with the
    /// buffer.
    pub async fn capture(response: Response, mut buffer: PooledBuffer) -> Result<Self, HandlerError> {
        let (parts, mut body) = response.into_parts();
        let mut trailers: Option<HeaderMap> = None;

        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(HandlerError::body)?;
            match frame.into_data() {
                Ok(data) => buffer.extend_from_slice(&data),
                Err(frame) => {
                    if let Ok(received) = frame.into_trailers() {
                        trailers.get_or_insert_with(HeaderMap::new).extend(received);
                    }
                }
            }
        }

        Ok(Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body: buffer,
            trailers,
        })
    }

    /// Captured status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Captured headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Captured body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Captured trailers, if the downstream sent any.
    #[must_use]
    pub fn trailers(&self) -> Option<&HeaderMap> {
        self.trailers.as_ref()
    }

    /// Turns the captured data into the client response and returns the
    /// buffer to its pool. Trailers are sent after the body, as received.
    pub fn flush(self) -> Response {
        let bytes = Bytes::copy_from_slice(&self.body);
        let body: Body = match self.trailers {
            Some(trailers) => Full::new(bytes)
                .with_trailers(std::future::ready(Some(Ok(trailers))))
                .map_err(|never| match never {})
                .boxed(),
            None => full(bytes),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers;
        response
    }
}
