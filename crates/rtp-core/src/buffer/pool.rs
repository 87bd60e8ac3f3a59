//! Pre-allocated frame storage for the packet receive path
//!
//! Every payload the jitter buffer keeps is copied into a pooled
//! frame, and the frame's storage returns to the pool when the
//! consumer drops it. Once the pool is warm the receive path performs
//! no allocation per packet.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::BytesMut;
use parking_lot::Mutex;
use tracing::trace;

/// Default number of frames held by a pool
pub const DEFAULT_POOL_FRAMES: usize = 64;

/// Default frame capacity in bytes (fits any UDP media payload)
pub const DEFAULT_FRAME_CAPACITY: usize = 1500;

struct PoolInner {
    free: Mutex<Vec<BytesMut>>,
    frame_capacity: usize,
    max_frames: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Statistics for a frame pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Number of frames the pool retains
    pub max_frames: usize,

    /// Frames currently available for checkout
    pub available: usize,

    /// Checkouts served from pooled storage
    pub hits: u64,

    /// Checkouts that had to allocate (pool exhausted)
    pub misses: u64,
}

/// Fixed-size pool of reusable payload buffers.
///
/// Cloning is cheap and shares the underlying storage.
#[derive(Clone)]
pub struct FramePool {
    inner: Arc<PoolInner>,
}

impl FramePool {
    /// Create a pool with `max_frames` buffers of `frame_capacity`
    /// bytes each, all allocated up front.
    pub fn new(max_frames: usize, frame_capacity: usize) -> Self {
        let free = (0..max_frames)
            .map(|_| BytesMut::with_capacity(frame_capacity))
            .collect();
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                frame_capacity,
                max_frames,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Take an empty frame from the pool.
    ///
    /// When the pool is exhausted this falls back to a fresh
    /// allocation, counted in `misses`; it never blocks the receive
    /// path.
    pub fn take(&self) -> PooledFrame {
        let reused = self.inner.free.lock().pop();
        let buf = match reused {
            Some(mut buf) => {
                buf.clear();
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                trace!("frame pool exhausted, allocating");
                BytesMut::with_capacity(self.inner.frame_capacity)
            }
        };
        PooledFrame {
            buf: Some(buf),
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Current pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_frames: self.inner.max_frames,
            available: self.inner.free.lock().len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("max_frames", &self.inner.max_frames)
            .field("frame_capacity", &self.inner.frame_capacity)
            .finish()
    }
}

/// A payload buffer checked out of a [`FramePool`].
///
/// Dereferences to [`BytesMut`]; the storage goes back to its pool on
/// drop. The frame stays valid if it outlives the pool, it simply is
/// not recycled.
pub struct PooledFrame {
    // Some until drop
    buf: Option<BytesMut>,
    pool: Weak<PoolInner>,
}

impl PooledFrame {
    /// Payload bytes currently held by the frame
    pub fn as_slice(&self) -> &[u8] {
        self.deref()
    }
}

impl Deref for PooledFrame {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().expect("buffer present until drop")
    }
}

impl DerefMut for PooledFrame {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().expect("buffer present until drop")
    }
}

impl Drop for PooledFrame {
    fn drop(&mut self) {
        if let (Some(buf), Some(pool)) = (self.buf.take(), self.pool.upgrade()) {
            let mut free = pool.free.lock();
            if free.len() < pool.max_frames && buf.capacity() >= pool.frame_capacity {
                free.push(buf);
            }
        }
    }
}

impl std::fmt::Debug for PooledFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledFrame")
            .field("len", &self.as_slice().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Set up a simple test logger
    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    #[test]
    fn test_take_and_recycle() {
        let pool = FramePool::new(2, 160);

        let mut frame = pool.take();
        frame.extend_from_slice(b"payload");
        assert_eq!(frame.as_slice(), b"payload");
        assert_eq!(pool.stats().available, 1);

        drop(frame);
        let stats = pool.stats();
        assert_eq!(stats.available, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_recycled_frame_is_empty() {
        let pool = FramePool::new(1, 160);

        let mut frame = pool.take();
        frame.extend_from_slice(b"stale data");
        drop(frame);

        let frame = pool.take();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_exhaustion_falls_back_to_allocation() {
        init_test_logging();
        let pool = FramePool::new(1, 160);

        let first = pool.take();
        let second = pool.take();
        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        // Both return; the pool keeps at most max_frames of them
        drop(first);
        drop(second);
        assert_eq!(pool.stats().available, 1);
    }

    #[test]
    fn test_frame_outlives_pool() {
        let pool = FramePool::new(1, 160);
        let mut frame = pool.take();
        drop(pool);
        frame.extend_from_slice(b"still usable");
        assert_eq!(frame.as_slice(), b"still usable");
    }
}
