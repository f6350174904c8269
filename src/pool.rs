//! Fixed-capacity buffer pool in three size classes.
//!
//! All buffers are allocated once at pool construction and recycled for the
//! lifetime of the process; a starved class applies back-pressure to its
//! callers by making [`BufferPool::acquire`] wait. Buffers are handed out as
//! [`PooledBuffer`] guards that return themselves to their class queue on
//! drop, so release happens on every exit path: success, error, or task
//! cancellation.
//!
//! # Example
//!
//! ```
//! use framewire::pool::{BufferPool, SMALL_SIZE};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let pool = BufferPool::new(4);
//! let mut buf = pool.acquire(16).await.unwrap();
//! buf.extend_from_slice(b"hello");
//! assert_eq!(buf.capacity(), SMALL_SIZE);
//! drop(buf); // back in the pool
//! # });
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tokio::sync::Semaphore;

use crate::error::{FramewireError, Result};

/// Smallest buffer capacity.
pub const SMALL_SIZE: usize = 256;
/// Middle buffer capacity.
pub const MEDIUM_SIZE: usize = 4096;
/// Largest buffer capacity; requests above this are rejected.
pub const LARGE_SIZE: usize = 65536;

/// The three capacities a pooled buffer can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    /// Smallest class whose capacity covers `size`, if any.
    pub fn for_request(size: usize) -> Option<Self> {
        if size <= SMALL_SIZE {
            Some(SizeClass::Small)
        } else if size <= MEDIUM_SIZE {
            Some(SizeClass::Medium)
        } else if size <= LARGE_SIZE {
            Some(SizeClass::Large)
        } else {
            None
        }
    }

    /// Class matching an exact capacity, if any.
    fn for_capacity(capacity: usize) -> Option<Self> {
        match capacity {
            SMALL_SIZE => Some(SizeClass::Small),
            MEDIUM_SIZE => Some(SizeClass::Medium),
            LARGE_SIZE => Some(SizeClass::Large),
            _ => None,
        }
    }

    /// Buffer capacity of this class in bytes.
    pub fn capacity(self) -> usize {
        match self {
            SizeClass::Small => SMALL_SIZE,
            SizeClass::Medium => MEDIUM_SIZE,
            SizeClass::Large => LARGE_SIZE,
        }
    }

    fn index(self) -> usize {
        match self {
            SizeClass::Small => 0,
            SizeClass::Medium => 1,
            SizeClass::Large => 2,
        }
    }
}

struct ClassQueue {
    free: Mutex<Vec<BytesMut>>,
    available: Semaphore,
}

impl ClassQueue {
    fn new(class: SizeClass, count: usize) -> Self {
        let mut free = Vec::with_capacity(count);
        for _ in 0..count {
            free.push(BytesMut::with_capacity(class.capacity()));
        }
        Self {
            free: Mutex::new(free),
            available: Semaphore::new(count),
        }
    }
}

/// Bounded pool of pre-allocated buffers, one queue per size class.
///
/// Capacity is fixed at construction: no buffer is created or destroyed
/// afterwards. The only synchronization is the per-class semaphore plus a
/// short-lived mutex around the free list.
pub struct BufferPool {
    classes: [ClassQueue; 3],
}

impl BufferPool {
    /// Create a pool holding `per_class` buffers in each size class.
    pub fn new(per_class: usize) -> Arc<Self> {
        tracing::info!(
            "initializing buffer pool with {} buffers per size class",
            per_class
        );
        Arc::new(Self {
            classes: [
                ClassQueue::new(SizeClass::Small, per_class),
                ClassQueue::new(SizeClass::Medium, per_class),
                ClassQueue::new(SizeClass::Large, per_class),
            ],
        })
    }

    /// Acquire a cleared buffer whose capacity covers `size`.
    ///
    /// Waits until a buffer of the chosen class is free. Requests larger
    /// than [`LARGE_SIZE`] fail immediately with
    /// [`FramewireError::BufferTooLarge`].
    pub async fn acquire(self: &Arc<Self>, size: usize) -> Result<PooledBuffer> {
        let class = SizeClass::for_request(size).ok_or(FramewireError::BufferTooLarge {
            requested: size,
            max: LARGE_SIZE,
        })?;

        let queue = &self.classes[class.index()];
        let permit = queue
            .available
            .acquire()
            .await
            .map_err(|_| FramewireError::ChannelClosed)?;
        // The buffer travels with the guard; the permit is restored by
        // `release` when the guard comes home.
        permit.forget();

        let mut buf = {
            let mut free = queue.free.lock().expect("pool mutex poisoned");
            free.pop().expect("semaphore permit without a free buffer")
        };
        buf.clear();

        Ok(PooledBuffer {
            buf: Some(buf),
            class,
            pool: Arc::clone(self),
        })
    }

    /// Return a buffer to its class queue.
    ///
    /// Releasing a buffer whose capacity matches no size class is a
    /// programmer error: it is logged and the buffer is discarded instead
    /// of poisoning a queue.
    fn release(&self, class: SizeClass, buf: BytesMut) {
        match SizeClass::for_capacity(buf.capacity()) {
            Some(actual) if actual == class => {}
            other => {
                debug_assert!(false, "released buffer with illegal capacity {}", buf.capacity());
                tracing::error!(
                    "attempted to release a buffer with an illegal capacity: {} (class {:?}, matched {:?})",
                    buf.capacity(),
                    class,
                    other
                );
                return;
            }
        }

        let queue = &self.classes[class.index()];
        {
            let mut free = queue.free.lock().expect("pool mutex poisoned");
            free.push(buf);
        }
        queue.available.add_permits(1);
    }

    /// Number of free buffers currently in a class. Diagnostic only.
    pub fn available(&self, class: SizeClass) -> usize {
        self.classes[class.index()].available.available_permits()
    }
}

/// A buffer leased from a [`BufferPool`].
///
/// Dereferences to [`BytesMut`]; returns itself to the pool on drop.
pub struct PooledBuffer {
    buf: Option<BytesMut>,
    class: SizeClass,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Size class this buffer belongs to.
    pub fn class(&self) -> SizeClass {
        self.class
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().expect("buffer taken")
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().expect("buffer taken")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(self.class, buf);
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("class", &self.class)
            .field("len", &self.buf.as_ref().map(|b| b.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_class_selection() {
        assert_eq!(SizeClass::for_request(0), Some(SizeClass::Small));
        assert_eq!(SizeClass::for_request(256), Some(SizeClass::Small));
        assert_eq!(SizeClass::for_request(257), Some(SizeClass::Medium));
        assert_eq!(SizeClass::for_request(4096), Some(SizeClass::Medium));
        assert_eq!(SizeClass::for_request(4097), Some(SizeClass::Large));
        assert_eq!(SizeClass::for_request(65536), Some(SizeClass::Large));
        assert_eq!(SizeClass::for_request(65537), None);
    }

    #[tokio::test]
    async fn test_acquire_matches_smallest_class() {
        let pool = BufferPool::new(2);

        let small = pool.acquire(10).await.unwrap();
        assert_eq!(small.class(), SizeClass::Small);
        assert_eq!(small.capacity(), SMALL_SIZE);

        let medium = pool.acquire(1000).await.unwrap();
        assert_eq!(medium.class(), SizeClass::Medium);

        let large = pool.acquire(60000).await.unwrap();
        assert_eq!(large.class(), SizeClass::Large);
    }

    #[tokio::test]
    async fn test_acquire_too_large_rejected() {
        let pool = BufferPool::new(2);
        let result = pool.acquire(LARGE_SIZE + 1).await;
        assert!(matches!(
            result,
            Err(FramewireError::BufferTooLarge {
                requested,
                max: LARGE_SIZE,
            }) if requested == LARGE_SIZE + 1
        ));
    }

    #[tokio::test]
    async fn test_acquired_buffer_is_cleared() {
        let pool = BufferPool::new(1);

        {
            let mut buf = pool.acquire(16).await.unwrap();
            buf.extend_from_slice(b"leftover");
        }

        let buf = pool.acquire(16).await.unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), SMALL_SIZE);
    }

    #[tokio::test]
    async fn test_conservation_on_drop() {
        let pool = BufferPool::new(3);
        assert_eq!(pool.available(SizeClass::Small), 3);

        let a = pool.acquire(1).await.unwrap();
        let b = pool.acquire(1).await.unwrap();
        assert_eq!(pool.available(SizeClass::Small), 1);

        drop(a);
        drop(b);
        assert_eq!(pool.available(SizeClass::Small), 3);
    }

    #[tokio::test]
    async fn test_classes_do_not_migrate() {
        let pool = BufferPool::new(1);

        let _small = pool.acquire(1).await.unwrap();
        assert_eq!(pool.available(SizeClass::Small), 0);
        // Other classes are untouched.
        assert_eq!(pool.available(SizeClass::Medium), 1);
        assert_eq!(pool.available(SizeClass::Large), 1);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let pool = BufferPool::new(1);
        let held = pool.acquire(1).await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire(1).await.unwrap().class() })
        };

        // The waiter cannot complete while the only buffer is leased.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let class = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(class, SizeClass::Small);
    }

    #[tokio::test]
    async fn test_release_on_cancelled_task() {
        let pool = BufferPool::new(1);

        let task = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let _buf = pool.acquire(1).await.unwrap();
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
        };

        // Let the task acquire, then cancel it mid-sleep.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.available(SizeClass::Small), 0);
        task.abort();
        let _ = task.await;

        assert_eq!(pool.available(SizeClass::Small), 1);
    }
}
