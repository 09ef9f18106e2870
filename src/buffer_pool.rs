//! Buffer pools (§4.5, §9 "Buffer pools") hand the MT pipeline fixed-size scratch buffers without
//! an allocation per frame. A checked-out [`PooledBuffer`]'s `Drop` impl returns its backing `Vec`
//! to the free list, so the spec's explicit `buffer_unref` call becomes just letting the value go
//! out of scope — the same RAII-reference-counting shape the teacher favors for scoped resources.

use std::sync::{Arc, Mutex};

struct Inner {
    elem_size: usize,
    free_list: Mutex<Vec<Vec<u8>>>,
}

/// A pool of `elem_size`-byte buffers, shared between the reader thread and worker pool for one
/// open file.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

impl BufferPool {
    pub fn new(elem_size: usize) -> Self {
        BufferPool { inner: Arc::new(Inner { elem_size, free_list: Mutex::new(Vec::new()) }) }
    }

    pub fn elem_size(&self) -> usize {
        self.inner.elem_size
    }

    /// Check out a buffer, reusing a freed one if available.
    pub fn get(&self) -> PooledBuffer {
        let mut buf = self.inner.free_list.lock().unwrap().pop().unwrap_or_default();
        buf.clear();
        buf.resize(self.inner.elem_size, 0);
        PooledBuffer { buf: Some(buf), pool: self.inner.clone() }
    }
}

/// A buffer checked out of a [`BufferPool`]. Returned to the pool's free list automatically when
/// dropped.
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: Arc<Inner>,
}

impl std::ops::Deref for PooledBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap()
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.free_list.lock().unwrap().push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_out_buffer_has_requested_size() {
        let pool = BufferPool::new(4096);
        let buf = pool.get();
        assert_eq!(buf.len(), 4096);
    }

    #[test]
    fn dropped_buffer_is_reused() {
        let pool = BufferPool::new(128);
        {
            let mut buf = pool.get();
            buf[0] = 0xAB;
        }
        let reused = pool.get();
        // Pool reuses the freed allocation; content is reset to zero on checkout.
        assert_eq!(reused[0], 0);
        assert_eq!(reused.len(), 128);
    }
}
