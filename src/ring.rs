//! Lock-free single-producer single-consumer ring buffer.
//!
//! This is the only channel between the processing thread and the UI thread
//! (parameter updates, atom transfers) and between the processing thread and
//! the worker thread (work requests/responses). Both sides are wait-free:
//! the indices are atomics, one slot is always left open, and a full ring
//! simply drops the write.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-capacity SPSC FIFO of `Copy` elements.
///
/// One thread calls `write`, one thread calls `read`. Using it with multiple
/// producers or consumers is undefined behavior; the bridge upholds this by
/// fixing each ring's producer and consumer role at construction.
pub struct RingBuffer<T> {
    buf: UnsafeCell<Box<[T]>>,
    size: usize,
    write_ptr: AtomicUsize,
    read_ptr: AtomicUsize,
}

unsafe impl<T: Copy + Send> Send for RingBuffer<T> {}
unsafe impl<T: Copy + Send> Sync for RingBuffer<T> {}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a ring holding up to `size - 1` elements.
    pub fn new(size: usize) -> RingBuffer<T> {
        assert!(size > 1, "ring needs at least one usable slot");
        RingBuffer {
            buf: UnsafeCell::new(vec![T::default(); size].into_boxed_slice()),
            size,
            write_ptr: AtomicUsize::new(0),
            read_ptr: AtomicUsize::new(0),
        }
    }

    /// Drop all content. Only valid while neither peer is running (the
    /// bridge resets its rings during re-initialization only).
    pub fn reset(&self) {
        self.write_ptr.store(0, Ordering::SeqCst);
        self.read_ptr.store(0, Ordering::SeqCst);
    }

    /// Number of elements that can be written without wrapping onto unread
    /// data.
    pub fn write_space(&self) -> usize {
        let w = self.write_ptr.load(Ordering::SeqCst);
        let r = self.read_ptr.load(Ordering::SeqCst);

        if w > r {
            (r + self.size - w) % self.size - 1
        } else if w < r {
            r - w - 1
        } else {
            self.size - 1
        }
    }

    /// Number of elements available for reading.
    pub fn read_space(&self) -> usize {
        let w = self.write_ptr.load(Ordering::SeqCst);
        let r = self.read_ptr.load(Ordering::SeqCst);

        if w >= r {
            w - r
        } else {
            w + self.size - r
        }
    }

    /// Write up to `src.len()` elements, returning how many were accepted.
    /// The new write index is published last.
    pub fn write(&self, src: &[T]) -> usize {
        let free = self.write_space();
        if free == 0 {
            return 0;
        }
        let to_write = src.len().min(free);
        let w = self.write_ptr.load(Ordering::SeqCst);

        let buf = unsafe { &mut *self.buf.get() };
        let n1 = to_write.min(self.size - w);
        buf[w..w + n1].copy_from_slice(&src[..n1]);
        let mut new_w = (w + n1) % self.size;
        if n1 < to_write {
            let n2 = to_write - n1;
            buf[..n2].copy_from_slice(&src[n1..to_write]);
            new_w = n2;
        }

        self.write_ptr.store(new_w, Ordering::SeqCst);
        to_write
    }

    /// Read up to `dst.len()` elements, returning how many were produced.
    /// The new read index is published last.
    pub fn read(&self, dst: &mut [T]) -> usize {
        let avail = self.read_space();
        if avail == 0 {
            return 0;
        }
        let to_read = dst.len().min(avail);
        let r = self.read_ptr.load(Ordering::SeqCst);

        let buf = unsafe { &*self.buf.get() };
        let n1 = to_read.min(self.size - r);
        dst[..n1].copy_from_slice(&buf[r..r + n1]);
        let mut new_r = (r + n1) % self.size;
        if n1 < to_read {
            let n2 = to_read - n1;
            dst[n1..to_read].copy_from_slice(&buf[..n2]);
            new_r = n2;
        }

        self.read_ptr.store(new_r, Ordering::SeqCst);
        to_read
    }

    /// Discard up to `n` readable elements, returning how many were dropped.
    /// Used to resynchronize framed byte streams when a frame cannot be
    /// delivered.
    pub fn skip(&self, n: usize) -> usize {
        let avail = self.read_space();
        let to_skip = n.min(avail);
        if to_skip == 0 {
            return 0;
        }
        let r = self.read_ptr.load(Ordering::SeqCst);
        self.read_ptr.store((r + to_skip) % self.size, Ordering::SeqCst);
        to_skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_has_no_data() {
        let ring: RingBuffer<u8> = RingBuffer::new(16);
        assert_eq!(ring.read_space(), 0);
        assert_eq!(ring.write_space(), 15);
        let mut buf = [0u8; 4];
        assert_eq!(ring.read(&mut buf), 0);
    }

    #[test]
    fn fifo_order() {
        let ring: RingBuffer<u32> = RingBuffer::new(8);
        assert_eq!(ring.write(&[1, 2, 3]), 3);
        assert_eq!(ring.write(&[4, 5]), 2);
        let mut buf = [0u32; 5];
        assert_eq!(ring.read(&mut buf), 5);
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn one_slot_stays_open() {
        let ring: RingBuffer<u8> = RingBuffer::new(4);
        assert_eq!(ring.write(&[1, 2, 3, 4]), 3);
        assert_eq!(ring.write_space(), 0);
        assert_eq!(ring.read_space(), 3);
    }

    #[test]
    fn space_invariant_holds_across_wraparound() {
        let ring: RingBuffer<u8> = RingBuffer::new(8);
        let mut out = [0u8; 8];
        for round in 0..64 {
            let n = (round % 7) + 1;
            let chunk: Vec<u8> = (0..n as u8).collect();
            let written = ring.write(&chunk);
            assert_eq!(ring.read_space() + ring.write_space() + 1, 8);
            let read = ring.read(&mut out[..written]);
            assert_eq!(read, written);
            assert_eq!(&out[..read], &chunk[..read]);
            assert_eq!(ring.read_space() + ring.write_space() + 1, 8);
        }
    }

    #[test]
    fn skip_discards_in_order() {
        let ring: RingBuffer<u8> = RingBuffer::new(8);
        ring.write(&[1, 2, 3, 4, 5]);
        assert_eq!(ring.skip(2), 2);
        let mut buf = [0u8; 3];
        assert_eq!(ring.read(&mut buf), 3);
        assert_eq!(buf, [3, 4, 5]);
        assert_eq!(ring.skip(10), 0);
    }

    #[test]
    fn randomized_chunks_preserve_byte_stream() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let ring: RingBuffer<u8> = RingBuffer::new(64);

        let mut sent = Vec::new();
        let mut received = Vec::new();
        let mut next = 0u8;
        for _ in 0..1000 {
            let n = rng.gen_range(0..16);
            let chunk: Vec<u8> = (0..n)
                .map(|_| {
                    let v = next;
                    next = next.wrapping_add(1);
                    v
                })
                .collect();
            let accepted = ring.write(&chunk);
            sent.extend_from_slice(&chunk[..accepted]);
            // Bytes past `accepted` are dropped; rewind the sequence so the
            // stream stays contiguous.
            next = next.wrapping_sub((n - accepted) as u8);

            let mut buf = vec![0u8; rng.gen_range(0..24)];
            let got = ring.read(&mut buf);
            received.extend_from_slice(&buf[..got]);
        }
        let mut tail = vec![0u8; 64];
        let got = ring.read(&mut tail);
        received.extend_from_slice(&tail[..got]);
        assert_eq!(sent, received);
    }

    #[test]
    fn concurrent_producer_consumer() {
        use std::sync::Arc;

        let ring: Arc<RingBuffer<u32>> = Arc::new(RingBuffer::new(32));
        let writer = ring.clone();
        let handle = std::thread::spawn(move || {
            let mut v = 0u32;
            while v < 10_000 {
                if writer.write(&[v]) == 1 {
                    v += 1;
                }
            }
        });

        let mut expect = 0u32;
        let mut buf = [0u32; 8];
        while expect < 10_000 {
            let n = ring.read(&mut buf);
            for &v in &buf[..n] {
                assert_eq!(v, expect);
                expect += 1;
            }
        }
        handle.join().unwrap();
    }
}
