//! The LV2 worker extension: a background thread serving the plugin's
//! `work()` calls, fed from the audio thread through a non-blocking
//! request ring.
//!
//! Messages travel framed as a native-endian `u32` length followed by the
//! payload. The audio thread never blocks: `schedule` writes the frame and
//! pokes the condition variable with `try_lock`, and a full ring simply
//! drops the request.

use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, error};
use parking_lot::{Condvar, Mutex};

use crate::lv2::{
    Lv2Handle, Lv2WorkerInterface, Lv2WorkerStatus, LV2_WORKER_ERR_UNKNOWN, LV2_WORKER_SUCCESS,
};
use crate::ring::RingBuffer;

/// Ring capacity and the hard ceiling for a single message.
const MAX_MSG: usize = 4096;
/// Bytes of the length prefix.
const PREFIX: usize = std::mem::size_of::<u32>();

struct Shared {
    lock: Mutex<()>,
    ready: Condvar,
    run: AtomicBool,
}

/// One worker per bridge instance, created only when the plugin exposes
/// `worker:interface`.
pub struct Worker {
    requests: Arc<RingBuffer<u8>>,
    responses: Arc<RingBuffer<u8>>,
    shared: Arc<Shared>,
    thread: Option<thread::JoinHandle<()>>,
    iface: *const Lv2WorkerInterface,
    handle: Lv2Handle,
    freewheeling: AtomicBool,
}

// The interface and handle pointers are only dereferenced by the worker
// thread and by emit_response/end_run on the audio thread, both of which the
// LV2 worker contract allows concurrently with run().
unsafe impl Send for Worker {}

impl Worker {
    /// Spawn the worker thread. Blocks (spin-yield) until the thread has
    /// observed itself alive, so a schedule directly after construction
    /// cannot race the startup.
    ///
    /// # Safety
    /// `iface` and `handle` must stay valid until the worker is dropped.
    pub unsafe fn new(iface: *const Lv2WorkerInterface, handle: Lv2Handle) -> Box<Worker> {
        let requests = Arc::new(RingBuffer::new(MAX_MSG));
        let responses = Arc::new(RingBuffer::new(MAX_MSG));
        let shared = Arc::new(Shared {
            lock: Mutex::new(()),
            ready: Condvar::new(),
            run: AtomicBool::new(false),
        });

        let t_requests = requests.clone();
        let t_responses = responses.clone();
        let t_shared = shared.clone();
        let t_iface = iface as usize;
        let t_handle = handle as usize;
        let thread = thread::Builder::new()
            .name("lv2-worker".to_string())
            .spawn(move || {
                worker_loop(
                    &t_requests,
                    &t_responses,
                    &t_shared,
                    t_iface as *const Lv2WorkerInterface,
                    t_handle as Lv2Handle,
                )
            })
            .expect("failed to spawn lv2 worker thread");

        while !shared.run.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        debug!("worker thread is up");

        Box::new(Worker {
            requests,
            responses,
            shared,
            thread: Some(thread),
            iface,
            handle,
            freewheeling: AtomicBool::new(false),
        })
    }

    /// Offline/export mode: run scheduled work synchronously on the calling
    /// thread instead of queueing it.
    pub fn set_freewheeling(&self, yn: bool) {
        self.freewheeling.store(yn, Ordering::SeqCst);
    }

    /// Queue one unit of work. Called on the audio thread through the
    /// plugin's `worker:schedule` feature; wait-free.
    pub fn schedule(&self, size: u32, data: *const c_void) -> Lv2WorkerStatus {
        if self.freewheeling.load(Ordering::SeqCst) {
            let work = unsafe { (*self.iface).work };
            if let Some(work) = work {
                unsafe {
                    work(
                        self.handle,
                        respond_callback,
                        &*self.responses as *const RingBuffer<u8> as *mut c_void,
                        size,
                        data,
                    );
                }
            }
            return LV2_WORKER_SUCCESS;
        }

        if !write_frame(&self.requests, size, data) {
            return LV2_WORKER_ERR_UNKNOWN;
        }
        // Wake the worker if it is waiting. When the lock is contended the
        // worker is awake anyway and re-checks the ring before sleeping.
        if let Some(guard) = self.shared.lock.try_lock() {
            self.shared.ready.notify_one();
            drop(guard);
        }
        LV2_WORKER_SUCCESS
    }

    /// Drain queued responses into the plugin's `work_response`. Called on
    /// the audio thread at the end of each cycle.
    pub fn emit_response(&self) {
        let work_response = match unsafe { (*self.iface).work_response } {
            Some(f) => f,
            None => return,
        };
        let mut buf = [0u8; MAX_MSG];
        loop {
            match read_frame(&self.responses, &mut buf) {
                Some(size) if size <= MAX_MSG => unsafe {
                    work_response(self.handle, size as u32, buf.as_ptr() as *const c_void);
                },
                _ => break,
            }
        }
    }

    /// Tell the plugin the cycle is over, if it cares.
    pub fn end_run(&self) {
        if let Some(end_run) = unsafe { (*self.iface).end_run } {
            unsafe {
                end_run(self.handle);
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        {
            let guard = self.shared.lock.lock();
            self.shared.run.store(false, Ordering::SeqCst);
            self.shared.ready.notify_one();
            drop(guard);
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The `worker:schedule` C entry; `handle` is the `Worker`.
pub unsafe extern "C" fn schedule_callback(
    handle: *mut c_void,
    size: u32,
    data: *const c_void,
) -> Lv2WorkerStatus {
    if handle.is_null() {
        return LV2_WORKER_ERR_UNKNOWN;
    }
    let worker = &*(handle as *const Worker);
    worker.schedule(size, data)
}

/// The respond callback handed to `work()`; `handle` is the response ring.
unsafe extern "C" fn respond_callback(
    handle: *mut c_void,
    size: u32,
    data: *const c_void,
) -> Lv2WorkerStatus {
    let responses = &*(handle as *const RingBuffer<u8>);
    if write_frame(responses, size, data) {
        LV2_WORKER_SUCCESS
    } else {
        LV2_WORKER_ERR_UNKNOWN
    }
}

fn write_frame(ring: &RingBuffer<u8>, size: u32, data: *const c_void) -> bool {
    let len = size as usize;
    if len > MAX_MSG || ring.write_space() < PREFIX + len {
        return false;
    }
    // one write call, so the peer never observes a length without its
    // payload
    let mut frame = [0u8; PREFIX + MAX_MSG];
    frame[..PREFIX].copy_from_slice(&size.to_ne_bytes());
    if len > 0 {
        let payload = unsafe { std::slice::from_raw_parts(data as *const u8, len) };
        frame[PREFIX..PREFIX + len].copy_from_slice(payload);
    }
    ring.write(&frame[..PREFIX + len]);
    true
}

fn read_frame(ring: &RingBuffer<u8>, buf: &mut [u8; MAX_MSG]) -> Option<usize> {
    if ring.read_space() < PREFIX {
        return None;
    }
    let mut prefix = [0u8; PREFIX];
    ring.read(&mut prefix);
    let size = u32::from_ne_bytes(prefix) as usize;
    if size > MAX_MSG {
        return Some(usize::MAX);
    }
    ring.read(&mut buf[..size]);
    Some(size)
}

fn worker_loop(
    requests: &RingBuffer<u8>,
    responses: &RingBuffer<u8>,
    shared: &Shared,
    iface: *const Lv2WorkerInterface,
    handle: Lv2Handle,
) {
    let mut guard = shared.lock.lock();
    shared.run.store(true, Ordering::SeqCst);
    let mut buf = [0u8; MAX_MSG];
    loop {
        if requests.read_space() < PREFIX {
            shared.ready.wait(&mut guard);
        }
        if !shared.run.load(Ordering::SeqCst) {
            break;
        }
        let size = match read_frame(requests, &mut buf) {
            Some(usize::MAX) => {
                // A frame claiming more than the ring can carry means the
                // stream is corrupt; stop serving rather than guess.
                error!("worker request exceeds {} bytes, aborting worker", MAX_MSG);
                break;
            }
            Some(size) => size,
            None => continue,
        };
        if let Some(work) = unsafe { (*iface).work } {
            unsafe {
                work(
                    handle,
                    respond_callback,
                    responses as *const RingBuffer<u8> as *mut c_void,
                    size as u32,
                    buf.as_ptr() as *const c_void,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    /// A synthetic plugin: `work()` echoes the request back through
    /// `respond`, `work_response` records what arrives.
    struct Sink {
        worked: PlMutex<Vec<Vec<u8>>>,
        responded: PlMutex<Vec<Vec<u8>>>,
        end_runs: std::sync::atomic::AtomicUsize,
    }

    unsafe extern "C" fn test_work(
        instance: Lv2Handle,
        respond: crate::lv2::Lv2WorkerRespondFn,
        handle: *mut c_void,
        size: u32,
        data: *const c_void,
    ) -> Lv2WorkerStatus {
        let sink = &*(instance as *const Sink);
        let payload = std::slice::from_raw_parts(data as *const u8, size as usize).to_vec();
        // respond first: once `worked` is observable the response frame is
        // already queued
        let status = respond(handle, size, data);
        sink.worked.lock().push(payload);
        status
    }

    unsafe extern "C" fn test_work_response(
        instance: Lv2Handle,
        size: u32,
        body: *const c_void,
    ) -> Lv2WorkerStatus {
        let sink = &*(instance as *const Sink);
        let payload = std::slice::from_raw_parts(body as *const u8, size as usize).to_vec();
        sink.responded.lock().push(payload);
        LV2_WORKER_SUCCESS
    }

    unsafe extern "C" fn test_end_run(instance: Lv2Handle) -> Lv2WorkerStatus {
        let sink = &*(instance as *const Sink);
        sink.end_runs
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        LV2_WORKER_SUCCESS
    }

    fn test_iface() -> Lv2WorkerInterface {
        Lv2WorkerInterface {
            work: Some(test_work),
            work_response: Some(test_work_response),
            end_run: Some(test_end_run),
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..2000 {
            if done() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        panic!("timed out waiting for the worker");
    }

    #[test]
    fn scheduled_work_round_trips_to_work_response() {
        let sink = Box::new(Sink {
            worked: PlMutex::new(Vec::new()),
            responded: PlMutex::new(Vec::new()),
            end_runs: std::sync::atomic::AtomicUsize::new(0),
        });
        let iface = test_iface();
        let worker =
            unsafe { Worker::new(&iface, &*sink as *const Sink as Lv2Handle) };

        for i in 0..10u8 {
            let msg = [i; 256];
            assert_eq!(
                worker.schedule(msg.len() as u32, msg.as_ptr() as *const c_void),
                LV2_WORKER_SUCCESS
            );
        }

        wait_until(|| sink.worked.lock().len() == 10);

        // the next cycle delivers the matching responses on the caller
        worker.emit_response();
        worker.end_run();

        let responded = sink.responded.lock();
        assert_eq!(responded.len(), 10);
        for (i, r) in responded.iter().enumerate() {
            assert_eq!(r.len(), 256);
            assert!(r.iter().all(|&b| b == i as u8));
        }
        assert_eq!(sink.end_runs.load(std::sync::atomic::Ordering::SeqCst), 1);
        drop(worker);
    }

    #[test]
    fn freewheeling_runs_work_inline() {
        let sink = Box::new(Sink {
            worked: PlMutex::new(Vec::new()),
            responded: PlMutex::new(Vec::new()),
            end_runs: std::sync::atomic::AtomicUsize::new(0),
        });
        let iface = test_iface();
        let worker =
            unsafe { Worker::new(&iface, &*sink as *const Sink as Lv2Handle) };
        worker.set_freewheeling(true);

        let msg = [7u8; 32];
        worker.schedule(msg.len() as u32, msg.as_ptr() as *const c_void);
        // no waiting: work ran on this thread
        assert_eq!(sink.worked.lock().len(), 1);
        worker.emit_response();
        assert_eq!(sink.responded.lock().len(), 1);
    }

    #[test]
    fn oversized_schedule_is_refused() {
        let sink = Box::new(Sink {
            worked: PlMutex::new(Vec::new()),
            responded: PlMutex::new(Vec::new()),
            end_runs: std::sync::atomic::AtomicUsize::new(0),
        });
        let iface = test_iface();
        let worker =
            unsafe { Worker::new(&iface, &*sink as *const Sink as Lv2Handle) };

        let big = vec![0u8; MAX_MSG + 1];
        assert_eq!(
            worker.schedule(big.len() as u32, big.as_ptr() as *const c_void),
            LV2_WORKER_ERR_UNKNOWN
        );
        assert!(sink.worked.lock().is_empty());
    }
}
