//! The multi-threaded DST pipeline (§4.5): a dedicated reader thread pulls compressed frames from
//! a private [`DiscReader`], dispatches decode jobs onto a shared [`WorkerPool`], and the consumer
//! drains decoded frames from a per-file ordered result queue that preserves dispatch order
//! regardless of which worker finishes first.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::buffer_pool::{BufferPool, PooledBuffer};
use crate::disc_reader::DiscReader;
use crate::dst::DstDecoderFactory;
use crate::worker_pool::WorkerPool;

/// How often the reader thread rechecks the command channel while a dispatch is blocked on a
/// full queue (§4.5 "the reader periodically rechecks the command channel to remain responsive").
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    None,
    Seek(u32),
    SeekDone,
    Close,
}

struct CommandChannel {
    state: Mutex<Command>,
    cv: Condvar,
}

impl CommandChannel {
    fn new() -> Self {
        CommandChannel { state: Mutex::new(Command::None), cv: Condvar::new() }
    }

    fn peek(&self) -> Command {
        *self.state.lock().unwrap()
    }

    fn send_seek(&self, frame: u32) {
        let mut s = self.state.lock().unwrap();
        *s = Command::Seek(frame);
        self.cv.notify_all();
    }

    fn send_close(&self) {
        let mut s = self.state.lock().unwrap();
        *s = Command::Close;
        self.cv.notify_all();
    }

    /// Reader-side: acknowledge a processed seek and return to `None` once the consumer observes
    /// `SeekDone` (§5 "Command transitions: NONE -> SEEK -> SEEK_DONE -> NONE").
    fn ack_seek_done(&self) {
        let mut s = self.state.lock().unwrap();
        *s = Command::SeekDone;
        self.cv.notify_all();
    }

    /// Consumer-side: block until the reader acknowledges, then reset to `None`.
    fn wait_seek_done(&self) {
        let mut s = self.state.lock().unwrap();
        while *s != Command::SeekDone {
            s = self.cv.wait(s).unwrap();
        }
        *s = Command::None;
    }

    /// Reader-side: block for up to `COMMAND_POLL_INTERVAL` waiting for a command other than
    /// `None`/`SeekDone` to arrive.
    fn wait_for_command(&self) {
        let s = self.state.lock().unwrap();
        let _ = self.cv.wait_timeout(s, COMMAND_POLL_INTERVAL).unwrap();
    }
}

/// Result of one decode job, delivered through the ordered queue in dispatch order.
pub struct FrameResult {
    pub is_eof: bool,
    pub error_code: i32,
    pub decompressed: Option<PooledBuffer>,
    pub decoded_len: usize,
}

impl FrameResult {
    fn eof() -> Self {
        FrameResult { is_eof: true, error_code: 0, decompressed: None, decoded_len: 0 }
    }

    /// The decoded bytes, if any (empty on EOF or error).
    pub fn data(&self) -> &[u8] {
        match &self.decompressed {
            Some(buf) => &buf[..self.decoded_len],
            None => &[],
        }
    }
}

struct Slot {
    result: Mutex<Option<FrameResult>>,
    cv: Condvar,
}

impl Slot {
    fn new() -> Arc<Self> {
        Arc::new(Slot { result: Mutex::new(None), cv: Condvar::new() })
    }

    fn fill(&self, result: FrameResult) {
        let mut slot = self.result.lock().unwrap();
        *slot = Some(result);
        self.cv.notify_all();
    }

    fn take(&self) -> FrameResult {
        let mut slot = self.result.lock().unwrap();
        while slot.is_none() {
            slot = self.cv.wait(slot).unwrap();
        }
        slot.take().unwrap()
    }
}

/// Per-file reorder buffer: dispatch reserves a slot (blocking when `capacity` slots are already
/// outstanding), the worker pool fills it asynchronously, and `next_result_wait` always returns
/// slots in the order they were reserved (§4.5 "ordering and cancellation").
struct OrderedQueue {
    slots: Mutex<VecDeque<Arc<Slot>>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl OrderedQueue {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(OrderedQueue {
            slots: Mutex::new(VecDeque::new()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        })
    }

    /// Reserve the next slot, blocking (while periodically giving the caller a chance to bail out
    /// via `should_abort`) until there is room.
    fn reserve(&self, mut should_abort: impl FnMut() -> bool) -> Option<Arc<Slot>> {
        let mut slots = self.slots.lock().unwrap();
        loop {
            if slots.len() < self.capacity {
                let slot = Slot::new();
                slots.push_back(slot.clone());
                self.not_empty.notify_all();
                return Some(slot);
            }
            if should_abort() {
                return None;
            }
            let (guard, _) =
                self.not_full.wait_timeout(slots, COMMAND_POLL_INTERVAL).unwrap();
            slots = guard;
        }
    }

    fn next_result_wait(&self) -> FrameResult {
        let mut slots = self.slots.lock().unwrap();
        while slots.is_empty() {
            slots = self.not_empty.wait(slots).unwrap();
        }
        let slot = slots.pop_front().unwrap();
        self.not_full.notify_all();
        drop(slots);
        slot.take()
    }

    /// Discard every in-flight slot; their eventual worker output, if any, is simply dropped
    /// (pooled buffers release through `PooledBuffer`'s `Drop`, the cleanup hook the spec asks
    /// for).
    fn reset(&self) {
        let mut slots = self.slots.lock().unwrap();
        slots.clear();
        self.not_full.notify_all();
    }
}

/// The per-file MT pipeline: owns the reader thread and its ordered queue. Constructed at
/// `VirtualFile::open` time for DST tracks when a worker pool is available; torn down on close.
pub struct MtPipeline {
    command: Arc<CommandChannel>,
    queue: Arc<OrderedQueue>,
    reader_handle: Option<JoinHandle<()>>,
    /// Shared pool of decoded-frame buffers for this file, sized once at construction and reused
    /// across every dispatched decode job (§4.5/§9 "two buffer pools per file").
    decompressed_pool: BufferPool,
}

impl MtPipeline {
    pub fn start(
        mut disc_reader: Box<dyn DiscReader>,
        decoder_factory: Arc<dyn DstDecoderFactory>,
        worker_pool: Arc<WorkerPool>,
        channel_count: u16,
        start_frame: u32,
        end_frame: u32,
    ) -> Self {
        let queue = OrderedQueue::new((2 * worker_pool.size()).max(16));
        let command = Arc::new(CommandChannel::new());
        let compressed_pool = BufferPool::new(crate::SACD_FRAME_SIZE * channel_count as usize);
        let decompressed_pool = BufferPool::new(crate::SACD_FRAME_SIZE * channel_count as usize);

        let reader_command = command.clone();
        let reader_queue = queue.clone();
        let reader_decompressed_pool = decompressed_pool.clone();
        let reader_handle = std::thread::Builder::new()
            .name("sacdfs-dst-reader".into())
            .spawn(move || {
                let decompressed_pool = reader_decompressed_pool;
                let mut current_frame = start_frame;
                loop {
                    match reader_command.peek() {
                        Command::Close => {
                            log::debug!("mt pipeline reader: CLOSE received, exiting");
                            return;
                        }
                        Command::Seek(frame) => {
                            log::debug!("mt pipeline reader: SEEK to frame {frame}");
                            reader_queue.reset();
                            current_frame = frame;
                            reader_command.ack_seek_done();
                        }
                        Command::SeekDone | Command::None => {}
                    }

                    if current_frame >= end_frame {
                        if let Some(slot) = reader_queue.reserve(|| {
                            matches!(reader_command.peek(), Command::Seek(_) | Command::Close)
                        }) {
                            slot.fill(FrameResult::eof());
                        }
                        reader_command.wait_for_command();
                        continue;
                    }

                    let should_abort = || {
                        matches!(reader_command.peek(), Command::Seek(_) | Command::Close)
                    };
                    let slot = match reader_queue.reserve(should_abort) {
                        Some(slot) => slot,
                        None => continue,
                    };

                    let frame = match disc_reader.read_frame(current_frame) {
                        Ok(frame) => frame,
                        Err(err) => {
                            log::warn!("mt pipeline reader: frame read failed: {err}");
                            slot.fill(FrameResult {
                                is_eof: false,
                                error_code: err.code(),
                                decompressed: None,
                                decoded_len: 0,
                            });
                            current_frame += 1;
                            continue;
                        }
                    };

                    let mut compressed = compressed_pool.get();
                    let len = frame.data.len().min(compressed.len());
                    compressed[..len].copy_from_slice(&frame.data[..len]);

                    let decoder_factory = decoder_factory.clone();
                    let job_decompressed_pool = decompressed_pool.clone();
                    worker_pool.dispatch(move || {
                        match decoder_factory.decode(&compressed[..len], channel_count) {
                            Ok(decoded) => {
                                let mut buf = job_decompressed_pool.get();
                                let n = decoded.len().min(buf.len());
                                buf[..n].copy_from_slice(&decoded[..n]);
                                slot.fill(FrameResult {
                                    is_eof: false,
                                    error_code: 0,
                                    decompressed: Some(buf),
                                    decoded_len: n,
                                });
                            }
                            Err(err) => {
                                slot.fill(FrameResult {
                                    is_eof: false,
                                    error_code: err.code(),
                                    decompressed: None,
                                    decoded_len: 0,
                                });
                            }
                        }
                    });

                    current_frame += 1;
                }
            })
            .expect("failed to spawn DST reader thread");

        MtPipeline { command, queue, reader_handle: Some(reader_handle), decompressed_pool }
    }

    /// Pull the next decoded frame (or EOF/error sentinel) in file order.
    pub fn next_result_wait(&self) -> FrameResult {
        self.queue.next_result_wait()
    }

    /// Send a SEEK command to the reader thread and block until it is fully processed.
    pub fn seek(&self, frame: u32) {
        self.command.send_seek(frame);
        self.command.wait_seek_done();
    }
}

impl Drop for MtPipeline {
    fn drop(&mut self) {
        // Shutdown order per §4.5 "Close": CLOSE, wake blocked dispatch (reset unblocks
        // `reserve`), join the reader thread; buffer pools and the queue drop afterward so the
        // reader can never reference freed pool state.
        log::debug!(
            "mt pipeline closing, decompressed pool element size {}",
            self.decompressed_pool.elem_size()
        );
        self.command.send_close();
        self.queue.reset();
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{SyntheticDiscReader, SyntheticDstDecoder};
    use std::marker::PhantomData;

    fn pipeline(start: u32, end: u32) -> MtPipeline {
        let reader = SyntheticDiscReader::stereo_two_tracks();
        let factory: Arc<dyn DstDecoderFactory> = Arc::new(PhantomData::<SyntheticDstDecoder>);
        let pool = Arc::new(WorkerPool::new(2));
        MtPipeline::start(Box::new(reader), factory, pool, 2, start, end)
    }

    #[test]
    fn delivers_frames_in_order_then_eof() {
        let p = pipeline(0, 5);
        let mut last_frame = None;
        for _ in 0..5 {
            let result = p.next_result_wait();
            assert!(!result.is_eof);
            assert_eq!(result.error_code, 0);
            assert!(!result.data().is_empty());
            last_frame = Some(result.data().to_vec());
        }
        assert!(last_frame.is_some());
        let eof = p.next_result_wait();
        assert!(eof.is_eof);
    }

    #[test]
    fn seek_resets_stream_position() {
        let p = pipeline(0, 10);
        let _ = p.next_result_wait();
        let _ = p.next_result_wait();
        p.seek(0);
        let after_seek = p.next_result_wait();
        assert!(!after_seek.is_eof);
    }

    #[test]
    fn decoded_frames_are_served_from_one_shared_pool() {
        let p = pipeline(0, 8);
        assert_eq!(p.decompressed_pool.elem_size(), 2 * crate::SACD_FRAME_SIZE);

        // Every decoded frame's buffer must come from the same pool, not a fresh one-off
        // allocation per frame.
        for _ in 0..8 {
            let result = p.next_result_wait();
            assert!(!result.is_eof);
            let buf = result.decompressed.as_ref().unwrap();
            assert_eq!(buf.len(), p.decompressed_pool.elem_size());
        }
    }
}
