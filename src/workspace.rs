//! Codec scratch space and the pool that hands it out.
//!
//! Grounded in `original_source/src/memory/object_allocator.h`'s
//! `ObjectAllocator<T>`: a bounded pool with a soft `base_capacity`, a hard
//! `burst_multiplier` ceiling, and a `reserve` of objects kept warm.
//! `acquire()` blocks once the burst ceiling is hit rather than growing
//! without bound, and releases wake one waiter. There is no
//! equivalent (it allocates codec buffers inline per call); this is ported
//! straight from `original_source` since every pipeline codec needs the
//! same two-scratch-buffer shape the C++ `Workspace` types share.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex};

/// A byte buffer whose backing allocation starts on a 64-byte boundary,
/// mirroring `terraputix-omfiles-rs`'s `AlignToSixtyFour`: the `repr(align)`
/// sits on the wrapper struct, not the heap allocation the inner `Vec`
/// controls, so this pins the *handle*, not the bytes. Kept in that shape
/// anyway since it is the same approximation `original_source`'s own
/// workspace buffers settle for.
#[repr(C, align(64))]
#[derive(Default)]
pub struct AlignedBytes(Vec<u8>);

impl AlignedBytes {
    fn new() -> Self {
        Self(Vec::new())
    }

    /// Clears then grows to exactly `len` bytes, zero-filled, reusing the
    /// existing allocation when its capacity already covers `len`.
    fn stage(&mut self, len: usize) -> &mut [u8] {
        self.0.clear();
        self.0.resize(len, 0);
        &mut self.0
    }
}

impl Deref for AlignedBytes {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl DerefMut for AlignedBytes {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

/// Two growable scratch buffers, reused across chunks to avoid a fresh
/// allocation per `encode`/`decode` call. Mirrors the paired `buffer_a_`/
/// `buffer_b_` members every `*CodecWorkspace` struct in `original_source`
/// carries (one for the demoted/shuffled intermediate, one for the
/// compressed output staging area).
pub struct Workspace {
    pub buffer_a: AlignedBytes,
    pub buffer_b: AlignedBytes,
}

impl Workspace {
    pub fn new() -> Self {
        Self { buffer_a: AlignedBytes::new(), buffer_b: AlignedBytes::new() }
    }

    /// Stages `len` bytes into `buffer_a`, returning it as a mutable slice
    /// for the caller to fill in place. The pipeline's primary scratch
    /// buffer — the post-transform, pre-shuffle/pre-compress byte stream.
    pub fn stage_a(&mut self, len: usize) -> &mut [u8] {
        self.buffer_a.stage(len)
    }

    /// Stages `len` bytes into `buffer_b`, the secondary scratch buffer —
    /// the post-shuffle byte stream handed to the entropy coder, or the
    /// pre-unshuffle byte stream read back from it.
    pub fn stage_b(&mut self, len: usize) -> &mut [u8] {
        self.buffer_b.stage(len)
    }

    /// Stages both buffers at once and returns disjoint mutable slices into
    /// each. Needed wherever a transform reads one scratch buffer while
    /// writing the other (shuffle/unshuffle) — two sequential `stage_a`/
    /// `stage_b` calls would each reborrow `self` and couldn't be held live
    /// at the same time.
    pub fn stage_ab(&mut self, len_a: usize, len_b: usize) -> (&mut [u8], &mut [u8]) {
        self.buffer_a.stage(len_a);
        self.buffer_b.stage(len_b);
        (&mut self.buffer_a.0, &mut self.buffer_b.0)
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

struct PoolState {
    idle: VecDeque<Workspace>,
    in_use: usize,
    capacity: usize,
    base_capacity: usize,
}

/// A bounded pool of [`Workspace`]s.
///
/// - `base_capacity` objects are kept warm, pre-allocated, up front.
/// - `acquire()` may grow the pool beyond `base_capacity` up to
///   `base_capacity * burst_multiplier` objects total, to absorb bursts of
///   concurrent pipeline calls.
/// - Once `in_use == capacity`, `acquire()` blocks on a condvar until a
///   `WorkspaceHandle` is dropped and releases one back.
pub struct WorkspacePool {
    state: Mutex<PoolState>,
    not_empty: Condvar,
}

impl WorkspacePool {
    pub fn new(base_capacity: usize, burst_multiplier: usize, reserve: usize) -> Arc<Self> {
        let capacity = base_capacity.saturating_mul(burst_multiplier.max(1));
        let mut idle = VecDeque::with_capacity(base_capacity);
        for _ in 0..base_capacity.max(reserve) {
            idle.push_back(Workspace::new());
        }
        Arc::new(Self {
            state: Mutex::new(PoolState { idle, in_use: 0, capacity, base_capacity }),
            not_empty: Condvar::new(),
        })
    }

    /// Blocking acquire: returns immediately if an idle workspace exists or
    /// the pool hasn't hit its burst ceiling; otherwise blocks until a
    /// handle is released.
    pub fn acquire(self: &Arc<Self>) -> WorkspaceHandle {
        let mut guard = self.state.lock().expect("workspace pool mutex poisoned");
        loop {
            if let Some(ws) = guard.idle.pop_front() {
                guard.in_use += 1;
                return WorkspaceHandle { pool: Arc::clone(self), workspace: Some(ws) };
            }
            if guard.in_use < guard.capacity {
                guard.in_use += 1;
                return WorkspaceHandle {
                    pool: Arc::clone(self),
                    workspace: Some(Workspace::new()),
                };
            }
            guard = self
                .not_empty
                .wait(guard)
                .expect("workspace pool mutex poisoned while waiting");
        }
    }

    pub fn available(&self) -> usize {
        let guard = self.state.lock().expect("workspace pool mutex poisoned");
        guard.capacity - guard.in_use
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().expect("workspace pool mutex poisoned").in_use
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().expect("workspace pool mutex poisoned").capacity
    }

    /// Returns `ws` to the idle queue iff the pool's idle count is still
    /// below `base_capacity`; otherwise `ws` is dropped here, destroying it,
    /// so burst-allocated workspaces don't linger once the burst subsides.
    fn release(&self, ws: Workspace) {
        let mut guard = self.state.lock().expect("workspace pool mutex poisoned");
        guard.in_use -= 1;
        if guard.idle.len() < guard.base_capacity {
            guard.idle.push_back(ws);
        }
        drop(guard);
        self.not_empty.notify_one();
    }
}

/// RAII handle returned by [`WorkspacePool::acquire`]. Releases the
/// workspace back to the pool on drop, mirroring the
/// `original_source`-present move-only `Releaser` functor.
pub struct WorkspaceHandle {
    pool: Arc<WorkspacePool>,
    workspace: Option<Workspace>,
}

impl std::ops::Deref for WorkspaceHandle {
    type Target = Workspace;
    fn deref(&self) -> &Workspace {
        self.workspace.as_ref().expect("workspace taken before drop")
    }
}

impl std::ops::DerefMut for WorkspaceHandle {
    fn deref_mut(&mut self) -> &mut Workspace {
        self.workspace.as_mut().expect("workspace taken before drop")
    }
}

impl Drop for WorkspaceHandle {
    fn drop(&mut self) {
        if let Some(ws) = self.workspace.take() {
            self.pool.release(ws);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_release_accounting_round_trips() {
        let pool = WorkspacePool::new(2, 2, 0);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.in_use(), 0);
        let h1 = pool.acquire();
        assert_eq!(pool.in_use(), 1);
        let h2 = pool.acquire();
        assert_eq!(pool.in_use(), 2);
        drop(h1);
        assert_eq!(pool.in_use(), 1);
        drop(h2);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn acquire_blocks_at_burst_capacity_and_wakes_on_release() {
        let pool = WorkspacePool::new(1, 1, 0);
        assert_eq!(pool.capacity(), 1);
        let h1 = pool.acquire();

        let woke = Arc::new(AtomicBool::new(false));
        let woke_clone = Arc::clone(&woke);
        let pool_clone = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            let _h2 = pool_clone.acquire();
            woke_clone.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!woke.load(Ordering::SeqCst));

        drop(h1);
        handle.join().unwrap();
        assert!(woke.load(Ordering::SeqCst));
    }

    #[test]
    fn burst_workspaces_are_destroyed_not_pooled_beyond_base_capacity() {
        let pool = WorkspacePool::new(1, 4, 0);
        assert_eq!(pool.capacity(), 4);
        let handles: Vec<_> = (0..4).map(|_| pool.acquire()).collect();
        assert_eq!(pool.in_use(), 4);
        drop(handles);
        assert_eq!(pool.in_use(), 0);

        let guard = pool.state.lock().expect("workspace pool mutex poisoned");
        assert!(guard.idle.len() <= guard.base_capacity);
    }
}
