//! # SPSC Ring Buffer
//!
//! Fixed-capacity circular buffer that hands samples from the sampling
//! interrupt (producer) to the main loop (consumer) without locks.
//!
//! ## Design
//!
//! 1. **Static Allocation**: Storage is an inline array sized at compile
//!    time and the constructor is `const`. Splitting needs `&mut`, so an
//!    interrupt-fed buffer lives in a `static mut` that is borrowed once
//!    at start-up (see [`RingBuffer::split`]).
//!
//! 2. **Lock-Free Access**: Each side owns one atomic cursor. The producer
//!    writes a slot and then publishes its cursor with `Release`; the
//!    consumer loads that cursor with `Acquire` before reading the slot.
//!
//! 3. **One Empty Slot**: Full and empty are told apart from the cursors
//!    alone, so `N` slots hold at most `N - 1` items and no count is stored.
//!
//! 4. **Bounded Time**: No operation blocks, spins or allocates.
//!
//! ## Memory Layout
//!
//! ```text
//! ┌──────────┬───────────────────────┬──────────────────────────┐
//! │  free    │    readable items     │          free            │
//! └──────────┴───────────────────────┴──────────────────────────┘
//!            ▲                       ▲
//!          read                    write
//!     (consumer only)         (producer only)
//! ```
//!
//! Use one buffer per input source. [`RingBuffer::split`] hands out the
//! [`Producer`] and [`Consumer`] roles so a second writer cannot exist.

use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Errors specific to buffer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Attempted to push into a full buffer
    Overflow,
    /// Attempted to consume from an empty buffer
    Underflow,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Overflow => f.write_str("ring buffer is full"),
            BufferError::Underflow => f.write_str("ring buffer is empty"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BufferError {}

/// Lock-free single-producer single-consumer ring buffer
///
/// `N` is the number of slots; the usable capacity is `N - 1`.
///
/// # Example
///
/// ```rust
/// use sample_stream::buffer::RingBuffer;
///
/// let mut buffer: RingBuffer<i16, 4> = RingBuffer::new();
/// let (mut producer, mut consumer) = buffer.split();
///
/// // Sampling interrupt
/// producer.push(100).unwrap();
/// producer.push(-50).unwrap();
///
/// // Main loop
/// assert_eq!(consumer.pop(), Some(100));
/// assert_eq!(consumer.pop(), Some(-50));
/// assert_eq!(consumer.pop(), None);
/// ```
pub struct RingBuffer<T, const N: usize> {
    /// Slot storage; a slot is initialised before the write cursor passes it
    slots: UnsafeCell<[MaybeUninit<T>; N]>,

    /// Next slot to write, in `0..N`; stored only by the producer
    write: AtomicUsize,

    /// Next slot to read, in `0..N`; stored only by the consumer
    read: AtomicUsize,
}

// SAFETY: slot access only happens through the producer and consumer paths,
// which are reachable either through `&mut RingBuffer` or through the unique
// `Producer`/`Consumer` pair handed out by `split`. The cursor protocol keeps
// the two sides on disjoint slots.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    const MIN_SLOTS: () = assert!(N >= 2, "a ring buffer needs at least two slots");

    /// Create a new empty buffer
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::MIN_SLOTS;
        Self {
            // SAFETY: an array of `MaybeUninit` needs no initialisation.
            slots: UnsafeCell::new(unsafe { MaybeUninit::uninit().assume_init() }),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    /// Maximum number of items the buffer can hold (`N - 1`)
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of occupied slots
    #[inline]
    pub fn count(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        Self::distance(read, write)
    }

    /// Number of items that can still be pushed
    #[inline]
    pub fn space(&self) -> usize {
        (N - 1) - self.count()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Check if the buffer is full
    #[inline]
    pub fn is_full(&self) -> bool {
        self.space() == 0
    }

    /// Split into the producer and consumer halves
    ///
    /// The halves borrow the buffer, so while they exist nothing else can
    /// push or pop. Each half is `Send` and may move to its own context.
    ///
    /// For an interrupt producer, borrow a `static mut` buffer exactly once
    /// before interrupts are enabled; both halves are then `'static`:
    ///
    /// ```rust
    /// use core::ptr::addr_of_mut;
    /// use sample_stream::{Consumer, Producer, RingBuffer};
    ///
    /// static mut CHANNEL_0: RingBuffer<i16, 256> = RingBuffer::new();
    ///
    /// // SAFETY: the only reference ever taken to `CHANNEL_0`.
    /// let buffer: &'static mut RingBuffer<i16, 256> = unsafe { &mut *addr_of_mut!(CHANNEL_0) };
    /// let (mut producer, mut consumer): (Producer<'static, i16, 256>, Consumer<'static, i16, 256>) =
    ///     buffer.split();
    ///
    /// producer.push(3).unwrap();
    /// assert_eq!(consumer.pop(), Some(3));
    /// ```
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let buffer: &Self = self;
        (Producer { buffer }, Consumer { buffer })
    }

    /// Push one item, failing without side effects when full
    pub fn push(&mut self, item: T) -> Result<(), BufferError> {
        self.enqueue(item)
    }

    /// Push as many of `items` as fit; returns the number pushed
    pub fn push_slice(&mut self, items: &[T]) -> usize {
        self.enqueue_slice(items)
    }

    /// Return the oldest item without removing it
    pub fn peek(&mut self) -> Option<T> {
        self.front()
    }

    /// Remove and return the oldest item
    pub fn pop(&mut self) -> Option<T> {
        self.dequeue()
    }

    /// Pop up to `out.len()` items into `out`; returns the number popped
    pub fn pop_slice(&mut self, out: &mut [T]) -> usize {
        self.dequeue_slice(out)
    }

    /// Drop the oldest item without reading it
    pub fn skip(&mut self) -> Result<(), BufferError> {
        self.advance_read()
    }

    /// Empty the buffer in O(1)
    pub fn clear(&mut self) {
        self.discard_all()
    }

    #[inline]
    const fn distance(from: usize, to: usize) -> usize {
        if to >= from {
            to - from
        } else {
            to + N - from
        }
    }

    #[inline]
    const fn wrap(index: usize) -> usize {
        if index >= N {
            index - N
        } else {
            index
        }
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut T {
        debug_assert!(index < N);
        // `MaybeUninit<T>` has the layout of `T`.
        self.slots.get().cast::<T>().wrapping_add(index)
    }

    // Producer side. Callers must hold the producer role.

    fn enqueue(&self, item: T) -> Result<(), BufferError> {
        let write = self.write.load(Ordering::Relaxed);
        let next = Self::wrap(write + 1);
        if next == self.read.load(Ordering::Acquire) {
            return Err(BufferError::Overflow);
        }

        // SAFETY: `write` is in bounds and not readable by the consumer
        // until the cursor below is published.
        unsafe { ptr::write(self.slot(write), item) };
        self.write.store(next, Ordering::Release);
        Ok(())
    }

    fn enqueue_slice(&self, items: &[T]) -> usize {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let space = (N - 1) - Self::distance(read, write);
        let len = items.len().min(space);
        if len == 0 {
            return 0;
        }

        // Copy up to the physical end, then wrap to the start.
        let first_len = (N - write).min(len);
        // SAFETY: both ranges are in bounds, lie in the free region and
        // cannot overlap the caller's slice.
        unsafe {
            ptr::copy_nonoverlapping(items.as_ptr(), self.slot(write), first_len);
            ptr::copy_nonoverlapping(items.as_ptr().add(first_len), self.slot(0), len - first_len);
        }

        self.write
            .store(Self::wrap(write + len), Ordering::Release);
        len
    }

    // Consumer side. Callers must hold the consumer role.

    fn front(&self) -> Option<T> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the slot was initialised before `write` moved past it.
        Some(unsafe { ptr::read(self.slot(read)) })
    }

    fn dequeue(&self) -> Option<T> {
        let item = self.front()?;
        let read = self.read.load(Ordering::Relaxed);
        self.read.store(Self::wrap(read + 1), Ordering::Release);
        Some(item)
    }

    fn dequeue_slice(&self, out: &mut [T]) -> usize {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        let len = out.len().min(Self::distance(read, write));
        if len == 0 {
            return 0;
        }

        let first_len = (N - read).min(len);
        // SAFETY: both ranges are in bounds and initialised.
        unsafe {
            ptr::copy_nonoverlapping(self.slot(read), out.as_mut_ptr(), first_len);
            ptr::copy_nonoverlapping(self.slot(0), out.as_mut_ptr().add(first_len), len - first_len);
        }

        self.read.store(Self::wrap(read + len), Ordering::Release);
        len
    }

    fn advance_read(&self) -> Result<(), BufferError> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return Err(BufferError::Underflow);
        }
        self.read.store(Self::wrap(read + 1), Ordering::Release);
        Ok(())
    }

    fn discard_all(&self) {
        let write = self.write.load(Ordering::Acquire);
        self.read.store(write, Ordering::Release);
    }
}

impl<T: Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for RingBuffer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("slots", &N)
            .field("write", &self.write.load(Ordering::Relaxed))
            .field("read", &self.read.load(Ordering::Relaxed))
            .finish()
    }
}

/// Writing half of a [`RingBuffer`], owned by the sampling context
pub struct Producer<'a, T, const N: usize> {
    buffer: &'a RingBuffer<T, N>,
}

impl<T: Copy, const N: usize> Producer<'_, T, N> {
    /// Push one item, failing without side effects when full
    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), BufferError> {
        self.buffer.enqueue(item)
    }

    /// Push as many of `items` as fit; returns the number pushed
    ///
    /// Items that do not fit are dropped. Compare the return value with
    /// `items.len()` to account for them.
    #[inline]
    pub fn push_slice(&mut self, items: &[T]) -> usize {
        self.buffer.enqueue_slice(items)
    }

    /// Number of items waiting for the consumer
    #[inline]
    pub fn count(&self) -> usize {
        self.buffer.count()
    }

    /// Number of items that can still be pushed
    #[inline]
    pub fn space(&self) -> usize {
        self.buffer.space()
    }

    /// Maximum number of items the buffer can hold
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

/// Reading half of a [`RingBuffer`], owned by the main loop
pub struct Consumer<'a, T, const N: usize> {
    buffer: &'a RingBuffer<T, N>,
}

impl<T: Copy, const N: usize> Consumer<'_, T, N> {
    /// Return the oldest item without removing it
    #[inline]
    pub fn peek(&self) -> Option<T> {
        self.buffer.front()
    }

    /// Remove and return the oldest item
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.buffer.dequeue()
    }

    /// Pop up to `out.len()` items into `out`; returns the number popped
    #[inline]
    pub fn pop_slice(&mut self, out: &mut [T]) -> usize {
        self.buffer.dequeue_slice(out)
    }

    /// Drop the oldest item without reading it
    #[inline]
    pub fn skip(&mut self) -> Result<(), BufferError> {
        self.buffer.advance_read()
    }

    /// Empty the buffer in O(1); stored values are left in place
    #[inline]
    pub fn clear(&mut self) {
        self.buffer.discard_all()
    }

    /// Number of items ready to pop
    #[inline]
    pub fn count(&self) -> usize {
        self.buffer.count()
    }

    /// Number of items the producer can still push
    #[inline]
    pub fn space(&self) -> usize {
        self.buffer.space()
    }

    /// Check if there is nothing to pop
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
