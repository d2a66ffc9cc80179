//! Fixed capacity byte buffers used by the SPI framer and the socket receive path
use heapless::Deque;

/// Byte ring buffer. Pushing into a full buffer overwrites the oldest byte, so producers never block.
pub struct RingBuffer<const N: usize> {
    inner: Deque<u8, N>,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self { inner: Deque::new() }
    }

    /// Appends a byte, dropping the oldest one if the buffer is full
    pub fn push(&mut self, byte: u8) {
        if self.inner.is_full() {
            self.inner.pop_front();
        }

        // Space was made above, so this never fails
        let _ = self.inner.push_back(byte);
    }

    /// Takes the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        self.inner.pop_front()
    }

    /// True if at least one byte is buffered
    pub fn available(&self) -> bool {
        !self.inner.is_empty()
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Discards all buffered bytes
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Helper for filling a receive buffer chunk by chunk
pub(crate) struct Buffer<'a> {
    buffer: &'a mut [u8],

    /// Max. length of a single chunk
    chunk_size: usize,

    /// Next buffer index to start inserting data
    position: usize,
}

impl<'a> Buffer<'a> {
    pub fn new(buffer: &'a mut [u8], chunk_size: usize) -> Self {
        Self {
            buffer,
            chunk_size,
            position: 0,
        }
    }

    /// Returns the length of next chunk based on max. chunk_size and available buffer space
    pub fn get_next_length(&self) -> usize {
        let buffer_space = self.buffer_space();

        if buffer_space > self.chunk_size {
            return self.chunk_size;
        }

        buffer_space
    }

    /// Returns the writable region for the next chunk
    pub fn next_chunk(&mut self) -> &mut [u8] {
        let end = self.position + self.get_next_length();
        &mut self.buffer[self.position..end]
    }

    /// Marks the given number of bytes of the current chunk as filled
    pub fn advance(&mut self, length: usize) {
        self.position += length.min(self.buffer_space());
    }

    /// Returns true if the buffer is completely filled
    pub fn is_full(&self) -> bool {
        if self.buffer.is_empty() {
            return true;
        }

        self.position >= self.buffer.len()
    }

    /// Returns the remaining free buffer space
    fn buffer_space(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Returns the current fill length
    pub(crate) fn len(&self) -> usize {
        self.position
    }
}
