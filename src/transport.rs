use crate::bus::Bus;
use crate::parser::Error;
use fugit::TimerDurationU32;
use fugit_timer::Timer;

/// Framing overhead subtracted from every intermediate chunk of a bulk read
pub const DEFAULT_FRAME_OVERHEAD: usize = 2;

/// Byte stream on top of a framed [Bus], bounding every single byte wait by a timeout
pub struct Transport<B: Bus, T: Timer<TIMER_HZ>, const TIMER_HZ: u32> {
    /// Framed bus
    pub(crate) bus: B,

    /// Timer used for timeout measurement
    timer: T,

    /// Timeout of a single byte wait
    timeout: TimerDurationU32<TIMER_HZ>,

    /// Bytes subtracted from intermediate chunks of bulk reads
    frame_overhead: usize,
}

impl<B: Bus, T: Timer<TIMER_HZ>, const TIMER_HZ: u32> Transport<B, T, TIMER_HZ> {
    pub fn new(bus: B, timer: T, timeout_ms: u32) -> Self {
        Self {
            bus,
            timer,
            timeout: TimerDurationU32::millis(timeout_ms),
            frame_overhead: DEFAULT_FRAME_OVERHEAD,
        }
    }

    /// Sets the timeout of single byte waits in ms
    pub fn set_timeout_ms(&mut self, timeout: u32) {
        self.timeout = TimerDurationU32::millis(timeout);
    }

    pub fn set_frame_overhead(&mut self, overhead: usize) {
        self.frame_overhead = overhead;
    }

    pub fn frame_overhead(&self) -> usize {
        self.frame_overhead
    }

    pub fn readable(&self) -> bool {
        self.bus.readable()
    }

    pub fn writeable(&self) -> bool {
        self.bus.writeable()
    }

    /// Returns the next inbound byte. Fails with [Error::ChannelTimeout] if none arrives in time.
    pub fn getc(&mut self) -> Result<u8, Error> {
        if let Some(byte) = self.bus.getc() {
            return Ok(byte);
        }

        self.timer.start(self.timeout).map_err(|_| Error::TimerError)?;

        loop {
            if let Some(byte) = self.bus.getc() {
                return Ok(byte);
            }

            self.check_deadline()?;
        }
    }

    /// Queues a single outbound byte. Fails with [Error::ChannelTimeout] if the bus does not accept it in time.
    pub fn putc(&mut self, byte: u8) -> Result<(), Error> {
        if !self.bus.writeable() {
            self.timer.start(self.timeout).map_err(|_| Error::TimerError)?;

            while !self.bus.writeable() {
                self.check_deadline()?;
            }
        }

        self.bus.putc(byte);
        Ok(())
    }

    /// Discards all inbound bytes
    pub fn flush(&mut self) {
        self.bus.flush_rx();
    }

    /// Queues the given data and transmits it. Frames are limited to the outbound buffer capacity,
    /// so longer data is split over multiple frames. Already queued bytes are sent in front.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        if self.bus.tx_capacity() == 0 {
            return Err(Error::FormatOverflow);
        }

        let mut written = 0;

        loop {
            let space = self.bus.tx_capacity().saturating_sub(self.bus.queued());
            let end = written + space.min(data.len() - written);

            for byte in &data[written..end] {
                self.putc(*byte)?;
            }
            written = end;

            self.bus.send_queued().map_err(|_| Error::BusError)?;

            if written >= data.len() {
                return Ok(written);
            }
        }
    }

    /// Transmits the given bytes as a single frame
    pub fn transmit(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.bus.write_frame(data).map_err(|_| Error::BusError)
    }

    /// Pulls a single frame into the inbound buffer
    pub fn fetch(&mut self, max: Option<usize>) -> Result<usize, Error> {
        self.bus.read_frame(max).map_err(|_| Error::BusError)
    }

    /// Reads data in multiple frames. Intermediate chunks carry `chunk_capacity - overhead` bytes,
    /// the last chunk the remainder. Bytes are stored contiguously. Returns the total read length.
    pub fn read(&mut self, data: &mut [u8], chunk_capacity: usize) -> Result<usize, Error> {
        self.flush();
        let mut total = 0;

        for chunk_size in ReadChunks::new(data.len(), chunk_capacity, self.frame_overhead) {
            let received = self.fetch(Some(chunk_size))?;
            let length = received.min(chunk_size).min(data.len() - total);

            for i in 0..length {
                data[total + i] = self.getc()?;
            }

            total += length;
        }

        Ok(total)
    }

    /// Streams a single frame directly into the given buffer
    pub fn read_stream(&mut self, data: &mut [u8]) -> Result<usize, Error> {
        self.flush();
        self.bus.read_frame_into(data).map_err(|_| Error::BusError)
    }

    fn check_deadline(&mut self) -> Result<(), Error> {
        match self.timer.wait() {
            Ok(_) => Err(Error::ChannelTimeout),
            Err(nb::Error::WouldBlock) => Ok(()),
            Err(nb::Error::Other(_)) => Err(Error::TimerError),
        }
    }
}

/// Chunk sizes of a bulk read
///
/// `count = ceil(size / capacity)` (at least one), every chunk but the last is `capacity - overhead`
/// long, the last one `size - capacity * index`.
#[derive(Clone, Debug)]
pub struct ReadChunks {
    size: usize,
    capacity: usize,
    overhead: usize,
    count: usize,
    index: usize,
}

impl ReadChunks {
    pub fn new(size: usize, capacity: usize, overhead: usize) -> Self {
        let mut count = 1;

        if capacity > 0 && size > capacity {
            count = size / capacity;
            if size % capacity != 0 {
                count += 1;
            }
        }

        Self {
            size,
            capacity,
            overhead,
            count,
            index: 0,
        }
    }
}

impl Iterator for ReadChunks {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.index >= self.count {
            return None;
        }

        let chunk = if self.index < self.count - 1 {
            self.capacity.saturating_sub(self.overhead)
        } else {
            self.size.saturating_sub(self.capacity * self.index)
        };

        self.index += 1;
        Some(chunk)
    }
}
