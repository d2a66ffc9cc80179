use core::fmt::Debug;

/// Framed, buffered bus towards the module.
///
/// Bytes are exchanged in frames: a frame is pulled from the module into the inbound buffer
/// (or straight into a caller buffer), and outbound bytes are queued and pushed in one frame.
/// Implemented by [BufferedSpi](crate::spi::BufferedSpi).
pub trait Bus {
    type Error: Debug;

    /// True if the inbound buffer holds at least one byte
    fn readable(&self) -> bool;

    /// True if a byte may be queued. The outbound buffer overwrites, so this is usually always true.
    fn writeable(&self) -> bool;

    /// Takes the next inbound byte
    fn getc(&mut self) -> Option<u8>;

    /// Queues an outbound byte without starting a bus transaction
    fn putc(&mut self, byte: u8);

    /// Discards all inbound bytes
    fn flush_rx(&mut self);

    /// Number of queued outbound bytes
    fn queued(&self) -> usize;

    /// Capacity of the outbound buffer
    fn tx_capacity(&self) -> usize;

    /// Replaces the outbound queue by the given data and transmits it in one frame
    fn write_frame(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Transmits all queued outbound bytes in one frame
    fn send_queued(&mut self) -> Result<usize, Self::Error>;

    /// Pulls one frame into the inbound buffer, storing at most `max` bytes. Returns the stored length.
    fn read_frame(&mut self, max: Option<usize>) -> Result<usize, Self::Error>;

    /// Pulls one frame directly into the given buffer, bypassing the inbound buffer
    fn read_frame_into(&mut self, data: &mut [u8]) -> Result<usize, Self::Error>;
}
