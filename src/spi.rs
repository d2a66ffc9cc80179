//! # Buffered SPI framer
//!
//! The ISM43362 talks over a half duplex SPI bus in 16 bit words. A data-ready line signals that the
//! module either accepts a command or has a reply pending, and the chip select (NSS) line gates every
//! transaction.
//!
//! [BufferedSpi] turns this into a byte stream with independent inbound and outbound ring buffers:
//! * Sending waits for data-ready, selects the module and pushes all queued bytes as little endian
//!   word pairs. Odd lengths are padded with `\n`.
//! * Receiving waits for data-ready and pulls words as long as the line stays asserted. The `\r\n`
//!   every reply starts with is dropped. A word with the high byte `0x15` on the last transfer
//!   marks the end of the frame and carries at most one more data byte.
//!
//! NSS is released on every exit path, including bus errors.
use crate::buffer::RingBuffer;
use crate::bus::Bus;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

/// Leading `\r\n` of every reply as received word
const LEADING_CRLF: u16 = 0x0A0D;

/// High byte signaling the last word of a frame
const END_OF_FRAME: u16 = 0x1500;

/// Byte used for padding odd frames
const PADDING: u8 = b'\n';

/// Settle time after toggling NSS
const NSS_SETTLE_US: u32 = 15;

/// Extra time given to the module after receiving a end-of-frame word
const END_OF_FRAME_WAIT_US: u32 = 100;

/// Power-up prompt of the module
const PROMPT: [u16; 3] = [0x1515, 0x0A0D, 0x203E];

/// SPI framing errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Upstream SPI bus error
    Spi,

    /// Error while driving NSS or reading the data-ready line
    Pin,

    /// Data-ready was not asserted within the configured poll limit
    NotReady,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi => defmt::write!(f, "Error::Spi"),
            Error::Pin => defmt::write!(f, "Error::Pin"),
            Error::NotReady => defmt::write!(f, "Error::NotReady"),
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::NotReady => embedded_io::ErrorKind::TimedOut,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

/// Physical lines of the module
struct Link<SPI, NSS, DR, D> {
    spi: SPI,
    nss: NSS,
    data_ready: DR,
    delay: D,

    /// Max. number of data-ready polls before giving up. None = wait forever.
    ready_poll_limit: Option<u32>,
}

impl<SPI: SpiBus<u16>, NSS: OutputPin, DR: InputPin, D: DelayNs> Link<SPI, NSS, DR, D> {
    fn select(&mut self) -> Result<(), Error> {
        self.nss.set_low().map_err(|_| Error::Pin)?;
        self.delay.delay_us(NSS_SETTLE_US);
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Error> {
        self.nss.set_high().map_err(|_| Error::Pin)?;
        self.delay.delay_us(NSS_SETTLE_US);
        Ok(())
    }

    /// Runs the given transaction with NSS asserted. NSS is released afterwards in any case.
    fn selected<R>(&mut self, transaction: impl FnOnce(&mut Self) -> Result<R, Error>) -> Result<R, Error> {
        let result = self.select().and_then(|_| transaction(self));
        let released = self.deselect();

        match (result, released) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(error)) => Err(error),
            (Err(error), _) => Err(error),
        }
    }

    fn is_ready(&mut self) -> Result<bool, Error> {
        self.data_ready.is_high().map_err(|_| Error::Pin)
    }

    /// Polls the data-ready line until asserted
    fn wait_ready(&mut self) -> Result<(), Error> {
        let mut polls: u32 = 0;

        while !self.is_ready()? {
            polls = polls.saturating_add(1);

            if let Some(limit) = self.ready_poll_limit {
                if polls >= limit {
                    return Err(Error::NotReady);
                }
            }
        }

        Ok(())
    }

    /// Full duplex transfer of a single word
    fn transfer(&mut self, word: u16) -> Result<u16, Error> {
        let mut words = [word];
        self.spi.transfer_in_place(&mut words).map_err(|_| Error::Spi)?;
        Ok(words[0])
    }

    /// Receives a single frame and hands every data byte to the sink.
    /// At most `max` bytes are taken, remaining words are still clocked out.
    fn receive(&mut self, max: Option<usize>, mut sink: impl FnMut(u8)) -> Result<usize, Error> {
        self.deselect()?;
        self.wait_ready()?;

        self.selected(|link| {
            let has_room = |len: usize| max.map_or(true, |max| len < max);
            let mut len = 0;

            while link.is_ready()? {
                let word = link.transfer(0)?;
                let end_of_frame = word & 0xFF00 == END_OF_FRAME;

                if end_of_frame {
                    link.delay.delay_us(END_OF_FRAME_WAIT_US);
                }

                if !link.is_ready()? && end_of_frame {
                    if has_room(len) {
                        sink((word & 0xFF) as u8);
                        len += 1;
                    }
                    break;
                }

                if !(len == 0 && word == LEADING_CRLF) && has_room(len) {
                    sink((word & 0xFF) as u8);
                    sink((word >> 8) as u8);
                    len += 2;
                }
            }

            Ok(len)
        })
    }
}

/// Buffered byte stream over the SPI bus of the ISM43362
///
/// RX_SIZE: Capacity of the inbound ring buffer in bytes.
///
/// TX_SIZE: Capacity of the outbound ring buffer in bytes. Larger frames overwrite their beginning.
pub struct BufferedSpi<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> {
    link: Link<SPI, NSS, DR, D>,

    /// Inbound bytes
    rx: RingBuffer<RX_SIZE>,

    /// Outbound bytes
    tx: RingBuffer<TX_SIZE>,
}

impl<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> BufferedSpi<SPI, NSS, DR, D, RX_SIZE, TX_SIZE>
where
    SPI: SpiBus<u16>,
    NSS: OutputPin,
    DR: InputPin,
    D: DelayNs,
{
    /// Creates a new framer. The SPI bus needs to be configured for 16 bit words, mode 0.
    pub fn new(spi: SPI, nss: NSS, data_ready: DR, delay: D) -> Self {
        Self {
            link: Link {
                spi,
                nss,
                data_ready,
                delay,
                ready_poll_limit: None,
            },
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
        }
    }

    /// Limits the number of data-ready polls. None (default) waits forever.
    pub fn set_ready_poll_limit(&mut self, limit: Option<u32>) {
        self.link.ready_poll_limit = limit;
    }

    /// Asserts NSS
    pub fn enable_nss(&mut self) -> Result<(), Error> {
        self.link.select()
    }

    /// Releases NSS
    pub fn disable_nss(&mut self) -> Result<(), Error> {
        self.link.deselect()
    }

    /// Current level of the data-ready line
    pub fn data_ready(&mut self) -> Result<bool, Error> {
        self.link.is_ready()
    }

    /// Clocks out a single word, stores both bytes in the inbound buffer and returns the word
    pub fn get16b(&mut self) -> Result<u16, Error> {
        let word = self.link.transfer(0)?;
        self.rx.push((word & 0xFF) as u8);
        self.rx.push((word >> 8) as u8);
        Ok(word)
    }

    /// Reads the power-up prompt. Returns true if the module sent the expected prompt.
    pub fn check_prompt(&mut self) -> Result<bool, Error> {
        let mut prompt = [0u16; PROMPT.len()];

        let count = self.link.selected(|link| {
            let mut count = 0;
            while link.is_ready()? {
                let word = link.transfer(0)?;
                if count < prompt.len() {
                    prompt[count] = word;
                }
                count += 1;
            }
            Ok(count)
        })?;

        let valid = count >= PROMPT.len() && prompt == PROMPT;
        if !valid {
            warn!("Unexpected prompt, received {} words", count);
        }

        Ok(valid)
    }

    /// Discards all queued outbound bytes
    pub fn flush_tx(&mut self) {
        self.tx.clear();
    }

    /// Writes all queued outbound bytes as word pairs
    fn transmit_queued(link: &mut Link<SPI, NSS, DR, D>, tx: &mut RingBuffer<TX_SIZE>) -> Result<usize, Error> {
        let mut sent = 0;

        while let Some(low) = tx.pop() {
            let high = tx.pop().unwrap_or(PADDING);
            link.transfer(low as u16 | (high as u16) << 8)?;
            sent += 2;
        }

        trace!("SPI sent {} bytes", sent);
        Ok(sent)
    }
}

impl<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> Bus for BufferedSpi<SPI, NSS, DR, D, RX_SIZE, TX_SIZE>
where
    SPI: SpiBus<u16>,
    NSS: OutputPin,
    DR: InputPin,
    D: DelayNs,
{
    type Error = Error;

    fn readable(&self) -> bool {
        self.rx.available()
    }

    fn writeable(&self) -> bool {
        true
    }

    fn getc(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    fn putc(&mut self, byte: u8) {
        self.tx.push(byte);
    }

    fn flush_rx(&mut self) {
        self.rx.clear();
    }

    fn queued(&self) -> usize {
        self.tx.len()
    }

    fn tx_capacity(&self) -> usize {
        TX_SIZE
    }

    fn write_frame(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.tx.clear();
        self.link.wait_ready()?;

        let tx = &mut self.tx;
        self.link.selected(|link| {
            if data.is_empty() {
                return Ok(0);
            }

            for byte in data {
                tx.push(*byte);
            }

            if data.len() % 2 != 0 {
                tx.push(PADDING);
            }

            Self::transmit_queued(link, tx)?;
            Ok(data.len())
        })
    }

    fn send_queued(&mut self) -> Result<usize, Error> {
        self.link.wait_ready()?;

        let tx = &mut self.tx;
        self.link.selected(|link| {
            if tx.len() % 2 != 0 {
                tx.push(PADDING);
            }

            Self::transmit_queued(link, tx)
        })
    }

    fn read_frame(&mut self, max: Option<usize>) -> Result<usize, Error> {
        let rx = &mut self.rx;
        let len = self.link.receive(max, |byte| rx.push(byte))?;

        trace!("SPI read {} bytes", len);
        Ok(len)
    }

    fn read_frame_into(&mut self, data: &mut [u8]) -> Result<usize, Error> {
        let mut position = 0;
        let len = self.link.receive(Some(data.len()), |byte| {
            if position < data.len() {
                data[position] = byte;
                position += 1;
            }
        })?;

        trace!("SPI streamed {} bytes", len);
        Ok(position)
    }
}

impl<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> embedded_io::ErrorType
    for BufferedSpi<SPI, NSS, DR, D, RX_SIZE, TX_SIZE>
{
    type Error = Error;
}

impl<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> embedded_io::Read
    for BufferedSpi<SPI, NSS, DR, D, RX_SIZE, TX_SIZE>
where
    SPI: SpiBus<u16>,
    NSS: OutputPin,
    DR: InputPin,
    D: DelayNs,
{
    /// Returns buffered bytes. If nothing is buffered, a frame is pulled first.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.rx.available() {
            self.read_frame(None)?;
        }

        let mut count = 0;
        while count < buf.len() {
            match self.rx.pop() {
                Some(byte) => buf[count] = byte,
                None => break,
            }
            count += 1;
        }

        Ok(count)
    }
}

impl<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> embedded_io::Write
    for BufferedSpi<SPI, NSS, DR, D, RX_SIZE, TX_SIZE>
where
    SPI: SpiBus<u16>,
    NSS: OutputPin,
    DR: InputPin,
    D: DelayNs,
{
    /// Queues as many bytes as fit into the outbound buffer and transmits them in one frame
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let space = TX_SIZE - self.tx.len();
        let length = buf.len().min(space);

        for byte in &buf[..length] {
            self.tx.push(*byte);
        }

        self.send_queued()?;
        Ok(length)
    }

    fn flush(&mut self) -> Result<(), Error> {
        if self.tx.available() {
            self.send_queued()?;
        }
        Ok(())
    }
}

impl<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> embedded_io::ReadReady
    for BufferedSpi<SPI, NSS, DR, D, RX_SIZE, TX_SIZE>
where
    SPI: SpiBus<u16>,
    NSS: OutputPin,
    DR: InputPin,
    D: DelayNs,
{
    fn read_ready(&mut self) -> Result<bool, Error> {
        Ok(self.rx.available())
    }
}

impl<SPI, NSS, DR, D, const RX_SIZE: usize, const TX_SIZE: usize> embedded_io::WriteReady
    for BufferedSpi<SPI, NSS, DR, D, RX_SIZE, TX_SIZE>
where
    SPI: SpiBus<u16>,
    NSS: OutputPin,
    DR: InputPin,
    D: DelayNs,
{
    fn write_ready(&mut self) -> Result<bool, Error> {
        Ok(true)
    }
}
