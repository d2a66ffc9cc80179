//! # AT protocol engine
//!
//! Sends formatted command lines and matches the streamed response byte by byte against a response template.
//! Out-of-band notifications (OOB) may interleave with any response at any byte boundary: after every received
//! byte the current line is checked against all registered OOB prefixes first.
//!
//! Only a single command/response exchange may be in flight at a time. The engine does not lock internally,
//! so callers sharing it between threads need to serialize access, e.g. by
//! [SharedDriver](crate::shared::SharedDriver) (feature `shared`).
//!
//! ## Example
//!
//! ````
//! # use ism43362_at::example::{ExampleBus, ExampleTimer};
//! # use ism43362_at::parser::AtParser;
//! # use ism43362_at::pattern::{Arg, Capture};
//! #
//! let mut bus = ExampleBus::default();
//! bus.add_frame(b"+CME: 3\r\nOK\r\n> ");
//!
//! let mut parser: AtParser<_, _, (), 1_000_000, 256> = AtParser::new(bus, ExampleTimer::default());
//! parser.send("X=%d", &[Arg::Int(7)]).unwrap();
//!
//! let mut code = 0;
//! parser.recv("+CME: %d\r\nOK\r\n", &mut [Capture::Int(&mut code)]).unwrap();
//! assert_eq!(3, code);
//! ````
use crate::bus::Bus;
use crate::fmt::text;
use crate::oob::OobRegistry;
use crate::pattern::{self, Arg, Capture, Line};
use crate::transport::Transport;
use fugit_timer::Timer;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Default timeout of a single byte wait in ms
pub const DEFAULT_TIMEOUT_MS: u32 = 8_000;

/// Default line delimiter appended to every command
pub const DEFAULT_DELIMITER: &str = "\r\n";

/// Callback invoked when an OOB prefix matched. May call [AtParser::abort] or start nested exchanges.
pub type OobCallback<B, T, S, const TIMER_HZ: u32, const BUF_SIZE: usize> = fn(&mut AtParser<B, T, S, TIMER_HZ, BUF_SIZE>);

/// Engine errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// No byte arrived within the timeout
    ChannelTimeout,

    /// Scratch buffer exhausted while formatting or matching, or a captured value does not fit its target
    FormatOverflow,

    /// Unrelated lines were discarded, but the expected response never matched
    NoMatch,

    /// Receiving was aborted by an OOB callback
    Aborted,

    /// Placeholders do not match the given arguments or captures
    InvalidTemplate,

    /// Upstream bus error
    BusError,

    /// Upstream timer error
    TimerError,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::ChannelTimeout => defmt::write!(f, "Error::ChannelTimeout"),
            Error::FormatOverflow => defmt::write!(f, "Error::FormatOverflow"),
            Error::NoMatch => defmt::write!(f, "Error::NoMatch"),
            Error::Aborted => defmt::write!(f, "Error::Aborted"),
            Error::InvalidTemplate => defmt::write!(f, "Error::InvalidTemplate"),
            Error::BusError => defmt::write!(f, "Error::BusError"),
            Error::TimerError => defmt::write!(f, "Error::TimerError"),
        }
    }
}

/// Outcome of matching a single response line
enum Signal {
    /// Line matched, the given number of scratch bytes hold the line
    Matched(usize),

    /// An OOB callback ran, the whole response needs to be matched again
    Restart,
}

/// Progress of a multi-line receive
struct Exchange<'t> {
    /// Remaining response template
    remaining: &'t str,

    /// Number of captures already filled
    captured: usize,
}

impl<'t> Exchange<'t> {
    fn new(response: &'t str) -> Self {
        Self {
            remaining: response,
            captured: 0,
        }
    }

    fn advance(&mut self, template_len: usize, captured: usize) {
        self.remaining = &self.remaining[template_len..];
        self.captured += captured;
    }
}

/// AT command engine
///
/// S: Client state, reachable by OOB callbacks via [AtParser::state_mut].
///
/// BUF_SIZE: Size of the scratch buffer in bytes. Needs to exceed the longest command and the longest response line.
pub struct AtParser<B: Bus, T: Timer<TIMER_HZ>, S, const TIMER_HZ: u32, const BUF_SIZE: usize> {
    /// Byte transport
    pub(crate) transport: Transport<B, T, TIMER_HZ>,

    /// Scratch buffer used for formatting commands and accumulating response lines
    buffer: [u8; BUF_SIZE],

    /// Line delimiter appended to commands
    delimiter: &'static str,

    /// Registered OOB notifications
    oobs: OobRegistry<OobCallback<B, T, S, TIMER_HZ, BUF_SIZE>>,

    /// Set by OOB callbacks for terminating the current receive
    aborted: bool,

    /// Previous raw byte, used for collapsing CR/LF pairs
    in_prev: u8,

    /// Protocol tracing enabled?
    debug: bool,

    /// Client state
    state: S,
}

impl<B: Bus, T: Timer<TIMER_HZ>, S: Default, const TIMER_HZ: u32, const BUF_SIZE: usize>
    AtParser<B, T, S, TIMER_HZ, BUF_SIZE>
{
    pub fn new(bus: B, timer: T) -> Self {
        Self::with_state(bus, timer, S::default())
    }
}

impl<B: Bus, T: Timer<TIMER_HZ>, S, const TIMER_HZ: u32, const BUF_SIZE: usize> AtParser<B, T, S, TIMER_HZ, BUF_SIZE> {
    pub fn with_state(bus: B, timer: T, state: S) -> Self {
        Self {
            transport: Transport::new(bus, timer, DEFAULT_TIMEOUT_MS),
            buffer: [0; BUF_SIZE],
            delimiter: DEFAULT_DELIMITER,
            oobs: OobRegistry::new(),
            aborted: false,
            in_prev: 0,
            debug: false,
            state,
        }
    }

    /// Formats the command, appends the delimiter and transmits it in a single bus frame
    pub fn send(&mut self, command: &str, args: &[Arg<'_>]) -> Result<(), Error> {
        let length = pattern::format(command, args, &mut self.buffer)?;
        let delimiter = self.delimiter.as_bytes();
        let end = length + delimiter.len();

        if end > BUF_SIZE {
            return Err(Error::FormatOverflow);
        }
        self.buffer[length..end].copy_from_slice(delimiter);

        if self.debug {
            debug!("AT> {}", text(&self.buffer[..end]));
        }

        self.transport.transmit(&self.buffer[..end])?;
        Ok(())
    }

    /// Pulls the response frame and matches it line by line against the given template.
    /// Values of all storing placeholders are written to the captures in order.
    pub fn recv(&mut self, response: &str, captures: &mut [Capture<'_>]) -> Result<(), Error> {
        self.flush();
        self.transport.fetch(None)?;
        self.receive(response, captures)
    }

    /// Formats the template and queues it without delimiter. Nothing is transmitted yet.
    pub fn printf(&mut self, template: &str, args: &[Arg<'_>]) -> Result<usize, Error> {
        let length = pattern::format(template, args, &mut self.buffer)?;

        for i in 0..length {
            self.transport.putc(self.buffer[i])?;
        }

        Ok(length)
    }

    /// Matches buffered bytes against the whole template, without OOB handling or newline normalization.
    /// Returns the matched length.
    pub fn scanf(&mut self, template: &str, captures: &mut [Capture<'_>]) -> Result<usize, Error> {
        let line = Line::whole(template)?;
        let mut length = 0;

        loop {
            if length >= BUF_SIZE {
                return Err(Error::FormatOverflow);
            }

            self.buffer[length] = self.transport.getc()?;
            length += 1;

            if line.matched_len(&self.buffer[..length]) == Some(length) {
                line.extract(&self.buffer[..length], captures)?;
                return Ok(length);
            }
        }
    }

    /// Queues the data behind any queued bytes and transmits it
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.transport.write(data)
    }

    /// Reads raw data in chunks of the scratch buffer size
    pub fn read(&mut self, data: &mut [u8]) -> Result<usize, Error> {
        let length = self.transport.read(data, BUF_SIZE)?;

        if self.debug {
            debug!("AT< {}", text(&data[..length]));
        }

        Ok(length)
    }

    /// Reads a single frame directly into the given buffer, not limited by the inbound buffer size
    pub fn read_stream(&mut self, data: &mut [u8]) -> Result<usize, Error> {
        let length = self.transport.read_stream(data)?;

        if self.debug {
            debug!("AT< {}", text(&data[..length]));
        }

        Ok(length)
    }

    /// Takes already buffered bytes without pulling a new frame. Waits for each byte up to the timeout.
    pub fn read_buffered(&mut self, data: &mut [u8]) -> Result<usize, Error> {
        for byte in data.iter_mut() {
            *byte = self.transport.getc()?;
        }

        Ok(data.len())
    }

    /// Pulls a frame and scans it for OOB notifications only. Returns once a callback was invoked.
    pub fn process_oob(&mut self) -> Result<(), Error> {
        self.flush();
        self.transport.fetch(None)?;

        let mut length = 0;
        loop {
            if length >= BUF_SIZE {
                length = 0;
            }

            self.buffer[length] = self.transport.getc()?;
            length += 1;

            if let Some((prefix, callback)) = self.oobs.find(&self.buffer[..length]) {
                if self.debug {
                    debug!("AT! {}", text(prefix));
                }

                callback(self);
                return Ok(());
            }

            if self.buffer[..length].ends_with(self.delimiter.as_bytes()) {
                if self.debug {
                    debug!("AT< {}", text(&self.buffer[..length]));
                }
                length = 0;
            }
        }
    }

    /// Registers an OOB notification. Prefixes are matched by exact length, most recent registration first.
    pub fn register_oob(&mut self, prefix: &'static str, callback: OobCallback<B, T, S, TIMER_HZ, BUF_SIZE>) {
        self.oobs.register(prefix, callback);
    }

    /// Terminates the current receive. Only effective when called from an OOB callback.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Discards all inbound bytes and resets the newline state
    pub fn flush(&mut self) {
        self.transport.flush();
        self.in_prev = 0;
    }

    /// Sets the timeout of single byte waits in ms
    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.transport.set_timeout_ms(timeout_ms);
    }

    /// Sets the delimiter appended to commands
    pub fn set_delimiter(&mut self, delimiter: &'static str) {
        self.delimiter = delimiter;
    }

    /// Sets the number of bytes subtracted from intermediate chunks of [AtParser::read]
    pub fn set_frame_overhead(&mut self, overhead: usize) {
        self.transport.set_frame_overhead(overhead);
    }

    pub fn frame_overhead(&self) -> usize {
        self.transport.frame_overhead()
    }

    /// Enables/Disables protocol tracing
    pub fn debug_on(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Size of the scratch buffer
    pub const fn buffer_size(&self) -> usize {
        BUF_SIZE
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn bus(&self) -> &B {
        &self.transport.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.transport.bus
    }

    /// Matches the response line by line. Restarts from the first line after each OOB callback.
    fn receive(&mut self, response: &str, captures: &mut [Capture<'_>]) -> Result<(), Error> {
        'restart: loop {
            self.aborted = false;
            captures.iter_mut().for_each(Capture::reset);
            let mut exchange = Exchange::new(response);

            while !exchange.remaining.is_empty() {
                let line = Line::first(exchange.remaining)?;

                if self.debug {
                    debug!("AT? {}", &exchange.remaining[..line.len]);
                }

                match self.match_line(&line)? {
                    Signal::Restart => continue 'restart,
                    Signal::Matched(length) => {
                        let captured = line.extract(&self.buffer[..length], &mut captures[exchange.captured..])?;
                        exchange.advance(line.len, captured);
                    }
                }
            }

            return Ok(());
        }
    }

    /// Accumulates bytes until the line matches exactly or an OOB prefix was received
    fn match_line(&mut self, line: &Line<'_>) -> Result<Signal, Error> {
        if BUF_SIZE == 0 {
            return Err(Error::FormatOverflow);
        }

        let mut length = 0;
        let mut discarded = false;
        let mut overflowed = false;

        loop {
            let byte = match self.transport.getc() {
                Ok(byte) => byte,
                Err(Error::ChannelTimeout) => {
                    if self.debug {
                        debug!("AT(Timeout)");
                    }

                    return Err(match (overflowed, discarded) {
                        (true, _) => Error::FormatOverflow,
                        (false, true) => Error::NoMatch,
                        (false, false) => Error::ChannelTimeout,
                    });
                }
                Err(error) => return Err(error),
            };

            let Some(byte) = self.normalize(byte) else {
                continue;
            };

            self.buffer[length] = byte;
            length += 1;

            if let Some((prefix, callback)) = self.oobs.find(&self.buffer[..length]) {
                if self.debug {
                    debug!("AT! {}", text(prefix));
                }

                callback(self);

                if self.aborted {
                    if self.debug {
                        debug!("AT(Aborted)");
                    }
                    return Err(Error::Aborted);
                }

                return Ok(Signal::Restart);
            }

            // A newline terminated template line must not match a partial line
            let deferred = line.whole_line && byte != LF;
            if !deferred && line.matched_len(&self.buffer[..length]) == Some(length) {
                if self.debug {
                    debug!("AT= {}", text(&self.buffer[..length]));
                }
                return Ok(Signal::Matched(length));
            }

            if byte == LF || length >= BUF_SIZE {
                if self.debug {
                    debug!("AT< {}", text(&self.buffer[..length]));
                }

                if byte == LF {
                    discarded = true;
                } else {
                    overflowed = true;
                }
                length = 0;
            }
        }
    }

    /// Collapses CR, LF, CR LF and LF CR to a single LF. Returns None if the byte is swallowed.
    fn normalize(&mut self, byte: u8) -> Option<u8> {
        let previous = core::mem::replace(&mut self.in_prev, byte);

        match (byte, previous) {
            (CR, LF) | (LF, CR) => None,
            (CR, _) | (LF, _) => Some(LF),
            _ => Some(byte),
        }
    }
}
