//! # Socket client
//!
//! The module supports four concurrent client sockets (link id 0 to 3). All socket commands refer to the
//! socket selected before by `P0`, so each operation selects its socket first.
//!
//! ## Example
//!
//! ````
//! # use core::str::FromStr;
//! # use core::net::SocketAddr;
//! # use ism43362_at::example::{ExampleBus, ExampleTimer};
//! # use ism43362_at::stack::Protocol;
//! # use ism43362_at::wifi::Ism43362;
//! #
//! let mut driver: Ism43362<_, _, 1_000_000, 256> = Ism43362::new(ExampleBus::default(), ExampleTimer::default());
//!
//! // Creating a TCP connection
//! driver.open(Protocol::Tcp, 0, SocketAddr::from_str("10.0.0.1:21").unwrap()).unwrap();
//!
//! // Sending some data
//! assert_eq!(6, driver.send(0, b"hallo!").unwrap());
//!
//! // Receiving some data
//! let mut rx_buffer = [0x0; 64];
//! let length = driver.recv(0, &mut rx_buffer).unwrap();
//! assert_eq!(b"nice to see you!", &rx_buffer[..length]);
//!
//! // Closing socket
//! driver.close(0).unwrap();
//! ````
use crate::buffer::Buffer;
use crate::bus::Bus;
use crate::commands::{
    ClientCommand, ProtocolCommand, ReadSizeCommand, ReceiveTimeoutCommand, RemoteHostCommand, RemotePortCommand,
    SelectSocketCommand, SendTimeoutCommand, READ_DATA, WRITE_DATA,
};
use crate::parser::{AtParser, Error as AtError};
use crate::pattern::{Arg, Capture};
use crate::wifi::Ism43362;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt::Write;
use core::net::SocketAddr;
use fugit_timer::Timer;
use heapless::String;

/// Highest socket link id
pub const MAX_LINK_ID: usize = 3;

/// Max. payload of a single send
pub const MAX_PAYLOAD: usize = 1400;

/// Reply of a read without pending data
const NO_DATA: &[u8] = b"OK\r\n> ";

/// Trailer appended by the module to socket data
const DATA_TRAILER: &[u8] = b"\r\nOK\r\n> ";

/// Transport protocol of a socket
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn code(&self) -> &'static str {
        match self {
            Protocol::Tcp => "0",
            Protocol::Udp => "1",
        }
    }
}

/// Socket data received by the packet handler
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    /// Socket link id
    pub link_id: usize,

    pub data: Vec<u8>,
}

/// Client state shared with OOB callbacks
#[derive(Default)]
pub struct Session {
    /// Received packets, oldest first
    packets: VecDeque<Packet>,
}

impl Session {
    /// Number of queued packets
    pub fn pending(&self) -> usize {
        self.packets.len()
    }
}

/// Network related errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Link id is out of range 0..=3
    InvalidSocketId,

    /// Only IPv4 remotes are supported
    UnsupportedAddress,

    /// Selecting the socket failed
    SelectFailed(AtError),

    /// Setting protocol, remote, or timeouts failed
    ConfigureFailed(AtError),

    /// Starting the client failed
    ConnectError(AtError),

    /// Transmission of data failed
    SendFailed(AtError),

    /// Receiving data failed
    ReceiveFailed(AtError),

    /// Stopping the client failed
    CloseError(AtError),
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::InvalidSocketId => defmt::write!(f, "Error::InvalidSocketId"),
            Error::UnsupportedAddress => defmt::write!(f, "Error::UnsupportedAddress"),
            Error::SelectFailed(e) => defmt::write!(f, "Error::SelectFailed({})", e),
            Error::ConfigureFailed(e) => defmt::write!(f, "Error::ConfigureFailed({})", e),
            Error::ConnectError(e) => defmt::write!(f, "Error::ConnectError({})", e),
            Error::SendFailed(e) => defmt::write!(f, "Error::SendFailed({})", e),
            Error::ReceiveFailed(e) => defmt::write!(f, "Error::ReceiveFailed({})", e),
            Error::CloseError(e) => defmt::write!(f, "Error::CloseError({})", e),
        }
    }
}

impl<B: Bus, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const BUF_SIZE: usize> Ism43362<B, T, TIMER_HZ, BUF_SIZE> {
    /// Opens a client connection on the given socket
    pub fn open(&mut self, protocol: Protocol, link_id: usize, remote: SocketAddr) -> Result<(), Error> {
        let SocketAddr::V4(remote) = remote else {
            return Err(Error::UnsupportedAddress);
        };

        let mut host: String<15> = String::new();
        write!(host, "{}", remote.ip()).map_err(|_| Error::UnsupportedAddress)?;

        self.select_socket(link_id)?;
        self.send_command(ProtocolCommand::new(protocol.code()))?;
        self.send_command(RemoteHostCommand::new(host.as_str()))?;
        self.send_command(RemotePortCommand::new(remote.port()))?;
        self.send_command(ClientCommand::start())?;

        debug!("Socket {} connected", link_id);
        Ok(())
    }

    /// Sends data on the given socket. At most [MAX_PAYLOAD] bytes are sent, returns the sent length.
    pub fn send(&mut self, link_id: usize, data: &[u8]) -> Result<usize, Error> {
        let data = &data[..data.len().min(MAX_PAYLOAD)];

        self.select_socket(link_id)?;
        self.send_command(SendTimeoutCommand::new(self.timeout_ms))?;

        self.parser
            .printf(WRITE_DATA, &[Arg::Uint(data.len() as u32)])
            .map_err(Error::SendFailed)?;
        self.parser.write(data).map_err(Error::SendFailed)?;
        self.parser.recv("OK", &mut []).map_err(Error::SendFailed)?;

        trace!("Socket {} sent {} bytes", link_id, data.len());
        Ok(data.len())
    }

    /// Receives pending data of the given socket. Reads are split into chunks fitting the scratch buffer.
    /// Returns the received length, 0 if no data is pending.
    pub fn recv(&mut self, link_id: usize, buffer: &mut [u8]) -> Result<usize, Error> {
        self.select_socket(link_id)?;
        self.send_command(ReceiveTimeoutCommand::new(self.timeout_ms))?;

        let chunk_size = BUF_SIZE.saturating_sub(self.parser.frame_overhead()).max(1);
        let mut buffer = Buffer::new(buffer, chunk_size);

        while !buffer.is_full() {
            let requested = buffer.get_next_length();
            let length = self.read_data(buffer.next_chunk())?;
            buffer.advance(length);

            // Nothing more pending
            if length < requested {
                break;
            }
        }

        let total = buffer.len();
        trace!("Socket {} received {} bytes", link_id, total);
        Ok(total)
    }

    /// Polls the given socket for data with a single read of the buffer size. Returns 0 if no data is pending.
    pub fn check_recv_status(&mut self, link_id: usize, buffer: &mut [u8]) -> Result<usize, Error> {
        self.select_socket(link_id)?;
        self.send_command(ReceiveTimeoutCommand::new(self.timeout_ms))?;
        self.read_data(buffer)
    }

    /// Closes the connection of the given socket
    pub fn close(&mut self, link_id: usize) -> Result<(), Error> {
        self.select_socket(link_id)?;
        self.send_command(ClientCommand::stop())?;

        debug!("Socket {} closed", link_id);
        Ok(())
    }

    /// Registers an OOB handler for socket data notifications. The prefix is followed by
    /// `,<link id>,<length>:` and the payload, which gets appended to the packet queue.
    pub fn enable_packet_handler(&mut self, prefix: &'static str) {
        self.parser.register_oob(prefix, Self::handle_packet);
    }

    /// Takes the oldest received packet
    pub fn pop_packet(&mut self) -> Option<Packet> {
        self.parser.state_mut().packets.pop_front()
    }

    /// Number of queued packets
    pub fn pending_packets(&self) -> usize {
        self.parser.state().pending()
    }

    /// Reads a single chunk of prepared socket data and strips the module trailer
    fn read_data(&mut self, chunk: &mut [u8]) -> Result<usize, Error> {
        self.send_command(ReadSizeCommand::new(chunk.len()))?;
        self.parser.send(READ_DATA, &[]).map_err(Error::ReceiveFailed)?;

        let length = self.parser.read(chunk).map_err(Error::ReceiveFailed)?;
        let data = &chunk[..length];

        if data.starts_with(NO_DATA) {
            return Ok(0);
        }

        if data.ends_with(DATA_TRAILER) {
            return Ok(length - DATA_TRAILER.len());
        }

        Ok(length)
    }

    fn select_socket(&mut self, link_id: usize) -> Result<(), Error> {
        if link_id > MAX_LINK_ID {
            return Err(Error::InvalidSocketId);
        }

        self.send_command(SelectSocketCommand::new(link_id))
    }

    /// OOB callback parsing a packet notification
    fn handle_packet(parser: &mut AtParser<B, T, Session, TIMER_HZ, BUF_SIZE>) {
        let mut link_id = 0;
        let mut length = 0;

        let header = parser.scanf(",%d,%d:", &mut [Capture::Int(&mut link_id), Capture::Int(&mut length)]);
        if let Err(error) = header {
            warn!("Invalid packet header: {:?}", error);
            return;
        }

        let (Ok(link_id), Ok(length)) = (usize::try_from(link_id), usize::try_from(length)) else {
            warn!("Invalid packet header");
            return;
        };

        if length > MAX_PAYLOAD {
            warn!("Dropping packet of {} bytes", length);
            return;
        }

        let mut data = Vec::new();
        if data.try_reserve_exact(length).is_err() {
            warn!("No memory for packet of {} bytes", length);
            return;
        }
        data.resize(length, 0x0);

        if let Err(error) = parser.read_buffered(&mut data) {
            warn!("Incomplete packet: {:?}", error);
            return;
        }

        trace!("Socket {} packet of {} bytes", link_id, length);
        parser.state_mut().packets.push_back(Packet { link_id, data });
    }
}
