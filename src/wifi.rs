//! # WIFI station client
//!
//! Joining a network, querying address information, scanning and DNS lookups are supported.
//!
//! ## Example
//!
//! ````
//! # use ism43362_at::example::{ExampleBus, ExampleTimer};
//! # use ism43362_at::wifi::{Ism43362, WifiAdapter};
//! #
//! let mut driver: Ism43362<_, _, 1_000_000, 256> = Ism43362::new(ExampleBus::default(), ExampleTimer::default());
//!
//! // Joining the WIFI access point
//! driver.join("test_wifi", "secret").unwrap();
//! assert!(driver.is_connected());
//!
//! let address = driver.get_address().unwrap();
//! assert_eq!("10.0.0.181", address.ipv4.to_string());
//! assert_eq!("10.0.0.1", address.gateway.to_string());
//! ````
use crate::bus::Bus;
use crate::commands::{
    Command, DhcpCommand, DisconnectCommand, JoinCommand, PassphraseCommand, SecurityCommand,
    SsidCommand, DNS_LOOKUP, GET_ADDRESS, GET_MAC_ADDRESS, GET_RSSI, SCAN,
};
use crate::parser::{AtParser, Error as AtError};
use crate::pattern::{Arg, Capture};
use crate::responses::{parse_host_address, parse_rssi, AccessPoint, LocalAddress};
use crate::stack::Session;
use core::fmt::Debug;
use core::net::Ipv4Addr;
use fugit_timer::Timer;
use heapless::{String, Vec};

/// Default timeout of the driver in ms
pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;

/// Max. length of a SSID
const MAX_SSID_LENGTH: usize = 32;

/// Max. length of a WPA passphrase
const MAX_PASSPHRASE_LENGTH: usize = 63;

/// Max. length of single query responses (address, RSSI, DNS)
const QUERY_BUFFER_SIZE: usize = 256;

/// Max. length of the access point list
const SCAN_BUFFER_SIZE: usize = 1024;

/// Wifi network adapter trait
pub trait WifiAdapter {
    /// Error when joining a WIFI network
    type JoinError: Debug;

    /// Error when receiving local address information
    type AddressError: Debug;

    /// Connects to an WIFI access point
    fn join(&mut self, ssid: &str, key: &str) -> Result<(), Self::JoinError>;

    /// Returns true if an address was assigned
    fn is_connected(&mut self) -> bool;

    /// Returns local address information
    fn get_address(&mut self) -> Result<LocalAddress, Self::AddressError>;
}

/// Driver of the ISM43362 WIFI module
///
/// BUF_SIZE: Size of the command scratch buffer in bytes. Determines the chunk size of socket reads.
pub struct Ism43362<B: Bus, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const BUF_SIZE: usize> {
    /// AT engine
    pub(crate) parser: AtParser<B, T, Session, TIMER_HZ, BUF_SIZE>,

    /// Module side socket timeout in ms
    pub(crate) timeout_ms: u32,
}

/// Possible errors when joining an access point
#[derive(Clone, Debug, PartialEq)]
pub enum JoinError {
    /// Error while enabling/disabling DHCP
    DhcpError(AtError),

    /// Error while setting the SSID
    SsidError(AtError),

    /// Error while setting the passphrase
    PassphraseError(AtError),

    /// Error while setting the security type
    SecurityError(AtError),

    /// Join command failed
    ConnectError(AtError),

    /// Disconnect command failed
    DisconnectError(AtError),

    /// Given SSID is longer then the max. size of 32 chars
    InvalidSsidLength,

    /// Given passphrase is longer then the max. size of 63 chars
    InvalidPassphraseLength,
}

/// Errors when receiving address information
#[derive(Clone, Debug, PartialEq)]
pub enum AddressError {
    /// Query command failed
    CommandError(AtError),

    /// Error while parsing the response
    AddressParseError,
}

/// Errors when scanning for access points
#[derive(Clone, Debug, PartialEq)]
pub enum ScanError {
    /// Scan command failed
    CommandError(AtError),

    /// Error while parsing the access point list
    ParseError,
}

#[cfg(feature = "defmt")]
impl defmt::Format for JoinError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            JoinError::DhcpError(e) => defmt::write!(f, "JoinError::DhcpError({})", e),
            JoinError::SsidError(e) => defmt::write!(f, "JoinError::SsidError({})", e),
            JoinError::PassphraseError(e) => defmt::write!(f, "JoinError::PassphraseError({})", e),
            JoinError::SecurityError(e) => defmt::write!(f, "JoinError::SecurityError({})", e),
            JoinError::ConnectError(e) => defmt::write!(f, "JoinError::ConnectError({})", e),
            JoinError::DisconnectError(e) => defmt::write!(f, "JoinError::DisconnectError({})", e),
            JoinError::InvalidSsidLength => defmt::write!(f, "JoinError::InvalidSsidLength"),
            JoinError::InvalidPassphraseLength => defmt::write!(f, "JoinError::InvalidPassphraseLength"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AddressError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            AddressError::CommandError(e) => defmt::write!(f, "AddressError::CommandError({})", e),
            AddressError::AddressParseError => defmt::write!(f, "AddressError::AddressParseError"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ScanError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ScanError::CommandError(e) => defmt::write!(f, "ScanError::CommandError({})", e),
            ScanError::ParseError => defmt::write!(f, "ScanError::ParseError"),
        }
    }
}

impl<B: Bus, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const BUF_SIZE: usize> WifiAdapter
    for Ism43362<B, T, TIMER_HZ, BUF_SIZE>
{
    type JoinError = JoinError;
    type AddressError = AddressError;

    /// Configures the WPA2 access point and joins it
    fn join(&mut self, ssid: &str, key: &str) -> Result<(), JoinError> {
        if ssid.len() > MAX_SSID_LENGTH {
            return Err(JoinError::InvalidSsidLength);
        }

        if key.len() > MAX_PASSPHRASE_LENGTH {
            return Err(JoinError::InvalidPassphraseLength);
        }

        self.send_command(SsidCommand::new(ssid))?;
        self.send_command(PassphraseCommand::new(key))?;
        self.send_command(SecurityCommand::wpa2())?;
        self.send_command(JoinCommand)?;

        debug!("Joined access point {}", ssid);
        Ok(())
    }

    /// Returns true if an IP address was assigned. Query failures count as not connected.
    fn is_connected(&mut self) -> bool {
        self.get_address().map(|address| address.is_assigned()).unwrap_or(false)
    }

    /// Returns the local IPv4 address, netmask and gateway
    fn get_address(&mut self) -> Result<LocalAddress, AddressError> {
        let mut buffer = [0x0; QUERY_BUFFER_SIZE];
        let length = self.query(GET_ADDRESS, &[], &mut buffer)?;

        LocalAddress::from_response(&buffer[..length])
    }
}

impl<B: Bus, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const BUF_SIZE: usize> Ism43362<B, T, TIMER_HZ, BUF_SIZE> {
    pub fn new(bus: B, timer: T) -> Self {
        let mut parser = AtParser::new(bus, timer);
        parser.set_timeout(DEFAULT_TIMEOUT_MS);

        Self {
            parser,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Enables/Disables DHCP
    pub fn dhcp(&mut self, enabled: bool) -> Result<(), JoinError> {
        self.send_command(DhcpCommand::new(enabled))
    }

    /// Leaves the current access point
    pub fn disconnect(&mut self) -> Result<(), JoinError> {
        self.send_command(DisconnectCommand)
    }

    /// Returns the MAC address, e.g. `C4:7F:51:01:12:31`
    pub fn get_mac_address(&mut self) -> Result<String<17>, AddressError> {
        let mut mac = String::new();

        self.parser.send(GET_MAC_ADDRESS, &[]).map_err(AddressError::CommandError)?;
        self.parser
            .recv("%s\r\nOK", &mut [Capture::Str(&mut mac)])
            .map_err(AddressError::CommandError)?;

        Ok(mac)
    }

    /// Returns the signal strength of the current connection in dBm
    pub fn get_rssi(&mut self) -> Result<i8, AddressError> {
        let mut buffer = [0x0; QUERY_BUFFER_SIZE];
        let length = self.query(GET_RSSI, &[], &mut buffer)?;

        parse_rssi(&buffer[..length])
    }

    /// Resolves the given host name
    pub fn dns_lookup(&mut self, name: &str) -> Result<Ipv4Addr, AddressError> {
        let mut buffer = [0x0; QUERY_BUFFER_SIZE];
        let length = self.query(DNS_LOOKUP, &[Arg::Str(name)], &mut buffer)?;

        let address = parse_host_address(&buffer[..length])?;
        debug!("Resolved {}", name);
        Ok(address)
    }

    /// Scans for access points. Returns at most N entries.
    pub fn scan<const N: usize>(&mut self) -> Result<Vec<AccessPoint, N>, ScanError> {
        let mut buffer = [0x0; SCAN_BUFFER_SIZE];

        self.parser.send(SCAN, &[]).map_err(ScanError::CommandError)?;
        let length = self.parser.read_stream(&mut buffer).map_err(ScanError::CommandError)?;

        AccessPoint::parse_list(&buffer[..length])
    }

    /// Sets the timeout in ms, used by the engine and as module side socket timeout
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
        self.parser.set_timeout(timeout_ms);
    }

    /// Enables/Disables protocol tracing
    pub fn debug_on(&mut self, enabled: bool) {
        self.parser.debug_on(enabled);
    }

    pub fn parser(&mut self) -> &mut AtParser<B, T, Session, TIMER_HZ, BUF_SIZE> {
        &mut self.parser
    }

    /// Sends a query command and reads the single frame response
    fn query(&mut self, command: &str, args: &[Arg<'_>], buffer: &mut [u8]) -> Result<usize, AddressError> {
        self.parser.send(command, args).map_err(AddressError::CommandError)?;
        self.parser.read_stream(buffer).map_err(AddressError::CommandError)
    }

    /// Sends a command, waits for `OK` and maps the error if the command failed
    pub(crate) fn send_command<Cmd: Command>(&mut self, command: Cmd) -> Result<(), Cmd::Error> {
        let args = command.arg();

        self.parser
            .send(command.template(), args.as_slice())
            .map_err(|error| command.command_error(error))?;

        self.parser.recv("OK", &mut []).map_err(|error| command.command_error(error))
    }
}
