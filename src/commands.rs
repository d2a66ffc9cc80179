use crate::parser::Error as AtError;
use crate::pattern::Arg;
use crate::stack::Error as StackError;
use crate::wifi::JoinError;

/// Network address information (CSV)
pub(crate) const GET_ADDRESS: &str = "C?";

/// MAC address
pub(crate) const GET_MAC_ADDRESS: &str = "Z5";

/// Signal strength of the current connection
pub(crate) const GET_RSSI: &str = "CR";

/// Lists the access points in range
pub(crate) const SCAN: &str = "F0";

/// Resolves a host name
pub(crate) const DNS_LOOKUP: &str = "D0=%s";

/// Reads the prepared amount of socket data
pub(crate) const READ_DATA: &str = "R0";

/// Announces the length of the following socket data. Sent without delimiter, the data follows directly.
pub(crate) const WRITE_DATA: &str = "S3=%d\r";

/// Trait for mapping command errors
pub trait CommandErrorHandler {
    type Error;

    /// Maps regular errors
    fn command_error(&self, error: AtError) -> Self::Error;
}

/// Command acknowledged by a single `OK`
pub(crate) trait Command: CommandErrorHandler {
    /// Command template
    fn template(&self) -> &'static str;

    /// Argument of the template, if any
    fn arg(&self) -> Option<Arg<'_>>;
}

/// Enables/Disables DHCP
pub(crate) struct DhcpCommand {
    enabled: bool,
}

impl DhcpCommand {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Command for DhcpCommand {
    fn template(&self) -> &'static str {
        "C4=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.enabled as u32))
    }
}

impl CommandErrorHandler for DhcpCommand {
    type Error = JoinError;

    fn command_error(&self, error: AtError) -> Self::Error {
        JoinError::DhcpError(error)
    }
}

/// Sets the SSID of the target access point
pub(crate) struct SsidCommand<'a> {
    ssid: &'a str,
}

impl<'a> SsidCommand<'a> {
    pub fn new(ssid: &'a str) -> Self {
        Self { ssid }
    }
}

impl Command for SsidCommand<'_> {
    fn template(&self) -> &'static str {
        "C1=%s"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Str(self.ssid))
    }
}

impl CommandErrorHandler for SsidCommand<'_> {
    type Error = JoinError;

    fn command_error(&self, error: AtError) -> Self::Error {
        JoinError::SsidError(error)
    }
}

/// Sets the passphrase of the target access point
pub(crate) struct PassphraseCommand<'a> {
    passphrase: &'a str,
}

impl<'a> PassphraseCommand<'a> {
    pub fn new(passphrase: &'a str) -> Self {
        Self { passphrase }
    }
}

impl Command for PassphraseCommand<'_> {
    fn template(&self) -> &'static str {
        "C2=%s"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Str(self.passphrase))
    }
}

impl CommandErrorHandler for PassphraseCommand<'_> {
    type Error = JoinError;

    fn command_error(&self, error: AtError) -> Self::Error {
        JoinError::PassphraseError(error)
    }
}

/// Sets the security type of the target access point
pub(crate) struct SecurityCommand {
    /// 0: Open, 1: WEP, 2: WPA, 3: WPA2, 4: WPA/WPA2 mixed
    mode: u32,
}

impl SecurityCommand {
    pub fn wpa2() -> Self {
        Self { mode: 3 }
    }
}

impl Command for SecurityCommand {
    fn template(&self) -> &'static str {
        "C3=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.mode))
    }
}

impl CommandErrorHandler for SecurityCommand {
    type Error = JoinError;

    fn command_error(&self, error: AtError) -> Self::Error {
        JoinError::SecurityError(error)
    }
}

/// Joins the configured network
pub(crate) struct JoinCommand;

impl Command for JoinCommand {
    fn template(&self) -> &'static str {
        "C0"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        None
    }
}

impl CommandErrorHandler for JoinCommand {
    type Error = JoinError;

    fn command_error(&self, error: AtError) -> Self::Error {
        JoinError::ConnectError(error)
    }
}

/// Leaves the current network
pub(crate) struct DisconnectCommand;

impl Command for DisconnectCommand {
    fn template(&self) -> &'static str {
        "CD"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        None
    }
}

impl CommandErrorHandler for DisconnectCommand {
    type Error = JoinError;

    fn command_error(&self, error: AtError) -> Self::Error {
        JoinError::DisconnectError(error)
    }
}

/// Selects the socket all following socket commands refer to
pub(crate) struct SelectSocketCommand {
    link_id: usize,
}

impl SelectSocketCommand {
    pub fn new(link_id: usize) -> Self {
        Self { link_id }
    }
}

impl Command for SelectSocketCommand {
    fn template(&self) -> &'static str {
        "P0=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.link_id as u32))
    }
}

impl CommandErrorHandler for SelectSocketCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::SelectFailed(error)
    }
}

/// Sets the transport protocol of the selected socket
pub(crate) struct ProtocolCommand {
    /// 0: TCP, 1: UDP
    code: &'static str,
}

impl ProtocolCommand {
    pub fn new(code: &'static str) -> Self {
        Self { code }
    }
}

impl Command for ProtocolCommand {
    fn template(&self) -> &'static str {
        "P1=%s"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Str(self.code))
    }
}

impl CommandErrorHandler for ProtocolCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ConfigureFailed(error)
    }
}

/// Sets the remote IPv4 address of the selected socket
pub(crate) struct RemoteHostCommand<'a> {
    host: &'a str,
}

impl<'a> RemoteHostCommand<'a> {
    pub fn new(host: &'a str) -> Self {
        Self { host }
    }
}

impl Command for RemoteHostCommand<'_> {
    fn template(&self) -> &'static str {
        "P3=%s"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Str(self.host))
    }
}

impl CommandErrorHandler for RemoteHostCommand<'_> {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ConfigureFailed(error)
    }
}

/// Sets the remote port of the selected socket
pub(crate) struct RemotePortCommand {
    port: u16,
}

impl RemotePortCommand {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Command for RemotePortCommand {
    fn template(&self) -> &'static str {
        "P4=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.port as u32))
    }
}

impl CommandErrorHandler for RemotePortCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ConfigureFailed(error)
    }
}

/// Starts/Stops the client of the selected socket
pub(crate) struct ClientCommand {
    start: bool,
}

impl ClientCommand {
    pub fn start() -> Self {
        Self { start: true }
    }

    pub fn stop() -> Self {
        Self { start: false }
    }
}

impl Command for ClientCommand {
    fn template(&self) -> &'static str {
        "P6=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.start as u32))
    }
}

impl CommandErrorHandler for ClientCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        match self.start {
            true => StackError::ConnectError(error),
            false => StackError::CloseError(error),
        }
    }
}

/// Sets the write timeout of the selected socket in ms
pub(crate) struct SendTimeoutCommand {
    timeout_ms: u32,
}

impl SendTimeoutCommand {
    pub fn new(timeout_ms: u32) -> Self {
        Self { timeout_ms }
    }
}

impl Command for SendTimeoutCommand {
    fn template(&self) -> &'static str {
        "S2=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.timeout_ms))
    }
}

impl CommandErrorHandler for SendTimeoutCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ConfigureFailed(error)
    }
}

/// Sets the read timeout of the selected socket in ms
pub(crate) struct ReceiveTimeoutCommand {
    timeout_ms: u32,
}

impl ReceiveTimeoutCommand {
    pub fn new(timeout_ms: u32) -> Self {
        Self { timeout_ms }
    }
}

impl Command for ReceiveTimeoutCommand {
    fn template(&self) -> &'static str {
        "R2=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.timeout_ms))
    }
}

impl CommandErrorHandler for ReceiveTimeoutCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ConfigureFailed(error)
    }
}

/// Sets the amount of data returned by the next read
pub(crate) struct ReadSizeCommand {
    length: usize,
}

impl ReadSizeCommand {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Command for ReadSizeCommand {
    fn template(&self) -> &'static str {
        "R1=%d"
    }

    fn arg(&self) -> Option<Arg<'_>> {
        Some(Arg::Uint(self.length as u32))
    }
}

impl CommandErrorHandler for ReadSizeCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ReceiveFailed(error)
    }
}
