use crate::pattern::{parse_int, skip_space};
use crate::wifi::{AddressError, ScanError};
use core::str::FromStr;
use core::net::Ipv4Addr;
use heapless::{String, Vec};

/// CSV field positions of the `C?` response
const IPV4_FIELD: usize = 5;
const NETMASK_FIELD: usize = 6;
const GATEWAY_FIELD: usize = 7;

/// Number of CSV fields per access point record of the `F0` response
const AP_RECORD_FIELDS: usize = 9;

/// Local network configuration
#[derive(Clone, Debug, PartialEq)]
pub struct LocalAddress {
    /// Local IPv4 address, unspecified if not assigned
    pub ipv4: Ipv4Addr,

    pub netmask: Ipv4Addr,

    pub gateway: Ipv4Addr,
}

impl LocalAddress {
    /// Parses the CSV network status, e.g. `MyAP,secret,3,1,0,10.0.0.181,255.255.255.0,10.0.0.1,...`
    pub(crate) fn from_response(data: &[u8]) -> Result<Self, AddressError> {
        let text = core::str::from_utf8(data).map_err(|_| AddressError::AddressParseError)?;
        let field = |index: usize| -> Result<Ipv4Addr, AddressError> {
            let value = text
                .split(',')
                .filter(|value| !value.is_empty())
                .nth(index)
                .ok_or(AddressError::AddressParseError)?;

            Ipv4Addr::from_str(value.trim()).map_err(|_| AddressError::AddressParseError)
        };

        Ok(Self {
            ipv4: field(IPV4_FIELD)?,
            netmask: field(NETMASK_FIELD)?,
            gateway: field(GATEWAY_FIELD)?,
        })
    }

    /// True if an address was assigned
    pub fn is_assigned(&self) -> bool {
        !self.ipv4.is_unspecified()
    }
}

/// Parses the signal strength of a `CR` response, e.g. `-45\r\nOK\r\n> `
pub(crate) fn parse_rssi(data: &[u8]) -> Result<i8, AddressError> {
    let (value, _) = parse_int(data, skip_space(data, 0)).ok_or(AddressError::AddressParseError)?;
    i8::try_from(value).map_err(|_| AddressError::AddressParseError)
}

/// Parses the resolved address of a `D0` response, which is terminated by `\r`
pub(crate) fn parse_host_address(data: &[u8]) -> Result<Ipv4Addr, AddressError> {
    let start = skip_space(data, 0);
    let end = data[start..]
        .iter()
        .position(|byte| *byte == b'\r')
        .map(|position| start + position)
        .ok_or(AddressError::AddressParseError)?;

    let text = core::str::from_utf8(&data[start..end]).map_err(|_| AddressError::AddressParseError)?;
    Ipv4Addr::from_str(text).map_err(|_| AddressError::AddressParseError)
}

/// Security mode of an access point
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Security {
    Open,
    Wep,
    Wpa,
    Wpa2,
    WpaWpa2,
    #[default]
    Unknown,
}

impl Security {
    fn from_field(field: &[u8]) -> Self {
        if contains(field, b"Open") {
            Self::Open
        } else if contains(field, b"WEP") {
            Self::Wep
        } else if contains(field, b"WPA WPA2") {
            Self::WpaWpa2
        } else if contains(field, b"WPA2") {
            Self::Wpa2
        } else if contains(field, b"WPA") {
            Self::Wpa
        } else {
            Self::Unknown
        }
    }
}

/// Access point found by a scan
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccessPoint {
    pub ssid: String<32>,

    pub bssid: [u8; 6],

    /// Signal strength in dBm
    pub rssi: i8,

    pub security: Security,

    pub channel: u8,
}

impl AccessPoint {
    /// Parses the access point list of a `F0` response. Records are CSV with nine fields:
    /// `#index,"ssid",bssid,rssi,rate,type,security,band,channel`. Consecutive records share a
    /// field, as the line break between channel and the next index is no separator.
    pub(crate) fn parse_list<const N: usize>(data: &[u8]) -> Result<Vec<AccessPoint, N>, ScanError> {
        let data = &data[skip_space(data, 0)..];
        let mut list = Vec::new();
        let mut record = AccessPoint::default();
        let mut field = 0;

        for value in data.split(|byte| *byte == b',').filter(|value| !value.is_empty()) {
            if list.is_full() {
                break;
            }

            match field {
                1 => record.ssid = parse_ssid(value)?,
                2 => record.bssid = parse_bssid(value)?,
                3 => record.rssi = parse_number(value)?,
                6 => record.security = Security::from_field(value),
                8 => {
                    record.channel = parse_number(value)?;
                    list.push(core::mem::take(&mut record)).map_err(|_| ScanError::ParseError)?;
                }
                _ => {}
            }

            // Channel and next index share a field
            field = match field + 1 {
                AP_RECORD_FIELDS => 1,
                next => next,
            };
        }

        Ok(list)
    }
}

/// Strips the quotes, long names are truncated
fn parse_ssid(value: &[u8]) -> Result<String<32>, ScanError> {
    let text = core::str::from_utf8(value).map_err(|_| ScanError::ParseError)?;
    let mut ssid = String::new();

    for char in text.trim_matches('"').chars() {
        if ssid.push(char).is_err() {
            break;
        }
    }

    Ok(ssid)
}

/// Parses a colon separated hex address, e.g. `C4:7F:51:01:12:31`
fn parse_bssid(value: &[u8]) -> Result<[u8; 6], ScanError> {
    let mut bssid = [0u8; 6];

    for (i, octet) in bssid.chunks_mut(1).enumerate() {
        let digits = value.get(i * 3..i * 3 + 2).ok_or(ScanError::ParseError)?;
        base16::decode_slice(digits, octet).map_err(|_| ScanError::ParseError)?;
    }

    Ok(bssid)
}

fn parse_number<V: TryFrom<i32>>(value: &[u8]) -> Result<V, ScanError> {
    let (number, _) = parse_int(value, skip_space(value, 0)).ok_or(ScanError::ParseError)?;
    V::try_from(number).map_err(|_| ScanError::ParseError)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
