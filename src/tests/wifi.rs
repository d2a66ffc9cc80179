use crate::parser::Error;
use crate::responses::{AccessPoint, Security};
use crate::tests::mock::{MockBus, MockTimer};
use crate::wifi::{AddressError, Ism43362, JoinError, ScanError, WifiAdapter};
use alloc::string::ToString;
use core::net::Ipv4Addr;

type DriverType = Ism43362<MockBus, MockTimer, 1_000_000, 256>;

const ADDRESS_RESPONSE: &[u8] =
    b"MyAP,secret,3,1,0,10.0.0.181,255.255.255.0,10.0.0.1,8.8.8.8,8.8.4.4,3,1\r\nOK\r\n> ";

fn driver(bus: MockBus) -> DriverType {
    Ism43362::new(bus, MockTimer::expiring())
}

#[test]
fn test_join_correct_commands() {
    let mut bus = MockBus::new();
    bus.add_ok_times(4);

    let mut driver = driver(bus);
    driver.join("test_wifi", "secret").unwrap();

    let commands = driver.parser().bus().get_sent_as_strings();
    assert_eq!(4, commands.len());
    assert_eq!("C1=test_wifi\r\n".to_string(), commands[0]);
    assert_eq!("C2=secret\r\n".to_string(), commands[1]);
    assert_eq!("C3=3\r\n".to_string(), commands[2]);
    assert_eq!("C0\r\n".to_string(), commands[3]);
}

#[test]
fn test_join_ssid_timeout() {
    let mut driver = driver(MockBus::new());
    let result = driver.join("test_wifi", "secret").unwrap_err();

    assert_eq!(JoinError::SsidError(Error::ChannelTimeout), result);
    assert_eq!(1, driver.parser().bus().get_sent().len());
}

#[test]
fn test_join_passphrase_error() {
    let mut bus = MockBus::new();
    bus.add_ok();
    bus.add_error();

    let mut driver = driver(bus);
    let result = driver.join("test_wifi", "secret").unwrap_err();

    assert_eq!(JoinError::PassphraseError(Error::NoMatch), result);
    assert_eq!(2, driver.parser().bus().get_sent().len());
}

#[test]
fn test_join_security_error() {
    let mut bus = MockBus::new();
    bus.add_ok_times(2);
    bus.add_error();

    let mut driver = driver(bus);
    let result = driver.join("test_wifi", "secret").unwrap_err();

    assert_eq!(JoinError::SecurityError(Error::NoMatch), result);
}

#[test]
fn test_join_connect_error() {
    let mut bus = MockBus::new();
    bus.add_ok_times(3);
    bus.add_error();

    let mut driver = driver(bus);
    let result = driver.join("test_wifi", "secret").unwrap_err();

    assert_eq!(JoinError::ConnectError(Error::NoMatch), result);
}

#[test]
fn test_join_bus_error() {
    let mut bus = MockBus::new();
    bus.fail();

    let mut driver = driver(bus);
    let result = driver.join("test_wifi", "secret").unwrap_err();

    assert_eq!(JoinError::SsidError(Error::BusError), result);
}

#[test]
fn test_join_invalid_ssid_length() {
    let mut driver = driver(MockBus::new());
    let result = driver.join("0123456789abcdef0123456789abcdefX", "secret").unwrap_err();

    assert_eq!(JoinError::InvalidSsidLength, result);
    assert!(driver.parser().bus().get_sent().is_empty());
}

#[test]
fn test_join_invalid_passphrase_length() {
    let mut driver = driver(MockBus::new());
    let key = "k".repeat(64);
    let result = driver.join("test_wifi", &key).unwrap_err();

    assert_eq!(JoinError::InvalidPassphraseLength, result);
    assert!(driver.parser().bus().get_sent().is_empty());
}

#[test]
fn test_join_max_lengths_accepted() {
    let mut bus = MockBus::new();
    bus.add_ok_times(4);

    let mut driver = driver(bus);
    let ssid = "s".repeat(32);
    let key = "k".repeat(63);

    driver.join(&ssid, &key).unwrap();
}

#[test]
fn test_dhcp() {
    let mut bus = MockBus::new();
    bus.add_ok();
    bus.add_error();

    let mut driver = driver(bus);
    driver.dhcp(true).unwrap();
    assert_eq!(JoinError::DhcpError(Error::NoMatch), driver.dhcp(false).unwrap_err());

    let commands = driver.parser().bus().get_sent_as_strings();
    assert_eq!("C4=1\r\n".to_string(), commands[0]);
    assert_eq!("C4=0\r\n".to_string(), commands[1]);
}

#[test]
fn test_disconnect() {
    let mut bus = MockBus::new();
    bus.add_ok();

    let mut driver = driver(bus);
    driver.disconnect().unwrap();
    assert_eq!(JoinError::DisconnectError(Error::ChannelTimeout), driver.disconnect().unwrap_err());

    assert_eq!("CD\r\n".to_string(), driver.parser().bus().get_sent_as_strings()[0]);
}

#[test]
fn test_get_address() {
    let mut bus = MockBus::new();
    bus.add_frame(ADDRESS_RESPONSE);

    let mut driver = driver(bus);
    let address = driver.get_address().unwrap();

    assert_eq!(Ipv4Addr::new(10, 0, 0, 181), address.ipv4);
    assert_eq!(Ipv4Addr::new(255, 255, 255, 0), address.netmask);
    assert_eq!(Ipv4Addr::new(10, 0, 0, 1), address.gateway);
    assert_eq!(vec!["C?\r\n".to_string()], driver.parser().bus().get_sent_as_strings());
}

#[test]
fn test_get_address_parse_error() {
    let mut bus = MockBus::new();
    bus.add_frame(b"ERROR\r\n> ");

    let mut driver = driver(bus);
    assert_eq!(AddressError::AddressParseError, driver.get_address().unwrap_err());
}

#[test]
fn test_get_address_bus_error() {
    let mut bus = MockBus::new();
    bus.fail();

    let mut driver = driver(bus);
    assert_eq!(AddressError::CommandError(Error::BusError), driver.get_address().unwrap_err());
}

#[test]
fn test_is_connected() {
    let mut bus = MockBus::new();
    bus.add_frame(ADDRESS_RESPONSE);
    bus.add_frame(b"MyAP,secret,3,1,0,0.0.0.0,0.0.0.0,0.0.0.0,0.0.0.0,0.0.0.0,3,0\r\nOK\r\n> ");
    bus.add_frame(b"ERROR\r\n> ");

    let mut driver = driver(bus);
    assert!(driver.is_connected());
    assert!(!driver.is_connected());
    assert!(!driver.is_connected());
}

#[test]
fn test_get_mac_address() {
    let mut bus = MockBus::new();
    bus.add_frame(b"C4:7F:51:01:12:31\r\nOK\r\n> ");

    let mut driver = driver(bus);
    let mac = driver.get_mac_address().unwrap();

    assert_eq!("C4:7F:51:01:12:31", mac.as_str());
    assert_eq!(vec!["Z5\r\n".to_string()], driver.parser().bus().get_sent_as_strings());
}

#[test]
fn test_get_mac_address_timeout() {
    let mut driver = driver(MockBus::new());
    assert_eq!(AddressError::CommandError(Error::ChannelTimeout), driver.get_mac_address().unwrap_err());
}

#[test]
fn test_get_rssi() {
    let mut bus = MockBus::new();
    bus.add_frame(b"-45\r\nOK\r\n> ");
    bus.add_frame(b"\r\n-67\r\nOK\r\n> ");
    bus.add_frame(b"-300\r\nOK\r\n> ");
    bus.add_frame(b"OK\r\n> ");

    let mut driver = driver(bus);
    assert_eq!(Ok(-45), driver.get_rssi());
    assert_eq!(Ok(-67), driver.get_rssi());
    assert_eq!(Err(AddressError::AddressParseError), driver.get_rssi());
    assert_eq!(Err(AddressError::AddressParseError), driver.get_rssi());
    assert_eq!("CR\r\n".to_string(), driver.parser().bus().get_sent_as_strings()[0]);
}

#[test]
fn test_dns_lookup() {
    let mut bus = MockBus::new();
    bus.add_frame(b"93.184.216.34\r\nOK\r\n> ");

    let mut driver = driver(bus);
    let address = driver.dns_lookup("example.com").unwrap();

    assert_eq!(Ipv4Addr::new(93, 184, 216, 34), address);
    assert_eq!(vec!["D0=example.com\r\n".to_string()], driver.parser().bus().get_sent_as_strings());
}

#[test]
fn test_dns_lookup_failed() {
    let mut bus = MockBus::new();
    bus.add_frame(b"ERROR\r\n> ");

    let mut driver = driver(bus);
    assert_eq!(AddressError::AddressParseError, driver.dns_lookup("unknown.host").unwrap_err());
}

#[test]
fn test_dns_lookup_name_too_long() {
    let mut driver = driver(MockBus::new());
    let name = "a".repeat(300);

    assert_eq!(AddressError::CommandError(Error::FormatOverflow), driver.dns_lookup(&name).unwrap_err());
}

#[test]
fn test_scan() {
    let mut bus = MockBus::new();
    bus.add_frame(
        b"#1,\"MyNet\",C4:7F:51:01:12:31,-45,72.2,Infrastructure,WPA2 AES,2.4GHz,6\r\n\
          #2,\"Open Cafe\",00:11:22:aa:bb:cc,-80,54.0,Infrastructure,Open,2.4GHz,11\r\nOK\r\n> ",
    );

    let mut driver = driver(bus);
    let list = driver.scan::<8>().unwrap();

    assert_eq!(2, list.len());
    assert_eq!("MyNet", list[0].ssid.as_str());
    assert_eq!([0xC4, 0x7F, 0x51, 0x01, 0x12, 0x31], list[0].bssid);
    assert_eq!(-45, list[0].rssi);
    assert_eq!(Security::Wpa2, list[0].security);
    assert_eq!(6, list[0].channel);

    assert_eq!("Open Cafe", list[1].ssid.as_str());
    assert_eq!([0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC], list[1].bssid);
    assert_eq!(-80, list[1].rssi);
    assert_eq!(Security::Open, list[1].security);
    assert_eq!(11, list[1].channel);

    assert_eq!(vec!["F0\r\n".to_string()], driver.parser().bus().get_sent_as_strings());
}

#[test]
fn test_scan_security_types() {
    let mut bus = MockBus::new();
    bus.add_frame(
        b"#1,\"a\",00:00:00:00:00:01,-40,72.2,Infrastructure,WPA WPA2 Mixed,2.4GHz,1\r\n\
          #2,\"b\",00:00:00:00:00:02,-50,72.2,Infrastructure,WPA TKIP,2.4GHz,2\r\n\
          #3,\"c\",00:00:00:00:00:03,-60,72.2,Infrastructure,WEP,2.4GHz,3\r\n\
          #4,\"d\",00:00:00:00:00:04,-70,72.2,Infrastructure,Enterprise,2.4GHz,4\r\nOK\r\n> ",
    );

    let mut driver = driver(bus);
    let list = driver.scan::<8>().unwrap();

    let security: Vec<Security> = list.iter().map(|ap| ap.security).collect();
    assert_eq!(vec![Security::WpaWpa2, Security::Wpa, Security::Wep, Security::Unknown], security);
}

#[test]
fn test_scan_limited_entries() {
    let mut bus = MockBus::new();
    bus.add_frame(
        b"#1,\"MyNet\",C4:7F:51:01:12:31,-45,72.2,Infrastructure,WPA2 AES,2.4GHz,6\r\n\
          #2,\"Open Cafe\",00:11:22:aa:bb:cc,-80,54.0,Infrastructure,Open,2.4GHz,11\r\nOK\r\n> ",
    );

    let mut driver = driver(bus);
    let list = driver.scan::<1>().unwrap();

    assert_eq!(1, list.len());
    assert_eq!("MyNet", list[0].ssid.as_str());
}

#[test]
fn test_scan_empty() {
    let mut bus = MockBus::new();
    bus.add_frame(b"OK\r\n> ");

    let mut driver = driver(bus);
    let list: heapless::Vec<AccessPoint, 4> = driver.scan().unwrap();

    assert!(list.is_empty());
}

#[test]
fn test_scan_invalid_bssid() {
    let mut bus = MockBus::new();
    bus.add_frame(b"#1,\"MyNet\",ZZ:7F:51:01:12:31,-45,72.2,Infrastructure,WPA2 AES,2.4GHz,6\r\nOK\r\n> ");

    let mut driver = driver(bus);
    assert_eq!(ScanError::ParseError, driver.scan::<4>().unwrap_err());
}

#[test]
fn test_scan_bus_error() {
    let mut bus = MockBus::new();
    bus.fail();

    let mut driver = driver(bus);
    assert_eq!(ScanError::CommandError(Error::BusError), driver.scan::<4>().unwrap_err());
}

#[test]
fn test_set_timeout_ms() {
    let mut timer = MockTimer::new();
    timer.expect_start().times(1).returning(|duration| {
        assert_eq!(duration, MockTimer::duration_ms(1_500));
        Ok(())
    });
    timer.expect_wait().times(1).returning(|| Ok(()));

    let mut driver: DriverType = Ism43362::new(MockBus::new(), timer);
    driver.set_timeout_ms(1_500);

    assert_eq!(1_500, driver.timeout_ms);
    assert_eq!(JoinError::DisconnectError(Error::ChannelTimeout), driver.disconnect().unwrap_err());
}
