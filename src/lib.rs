//! # ISM43362 AT driver
//!
//! AT command engine and buffered SPI transport for Inventek ISM43362 WIFI modules, built on
//! [embedded-hal](embedded_hal) 1.0.
//!
//! The crate is layered:
//! * [spi::BufferedSpi] frames the module's 16 bit SPI protocol into a byte stream ([bus::Bus]).
//! * [parser::AtParser] sends commands and matches responses, dispatching out-of-band notifications.
//! * [wifi::Ism43362] implements the module command set (WIFI and [sockets](stack)).
//!
//! Timeouts are measured by a [fugit_timer::Timer], so any HAL timer may be used.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

extern crate alloc;

// Needs to be declared first, so the macros are visible to all other modules
mod fmt;

pub mod buffer;
pub mod bus;
pub(crate) mod commands;
pub mod oob;
pub mod parser;
pub mod pattern;
pub mod responses;
pub mod spi;
pub mod stack;
pub mod transport;
pub mod wifi;

#[cfg(any(feature = "shared", test))]
pub mod shared;

#[cfg(feature = "examples")]
pub mod example;

#[cfg(test)]
mod tests;
