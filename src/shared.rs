//! # Shared driver
//!
//! The engine supports a single exchange in flight. [SharedDriver] serializes access from multiple
//! contexts by holding a critical section mutex for the duration of an exchange.
//!
//! ## Example
//!
//! ````
//! # use ism43362_at::example::{ExampleBus, ExampleTimer};
//! # use ism43362_at::shared::SharedDriver;
//! # use ism43362_at::wifi::{Ism43362, WifiAdapter};
//! #
//! let driver: Ism43362<_, _, 1_000_000, 256> = Ism43362::new(ExampleBus::default(), ExampleTimer::default());
//! let shared = SharedDriver::new(driver);
//!
//! let connected = shared.exchange(|driver| driver.is_connected()).unwrap();
//! assert!(connected);
//! ````
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Errors of shared access
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Exchange was started from within another exchange
    Reentrant,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Reentrant => defmt::write!(f, "Error::Reentrant"),
        }
    }
}

/// Driver guarded by a critical section mutex
pub struct SharedDriver<D> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<D>>,
}

impl<D> SharedDriver<D> {
    pub const fn new(driver: D) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(driver)),
        }
    }

    /// Runs the given exchange with exclusive access to the driver. The lock is released on return.
    pub fn exchange<R>(&self, exchange: impl FnOnce(&mut D) -> R) -> Result<R, Error> {
        self.inner.lock(|cell| {
            let mut driver = cell.try_borrow_mut().map_err(|_| Error::Reentrant)?;
            Ok(exchange(&mut driver))
        })
    }

    pub fn into_inner(self) -> D {
        self.inner.into_inner().into_inner()
    }
}
