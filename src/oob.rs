//! Registry of out-of-band notifications
use alloc::vec::Vec;

/// A single registered notification
#[derive(Copy, Clone)]
struct Registration<C> {
    /// Prefix to be matched exactly (length and content)
    prefix: &'static [u8],

    /// Action invoked on match
    callback: C,
}

/// Ordered set of (prefix, callback) registrations. The most recently registered prefix is checked first.
///
/// Prefixes are matched by exact length, so registered prefixes should not be prefixes of one another.
pub struct OobRegistry<C: Copy> {
    registrations: Vec<Registration<C>>,
}

impl<C: Copy> Default for OobRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Copy> OobRegistry<C> {
    pub const fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Adds a registration. There is no removal, registrations live as long as the registry.
    pub fn register(&mut self, prefix: &'static str, callback: C) {
        self.registrations.push(Registration {
            prefix: prefix.as_bytes(),
            callback,
        });
    }

    /// Returns the prefix and callback of the registration exactly matching the given bytes
    pub fn find(&self, accumulated: &[u8]) -> Option<(&'static [u8], C)> {
        self.registrations
            .iter()
            .rev()
            .find(|registration| registration.prefix == accumulated)
            .map(|registration| (registration.prefix, registration.callback))
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
