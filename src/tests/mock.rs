use crate::bus::Bus;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::spi::{ErrorKind, ErrorType as SpiErrorType, SpiBus};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer as FugitTimer;
use mockall::mock;

/// Scripted framed bus. Frames get pulled in the same order as inserted.
pub struct MockBus {
    /// Frames returned by subsequent read_frame() calls
    frames: VecDeque<Vec<u8>>,

    /// Inbound bytes
    rx: VecDeque<u8>,

    /// Queued outbound bytes
    tx: Vec<u8>,

    /// Transmitted frames
    sent: Vec<Vec<u8>>,

    /// Max. argument of each read_frame() call
    read_limits: Vec<Option<usize>>,

    /// Outbound capacity
    tx_capacity: usize,

    /// Fails all bus transactions if true
    fail: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            rx: VecDeque::new(),
            tx: Vec::new(),
            sent: Vec::new(),
            read_limits: Vec::new(),
            tx_capacity: 256,
            fail: false,
        }
    }

    /// Adds a frame to be pulled
    pub fn add_frame(&mut self, frame: &[u8]) {
        self.frames.push_back(frame.to_vec());
    }

    /// Adds the standard reply of a successful command
    pub fn add_ok(&mut self) {
        self.add_frame(b"OK\r\n> ");
    }

    /// Adds the given number of standard replies
    pub fn add_ok_times(&mut self, count: usize) {
        for _ in 0..count {
            self.add_ok();
        }
    }

    /// Adds the reply of a failed command
    pub fn add_error(&mut self) {
        self.add_frame(b"ERROR\r\nUSAGE: bad parameter\r\n> ");
    }

    /// Puts bytes directly into the inbound buffer
    pub fn add_rx(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    pub fn set_tx_capacity(&mut self, capacity: usize) {
        self.tx_capacity = capacity;
    }

    pub fn fail(&mut self) {
        self.fail = true;
    }

    /// Returns the transmitted frames
    pub fn get_sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Returns a copy of the transmitted frames as strings
    pub fn get_sent_as_strings(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|frame| String::from_utf8(frame.clone()).unwrap())
            .collect()
    }

    pub fn get_read_limits(&self) -> &[Option<usize>] {
        &self.read_limits
    }

    /// Number of frames not pulled yet
    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of inbound bytes not consumed yet
    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }
}

impl Bus for MockBus {
    type Error = ();

    fn readable(&self) -> bool {
        !self.rx.is_empty()
    }

    fn writeable(&self) -> bool {
        true
    }

    fn getc(&mut self) -> Option<u8> {
        self.rx.pop_front()
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
        self.tx_capacity
    }

    fn write_frame(&mut self, data: &[u8]) -> Result<usize, ()> {
        if self.fail {
            return Err(());
        }

        self.tx.clear();
        self.sent.push(data.to_vec());
        Ok(data.len())
    }

    fn send_queued(&mut self) -> Result<usize, ()> {
        if self.fail {
            return Err(());
        }

        let frame = core::mem::take(&mut self.tx);
        let length = frame.len();
        self.sent.push(frame);
        Ok(length)
    }

    fn read_frame(&mut self, max: Option<usize>) -> Result<usize, ()> {
        if self.fail {
            return Err(());
        }

        self.read_limits.push(max);
        let frame = self.frames.pop_front().unwrap_or_default();
        let length = max.map_or(frame.len(), |max| frame.len().min(max));

        self.rx.extend(&frame[..length]);
        Ok(length)
    }

    fn read_frame_into(&mut self, data: &mut [u8]) -> Result<usize, ()> {
        if self.fail {
            return Err(());
        }

        let frame = self.frames.pop_front().unwrap_or_default();
        let length = frame.len().min(data.len());

        data[..length].copy_from_slice(&frame[..length]);
        Ok(length)
    }
}

/// State of the simulated SPI module, shared by bus and pin mocks
pub struct SpiState {
    /// Words clocked out by the module
    pub incoming: VecDeque<u16>,

    /// Words clocked in by the host
    pub sent: Vec<u16>,

    /// NSS currently asserted?
    pub nss_low: bool,

    /// NSS level changes, true = asserted
    pub nss_history: Vec<bool>,

    /// Data-ready level while NSS is released and nothing is pending
    pub idle_ready: bool,

    /// Forces the data-ready level
    pub ready_override: Option<bool>,

    /// Fails all SPI transfers if true
    pub fail: bool,
}

impl SpiState {
    pub fn shared() -> Rc<RefCell<SpiState>> {
        Rc::new(RefCell::new(Self {
            incoming: VecDeque::new(),
            sent: Vec::new(),
            nss_low: false,
            nss_history: Vec::new(),
            idle_ready: true,
            ready_override: None,
            fail: false,
        }))
    }

    /// Adds words as transmitted by the module
    pub fn add_words(&mut self, words: &[u16]) {
        self.incoming.extend(words);
    }

    fn is_ready(&self) -> bool {
        if let Some(ready) = self.ready_override {
            return ready;
        }

        !self.incoming.is_empty() || (!self.nss_low && self.idle_ready)
    }
}

pub struct MockSpi(pub Rc<RefCell<SpiState>>);

impl SpiErrorType for MockSpi {
    type Error = ErrorKind;
}

impl SpiBus<u16> for MockSpi {
    fn read(&mut self, words: &mut [u16]) -> Result<(), ErrorKind> {
        self.transfer_in_place(words)
    }

    fn write(&mut self, words: &[u16]) -> Result<(), ErrorKind> {
        let mut buffer = words.to_vec();
        self.transfer_in_place(&mut buffer)
    }

    fn transfer(&mut self, read: &mut [u16], write: &[u16]) -> Result<(), ErrorKind> {
        let mut buffer = write.to_vec();
        self.transfer_in_place(&mut buffer)?;
        read.copy_from_slice(&buffer[..read.len()]);
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u16]) -> Result<(), ErrorKind> {
        let mut state = self.0.borrow_mut();
        if state.fail {
            return Err(ErrorKind::Other);
        }

        for word in words.iter_mut() {
            state.sent.push(*word);
            *word = state.incoming.pop_front().unwrap_or(0);
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }
}

/// Chip select line
pub struct MockNss(pub Rc<RefCell<SpiState>>);

impl PinErrorType for MockNss {
    type Error = Infallible;
}

impl OutputPin for MockNss {
    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        state.nss_low = true;
        state.nss_history.push(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        state.nss_low = false;
        state.nss_history.push(false);
        Ok(())
    }
}

/// Data-ready line
pub struct MockReady(pub Rc<RefCell<SpiState>>);

impl PinErrorType for MockReady {
    type Error = Infallible;
}

impl InputPin for MockReady {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.borrow().is_ready())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().is_ready())
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

mock! {
    pub Timer{}

    impl FugitTimer<1_000_000> for Timer {
        type Error = u32;

        fn now(&mut self) -> TimerInstantU32<1000000>;
        fn start(&mut self, duration: TimerDurationU32<1000000>) -> Result<(), u32>;
        fn cancel(&mut self) -> Result<(), u32>;
        fn wait(&mut self) -> nb::Result<(), u32>;
    }
}

impl MockTimer {
    /// Short hand helper for returning a milliseconds duration
    pub fn duration_ms(duration: u32) -> TimerDurationU32<1_000_000> {
        TimerDurationU32::millis(duration)
    }

    /// Timer expiring on the first wait() call
    pub fn expiring() -> Self {
        let mut timer = MockTimer::new();
        timer.expect_start().returning(|_| Ok(()));
        timer.expect_wait().returning(|| Ok(()));
        timer
    }
}
