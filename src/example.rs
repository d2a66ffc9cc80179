//! Mocks for doc examples
use crate::bus::Bus;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::convert::Infallible;
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;

/// Bus mock replying to the ISM43362 commands used by the doc examples
#[derive(Default)]
pub struct ExampleBus {
    /// Frames pending to be pulled
    frames: VecDeque<Vec<u8>>,

    /// Inbound bytes
    rx: VecDeque<u8>,

    /// Queued outbound bytes
    tx: Vec<u8>,
}

impl ExampleBus {
    /// Adds a frame in front of all command replies
    pub fn add_frame(&mut self, frame: &[u8]) {
        self.frames.push_back(frame.to_vec());
    }

    fn respond(&mut self, command: &[u8]) {
        let response: &[u8] = match command {
            b"C?\r\n" => b"test_wifi,secret,3,1,0,10.0.0.181,255.255.255.0,10.0.0.1,8.8.8.8,8.8.4.4,3,1\r\nOK\r\n> ",
            b"R0\r\n" => b"nice to see you!\r\nOK\r\n> ",
            _ => b"OK\r\n> ",
        };

        self.frames.push_back(response.to_vec());
    }
}

impl Bus for ExampleBus {
    type Error = Infallible;

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
        256
    }

    fn write_frame(&mut self, data: &[u8]) -> Result<usize, Infallible> {
        self.tx.clear();
        self.respond(data);
        Ok(data.len())
    }

    fn send_queued(&mut self) -> Result<usize, Infallible> {
        let frame = core::mem::take(&mut self.tx);
        self.respond(&frame);
        Ok(frame.len())
    }

    fn read_frame(&mut self, max: Option<usize>) -> Result<usize, Infallible> {
        let frame = self.frames.pop_front().unwrap_or_default();
        let length = max.map_or(frame.len(), |max| frame.len().min(max));

        self.rx.extend(&frame[..length]);
        Ok(length)
    }

    fn read_frame_into(&mut self, data: &mut [u8]) -> Result<usize, Infallible> {
        let frame = self.frames.pop_front().unwrap_or_default();
        let length = frame.len().min(data.len());

        data[..length].copy_from_slice(&frame[..length]);
        Ok(length)
    }
}

/// Timer mock, expiring immediately
#[derive(Default)]
pub struct ExampleTimer {}

impl Timer<1_000_000> for ExampleTimer {
    type Error = Infallible;

    fn now(&mut self) -> TimerInstantU32<1_000_000> {
        TimerInstantU32::from_ticks(0)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000_000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}
