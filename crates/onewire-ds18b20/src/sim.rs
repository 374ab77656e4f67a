//! A simulated 1-Wire bus for the unit tests.
//!
//! Every handle shares one [`Bus`] whose virtual clock only advances through
//! [`SimDelay`]. The bus decodes the master's pulses the way a real device
//! does, lets a simulated peer pull the line low, and records every timing
//! rule the master breaks.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use crate::atomic::InterruptMask;
use crate::pin::BusPin;

const NS_PER_US: u64 = 1_000;

const RESET_MIN_NS: u64 = 480 * NS_PER_US;
const RESET_MAX_NS: u64 = 960 * NS_PER_US;
const WRITE_1_MAX_LOW_NS: u64 = 15 * NS_PER_US;
const WRITE_0_MIN_LOW_NS: u64 = 60 * NS_PER_US;
const WRITE_0_MAX_LOW_NS: u64 = 120 * NS_PER_US;
const READ_SAMPLE_MAX_NS: u64 = 15 * NS_PER_US;
const SLOT_MIN_NS: u64 = 60 * NS_PER_US;
const RECOVERY_MIN_NS: u64 = NS_PER_US;
const DEVICE_0_HOLD_NS: u64 = 30 * NS_PER_US;

// Scratchpad content after power-on: 85 °C, TH, TL, 12-bit configuration.
const POWER_ON_SCRATCHPAD: [u8; 9] = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x1C];

/// What sits on the simulated line next to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Peer {
    /// Nothing answers.
    Absent,
    /// Something keeps the line low forever.
    StuckLow,
    /// Answers resets, records written bytes and sends them back on request.
    Loopback,
    /// A `DS18B20` addressed through Skip ROM.
    Ds18b20,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Record,
    Rom,
    Function,
    WriteScratchpad(usize),
    Converting,
    Transmit(VecDeque<bool>),
}

/// Sample fault reported by a [`SimPin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SimFault;

pub(crate) struct Bus {
    now: u64,
    peer: Peer,
    output: bool,
    latch_low: bool,
    masked: usize,
    low_since: u64,
    last_fall: Option<u64>,
    last_release: Option<u64>,
    last_pulse_short: bool,
    reset_release: Option<u64>,
    presence_us: (u64, u64),
    presence: Option<(u64, u64)>,
    pull: Option<(u64, u64)>,
    phase: Phase,
    rx: u8,
    rx_bits: u8,
    scratchpad: [u8; 9],
    temperature: [u8; 2],
    conversion_ns: u64,
    conversion_done: Option<u64>,
    fail_samples: bool,
    resets: usize,
    slots: usize,
    captured: Vec<u8>,
    violations: Vec<String>,
}

impl Bus {
    fn new(peer: Peer) -> Self {
        Self {
            now: 0,
            peer,
            output: false,
            latch_low: false,
            masked: 0,
            low_since: 0,
            last_fall: None,
            last_release: None,
            last_pulse_short: false,
            reset_release: None,
            presence_us: (15, 135),
            presence: None,
            pull: None,
            phase: Phase::Idle,
            rx: 0,
            rx_bits: 0,
            scratchpad: POWER_ON_SCRATCHPAD,
            temperature: [0x50, 0x05],
            conversion_ns: 1_000 * NS_PER_US,
            conversion_done: None,
            fail_samples: false,
            resets: 0,
            slots: 0,
            captured: Vec::new(),
            violations: Vec::new(),
        }
    }

    fn violation(&mut self, what: String) {
        self.violations.push(format!("{what} at {} ns", self.now));
    }

    fn within(window: Option<(u64, u64)>, now: u64) -> bool {
        window.is_some_and(|(start, end)| (start..end).contains(&now))
    }

    fn line_high(&mut self) -> bool {
        self.finish_conversion();
        let master_low = self.output && self.latch_low;
        let peer_low = self.peer == Peer::StuckLow
            || Self::within(self.presence, self.now)
            || Self::within(self.pull, self.now);
        !(master_low || peer_low)
    }

    fn finish_conversion(&mut self) {
        if let Some(done) = self.conversion_done
            && self.now >= done
        {
            self.scratchpad[..2].copy_from_slice(&self.temperature);
            self.conversion_done = None;
        }
    }

    fn set_output(&mut self) {
        if self.output {
            return;
        }
        self.output = true;
        if !self.latch_low {
            self.violation(String::from("line actively driven high"));
            return;
        }
        self.fall();
    }

    fn set_input(&mut self) {
        if !self.output {
            return;
        }
        self.output = false;
        if self.latch_low {
            self.release();
        }
    }

    fn set_low(&mut self) {
        if self.output && !self.latch_low {
            self.latch_low = true;
            self.fall();
        }
        self.latch_low = true;
    }

    fn fall(&mut self) {
        if let Some(release) = self.last_release
            && self.now - release < RECOVERY_MIN_NS
        {
            self.violation(String::from("recovery time too short"));
        }
        if let Some(fall) = self.last_fall
            && self.last_pulse_short
            && self.now - fall < SLOT_MIN_NS + RECOVERY_MIN_NS
        {
            self.violation(String::from("time slot too short"));
        }
        if let Some(release) = self.reset_release
            && self.now - release < RESET_MIN_NS
        {
            self.violation(String::from("reset high time too short"));
        }
        self.reset_release = None;
        self.low_since = self.now;
        self.last_fall = Some(self.now);
    }

    fn release(&mut self) {
        let low = self.now - self.low_since;
        self.last_release = Some(self.now);
        self.last_pulse_short = low < RESET_MIN_NS;

        if low >= RESET_MIN_NS {
            self.reset(low);
        } else if low < WRITE_1_MAX_LOW_NS {
            self.slot(true);
        } else if (WRITE_0_MIN_LOW_NS..=WRITE_0_MAX_LOW_NS).contains(&low) {
            self.slot(false);
        } else {
            self.violation(format!("unexpected low pulse of {low} ns"));
        }
    }

    fn reset(&mut self, low: u64) {
        if low > RESET_MAX_NS {
            self.violation(format!("reset pulse of {low} ns"));
        }
        self.resets += 1;
        self.reset_release = Some(self.now);
        self.pull = None;
        self.rx = 0;
        self.rx_bits = 0;

        if self.peer == Peer::Absent {
            return;
        }

        let (start, end) = self.presence_us;
        self.presence = Some((
            self.now + start * NS_PER_US,
            self.now + end * NS_PER_US,
        ));
        self.phase = match self.peer {
            Peer::Loopback => Phase::Record,
            Peer::Ds18b20 => Phase::Rom,
            Peer::Absent | Peer::StuckLow => Phase::Idle,
        };
    }

    fn slot(&mut self, released: bool) {
        if self.masked == 0 {
            self.violation(String::from("time slot outside an atomic section"));
        }
        self.slots += 1;
        self.pull = None;
        self.finish_conversion();

        let fall = self.low_since;
        match &mut self.phase {
            Phase::Transmit(bits) => {
                if released && bits.pop_front() == Some(false) {
                    self.pull = Some((fall, fall + DEVICE_0_HOLD_NS));
                }
                if bits.is_empty() && self.peer == Peer::Loopback {
                    self.phase = Phase::Record;
                }
            }
            Phase::Converting => {
                if released && self.conversion_done.is_some() {
                    self.pull = Some((fall, fall + DEVICE_0_HOLD_NS));
                }
            }
            Phase::Idle => {}
            _ => self.receive(released),
        }
    }

    fn receive(&mut self, bit: bool) {
        self.rx |= u8::from(bit) << self.rx_bits;
        self.rx_bits += 1;
        if self.rx_bits < 8 {
            return;
        }

        let byte = self.rx;
        self.rx = 0;
        self.rx_bits = 0;
        self.captured.push(byte);

        self.phase = match (&self.phase, byte) {
            (Phase::Record, _) => Phase::Record,
            (Phase::Rom, 0xCC) => Phase::Function,
            (Phase::Function, 0x4E) => Phase::WriteScratchpad(0),
            (Phase::Function, 0x44) => {
                self.conversion_done = Some(self.now + self.conversion_ns);
                Phase::Converting
            }
            (Phase::Function, 0xBE) => Phase::Transmit(Self::bits_of(&self.scratchpad)),
            (Phase::WriteScratchpad(index), _) => {
                self.scratchpad[2 + index] = byte;
                if index + 1 < 3 {
                    Phase::WriteScratchpad(index + 1)
                } else {
                    Phase::Idle
                }
            }
            (phase, byte) => {
                self.violations.push(format!(
                    "unexpected byte {byte:#04x} in {phase:?} at {} ns",
                    self.now
                ));
                Phase::Idle
            }
        };
    }

    fn bits_of(bytes: &[u8]) -> VecDeque<bool> {
        bytes
            .iter()
            .flat_map(|byte| (0..8u8).map(move |i| (byte >> i) & 1 == 1))
            .collect()
    }

    fn sample(&mut self) -> Result<bool, SimFault> {
        if self.fail_samples {
            return Err(SimFault);
        }

        let in_presence_window = self
            .reset_release
            .is_some_and(|release| self.now - release < RESET_MIN_NS);
        let in_read_slot = self.last_pulse_short
            && self
                .last_fall
                .is_some_and(|fall| self.now - fall < SLOT_MIN_NS);

        if in_read_slot
            && let Some(fall) = self.last_fall
            && self.now - fall > READ_SAMPLE_MAX_NS
        {
            self.violation(String::from("read slot sampled too late"));
        }
        if (in_presence_window || in_read_slot) && self.masked == 0 {
            self.violation(String::from("sample outside an atomic section"));
        }

        Ok(self.line_high())
    }
}

/// Handle to a simulated bus, producing the pin, delay and mask of a master.
pub(crate) struct Sim {
    bus: Rc<RefCell<Bus>>,
}

impl Sim {
    pub(crate) fn new(peer: Peer) -> Self {
        Self {
            bus: Rc::new(RefCell::new(Bus::new(peer))),
        }
    }

    /// Moves the presence pulse, in microseconds after the reset release.
    pub(crate) fn with_presence(self, start_us: u64, end_us: u64) -> Self {
        self.bus.borrow_mut().presence_us = (start_us, end_us);
        self
    }

    pub(crate) fn with_conversion_time_us(self, us: u64) -> Self {
        self.bus.borrow_mut().conversion_ns = us * NS_PER_US;
        self
    }

    /// Value latched into the scratchpad by the next completed conversion.
    pub(crate) fn with_temperature(self, raw: i16) -> Self {
        self.bus.borrow_mut().temperature = raw.to_le_bytes();
        self
    }

    pub(crate) fn pin(&self) -> SimPin {
        SimPin(self.bus.clone())
    }

    pub(crate) fn delay(&self) -> SimDelay {
        SimDelay(self.bus.clone())
    }

    pub(crate) fn mask(&self) -> SimMask {
        SimMask(self.bus.clone())
    }

    /// Queues the last recorded byte for transmission.
    pub(crate) fn echo(&self) {
        let mut bus = self.bus.borrow_mut();
        let last = bus.captured.last().copied().unwrap_or_default();
        bus.phase = Phase::Transmit(Bus::bits_of(&[last]));
    }

    /// Removes the peer from the line.
    pub(crate) fn disconnect(&self) {
        self.bus.borrow_mut().peer = Peer::Absent;
    }

    pub(crate) fn fail_samples(&self) {
        self.bus.borrow_mut().fail_samples = true;
    }

    pub(crate) fn captured(&self) -> Vec<u8> {
        self.bus.borrow().captured.clone()
    }

    pub(crate) fn scratchpad(&self) -> [u8; 9] {
        self.bus.borrow().scratchpad
    }

    pub(crate) fn resets(&self) -> usize {
        self.bus.borrow().resets
    }

    pub(crate) fn slots(&self) -> usize {
        self.bus.borrow().slots
    }

    pub(crate) fn masked(&self) -> usize {
        self.bus.borrow().masked
    }

    pub(crate) fn now_us(&self) -> u64 {
        self.bus.borrow().now / NS_PER_US
    }

    pub(crate) fn violations(&self) -> Vec<String> {
        self.bus.borrow().violations.clone()
    }
}

pub(crate) struct SimPin(Rc<RefCell<Bus>>);

impl BusPin for SimPin {
    type Error = SimFault;

    fn set_output(&mut self) -> Result<(), SimFault> {
        self.0.borrow_mut().set_output();
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), SimFault> {
        self.0.borrow_mut().set_input();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), SimFault> {
        self.0.borrow_mut().set_low();
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, SimFault> {
        self.0.borrow_mut().sample()
    }
}

pub(crate) struct SimDelay(Rc<RefCell<Bus>>);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().now += u64::from(ns);
    }
}

pub(crate) struct SimMask(Rc<RefCell<Bus>>);

impl InterruptMask for SimMask {
    type State = ();

    fn mask(&mut self) {
        self.0.borrow_mut().masked += 1;
    }

    unsafe fn restore(&mut self, _state: ()) {
        self.0.borrow_mut().masked -= 1;
    }
}
