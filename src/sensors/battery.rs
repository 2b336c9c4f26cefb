//! LC709203F LiPo fuel gauge on I2C.
//!
//! Every register is 16 bits, transferred little-endian and followed by a
//! CRC-8 (ATM, poly 0x07) computed over the bus address bytes, the
//! register and the data.  A bad CRC is reported rather than retried; the
//! flusher treats it like any other failed reading.
//!
//! Generic over [`embedded_hal::i2c::I2c`], so the same driver runs on
//! `esp_idf_hal::i2c::I2cDriver` and on a mock bus in tests.

use embedded_hal::i2c::I2c;
use log::debug;

use crate::app::ports::{BatteryGauge, BatteryReading};
use crate::error::SensorReadError;

pub const LC709203F_ADDR: u8 = 0x0B;

const REG_CELL_VOLTAGE: u8 = 0x09;
const REG_RSOC: u8 = 0x0D;
const REG_POWER_MODE: u8 = 0x15;
const POWER_MODE_OPERATIONAL: u16 = 0x0001;

/// Plausible single-cell LiPo range.
const MIN_MILLIVOLTS: u16 = 2_500;
const MAX_MILLIVOLTS: u16 = 4_500;

/// CRC-8/ATM: poly 0x07, init 0x00, no reflection.
pub fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |mut crc, &b| {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
        crc
    })
}

pub struct Lc709203f<I2C> {
    bus: I2C,
    address: u8,
}

impl<I2C: I2c> Lc709203f<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self {
            bus,
            address: LC709203F_ADDR,
        }
    }

    /// Switch the gauge to operational mode.  It powers up in sleep mode
    /// on some boards.
    pub fn wake(&mut self) -> Result<(), SensorReadError> {
        self.write_word(REG_POWER_MODE, POWER_MODE_OPERATIONAL)
    }

    fn read_word(&mut self, reg: u8) -> Result<u16, SensorReadError> {
        let mut buf = [0u8; 3];
        self.bus
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorReadError::Bus)?;
        let addr_w = self.address << 1;
        let expected = crc8(&[addr_w, reg, addr_w | 1, buf[0], buf[1]]);
        if expected != buf[2] {
            debug!("LC709203F: crc mismatch on 0x{:02x} ({:02x} != {:02x})", reg, buf[2], expected);
            return Err(SensorReadError::Crc);
        }
        Ok(u16::from_le_bytes([buf[0], buf[1]]))
    }

    fn write_word(&mut self, reg: u8, value: u16) -> Result<(), SensorReadError> {
        let [lo, hi] = value.to_le_bytes();
        let crc = crc8(&[self.address << 1, reg, lo, hi]);
        self.bus
            .write(self.address, &[reg, lo, hi, crc])
            .map_err(|_| SensorReadError::Bus)
    }
}

impl<I2C: I2c> BatteryGauge for Lc709203f<I2C> {
    fn read(&mut self) -> Result<BatteryReading, SensorReadError> {
        let millivolts = self.read_word(REG_CELL_VOLTAGE)?;
        if !(MIN_MILLIVOLTS..=MAX_MILLIVOLTS).contains(&millivolts) {
            return Err(SensorReadError::OutOfRange);
        }
        let rsoc = self.read_word(REG_RSOC)?;
        let soc_percent = u8::try_from(rsoc)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(SensorReadError::OutOfRange)?;
        Ok(BatteryReading {
            millivolts,
            soc_percent,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
