//! Simulated sensor bus.
//!
//! Implements [`RegisterReader`] for one temperature/humidity probe so the
//! node runs end to end before a bus driver is attached. Register map
//! (holding registers, scaled x10):
//!
//! | Reg | Quantity           | Encoding       |
//! |-----|--------------------|----------------|
//! | 0   | relative humidity  | u16, %RH x10   |
//! | 1   | temperature        | i16, degC x10  |
//!
//! Values drift slowly with every read. Other registers answer with
//! exception 0x02 (illegal data address); other unit ids time out.

use log::debug;

use crate::app::ports::{BusError, RegisterReader};

/// Exception code for a register the slave does not have.
pub const ILLEGAL_DATA_ADDRESS: u8 = 0x02;

pub struct SimulatedBus {
    unit_id: u8,
    reads: u32,
}

impl SimulatedBus {
    pub fn new(unit_id: u8) -> Self {
        Self { unit_id, reads: 0 }
    }

    /// Triangle wave in `0..=2 * amplitude`, advancing one step per read.
    fn drift(&self, period: u32, amplitude: i32) -> i32 {
        let phase = (self.reads % period) as i32;
        let half = (period / 2) as i32;
        let tri = if phase < half { phase } else { 2 * half - phase };
        tri * 2 * amplitude / half.max(1)
    }
}

impl RegisterReader for SimulatedBus {
    fn read_register(&mut self, unit_id: u8, register: u16) -> Result<u16, BusError> {
        if unit_id != self.unit_id {
            return Err(BusError::Timeout);
        }
        self.reads = self.reads.wrapping_add(1);
        let raw = match register {
            0 => (450 + self.drift(120, 50)) as u16,
            1 => (190 + self.drift(200, 30)) as i16 as u16,
            _ => return Err(BusError::Exception(ILLEGAL_DATA_ADDRESS)),
        };
        debug!("SimBus: unit {} reg {} -> {}", unit_id, register, raw);
        Ok(raw)
    }
}
