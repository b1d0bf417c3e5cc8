//! In-memory bus adapter for tests and bench-top simulation.

use std::collections::{BTreeMap, HashSet};

use crate::{control_table, BusError, ServoBus, HOME_POSITION};

/// A recorded register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub id: u8,
    pub addr: u8,
    pub value: u16,
}

/// Simulated servo bus backed by a register map.
///
/// Servos listed at construction answer pings and hold registers; goal
/// position writes are mirrored into present position so position reads
/// behave like an instantly settling servo. Failure injection covers the
/// transport-fault paths the real bus exhibits.
pub struct MockBus {
    present: HashSet<u8>,
    registers: BTreeMap<(u8, u8), u16>,
    writes: Vec<WriteRecord>,
    fail_reads: usize,
    fail_writes: usize,
    fail_pings: usize,
}

impl MockBus {
    pub fn new(ids: &[u8]) -> Self {
        let mut registers = BTreeMap::new();
        for &id in ids {
            registers.insert((id, control_table::PRESENT_POSITION), HOME_POSITION);
        }
        Self {
            present: ids.iter().copied().collect(),
            registers,
            writes: Vec::new(),
            fail_reads: 0,
            fail_writes: 0,
            fail_pings: 0,
        }
    }

    /// Make the next `n` reads fail with a timeout.
    pub fn fail_next_reads(&mut self, n: usize) {
        self.fail_reads = n;
    }

    /// Make the next `n` writes fail with a timeout.
    pub fn fail_next_writes(&mut self, n: usize) {
        self.fail_writes = n;
    }

    /// Make the next `n` pings fail with a timeout.
    pub fn fail_next_pings(&mut self, n: usize) {
        self.fail_pings = n;
    }

    /// Force a present-position register, overriding the goal mirror.
    pub fn set_present_position(&mut self, id: u8, value: u16) {
        self.registers.insert((id, control_table::PRESENT_POSITION), value);
    }

    /// Last value written to `(id, addr)`, if any write happened.
    pub fn register(&self, id: u8, addr: u8) -> Option<u16> {
        self.registers.get(&(id, addr)).copied()
    }

    /// All writes in issue order.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Writes against a single register, in issue order.
    pub fn writes_to(&self, addr: u8) -> Vec<WriteRecord> {
        self.writes.iter().copied().filter(|w| w.addr == addr).collect()
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

impl ServoBus for MockBus {
    fn write_register(&mut self, id: u8, addr: u8, value: u16) -> Result<(), BusError> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(BusError::Timeout);
        }
        if !self.present.contains(&id) {
            return Err(BusError::Timeout);
        }
        self.registers.insert((id, addr), value);
        if addr == control_table::GOAL_POSITION {
            self.registers.insert((id, control_table::PRESENT_POSITION), value);
        }
        self.writes.push(WriteRecord { id, addr, value });
        Ok(())
    }

    fn read_register(&mut self, id: u8, addr: u8) -> Result<u16, BusError> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(BusError::Timeout);
        }
        if !self.present.contains(&id) {
            return Err(BusError::Timeout);
        }
        Ok(self.registers.get(&(id, addr)).copied().unwrap_or(0))
    }

    fn ping(&mut self, id: u8) -> Result<bool, BusError> {
        if self.fail_pings > 0 {
            self.fail_pings -= 1;
            return Err(BusError::Timeout);
        }
        Ok(self.present.contains(&id))
    }
}
