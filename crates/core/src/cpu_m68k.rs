//! Motorola 68000 bus interface and a minimal stub interpreter.
//!
//! The 68000 talks to memory over a 16-bit data bus with two byte-lane
//! strobes (UDS/LDS). A bus access may strobe the upper lane, the lower lane
//! or both. [`MemoryM68k`] is the system-side half of that contract and
//! [`M68kCore`] is what a system's frame loop drives.
//!
//! [`CpuM68k`] only knows a handful of instructions. Anything else is
//! treated as a 4-cycle no-op.

use crate::logging::{log, LogCategory, LogLevel};

/// Which halves of a 16-bit bus transaction are being accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteLanes {
    /// Upper data strobe only: the byte at the even address (bits 15..8)
    High,
    /// Lower data strobe only: the byte at the odd address (bits 7..0)
    Low,
    /// Full word
    Both,
}

impl ByteLanes {
    /// Build from the two strobe lines; no strobe means no access.
    pub fn from_strobes(upper: bool, lower: bool) -> Option<Self> {
        match (upper, lower) {
            (true, true) => Some(ByteLanes::Both),
            (true, false) => Some(ByteLanes::High),
            (false, true) => Some(ByteLanes::Low),
            (false, false) => None,
        }
    }

    pub fn high(self) -> bool {
        matches!(self, ByteLanes::High | ByteLanes::Both)
    }

    pub fn low(self) -> bool {
        matches!(self, ByteLanes::Low | ByteLanes::Both)
    }

    /// Mask selecting the requested halves of a word
    pub fn mask(self) -> u16 {
        match self {
            ByteLanes::High => 0xFF00,
            ByteLanes::Low => 0x00FF,
            ByteLanes::Both => 0xFFFF,
        }
    }
}

/// Memory interface trait for the 68000
pub trait MemoryM68k {
    /// Read the requested lanes of the word at `address`. Unrequested lanes read as 0.
    fn read(&mut self, address: u32, lanes: ByteLanes) -> u16;

    /// Write the requested lanes of `value` to the word at `address`.
    fn write(&mut self, address: u32, lanes: ByteLanes, value: u16);
}

/// The operations a system needs from its primary CPU.
pub trait M68kCore {
    /// Load the reset vectors and enter supervisor mode.
    fn reset<M: MemoryM68k>(&mut self, memory: &mut M);

    /// Advance by one CPU clock.
    fn do_cycle<M: MemoryM68k>(&mut self, memory: &mut M);

    /// Request an autovectored interrupt at `level` (1-7).
    fn interrupt<M: MemoryM68k>(&mut self, memory: &mut M, level: u8);
}

const SR_SUPERVISOR: u16 = 0x2000;
const SR_INTERRUPT_MASK: u16 = 0x0700;

/// 68000 register file plus a cycle countdown for the current instruction.
#[derive(Debug, Clone, Default)]
pub struct CpuM68k {
    /// Data registers
    pub d: [u32; 8],
    /// Address registers; `a[7]` is the active stack pointer
    pub a: [u32; 8],
    /// Inactive stack pointer (user SP while in supervisor mode and vice versa)
    pub other_sp: u32,
    pub pc: u32,
    pub sr: u16,
    pub stopped: bool,
    /// Cycles left before the next instruction is fetched
    pub cycles_remaining: u32,
    pub cycles: u64,
}

impl CpuM68k {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt_mask(&self) -> u8 {
        ((self.sr & SR_INTERRUPT_MASK) >> 8) as u8
    }

    fn read_long<M: MemoryM68k>(memory: &mut M, address: u32) -> u32 {
        let high = memory.read(address, ByteLanes::Both) as u32;
        let low = memory.read(address.wrapping_add(2), ByteLanes::Both) as u32;
        (high << 16) | low
    }

    fn fetch_word<M: MemoryM68k>(&mut self, memory: &mut M) -> u16 {
        let word = memory.read(self.pc, ByteLanes::Both);
        self.pc = self.pc.wrapping_add(2);
        word
    }

    fn push_word<M: MemoryM68k>(&mut self, memory: &mut M, value: u16) {
        self.a[7] = self.a[7].wrapping_sub(2);
        memory.write(self.a[7], ByteLanes::Both, value);
    }

    fn push_long<M: MemoryM68k>(&mut self, memory: &mut M, value: u32) {
        self.push_word(memory, value as u16);
        self.push_word(memory, (value >> 16) as u16);
    }

    fn pop_word<M: MemoryM68k>(&mut self, memory: &mut M) -> u16 {
        let value = memory.read(self.a[7], ByteLanes::Both);
        self.a[7] = self.a[7].wrapping_add(2);
        value
    }

    fn pop_long<M: MemoryM68k>(&mut self, memory: &mut M) -> u32 {
        let high = self.pop_word(memory) as u32;
        let low = self.pop_word(memory) as u32;
        (high << 16) | low
    }

    /// Replace SR, swapping stack pointers when the supervisor bit changes.
    fn set_sr(&mut self, value: u16) {
        if (self.sr ^ value) & SR_SUPERVISOR != 0 {
            std::mem::swap(&mut self.a[7], &mut self.other_sp);
        }
        self.sr = value;
    }

    /// Execute one instruction, returning its cycle cost.
    fn execute<M: MemoryM68k>(&mut self, memory: &mut M) -> u32 {
        let opcode_pc = self.pc;
        let opcode = self.fetch_word(memory);

        match opcode {
            // NOP
            0x4E71 => 4,
            // STOP #imm
            0x4E72 => {
                let sr = self.fetch_word(memory);
                self.set_sr(sr);
                self.stopped = true;
                4
            }
            // RTE
            0x4E73 => {
                let sr = self.pop_word(memory);
                let pc = self.pop_long(memory);
                self.set_sr(sr);
                self.pc = pc;
                20
            }
            // MOVE #imm,SR
            0x46FC => {
                let sr = self.fetch_word(memory);
                self.set_sr(sr);
                12
            }
            // BRA
            0x6000..=0x60FF => {
                let base = opcode_pc.wrapping_add(2);
                let displacement = match opcode as u8 {
                    0 => self.fetch_word(memory) as i16 as i32,
                    short => short as i8 as i32,
                };
                self.pc = base.wrapping_add(displacement as u32);
                10
            }
            _ => {
                log(LogCategory::CPU, LogLevel::Trace, || {
                    format!("68k: unimplemented opcode {:04X} at {:06X}", opcode, opcode_pc)
                });
                4
            }
        }
    }
}

impl M68kCore for CpuM68k {
    fn reset<M: MemoryM68k>(&mut self, memory: &mut M) {
        self.sr = SR_SUPERVISOR | SR_INTERRUPT_MASK;
        self.a[7] = Self::read_long(memory, 0);
        self.pc = Self::read_long(memory, 4);
        self.stopped = false;
        self.cycles_remaining = 0;
        self.cycles = 0;
    }

    fn do_cycle<M: MemoryM68k>(&mut self, memory: &mut M) {
        self.cycles += 1;

        if self.cycles_remaining > 0 {
            self.cycles_remaining -= 1;
            return;
        }

        if self.stopped {
            return;
        }

        // The fetch happens on this cycle.
        self.cycles_remaining = self.execute(memory) - 1;
    }

    fn interrupt<M: MemoryM68k>(&mut self, memory: &mut M, level: u8) {
        let level = level & 7;
        if level == 0 || (level < 7 && level <= self.interrupt_mask()) {
            return;
        }

        let old_sr = self.sr;
        self.set_sr(((old_sr | SR_SUPERVISOR) & !SR_INTERRUPT_MASK) | ((level as u16) << 8));
        let pc = self.pc;
        self.push_long(memory, pc);
        self.push_word(memory, old_sr);

        self.pc = Self::read_long(memory, (24 + level as u32) * 4);
        self.stopped = false;
        self.cycles_remaining = 43;
    }
}
