//! Mega Drive Video Display Processor (YM7101)
//!
//! The bus only needs the [`VideoProcessor`] operations: the two ports, a
//! scanline render step and the interrupt-enable bits. [`Vdp`] is a reduced
//! implementation that keeps the register file, command latch, memories and
//! DMA engine, but renders every line as the backdrop colour.
//!
//! # Features
//! - 24 registers written through the control port
//! - VRAM (64 KB), CRAM (64 colours), VSRAM (40 entries)
//! - 68000 → VRAM/CRAM/VSRAM DMA, VRAM fill and VRAM copy
//! - H32 (256 px) and H40 (320 px) line widths, 224 visible lines

use emu_core::logging::{log, LogCategory, LogLevel};

/// Memory the VDP may read during a DMA transfer.
pub trait DmaSource {
    fn read_word(&self, address: u32) -> u16;
}

/// Video processor operations used by the bus and the frame loop.
pub trait VideoProcessor {
    /// Return to power-on state.
    fn init(&mut self);

    fn read_data(&mut self) -> u16;

    fn write_data(&mut self, value: u16);

    /// Status register read
    fn read_control(&mut self) -> u16;

    /// Command, register or DMA trigger write. DMA reads go through `dma`.
    fn write_control(&mut self, value: u16, dma: &dyn DmaSource);

    /// Render `line` and hand the pixels to `on_scanline(line, pixels, width, height)`.
    fn render_scanline(&mut self, line: u16, on_scanline: &mut dyn FnMut(u16, &[u32], u16, u16));

    fn h_int_enabled(&self) -> bool;

    fn v_int_enabled(&self) -> bool;
}

const VRAM_SIZE: usize = 0x10000;
const REGISTER_COUNT: usize = 24;
const VSRAM_LEN: usize = 40;
const SCREEN_HEIGHT: u16 = 224;
const MAX_LINE_WIDTH: usize = 320;

// Status register bits
const STATUS_FIXED: u16 = 0x3400;
const STATUS_FIFO_EMPTY: u16 = 0x0200;
const STATUS_VINT_PENDING: u16 = 0x0080;
const STATUS_VBLANK: u16 = 0x0008;

// Command code targets (CD3..CD0)
const CODE_VRAM_READ: u8 = 0x00;
const CODE_VRAM_WRITE: u8 = 0x01;
const CODE_CRAM_WRITE: u8 = 0x03;
const CODE_VSRAM_READ: u8 = 0x04;
const CODE_VSRAM_WRITE: u8 = 0x05;
const CODE_CRAM_READ: u8 = 0x08;
const CODE_DMA: u8 = 0x20;

/// VDP state and rendering
pub struct Vdp {
    vram: Box<[u8; VRAM_SIZE]>,
    cram: [u16; 64],
    vsram: [u16; VSRAM_LEN],
    registers: [u8; REGISTER_COUNT],

    // Command latch
    address: u16,
    code: u8,
    write_pending: bool,
    fill_pending: bool,

    vint_pending: bool,
    in_vblank: bool,

    line_buffer: [u32; MAX_LINE_WIDTH],
}

impl Vdp {
    /// Bytes held outside the struct itself (VRAM)
    pub const HEAP_SIZE: usize = VRAM_SIZE;

    pub fn new() -> Self {
        Self {
            vram: Box::new([0; VRAM_SIZE]),
            cram: [0; 64],
            vsram: [0; VSRAM_LEN],
            registers: [0; REGISTER_COUNT],
            address: 0,
            code: 0,
            write_pending: false,
            fill_pending: false,
            vint_pending: false,
            in_vblank: false,
            line_buffer: [0; MAX_LINE_WIDTH],
        }
    }

    pub fn register(&self, index: usize) -> u8 {
        self.registers.get(index).copied().unwrap_or(0)
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram[..]
    }

    pub fn cram(&self) -> &[u16] {
        &self.cram
    }

    pub fn vsram(&self) -> &[u16] {
        &self.vsram
    }

    fn display_enabled(&self) -> bool {
        self.registers[1] & 0x40 != 0
    }

    fn dma_enabled(&self) -> bool {
        self.registers[1] & 0x10 != 0
    }

    fn line_width(&self) -> u16 {
        if self.registers[12] & 0x01 != 0 {
            320
        } else {
            256
        }
    }

    fn auto_increment(&self) -> u16 {
        self.registers[15] as u16
    }

    fn dma_length(&self) -> u32 {
        match (self.registers[20] as u32) << 8 | self.registers[19] as u32 {
            0 => 0x10000,
            length => length,
        }
    }

    fn write_register(&mut self, index: usize, value: u8) {
        match self.registers.get_mut(index) {
            Some(register) => *register = value,
            None => log(LogCategory::VDP, LogLevel::Debug, || {
                format!("VDP: write to nonexistent register {} ({:02X})", index, value)
            }),
        }
    }

    /// Store a word at the command address in the selected memory, then advance.
    fn write_target(&mut self, value: u16) {
        let address = self.address as usize;
        match self.code & 0x0F {
            CODE_VRAM_WRITE => {
                self.vram[address] = (value >> 8) as u8;
                self.vram[address ^ 1] = value as u8;
            }
            CODE_CRAM_WRITE => self.cram[(address >> 1) & 0x3F] = value & 0x0EEE,
            CODE_VSRAM_WRITE => {
                if let Some(entry) = self.vsram.get_mut(address >> 1) {
                    *entry = value & 0x07FF;
                }
            }
            code => log(LogCategory::VDP, LogLevel::Debug, || {
                format!("VDP: data write with read code {:02X}", code)
            }),
        }
        self.address = self.address.wrapping_add(self.auto_increment());
    }

    fn run_dma(&mut self, dma: &dyn DmaSource) {
        let length = self.dma_length();
        match self.registers[23] >> 6 {
            0 | 1 => {
                let mut source = ((self.registers[23] as u32 & 0x7F) << 17)
                    | ((self.registers[22] as u32) << 9)
                    | ((self.registers[21] as u32) << 1);
                log(LogCategory::VDP, LogLevel::Debug, || {
                    format!(
                        "VDP: 68k DMA {:06X} -> {:04X} ({} words, code {:02X})",
                        source, self.address, length, self.code
                    )
                });
                for _ in 0..length {
                    let word = dma.read_word(source);
                    self.write_target(word);
                    source = source.wrapping_add(2) & 0xFF_FFFF;
                }
            }
            2 => self.fill_pending = true,
            _ => {
                let mut source = (self.registers[22] as u16) << 8 | self.registers[21] as u16;
                for _ in 0..length {
                    self.vram[self.address as usize] = self.vram[source as usize];
                    source = source.wrapping_add(1);
                    self.address = self.address.wrapping_add(self.auto_increment());
                }
            }
        }
    }

    fn run_fill(&mut self, value: u16) {
        self.fill_pending = false;
        let fill = (value >> 8) as u8;
        self.write_target(value);
        for _ in 0..self.dma_length() {
            self.vram[self.address as usize] = fill;
            self.address = self.address.wrapping_add(self.auto_increment());
        }
    }
}

impl Default for Vdp {
    fn default() -> Self {
        Self::new()
    }
}

/// 0000BBB0GGG0RRR0 → 0xAARRGGBB
fn cram_to_argb(color: u16) -> u32 {
    let scale = |c: u16| ((c & 0x0E) as u32 >> 1) * 255 / 7;
    0xFF00_0000 | scale(color) << 16 | scale(color >> 4) << 8 | scale(color >> 8)
}

impl VideoProcessor for Vdp {
    fn init(&mut self) {
        *self = Self::new();
    }

    fn read_data(&mut self) -> u16 {
        self.write_pending = false;
        let address = self.address as usize;
        let value = match self.code & 0x0F {
            CODE_VRAM_READ => {
                let even = address & 0xFFFE;
                (self.vram[even] as u16) << 8 | self.vram[even | 1] as u16
            }
            CODE_CRAM_READ => self.cram[(address >> 1) & 0x3F],
            CODE_VSRAM_READ => self.vsram.get(address >> 1).copied().unwrap_or(0),
            code => {
                log(LogCategory::VDP, LogLevel::Debug, || {
                    format!("VDP: data read with write code {:02X}", code)
                });
                0
            }
        };
        self.address = self.address.wrapping_add(self.auto_increment());
        value
    }

    fn write_data(&mut self, value: u16) {
        self.write_pending = false;
        if self.fill_pending {
            self.run_fill(value);
        } else {
            self.write_target(value);
        }
    }

    fn read_control(&mut self) -> u16 {
        self.write_pending = false;
        let mut status = STATUS_FIXED | STATUS_FIFO_EMPTY;
        if self.vint_pending {
            status |= STATUS_VINT_PENDING;
        }
        if self.in_vblank {
            status |= STATUS_VBLANK;
        }
        self.vint_pending = false;
        status
    }

    fn write_control(&mut self, value: u16, dma: &dyn DmaSource) {
        if !self.write_pending {
            if value & 0xC000 == 0x8000 {
                self.write_register(((value >> 8) & 0x1F) as usize, value as u8);
                return;
            }
            // First half: CD1-CD0 and A13-A0
            self.code = (self.code & 0x3C) | (value >> 14) as u8;
            self.address = (self.address & 0xC000) | (value & 0x3FFF);
            self.write_pending = true;
        } else {
            // Second half: CD5-CD2 and A15-A14
            self.write_pending = false;
            self.code = (self.code & 0x03) | ((value >> 2) as u8 & 0x3C);
            self.address = (self.address & 0x3FFF) | ((value & 0x0003) << 14);

            if self.code & CODE_DMA != 0 && self.dma_enabled() {
                self.run_dma(dma);
            }
        }
    }

    fn render_scanline(&mut self, line: u16, on_scanline: &mut dyn FnMut(u16, &[u32], u16, u16)) {
        self.in_vblank = false;

        let width = self.line_width();
        let color = if self.display_enabled() {
            cram_to_argb(self.cram[(self.registers[7] & 0x3F) as usize])
        } else {
            0xFF00_0000
        };
        let pixels = &mut self.line_buffer[..width as usize];
        pixels.fill(color);
        on_scanline(line, pixels, width, SCREEN_HEIGHT);

        if line + 1 == SCREEN_HEIGHT {
            self.in_vblank = true;
            self.vint_pending = true;
        }
    }

    fn h_int_enabled(&self) -> bool {
        self.registers[0] & 0x10 != 0
    }

    fn v_int_enabled(&self) -> bool {
        self.registers[1] & 0x20 != 0
    }
}
