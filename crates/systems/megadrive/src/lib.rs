//! Sega Mega Drive / Genesis console bus
//!
//! This crate glues independently emulated components into one machine:
//! address decoding for the 68000's 24-bit bus, the joypad ports, and the
//! per-scanline loop that interleaves CPU execution with video interrupts.
//!
//! # Architecture
//!
//! - **CPU**: Motorola 68000 @ MCLK/7, driven through [`emu_core::cpu_m68k::M68kCore`]
//! - **VDP**: Yamaha YM7101, behind the [`VideoProcessor`] trait
//! - **Z80 / YM2612 / PSG**: not emulated; their ports are accepted no-ops
//! - **RAM**: 64 KB work RAM, 8 KB Z80 RAM
//! - **Cartridge**: up to 4 MB ROM
//!
//! Memory map (68000 side):
//!
//! | Range               | Device                         |
//! |---------------------|--------------------------------|
//! | 0x000000-ROM end    | Cartridge ROM                  |
//! | 0xA00000-0xA01FFF   | Z80 RAM (byte-wide)            |
//! | 0xA04000/0xA04002   | YM2612 (stub)                  |
//! | 0xA10000-0xA1001F   | I/O: joypad data/control       |
//! | 0xA11000-0xA11200   | Memory mode, Z80 bus/reset (stub) |
//! | 0xC00000-0xC00007   | VDP data and control ports     |
//! | 0xC00008/0xC00010   | H/V counter, PSG (stub)        |
//! | 0xE00000-0xFFFFFF   | Work RAM, mirrored every 64 KB |

mod bus;
mod config;
mod joypad;
mod memory;
mod system;
mod timing;
mod vdp;

pub use bus::{decode, M68kBus, Region, VdpBus};
pub use config::MachineConfig;
pub use joypad::{Button, Joypad};
pub use memory::{MegaDriveMemory, Rom, ROM_CAPACITY, WORK_RAM_SIZE, Z80_RAM_SIZE};
pub use system::{MegaDrive, MegaDriveError, H_INT_LEVEL, VERTICAL_RESOLUTION, V_INT_LEVEL};
pub use timing::{Timing, MASTER_CLOCK_NTSC, MASTER_CLOCK_PAL};
pub use vdp::{DmaSource, Vdp, VideoProcessor};
