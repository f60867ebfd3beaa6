//! Mega Drive machine: lifecycle, configuration and the per-frame driver

use crate::bus::M68kBus;
use crate::config::MachineConfig;
use crate::joypad::Button;
use crate::memory::{MegaDriveMemory, ROM_CAPACITY};
use crate::timing::Timing;
use crate::vdp::{Vdp, VideoProcessor};
use emu_core::cpu_m68k::{CpuM68k, M68kCore};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::Frame;
use emu_core::{MountPointInfo, System};
use thiserror::Error;

/// Visible lines driven per frame
pub const VERTICAL_RESOLUTION: u16 = 224;

/// Autovector level of the horizontal interrupt
pub const H_INT_LEVEL: u8 = 4;

/// Autovector level of the vertical interrupt
pub const V_INT_LEVEL: u8 = 6;

const CARTRIDGE: &str = "cartridge";

/// Mega Drive emulator errors
#[derive(Debug, Error)]
pub enum MegaDriveError {
    #[error("ROM image of {size} bytes exceeds the {capacity} byte cartridge buffer")]
    RomTooLarge { size: usize, capacity: usize },
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Sega Mega Drive / Genesis
///
/// The CPU is kept beside the memory it drives rather than owning it, so a
/// frame can lend both to the bus binding at once.
pub struct MegaDrive<C = CpuM68k, V = Vdp> {
    cpu: C,
    memory: MegaDriveMemory<V>,
    pal: bool,
    japanese: bool,
    timing: Timing,
    /// Buttons reported by [`System::step_frame`], one bit per [`Button::mask`]
    held_buttons: u8,
}

impl MegaDrive {
    pub fn new() -> Self {
        Self::with_components(CpuM68k::new(), Vdp::new())
    }

    /// Byte size of the machine, buffers included
    pub fn state_size() -> usize {
        std::mem::size_of::<Self>() + MegaDriveMemory::<Vdp>::heap_size() + Vdp::HEAP_SIZE
    }
}

impl Default for MegaDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: M68kCore, V: VideoProcessor> MegaDrive<C, V> {
    /// Build a machine around an existing CPU core and video processor.
    pub fn with_components(cpu: C, vdp: V) -> Self {
        let mut system = Self {
            cpu,
            memory: MegaDriveMemory::new(vdp),
            pal: false,
            japanese: false,
            timing: Timing::default(),
            held_buttons: 0,
        };
        system.init();
        system
    }

    /// Put the video processor in its power-on state.
    pub fn init(&mut self) {
        self.memory.vdp.init();
    }

    /// Reload the CPU's reset vectors through the bus. RAM and ROM are kept.
    pub fn reset(&mut self) {
        let Self { cpu, memory, .. } = self;
        let mut nothing_pressed = |_: Button| false;
        let mut bus = M68kBus::new(memory, &mut nothing_pressed);
        cpu.reset(&mut bus);
    }

    /// Copy a cartridge image into the ROM buffer.
    ///
    /// An image larger than the buffer is rejected and the previous ROM stays mapped.
    pub fn install_rom(&mut self, data: &[u8]) -> Result<(), MegaDriveError> {
        if !self.memory.rom.install(data) {
            log(LogCategory::Bus, LogLevel::Error, || {
                format!(
                    "ROM image of {} bytes is larger than the {} byte cartridge buffer",
                    data.len(),
                    ROM_CAPACITY
                )
            });
            return Err(MegaDriveError::RomTooLarge {
                size: data.len(),
                capacity: ROM_CAPACITY,
            });
        }
        Ok(())
    }

    pub fn set_rom_writeable(&mut self, writeable: bool) {
        self.memory.rom.writeable = writeable;
    }

    pub fn set_pal(&mut self, pal: bool) {
        self.pal = pal;
    }

    pub fn set_japanese(&mut self, japanese: bool) {
        self.japanese = japanese;
    }

    pub fn set_timing(&mut self, timing: Timing) -> Result<(), MegaDriveError> {
        if let Some(field) = timing.zero_divisor() {
            return Err(MegaDriveError::InvalidConfig(format!(
                "timing.{} must be non-zero",
                field
            )));
        }
        self.timing = timing;
        Ok(())
    }

    /// Apply every setting in `config`; nothing changes if it is invalid.
    pub fn apply_config(&mut self, config: &MachineConfig) -> Result<(), MegaDriveError> {
        if let Some(timing) = config.timing {
            self.set_timing(timing)?;
        }
        self.set_pal(config.pal);
        self.set_japanese(config.japanese);
        self.set_rom_writeable(config.rom_writeable);
        Ok(())
    }

    pub fn load_config(&mut self, json: &str) -> Result<(), MegaDriveError> {
        let config = MachineConfig::from_json(json)?;
        self.apply_config(&config)
    }

    pub fn pal(&self) -> bool {
        self.pal
    }

    pub fn japanese(&self) -> bool {
        self.japanese
    }

    pub fn rom_writeable(&self) -> bool {
        self.memory.rom.writeable
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Budget units stepped per scanline under the current region
    pub fn cycles_per_scanline(&self) -> u32 {
        self.timing.cycles_per_scanline(self.pal)
    }

    /// Buttons [`System::step_frame`] reports as pressed until the next call
    pub fn set_held_buttons(&mut self, buttons: &[Button]) {
        self.held_buttons = buttons.iter().fold(0, |mask, button| mask | button.mask());
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn memory(&self) -> &MegaDriveMemory<V> {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MegaDriveMemory<V> {
        &mut self.memory
    }

    /// Emulate one video frame.
    ///
    /// `on_scanline(line, pixels, width, height)` receives each rendered line in
    /// order. `read_input(button)` is queried whenever the game reads port 1.
    pub fn run_frame<F, I>(&mut self, mut on_scanline: F, mut read_input: I)
    where
        F: FnMut(u16, &[u32], u16, u16),
        I: FnMut(Button) -> bool,
    {
        let units = self.timing.cycles_per_scanline(self.pal);
        let sub_cycles = self.timing.sub_cycles.max(1);

        let Self { cpu, memory, .. } = self;
        let mut bus = M68kBus::new(memory, &mut read_input);

        for line in 0..VERTICAL_RESOLUTION {
            for _ in 0..units * sub_cycles {
                cpu.do_cycle(&mut bus);
            }

            bus.vdp_mut().render_scanline(line, &mut on_scanline);

            if bus.vdp().h_int_enabled() {
                log(LogCategory::Interrupts, LogLevel::Trace, || {
                    format!("H-INT after line {}", line)
                });
                cpu.interrupt(&mut bus, H_INT_LEVEL);
            }
        }

        if bus.vdp().v_int_enabled() {
            log(LogCategory::Interrupts, LogLevel::Trace, || "V-INT".to_string());
            cpu.interrupt(&mut bus, V_INT_LEVEL);
        }
    }
}

impl<C: M68kCore, V: VideoProcessor> System for MegaDrive<C, V> {
    type Error = MegaDriveError;

    fn reset(&mut self) {
        MegaDrive::reset(self);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        let held = self.held_buttons;
        let mut frame: Option<Frame> = None;

        self.run_frame(
            |line, pixels, width, height| {
                frame
                    .get_or_insert_with(|| Frame::new(width as u32, height as u32))
                    .blit_line(line as u32, pixels);
            },
            move |button| held & button.mask() != 0,
        );

        Ok(frame.unwrap_or_else(|| Frame::new(320, VERTICAL_RESOLUTION as u32)))
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: CARTRIDGE.to_string(),
            name: "Cartridge Slot".to_string(),
            extensions: ["md", "gen", "bin", "smd"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE {
            return Err(MegaDriveError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.install_rom(data)?;
        MegaDrive::reset(self);
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE {
            return Err(MegaDriveError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.memory.rom.eject();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == CARTRIDGE && self.memory.rom.size() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reset vectors: SSP 0xFFFE00, PC 0x000200, then a BRA.S to itself.
    fn looping_rom() -> Vec<u8> {
        let mut rom = vec![0; 0x400];
        rom[0..4].copy_from_slice(&[0x00, 0xFF, 0xFE, 0x00]);
        rom[4..8].copy_from_slice(&[0x00, 0x00, 0x02, 0x00]);
        rom[0x200..0x202].copy_from_slice(&[0x60, 0xFE]);
        rom
    }

    #[test]
    fn test_system_creation() {
        let system = MegaDrive::new();
        assert_eq!(system.mount_points()[0].id, "cartridge");
        assert!(!system.is_mounted("cartridge"));
        assert!(!system.pal());
        assert_eq!(system.cycles_per_scanline(), 28);
    }

    #[test]
    fn test_pal_budget() {
        let mut system = MegaDrive::new();
        system.set_pal(true);
        assert_eq!(system.cycles_per_scanline(), 33);
    }

    #[test]
    fn test_mount_resets_cpu() {
        let mut system = MegaDrive::new();
        system.mount("cartridge", &looping_rom()).unwrap();
        assert!(system.is_mounted("cartridge"));
        assert_eq!(system.cpu().pc, 0x200);
        assert_eq!(system.cpu().a[7], 0xFFFE00);
        assert_eq!(system.cpu().sr, 0x2700);
    }

    #[test]
    fn test_unmount_keeps_buffer_but_unmaps() {
        let mut system = MegaDrive::new();
        system.mount("cartridge", &looping_rom()).unwrap();
        system.unmount("cartridge").unwrap();
        assert!(!system.is_mounted("cartridge"));
        assert_eq!(system.memory().rom.size(), 0);
    }

    #[test]
    fn test_invalid_mount_point() {
        let mut system = MegaDrive::new();
        assert!(matches!(
            system.mount("floppy", &[0; 4]),
            Err(MegaDriveError::InvalidMountPoint(id)) if id == "floppy"
        ));
        assert!(system.unmount("floppy").is_err());
        assert!(!system.is_mounted("floppy"));
    }

    #[test]
    fn test_oversized_rom_is_rejected() {
        let mut system = MegaDrive::new();
        system.install_rom(&[0x12; 8]).unwrap();

        let err = system.install_rom(&vec![0; ROM_CAPACITY + 1]).unwrap_err();
        assert!(matches!(
            err,
            MegaDriveError::RomTooLarge { size, capacity }
                if size == ROM_CAPACITY + 1 && capacity == ROM_CAPACITY
        ));
        assert_eq!(system.memory().rom.size(), 8);
        assert_eq!(system.memory().rom.as_slice(), &[0x12; 8]);
    }

    #[test]
    fn test_zero_divisor_is_rejected() {
        let mut system = MegaDrive::new();
        let timing = Timing {
            lines: 0,
            ..Timing::default()
        };
        assert!(matches!(
            system.set_timing(timing),
            Err(MegaDriveError::InvalidConfig(_))
        ));
        assert_eq!(*system.timing(), Timing::default());
    }

    #[test]
    fn test_invalid_config_changes_nothing() {
        let mut system = MegaDrive::new();
        let result = system.load_config(r#"{ "pal": true, "timing": { "cpu_divider": 0 } }"#);
        assert!(matches!(result, Err(MegaDriveError::InvalidConfig(_))));
        assert!(!system.pal());
    }

    #[test]
    fn test_load_config() {
        let mut system = MegaDrive::new();
        system
            .load_config(r#"{ "pal": true, "japanese": true, "rom_writeable": true }"#)
            .unwrap();
        assert!(system.pal());
        assert!(system.japanese());
        assert!(system.rom_writeable());

        assert!(matches!(
            system.load_config("not json"),
            Err(MegaDriveError::Config(_))
        ));
    }

    #[test]
    fn test_step_frame_dimensions() {
        let mut system = MegaDrive::new();
        system.mount("cartridge", &looping_rom()).unwrap();

        let frame = system.step_frame().unwrap();
        assert_eq!(frame.height, 224);
        assert_eq!(frame.width, 256);
        assert_eq!(frame.pixels.len(), 256 * 224);
    }

    #[test]
    fn test_set_held_buttons_builds_mask() {
        let mut system = MegaDrive::new();
        system.set_held_buttons(&[Button::Up, Button::Start]);
        assert_eq!(system.held_buttons, Button::Up.mask() | Button::Start.mask());
        system.set_held_buttons(&[]);
        assert_eq!(system.held_buttons, 0);
    }

    #[test]
    fn test_reset_keeps_ram() {
        let mut system = MegaDrive::new();
        system.mount("cartridge", &looping_rom()).unwrap();
        system.memory_mut().work_ram[0x1234] = 0x5A;
        System::reset(&mut system);
        assert_eq!(system.memory().work_ram[0x1234], 0x5A);
        assert!(system.is_mounted("cartridge"));
    }

    #[test]
    fn test_state_size_counts_buffers() {
        // ROM, work RAM, Z80 RAM and VRAM
        let buffers = ROM_CAPACITY + 0x10000 + 0x2000 + 0x10000;
        assert_eq!(
            MegaDrive::state_size(),
            std::mem::size_of::<MegaDrive>() + buffers
        );
        assert_eq!(Vdp::HEAP_SIZE, Vdp::new().vram().len());
    }
}
