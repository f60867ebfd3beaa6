use emu_core::cpu_m68k::{ByteLanes, MemoryM68k};
use emu_core::logging::LogConfig;
use emu_megadrive::{Button, DmaSource, M68kBus, MegaDrive, Vdp, VdpBus, ROM_CAPACITY};
use log::{Log, Metadata, Record};
use std::sync::{Mutex, Once, PoisonError};

/// Keeps every record the emulator emits as (target, message).
struct RecordingLogger {
    records: Mutex<Vec<(String, String)>>,
}

impl Log for RecordingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((record.target().to_string(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger {
    records: Mutex::new(Vec::new()),
};
static INSTALL: Once = Once::new();
// The logger and LogConfig are process-wide; tests take turns.
static SERIAL: Mutex<()> = Mutex::new(());

/// Run `f` with default log levels and return the `emu::bus` messages it produced.
fn bus_messages(f: impl FnOnce()) -> Vec<String> {
    let _turn = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(log::LevelFilter::Trace);
        LogConfig::global().set_rate_limit(100_000);
    });
    LogConfig::global().reset();
    LOGGER
        .records
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();

    f();

    LOGGER
        .records
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain(..)
        .filter(|(target, _)| target == "emu::bus")
        .map(|(_, message)| message)
        .collect()
}

fn system_with_rom(rom: &[u8]) -> MegaDrive {
    let mut system = MegaDrive::new();
    system.install_rom(rom).unwrap();
    system
}

fn with_bus(rom: &[u8], f: impl FnOnce(&mut M68kBus<'_, Vdp>)) {
    let mut system = system_with_rom(rom);
    let mut released = |_: Button| false;
    let mut bus = M68kBus::new(system.memory_mut(), &mut released);
    f(&mut bus);
}

fn assert_single_record(messages: &[String], address: &str) {
    assert_eq!(messages.len(), 1, "records: {:?}", messages);
    assert!(
        messages[0].contains(address),
        "{:?} does not mention {}",
        messages[0],
        address
    );
}

#[test]
fn test_rom_write_is_logged() {
    let messages = bus_messages(|| {
        with_bus(&[0x12, 0x34, 0x56, 0x78], |bus| {
            bus.write(0x000002, ByteLanes::Both, 0xFFFF);
        });
    });
    assert_single_record(&messages, "0x000002");
    assert!(messages[0].contains("ROM"));
}

#[test]
fn test_z80_word_read_is_logged() {
    let messages = bus_messages(|| {
        with_bus(&[], |bus| {
            assert_eq!(bus.read(0xA00020, ByteLanes::Both), 0);
        });
    });
    assert_single_record(&messages, "0xA00020");
}

#[test]
fn test_z80_word_write_is_logged() {
    let messages = bus_messages(|| {
        with_bus(&[], |bus| bus.write(0xA00030, ByteLanes::Both, 0x1234));
    });
    assert_single_record(&messages, "0xA00030");
}

#[test]
fn test_unmapped_read_is_logged() {
    let messages = bus_messages(|| {
        with_bus(&[], |bus| {
            assert_eq!(bus.read(0xB00000, ByteLanes::Both), 0);
        });
    });
    assert_single_record(&messages, "0xB00000");
}

#[test]
fn test_unmapped_write_is_logged() {
    let messages = bus_messages(|| {
        with_bus(&[], |bus| bus.write(0xD00010, ByteLanes::Low, 0x00FF));
    });
    assert_single_record(&messages, "0xD00010");
}

#[test]
fn test_vdp_view_invalid_read_is_logged() {
    let messages = bus_messages(|| {
        let system = system_with_rom(&[0x11, 0x22]);
        let memory = system.memory();
        let view = VdpBus {
            rom: &memory.rom,
            work_ram: &memory.work_ram,
        };
        assert_eq!(view.read_word(0xA10002), 0);
    });
    assert_single_record(&messages, "0xA10002");
}

#[test]
fn test_oversized_install_is_logged() {
    let messages = bus_messages(|| {
        let mut system = MegaDrive::new();
        assert!(system.install_rom(&vec![0; ROM_CAPACITY + 1]).is_err());
    });
    assert_single_record(&messages, &(ROM_CAPACITY + 1).to_string());
}

#[test]
fn test_stub_ports_are_silent() {
    let messages = bus_messages(|| {
        with_bus(&[], |bus| {
            let stubs = [
                0xA04000, 0xA04002, 0xA10010, 0xA11000, 0xA11100, 0xA11200, 0xC00008, 0xC00010,
            ];
            for address in stubs {
                bus.read(address, ByteLanes::Both);
                bus.write(address, ByteLanes::Both, 0xFFFF);
            }
        });
    });
    assert!(messages.is_empty(), "records: {:?}", messages);
}

#[test]
fn test_valid_accesses_are_silent() {
    let messages = bus_messages(|| {
        with_bus(&[0x4E, 0x71], |bus| {
            bus.read(0x000000, ByteLanes::Both);
            bus.write(0xFF0000, ByteLanes::Both, 0xBEEF);
            bus.read(0xA00000, ByteLanes::High);
            bus.write(0xA10008, ByteLanes::Low, 0x0040);
            bus.read(0xA10002, ByteLanes::Low);
        });
    });
    assert!(messages.is_empty(), "records: {:?}", messages);
}

#[test]
fn test_global_off_suppresses_bus_errors() {
    let messages = bus_messages(|| {
        LogConfig::global().apply_spec("off").unwrap();
        with_bus(&[], |bus| {
            bus.read(0xB00000, ByteLanes::Both);
        });
    });
    assert!(messages.is_empty());
}
