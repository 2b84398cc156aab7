//! BIOS-stub interrupt services.
//!
//! Real hardware loads a BIOS ROM and lets guest code call into it via the
//! IVT. Here the IVT is never populated for these vectors at all: the CPU
//! core's `Memory8086::intercept_interrupt` seam lets `PcBus` answer
//! INT 10h/11h/12h/13h/16h directly, in Rust, before the interrupt dispatch
//! machinery would otherwise push flags/CS/IP and jump into nothing.

use crate::bus::PcBus;
use emu_core::cpu_8086::InterruptRegs;
use emu_core::log;
use emu_core::logging::{LogCategory, LogLevel};

pub use boot_priority::BootPriority;

mod boot_priority {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
    pub enum BootPriority {
        #[default]
        FloppyFirst,
        HardDriveFirst,
        FloppyOnly,
        HardDriveOnly,
    }
}

/// Answer a software interrupt in place of IVT dispatch. Returns `false`
/// for vectors this BIOS doesn't stub, letting the CPU fall back to its
/// normal push-flags/CS/IP-and-jump behavior.
pub fn intercept(bus: &mut PcBus, vector: u8, regs: &mut InterruptRegs) -> bool {
    match vector {
        0x10 => {
            video_service(bus, regs);
            true
        }
        0x11 => {
            // Equipment list: floppy present, 1 floppy drive, video=EGA/VGA (color 80x25).
            regs.ax = 0x0021;
            true
        }
        0x12 => {
            // Conventional memory size in KB. This core doesn't vary it.
            regs.ax = 640;
            true
        }
        0x13 => {
            disk_service(bus, regs);
            true
        }
        0x16 => {
            // Keyboard status: no keyboard device behind this core, so
            // polling loops see "no key available" rather than hanging on
            // a device that will never respond.
            regs.ax = 0;
            regs.cf = false;
            true
        }
        _ => false,
    }
}

fn video_service(bus: &mut PcBus, regs: &mut InterruptRegs) {
    let ah = (regs.ax >> 8) as u8;
    match ah {
        0x00 => {
            let mode = regs.ax as u8;
            bus.vga.set_mode(mode);
            log!(LogCategory::Interrupts, LogLevel::Debug, "INT 10h AH=00 set mode {:#04x}", mode);
        }
        0x02 => {
            let row = (regs.dx >> 8) as u8;
            let col = regs.dx as u8;
            let addr = row as u16 * bus.vga.cols.max(1) + col as u16;
            bus.vga.set_cursor_address(addr);
        }
        0x03 => {
            let addr = bus.vga.cursor_address();
            let cols = bus.vga.cols.max(1);
            let row = (addr / cols) as u8;
            let col = (addr % cols) as u8;
            regs.dx = ((row as u16) << 8) | col as u16;
            regs.cx = 0; // cursor shape, not modeled
        }
        0x0F => {
            let cols = bus.vga.cols.min(u8::MAX as u16) as u8;
            regs.ax = ((cols as u16) << 8) | bus.vga.video_mode as u16;
            regs.bx &= 0xFF00; // page 0
        }
        _ => {}
    }
    regs.cf = false;
}

fn disk_service(bus: &mut PcBus, regs: &mut InterruptRegs) {
    let ah = (regs.ax >> 8) as u8;
    let al = regs.ax as u8;
    let cl = regs.cx as u8;
    let ch = (regs.cx >> 8) as u8;
    let dh = (regs.dx >> 8) as u8;
    let dl = regs.dx as u8;
    let es = regs.es;
    let bx = regs.bx;

    // `disk` is owned by `bus`, and `DiskBios::service` needs a `&mut
    // PcBus` to reach guest RAM through `Memory8086`. Taking it out first
    // avoids borrowing `bus` through one of its own fields.
    let mut disk = std::mem::take(&mut bus.disk);
    let result = disk.service(bus, ah, al, cl, ch, dh, dl, es, bx);
    bus.disk = disk;

    regs.ax = ((result.ah as u16) << 8) | result.al as u16;
    regs.cf = result.cf;
}
