//! IBM PC/XT-class system implementation.
//!
//! Wires the 8086 core to a flat memory/port bus, an 8259 PIC, an INT 13h
//! disk table and a plane-based VGA adapter, and drives them with a tick
//! scheduler that mirrors fake86's `exec86`-quantum-plus-PIT-tick loop.

#![allow(clippy::upper_case_acronyms)]

mod bios;
mod bus;
mod cpu;
mod disk;
pub mod pic;
pub mod pit;
pub mod vga;

pub use bios::BootPriority;
pub use bus::PcBus;
pub use cpu::{CpuRegisters, PcCpu};
pub use disk::DiskBios;
pub use pit::Pit;

use emu_core::{types::Frame, MountPointInfo, System};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PcError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mount point: {0}")]
    InvalidMountPoint(String),
}

/// Instructions executed per scheduler quantum, between PIT clocking and
/// the pending-hard-reset check. Not cycle-exact (§1 excludes that); just
/// a pacing knob, matching fake86's `exec86(n)` call.
pub const DEFAULT_QUANTUM: u32 = 10_000;

/// Shared run-control flags a host thread can flip without holding a lock
/// on the rest of `PcSystem`. Mirrors spec's `running`/`dohardreset`/
/// `scrmodechange` triple, modeled as atomics the way the teacher's
/// `Cell<_>` fields on `PcBus` already model single-thread interior
/// mutability for register state touched mid-`step()`.
#[derive(Default)]
pub struct Scheduler {
    pub running: AtomicBool,
    pub dohardreset: AtomicBool,
    pub scrmodechange: AtomicU8,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            dohardreset: AtomicBool::new(false),
            scrmodechange: AtomicU8::new(0),
        }
    }

    pub fn request_hard_reset(&self) {
        self.dohardreset.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// PC system state: CPU+bus, the external PIT collaborator, and the
/// scheduler's run-control flags.
pub struct PcSystem {
    cpu: PcCpu,
    pit: Pit,
    scheduler: Scheduler,
    cycles: u64,
    quantum: u32,
}

impl Default for PcSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl PcSystem {
    pub fn new() -> Self {
        let bus = PcBus::new();
        let mut cpu = PcCpu::new(bus);
        let (cs, ip) = cpu.bus_mut().bootstrap();
        cpu.set_entry(cs, ip);

        Self {
            cpu,
            pit: Pit::new(),
            scheduler: Scheduler::new(),
            cycles: 0,
            quantum: DEFAULT_QUANTUM,
        }
    }

    pub fn set_quantum(&mut self, quantum: u32) {
        self.quantum = quantum.max(1);
    }

    pub fn set_boot_priority(&mut self, priority: BootPriority) {
        self.cpu.bus_mut().boot_priority = priority;
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn load_bios(&mut self, path: &str, fatal: bool) -> Result<(), PcError> {
        self.cpu.bus_mut().load_bios(path, fatal)
    }

    pub fn load_disk(&mut self, num: u8, path: &str, fatal: bool) -> Result<(), PcError> {
        self.cpu.bus_mut().load_disk(num, path, fatal)
    }

    /// Run one quantum of CPU instructions, clock the PIT against the
    /// cycles consumed, and raise/deliver IRQ0 when the PIT's terminal
    /// count fires and the guest has interrupts enabled.
    fn run_quantum(&mut self) {
        let mut executed = 0u32;
        while executed < self.quantum {
            let cycles = self.cpu.step();
            self.cycles += cycles as u64;
            executed += 1;

            if self.pit.clock(cycles) {
                self.cpu.bus_mut().pic.raise_irq(0);
            }
            self.pit.clear_timer_interrupt();

            if self.cpu.interrupts_enabled() && self.cpu.bus_mut().pic.pending() {
                let vector = self.cpu.bus_mut().pic.next_interrupt();
                self.cpu.deliver_hardware_interrupt(vector);
            }
        }
    }

    fn render_frame(&self) -> Frame {
        let vga = &self.cpu.bus().vga;
        let width = vga.width as u32;
        let height = vga.height as u32;
        let mut frame = Frame::new(width.max(1), height.max(1));

        match vga.video_mode {
            0x13 => {
                // Chain-4 256-color: consecutive pixels cycle through the
                // four planes, each holding every 4th byte of the row.
                for y in 0..height {
                    for x in 0..width {
                        let pixel = y * width + x;
                        let plane = (pixel & 3) as usize;
                        let offset = (pixel >> 2) as usize;
                        let index = vga.plane(plane).get(offset).copied().unwrap_or(0);
                        let rgb = vga.dac_entry(index);
                        frame.pixels[(y * width + x) as usize] = 0xFF00_0000 | rgb;
                    }
                }
            }
            0x12 => {
                let stride = (width / 8) as usize;
                for y in 0..height {
                    for x in 0..width {
                        let byte = stride * y as usize + (x / 8) as usize;
                        let bit = 7 - (x % 8) as u8;
                        let mut index = 0u8;
                        for plane in 0..4 {
                            let b = vga.plane(plane).get(byte).copied().unwrap_or(0);
                            if (b >> bit) & 1 != 0 {
                                index |= 1 << plane;
                            }
                        }
                        let (r, g, b) = vga.attribute_rgb(index);
                        let rgb = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
                        frame.pixels[(y * width + x) as usize] = 0xFF00_0000 | rgb;
                    }
                }
            }
            _ => {
                // Text modes: glyph rendering is host/frontend territory
                // (§1 excludes a font rasterizer from the core); present
                // the page as black until a frontend renders the cells.
                frame.pixels.fill(0xFF00_0000);
            }
        }

        frame
    }

    /// Get debug information
    pub fn debug_info(&self) -> DebugInfo {
        let regs = self.cpu.get_registers();
        DebugInfo {
            cs: regs.cs,
            ip: regs.ip,
            ax: regs.ax,
            bx: regs.bx,
            cx: regs.cx,
            dx: regs.dx,
            sp: regs.sp,
            bp: regs.bp,
            si: regs.si,
            di: regs.di,
            flags: regs.flags,
            cycles: self.cycles,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DebugInfo {
    pub cs: u16,
    pub ip: u16,
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub sp: u16,
    pub bp: u16,
    pub si: u16,
    pub di: u16,
    pub flags: u16,
    pub cycles: u64,
}

impl System for PcSystem {
    type Error = PcError;

    fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.bus_mut().reset();
        self.pit.reset();
        let (cs, ip) = self.cpu.bus_mut().bootstrap();
        self.cpu.set_entry(cs, ip);
        self.cycles = 0;
        self.scheduler.dohardreset.store(false, Ordering::SeqCst);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if self.scheduler.dohardreset.swap(false, Ordering::SeqCst) {
            self.reset();
        }

        // ~18.2 Hz IRQ0 tick at the PIT's default divisor means many
        // quanta run per displayed frame; run one quantum per step_frame
        // call and let the caller drive the cadence, matching the
        // teacher's one-call-per-host-tick scheduler contract.
        self.run_quantum();

        Ok(self.render_frame())
    }

    fn save_state(&self) -> Value {
        let regs = self.cpu.get_registers();
        let bus = self.cpu.bus();
        serde_json::json!({
            "version": 1,
            "system": "pc",
            "registers": regs,
            "cycles": self.cycles,
            "boot_priority": bus.boot_priority,
            "pic": bus.pic,
            "disk": bus.disk,
            "vga": bus.vga,
        })
    }

    fn load_state(&mut self, state: &Value) -> Result<(), serde_json::Error> {
        if let Some(regs) = state.get("registers") {
            let regs: CpuRegisters = serde_json::from_value(regs.clone())?;
            self.cpu.set_registers(&regs);
        }

        if let Some(cycles) = state.get("cycles").and_then(|v| v.as_u64()) {
            self.cycles = cycles;
        }

        if let Some(priority) = state.get("boot_priority") {
            let priority: BootPriority = serde_json::from_value(priority.clone())?;
            self.cpu.bus_mut().boot_priority = priority;
        }

        if let Some(pic) = state.get("pic") {
            self.cpu.bus_mut().pic = serde_json::from_value(pic.clone())?;
        }

        if let Some(disk) = state.get("disk") {
            self.cpu.bus_mut().disk = serde_json::from_value(disk.clone())?;
        }

        if let Some(vga) = state.get("vga") {
            self.cpu.bus_mut().vga = serde_json::from_value(vga.clone())?;
        }

        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![
            MountPointInfo {
                id: "fd0".to_string(),
                name: "Floppy Drive 0".to_string(),
                extensions: vec!["img".to_string(), "ima".to_string()],
                required: false,
            },
            MountPointInfo {
                id: "hd0".to_string(),
                name: "Hard Disk 0".to_string(),
                extensions: vec!["img".to_string()],
                required: false,
            },
        ]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        let drive = match mount_point_id {
            "fd0" => 0x00,
            "hd0" => 0x80,
            other => return Err(PcError::InvalidMountPoint(other.to_string())),
        };
        self.cpu.bus_mut().disk.insert(drive, data.to_vec());
        let (cs, ip) = self.cpu.bus_mut().bootstrap();
        self.cpu.set_entry(cs, ip);
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        match mount_point_id {
            "fd0" | "hd0" => Ok(()),
            other => Err(PcError::InvalidMountPoint(other.to_string())),
        }
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        let drive = match mount_point_id {
            "fd0" => 0x00,
            "hd0" => 0x80,
            _ => return false,
        };
        self.cpu.bus().disk.drive(drive).is_some()
    }
}
