//! Intel 8259 programmable interrupt controller.
//!
//! Tracks IRR/ISR/IMR and the ICW programming sequence at ports 0x20/0x21.
//! This is not a complete 8259 (no cascading, no level-triggered mode,
//! no auto-EOI) but covers what a single-PIC IBM PC/XT BIOS and DOS
//! programs exercise.

use emu_core::log;
use emu_core::logging::{LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Pic8259 {
    irr: u8,
    isr: u8,
    imr: u8,
    icw: [u8; 5],
    icw_step: u8,
    readmode_isr: bool,
    /// Credit applied to IRQ0 when an EOI clears it while ticks were
    /// owed; mirrors `makeupticks` being folded back into IRR on ack.
    pub makeup_ticks: u32,
}

impl Pic8259 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise_irq(&mut self, irq: u8) {
        debug_assert!(irq < 8, "single 8259 only services IRQ0-7");
        self.irr |= 1 << irq;
    }

    /// Port read at 0x20 (status) or 0x21 (mask).
    pub fn read(&self, port: u16) -> u8 {
        match port & 1 {
            0 => {
                if self.readmode_isr {
                    self.isr
                } else {
                    self.irr
                }
            }
            _ => self.imr,
        }
    }

    /// Port write at 0x20 (command) or 0x21 (data/mask).
    pub fn write(&mut self, port: u16, value: u8) {
        match port & 1 {
            0 => self.write_command(value),
            _ => self.write_data(value),
        }
    }

    fn write_command(&mut self, value: u8) {
        if value & 0x10 != 0 {
            // ICW1: start the initialization sequence.
            self.icw_step = 1;
            self.imr = 0;
            self.icw[0] = value;
            log!(
                LogCategory::Interrupts,
                LogLevel::Debug,
                "PIC: ICW1 {:#04x}, begin init",
                value
            );
            return;
        }
        if value & 0x98 == 0x08 {
            // OCW3. Only the read-register-select bit is implemented.
            if value & 0x02 != 0 {
                self.readmode_isr = value & 0x02 != 0;
            }
        }
        if value & 0x20 != 0 {
            self.eoi();
        }
    }

    fn write_data(&mut self, value: u8) {
        if self.icw_step == 3 && self.icw[1] & 0x02 != 0 {
            // Single (non-cascaded) mode skips ICW3.
            self.icw_step = 4;
        }
        if (self.icw_step as usize) < self.icw.len() {
            self.icw[self.icw_step as usize] = value;
            self.icw_step += 1;
            return;
        }
        self.imr = value;
    }

    fn eoi(&mut self) {
        for bit in 0..8u8 {
            if self.isr & (1 << bit) != 0 {
                self.isr &= !(1 << bit);
                if bit == 0 && self.makeup_ticks > 0 {
                    self.makeup_ticks = 0;
                    self.irr |= 1;
                }
                return;
            }
        }
    }

    /// The ICW2 base vector, i.e. the vector corresponding to IRQ0.
    fn base_vector(&self) -> u8 {
        self.icw[1]
    }

    /// Select the highest-priority unmasked pending IRQ, move it from IRR
    /// into ISR and return its interrupt vector. Call only when
    /// `pending()` is true.
    pub fn next_interrupt(&mut self) -> u8 {
        let ready = self.irr & !self.imr;
        for bit in 0..8u8 {
            if ready & (1 << bit) != 0 {
                self.irr &= !(1 << bit);
                self.isr |= 1 << bit;
                return self.base_vector().wrapping_add(bit);
            }
        }
        0
    }

    /// True if any unmasked IRQ is currently requesting service.
    pub fn pending(&self) -> bool {
        self.irr & !self.imr != 0
    }
}
