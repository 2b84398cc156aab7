//! MOVS/LODS/STOS/CMPS/SCAS bodies. The REP/REPE/REPNE driving loop lives
//! in `mod.rs` (`Cpu8086::rep_string`); each function here performs exactly
//! one iteration and advances SI/DI by 1 or 2 bytes according to DF.
//!
//! Source operand addressing (SI) honors a segment-override prefix via
//! `seg_override`, defaulting to DS. Destination (DI) is always ES and is
//! never overridable, matching the 8086 reference.

use super::{alu, Cpu8086, Io8086, Memory8086, Segment, FLAG_DF};

impl<M: Memory8086 + Io8086> Cpu8086<M> {
    fn df_step(&self, width: u16) -> u16 {
        if self.get_flag(FLAG_DF) {
            0u16.wrapping_sub(width)
        } else {
            width
        }
    }

    fn src_seg(&self, seg_override: Option<Segment>) -> u16 {
        self.seg_value(seg_override.unwrap_or(Segment::Ds))
    }

    pub(super) fn op_movsb(&mut self, seg_override: Option<Segment>) {
        let src = self.src_seg(seg_override);
        let v = self.read(src, self.si);
        self.write(self.es, self.di, v);
        let step = self.df_step(1);
        self.si = self.si.wrapping_add(step);
        self.di = self.di.wrapping_add(step);
    }

    pub(super) fn op_movsw(&mut self, seg_override: Option<Segment>) {
        let src = self.src_seg(seg_override);
        let v = self.read_u16(src, self.si);
        self.write_u16(self.es, self.di, v);
        let step = self.df_step(2);
        self.si = self.si.wrapping_add(step);
        self.di = self.di.wrapping_add(step);
    }

    pub(super) fn op_stosb(&mut self) {
        let v = self.ax as u8;
        self.write(self.es, self.di, v);
        let step = self.df_step(1);
        self.di = self.di.wrapping_add(step);
    }

    pub(super) fn op_stosw(&mut self) {
        let v = self.ax;
        self.write_u16(self.es, self.di, v);
        let step = self.df_step(2);
        self.di = self.di.wrapping_add(step);
    }

    pub(super) fn op_lodsb(&mut self, seg_override: Option<Segment>) {
        let src = self.src_seg(seg_override);
        let v = self.read(src, self.si);
        self.ax = (self.ax & 0xFF00) | v as u16;
        let step = self.df_step(1);
        self.si = self.si.wrapping_add(step);
    }

    pub(super) fn op_lodsw(&mut self, seg_override: Option<Segment>) {
        let src = self.src_seg(seg_override);
        let v = self.read_u16(src, self.si);
        self.ax = v;
        let step = self.df_step(2);
        self.si = self.si.wrapping_add(step);
    }

    pub(super) fn op_cmpsb(&mut self, seg_override: Option<Segment>) {
        let src = self.src_seg(seg_override);
        let a = self.read(src, self.si);
        let b = self.read(self.es, self.di);
        let (result, flags) = alu::sub8(a, b);
        self.update_flags_8(result);
        self.apply_alu_flags(flags);
        let step = self.df_step(1);
        self.si = self.si.wrapping_add(step);
        self.di = self.di.wrapping_add(step);
    }

    pub(super) fn op_cmpsw(&mut self, seg_override: Option<Segment>) {
        let src = self.src_seg(seg_override);
        let a = self.read_u16(src, self.si);
        let b = self.read_u16(self.es, self.di);
        let (result, flags) = alu::sub16(a, b);
        self.update_flags_16(result);
        self.apply_alu_flags(flags);
        let step = self.df_step(2);
        self.si = self.si.wrapping_add(step);
        self.di = self.di.wrapping_add(step);
    }

    pub(super) fn op_scasb(&mut self) {
        let a = self.ax as u8;
        let b = self.read(self.es, self.di);
        let (result, flags) = alu::sub8(a, b);
        self.update_flags_8(result);
        self.apply_alu_flags(flags);
        let step = self.df_step(1);
        self.di = self.di.wrapping_add(step);
    }

    pub(super) fn op_scasw(&mut self) {
        let a = self.ax;
        let b = self.read_u16(self.es, self.di);
        let (result, flags) = alu::sub16(a, b);
        self.update_flags_16(result);
        self.apply_alu_flags(flags);
        let step = self.df_step(2);
        self.di = self.di.wrapping_add(step);
    }
}
