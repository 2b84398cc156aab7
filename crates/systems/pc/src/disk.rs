//! INT 13h disk BIOS services.
//!
//! The disk table is indexed by drive number 0x00..=0xFF: 0x00-0x7F are
//! floppies, 0x80+ are fixed disks. Geometry is derived once at insertion
//! time from the backing image's size, never auto-detected afterward.

use emu_core::cpu_8086::Memory8086;
use emu_core::log;
use emu_core::logging::{LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

const SECTOR_SIZE: u32 = 512;
const BIOS_DISK_STATUS_ADDR: u32 = 0x474;

/// `[u8; 256]`/`[bool; 256]` are past serde's built-in array support, which
/// tops out at 32 elements; flatten through a `Vec` instead, matching the
/// teacher's `Riot::ram` save-state shim.
mod serde_u8_256 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(arr: &[u8; 256], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        arr.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 256], D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<u8>::deserialize(deserializer)?;
        if vec.len() != 256 {
            return Err(serde::de::Error::custom("expected 256 bytes"));
        }
        let mut arr = [0u8; 256];
        arr.copy_from_slice(&vec);
        Ok(arr)
    }
}

mod serde_bool_256 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(arr: &[bool; 256], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        arr.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[bool; 256], D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<bool>::deserialize(deserializer)?;
        if vec.len() != 256 {
            return Err(serde::de::Error::custom("expected 256 flags"));
        }
        let mut arr = [false; 256];
        arr.copy_from_slice(&vec);
        Ok(arr)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveEntry {
    pub data: Vec<u8>,
    pub cyls: u16,
    pub heads: u8,
    pub sects: u8,
    pub inserted: bool,
}

impl DriveEntry {
    fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Derive floppy geometry from image size; first matching bound wins.
pub fn floppy_geometry(size: usize) -> (u16, u8, u8) {
    if size <= 163_840 {
        (40, 1, 8)
    } else if size <= 368_640 {
        (40, 2, 9)
    } else if size <= 737_280 {
        (80, 2, 9)
    } else if size <= 1_228_800 {
        (80, 2, 15)
    } else {
        (80, 2, 18)
    }
}

/// Fixed-disk geometry is a fixed sects/heads pair with cylinder count
/// derived from image size; there is no autodetection beyond this rule.
pub fn fixed_geometry(size: usize) -> (u16, u8, u8) {
    let heads = 16u8;
    let sects = 63u8;
    let cyls = size / (sects as usize * heads as usize * SECTOR_SIZE as usize);
    (cyls.min(u16::MAX as usize) as u16, heads, sects)
}

/// Map a CHS tuple to an LBA sector index. Sector 0 is invalid per the
/// INT 13h convention (sectors are 1-based).
pub fn chs_to_lba(cyl: u16, head: u8, sect: u8, heads: u8, sects: u8) -> Option<u32> {
    if sect == 0 {
        return None;
    }
    Some((cyl as u32 * heads as u32 + head as u32) * sects as u32 + (sect as u32 - 1))
}

fn decode_chs(cl: u8, ch: u8, dh: u8) -> (u16, u8, u8) {
    let cyl = ((cl as u16 & 0xC0) << 2) | ch as u16;
    let sect = cl & 0x3F;
    (cyl, dh, sect)
}

/// Outcome of an INT 13h call: what to write back into AH/AL/CF, and
/// whether the guest's DL-indexed replay state should be updated.
pub struct Int13Result {
    pub ah: u8,
    pub al: u8,
    pub cf: bool,
}

#[derive(Serialize, Deserialize)]
pub struct DiskBios {
    drives: Vec<Option<DriveEntry>>,
    #[serde(with = "serde_u8_256")]
    lastah: [u8; 256],
    #[serde(with = "serde_bool_256")]
    lastcf: [bool; 256],
    pub hdcount: u8,
    pub bootdrive: Option<u8>,
}

impl Default for DiskBios {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskBios {
    pub fn new() -> Self {
        Self {
            drives: vec![None; 256],
            lastah: [0; 256],
            lastcf: [false; 256],
            hdcount: 0,
            bootdrive: None,
        }
    }

    pub fn drive(&self, num: u8) -> Option<&DriveEntry> {
        self.drives[num as usize].as_ref()
    }

    /// Mount a backing image at `num`, deriving geometry from its size.
    pub fn insert(&mut self, num: u8, data: Vec<u8>) {
        let (cyls, heads, sects) = if num < 0x80 {
            floppy_geometry(data.len())
        } else {
            fixed_geometry(data.len())
        };
        if num >= 0x80 {
            self.hdcount += 1;
        }
        self.drives[num as usize] = Some(DriveEntry {
            data,
            cyls,
            heads,
            sects,
            inserted: true,
        });
        if self.bootdrive.is_none() {
            self.bootdrive = Some(num);
        }
    }

    /// The raw bytes of one sector from `num`, used by `bootstrap()`.
    pub fn read_boot_sector(&self, num: u8) -> Option<[u8; SECTOR_SIZE as usize]> {
        let drive = self.drives[num as usize].as_ref()?;
        if !drive.inserted {
            return None;
        }
        let mut out = [0u8; SECTOR_SIZE as usize];
        let n = drive.data.len().min(SECTOR_SIZE as usize);
        out[..n].copy_from_slice(&drive.data[..n]);
        Some(out)
    }

    fn record(&mut self, dl: u8, ah: u8, cf: bool, mem: &mut impl Memory8086) {
        self.lastah[dl as usize] = ah;
        self.lastcf[dl as usize] = cf;
        if dl >= 0x80 {
            mem.write(BIOS_DISK_STATUS_ADDR, ah);
        }
    }

    /// Service one INT 13h call. `es`/`bx` name the guest transfer buffer
    /// for read/write; `mem` is the bus, used for both the transfer and
    /// the `RAM[0x474]` status mirror.
    #[allow(clippy::too_many_arguments)]
    pub fn service(
        &mut self,
        mem: &mut impl Memory8086,
        ah: u8,
        al: u8,
        cl: u8,
        ch: u8,
        dh: u8,
        dl: u8,
        es: u16,
        bx: u16,
    ) -> Int13Result {
        let result = match ah {
            0 => Int13Result { ah: 0, al, cf: false },
            1 => {
                return Int13Result {
                    ah: self.lastah[dl as usize],
                    al,
                    cf: self.lastcf[dl as usize],
                };
            }
            2 => self.read(mem, al, cl, ch, dh, dl, es, bx),
            3 => self.write(mem, al, cl, ch, dh, dl, es, bx),
            4 | 5 => Int13Result { ah: 0, al, cf: false },
            8 => self.geometry(al, dl),
            _ => Int13Result { ah: 1, al, cf: true },
        };
        self.record(dl, result.ah, result.cf, mem);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &mut self,
        mem: &mut impl Memory8086,
        al: u8,
        cl: u8,
        ch: u8,
        dh: u8,
        dl: u8,
        es: u16,
        bx: u16,
    ) -> Int13Result {
        let Some(drive) = self.drives[dl as usize].as_ref() else {
            return Int13Result { ah: 1, al, cf: true };
        };
        if !drive.inserted {
            return Int13Result { ah: 1, al, cf: true };
        }
        let (cyl, head, sect) = decode_chs(cl, ch, dh);
        let Some(lba) = chs_to_lba(cyl, head, sect, drive.heads, drive.sects) else {
            return Int13Result { ah: 1, al, cf: true };
        };
        let offset = lba as usize * SECTOR_SIZE as usize;
        let count = al as usize;
        let bytes = count * SECTOR_SIZE as usize;
        if offset + bytes > drive.size_bytes() {
            return Int13Result { ah: 1, al, cf: true };
        }
        log!(
            LogCategory::Bus,
            LogLevel::Debug,
            "disk read: drive={:#04x} lba={} count={}",
            dl,
            lba,
            count
        );
        for i in 0..bytes {
            let byte = drive.data[offset + i];
            let addr = ((es as u32) << 4) + bx.wrapping_add(i as u16) as u32;
            mem.write(addr, byte);
        }
        Int13Result { ah: 0, al, cf: false }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        mem: &mut impl Memory8086,
        al: u8,
        cl: u8,
        ch: u8,
        dh: u8,
        dl: u8,
        es: u16,
        bx: u16,
    ) -> Int13Result {
        let (cyl, head, sect) = decode_chs(cl, ch, dh);
        let (heads, sects, size) = match self.drives[dl as usize].as_ref() {
            Some(d) if d.inserted => (d.heads, d.sects, d.size_bytes()),
            _ => return Int13Result { ah: 1, al, cf: true },
        };
        let Some(lba) = chs_to_lba(cyl, head, sect, heads, sects) else {
            return Int13Result { ah: 1, al, cf: true };
        };
        let offset = lba as usize * SECTOR_SIZE as usize;
        let count = al as usize;
        let bytes = count * SECTOR_SIZE as usize;
        if offset + bytes > size {
            return Int13Result { ah: 1, al, cf: true };
        }
        let mut buf = vec![0u8; bytes];
        for (i, slot) in buf.iter_mut().enumerate() {
            let addr = ((es as u32) << 4) + bx.wrapping_add(i as u16) as u32;
            *slot = mem.read(addr);
        }
        let drive = self.drives[dl as usize].as_mut().unwrap();
        drive.data[offset..offset + bytes].copy_from_slice(&buf);
        Int13Result { ah: 0, al, cf: false }
    }

    fn geometry(&self, al: u8, dl: u8) -> Int13Result {
        let Some(drive) = self.drives[dl as usize].as_ref() else {
            return Int13Result { ah: 0xAA, al, cf: true };
        };
        if !drive.inserted {
            return Int13Result { ah: 0xAA, al, cf: true };
        }
        Int13Result { ah: 0, al, cf: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ArrayMem(Vec<u8>);
    impl Memory8086 for ArrayMem {
        fn read(&self, addr: u32) -> u8 {
            self.0[addr as usize]
        }
        fn write(&mut self, addr: u32, val: u8) {
            self.0[addr as usize] = val;
        }
    }

    #[test]
    fn floppy_geometry_matches_size_table() {
        assert_eq!(floppy_geometry(163_840), (40, 1, 8));
        assert_eq!(floppy_geometry(368_640), (40, 2, 9));
        assert_eq!(floppy_geometry(737_280), (80, 2, 9));
        assert_eq!(floppy_geometry(1_228_800), (80, 2, 15));
        assert_eq!(floppy_geometry(1_474_560), (80, 2, 18));
    }

    #[test]
    fn fixed_geometry_uses_63_16_512_rule() {
        let size = 63 * 16 * 512 * 100;
        assert_eq!(fixed_geometry(size), (100, 16, 63));
    }

    #[test]
    fn chs_to_lba_is_unique_across_geometry() {
        let (heads, sects) = (2u8, 18u8);
        let mut seen = std::collections::HashSet::new();
        for cyl in 0..4u16 {
            for head in 0..heads {
                for sect in 1..=sects {
                    let lba = chs_to_lba(cyl, head, sect, heads, sects).unwrap();
                    assert!(seen.insert(lba), "duplicate lba for C{cyl}H{head}S{sect}");
                }
            }
        }
    }

    #[test]
    fn sector_zero_is_invalid() {
        assert_eq!(chs_to_lba(0, 0, 0, 2, 18), None);
    }

    #[test]
    fn read_sectors_writes_guest_memory_byte_granular() {
        let mut bios = DiskBios::new();
        let mut data = vec![0u8; 368_640];
        for (i, b) in data.iter_mut().enumerate().take(512) {
            *b = (i % 256) as u8;
        }
        bios.insert(0x00, data);

        let mut mem = ArrayMem(vec![0u8; 0x30000]);
        let result = bios.service(&mut mem, 2, 1, 1, 0, 0, 0x00, 0x2000, 0x0000);
        assert!(!result.cf);
        assert_eq!(result.ah, 0);
        for k in 0..512usize {
            assert_eq!(mem.read(0x20000 + k as u32), (k % 256) as u8);
        }
    }

    #[test]
    fn uninserted_drive_reports_error_and_replays_on_ah1() {
        let mut bios = DiskBios::new();
        let mut mem = ArrayMem(vec![0u8; 0x1000]);

        let r1 = bios.service(&mut mem, 2, 1, 1, 0, 0, 0x80, 0, 0);
        assert!(r1.cf);
        assert_eq!(r1.ah, 1);

        let r2 = bios.service(&mut mem, 1, 0, 0, 0, 0, 0x80, 0, 0);
        assert!(r2.cf);
        assert_eq!(r2.ah, 1);
        assert_eq!(mem.read(BIOS_DISK_STATUS_ADDR), 1);
    }

    #[test]
    fn write_then_read_round_trips_through_guest_buffer() {
        let mut bios = DiskBios::new();
        bios.insert(0x80, vec![0u8; 63 * 16 * 512 * 4]);
        let mut mem = ArrayMem(vec![0u8; 0x3000]);
        for i in 0..512usize {
            mem.write(0x1000 + i as u32, (i % 256) as u8);
        }
        let w = bios.service(&mut mem, 3, 1, 1, 0, 0, 0x80, 0x0000, 0x1000);
        assert!(!w.cf);

        for i in 0x1000..0x1200 {
            mem.write(i, 0);
        }
        let r = bios.service(&mut mem, 2, 1, 1, 0, 0, 0x80, 0x0000, 0x1000);
        assert!(!r.cf);
        for i in 0..512usize {
            assert_eq!(mem.read(0x1000 + i as u32), (i % 256) as u8);
        }
    }
}
