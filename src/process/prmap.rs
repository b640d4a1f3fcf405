//! Binary memory-map reader for Solaris/illumos `/proc/<pid>/map`.
//!
//! The file is a flat array of LP64 `prmap_t` records in native byte order.

use crate::process::perms::decode_flags;
use crate::process::psinfo::{c_field, ne_i32, ne_u64, put_c_field};
use crate::process::record::{MemoryRegion, RegionStream};
use std::io::{ErrorKind, Read};
use tracing::trace;

/// `sizeof(prmap_t)` on LP64.
pub const PRMAP_SIZE: usize = 104;
/// `PRMAPSZ`
pub const PRMAPSZ: usize = 64;

const OFF_VADDR: usize = 0;
const OFF_SIZE: usize = 8;
const OFF_MAPNAME: usize = 16;
const OFF_OFFSET: usize = 80;
const OFF_MFLAGS: usize = 88;
const OFF_PAGESIZE: usize = 92;
const OFF_SHMID: usize = 96;

/// Decoded `prmap_t`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrMap {
    pub vaddr: u64,
    pub size: u64,
    pub mapname: String,
    pub offset: i64,
    pub mflags: u32,
    pub pagesize: i32,
    pub shmid: i32,
}

impl PrMap {
    pub fn decode(buf: &[u8; PRMAP_SIZE]) -> Self {
        Self {
            vaddr: ne_u64(buf, OFF_VADDR),
            size: ne_u64(buf, OFF_SIZE),
            mapname: c_field(&buf[OFF_MAPNAME..OFF_MAPNAME + PRMAPSZ]),
            offset: ne_u64(buf, OFF_OFFSET) as i64,
            mflags: ne_i32(buf, OFF_MFLAGS) as u32,
            pagesize: ne_i32(buf, OFF_PAGESIZE),
            shmid: ne_i32(buf, OFF_SHMID),
        }
    }

    /// Encodes into a zero-padded `prmap_t` image. Used to build fixtures.
    pub fn encode(&self) -> [u8; PRMAP_SIZE] {
        let mut buf = [0u8; PRMAP_SIZE];
        buf[OFF_VADDR..OFF_VADDR + 8].copy_from_slice(&self.vaddr.to_ne_bytes());
        buf[OFF_SIZE..OFF_SIZE + 8].copy_from_slice(&self.size.to_ne_bytes());
        put_c_field(&mut buf[OFF_MAPNAME..OFF_MAPNAME + PRMAPSZ], &self.mapname);
        buf[OFF_OFFSET..OFF_OFFSET + 8].copy_from_slice(&self.offset.to_ne_bytes());
        buf[OFF_MFLAGS..OFF_MFLAGS + 4].copy_from_slice(&self.mflags.to_ne_bytes());
        buf[OFF_PAGESIZE..OFF_PAGESIZE + 4].copy_from_slice(&self.pagesize.to_ne_bytes());
        buf[OFF_SHMID..OFF_SHMID + 4].copy_from_slice(&self.shmid.to_ne_bytes());
        buf
    }

    /// Region covered by this mapping, or `None` if `vaddr + size` overflows.
    pub fn region(&self) -> Option<MemoryRegion> {
        let end = self.vaddr.checked_add(self.size)?;
        Some(MemoryRegion {
            start: self.vaddr,
            end,
            perms: decode_flags(self.mflags),
        })
    }
}

enum Fill {
    Full,
    /// End of source, possibly after a partial record.
    Eof,
    Failed,
}

/// Lazy stream of `prmap_t` records.
pub struct PrMapStream<R> {
    reader: R,
    buf: [u8; PRMAP_SIZE],
    skipped: u64,
    interrupted: bool,
    done: bool,
}

impl<R: Read> PrMapStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: [0u8; PRMAP_SIZE],
            skipped: 0,
            interrupted: false,
            done: false,
        }
    }

    fn fill(&mut self) -> Fill {
        let mut filled = 0;
        while filled < PRMAP_SIZE {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => {
                    if filled > 0 {
                        trace!("Discarding {} trailing bytes of a partial prmap record", filled);
                    }
                    return Fill::Eof;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    trace!("Map read failed: {}", e);
                    return Fill::Failed;
                }
            }
        }
        Fill::Full
    }
}

impl<R: Read> Iterator for PrMapStream<R> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        while !self.done {
            match self.fill() {
                Fill::Full => match PrMap::decode(&self.buf).region() {
                    Some(region) => return Some(region),
                    None => self.skipped += 1,
                },
                Fill::Eof => self.done = true,
                Fill::Failed => {
                    self.interrupted = true;
                    self.done = true;
                }
            }
        }
        None
    }
}

impl<R: Read> RegionStream for PrMapStream<R> {
    fn skipped(&self) -> u64 {
        self.skipped
    }

    fn interrupted(&self) -> bool {
        self.interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::perms::mflags::*;
    use std::io::Cursor;

    fn map(vaddr: u64, size: u64, mflags: u32) -> PrMap {
        PrMap {
            vaddr,
            size,
            mapname: "a.out".into(),
            offset: 0,
            mflags,
            pagesize: 4096,
            shmid: -1,
        }
    }

    #[test]
    fn test_prmap_decode_roundtrip_fields() {
        let m = map(0x10000, 0x2000, MA_READ | MA_WRITE);
        let buf = m.encode();
        assert_eq!(ne_i32(&buf, OFF_MFLAGS) as u32, MA_READ | MA_WRITE);
        assert_eq!(PrMap::decode(&buf), m);
    }

    #[test]
    fn test_prmap_stream_regions() {
        let mut data = Vec::new();
        data.extend_from_slice(&map(0x10000, 4096, MA_READ | MA_WRITE).encode());
        data.extend_from_slice(&map(0x20000, 8192, MA_SHM).encode());
        data.extend_from_slice(&map(0x30000, 100, MA_READ).encode());

        let mut stream = PrMapStream::new(Cursor::new(data));
        let regions: Vec<MemoryRegion> = stream.by_ref().collect();
        assert_eq!(regions.len(), 3);
        assert!(regions[0].perms.is_read_write());
        assert!(regions[1].perms.shared);
        assert_eq!(regions[2].size(), 100);
        assert_eq!(stream.skipped(), 0);
        assert!(!stream.interrupted());
    }

    #[test]
    fn test_prmap_stream_short_trailing_record() {
        let mut data = Vec::new();
        data.extend_from_slice(&map(0x10000, 4096, MA_READ).encode());
        data.extend_from_slice(&map(0x20000, 4096, MA_READ).encode()[..40]);

        let mut stream = PrMapStream::new(Cursor::new(data));
        assert_eq!(stream.by_ref().count(), 1);
        assert!(!stream.interrupted());
    }

    #[test]
    fn test_prmap_stream_skips_overflowing_region() {
        let mut data = Vec::new();
        data.extend_from_slice(&map(u64::MAX - 10, 4096, MA_READ).encode());
        data.extend_from_slice(&map(0x20000, 4096, MA_READ).encode());

        let mut stream = PrMapStream::new(Cursor::new(data));
        let sizes: Vec<u64> = stream.by_ref().map(|r| r.size()).collect();
        assert_eq!(sizes, vec![4096]);
        assert_eq!(stream.skipped(), 1);
    }
}
