//! Binary status record reader for Solaris/illumos `/proc/<pid>/psinfo`.
//!
//! Decodes the LP64 `psinfo_t` layout in native byte order. Only the identity
//! and size fields are extracted; the embedded `lwpsinfo_t` is ignored.

use crate::process::record::{cap_name, ProcessRecord, Resident};
use crate::process::table::ProcessTable;
use std::io::{self, BufReader, Read};
use tracing::debug;

/// `sizeof(psinfo_t)` on LP64.
pub const PSINFO_SIZE: usize = 416;
/// `PRFNSZ`
pub const PRFNSZ: usize = 16;
/// `PRARGSZ`
pub const PRARGSZ: usize = 80;

const OFF_PID: usize = 8;
const OFF_PPID: usize = 12;
const OFF_UID: usize = 24;
const OFF_SIZE: usize = 48;
const OFF_RSSIZE: usize = 56;
const OFF_FNAME: usize = 136;
const OFF_PSARGS: usize = 152;

/// Decoded subset of `psinfo_t`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsInfo {
    pub pid: i32,
    pub ppid: i32,
    pub uid: u32,
    /// Process image size in KiB.
    pub size_kb: u64,
    /// Resident set size in KiB.
    pub rssize_kb: u64,
    /// `pr_fname`, truncated at the first NUL.
    pub fname: String,
    /// `pr_psargs`, truncated at the first NUL.
    pub psargs: String,
}

pub(crate) fn ne_i32(buf: &[u8], off: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    i32::from_ne_bytes(b)
}

pub(crate) fn ne_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_ne_bytes(b)
}

/// Reads a NUL-terminated string out of a fixed-width field.
pub(crate) fn c_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Writes `s` into a fixed-width field, truncating so a NUL always fits.
pub(crate) fn put_c_field(field: &mut [u8], s: &str) {
    let n = s.len().min(field.len().saturating_sub(1));
    field[..n].copy_from_slice(&s.as_bytes()[..n]);
}

impl PsInfo {
    pub fn decode(buf: &[u8; PSINFO_SIZE]) -> Self {
        Self {
            pid: ne_i32(buf, OFF_PID),
            ppid: ne_i32(buf, OFF_PPID),
            uid: ne_i32(buf, OFF_UID) as u32,
            size_kb: ne_u64(buf, OFF_SIZE),
            rssize_kb: ne_u64(buf, OFF_RSSIZE),
            fname: cap_name(&c_field(&buf[OFF_FNAME..OFF_FNAME + PRFNSZ])),
            psargs: c_field(&buf[OFF_PSARGS..OFF_PSARGS + PRARGSZ]),
        }
    }

    /// Encodes into a zero-padded `psinfo_t` image. Used to build fixtures.
    pub fn encode(&self) -> [u8; PSINFO_SIZE] {
        let mut buf = [0u8; PSINFO_SIZE];
        buf[OFF_PID..OFF_PID + 4].copy_from_slice(&self.pid.to_ne_bytes());
        buf[OFF_PPID..OFF_PPID + 4].copy_from_slice(&self.ppid.to_ne_bytes());
        buf[OFF_UID..OFF_UID + 4].copy_from_slice(&self.uid.to_ne_bytes());
        buf[OFF_SIZE..OFF_SIZE + 8].copy_from_slice(&self.size_kb.to_ne_bytes());
        buf[OFF_RSSIZE..OFF_RSSIZE + 8].copy_from_slice(&self.rssize_kb.to_ne_bytes());
        put_c_field(&mut buf[OFF_FNAME..OFF_FNAME + PRFNSZ], &self.fname);
        put_c_field(&mut buf[OFF_PSARGS..OFF_PSARGS + PRARGSZ], &self.psargs);
        buf
    }

    pub fn into_record(self) -> ProcessRecord {
        ProcessRecord {
            pid: self.pid,
            name: self.fname,
            resident: Resident::Kilobytes(self.rssize_kb),
        }
    }
}

/// Reads exactly one `psinfo_t` from `<entry>/psinfo`.
///
/// Open failures and short reads yield `None`.
pub fn read_psinfo(table: &dyn ProcessTable, entry: &str, buf_bytes: usize) -> Option<PsInfo> {
    let file = match table.open(entry, "psinfo") {
        Ok(f) => f,
        Err(e) => {
            debug!("Cannot open psinfo for entry {}: {}", entry, e);
            return None;
        }
    };

    let mut reader = BufReader::with_capacity(buf_bytes, file);
    let mut buf = [0u8; PSINFO_SIZE];
    match reader.read_exact(&mut buf) {
        Ok(()) => Some(PsInfo::decode(&buf)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            debug!("Short psinfo record for entry {}", entry);
            None
        }
        Err(e) => {
            debug!("Failed to read psinfo for entry {}: {}", entry, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::table::FsProcessTable;
    use tempfile::tempdir;

    fn sample() -> PsInfo {
        PsInfo {
            pid: 4321,
            ppid: 1,
            uid: 100,
            size_kb: 20480,
            rssize_kb: 5120,
            fname: "java".into(),
            psargs: "java -jar app.jar".into(),
        }
    }

    #[test]
    fn test_decode_known_offsets() {
        let buf = sample().encode();
        assert_eq!(&buf[OFF_FNAME..OFF_FNAME + 5], b"java\0");
        assert_eq!(ne_u64(&buf, OFF_RSSIZE), 5120);

        let info = PsInfo::decode(&buf);
        assert_eq!(info, sample());
        let record = info.into_record();
        assert_eq!(record.name, "java");
        assert_eq!(record.resident.bytes(4096), 5120 * 1024);
    }

    #[test]
    fn test_fname_fills_field() {
        let mut info = sample();
        info.fname = "abcdefghijklmnopqrstuvwxyz".into();
        let decoded = PsInfo::decode(&info.encode());
        // Encoding keeps room for the terminating NUL
        assert_eq!(decoded.fname, "abcdefghijklmno");

        // A field with no NUL at all is taken whole
        let mut buf = sample().encode();
        buf[OFF_FNAME..OFF_FNAME + PRFNSZ].copy_from_slice(b"0123456789abcdef");
        assert_eq!(PsInfo::decode(&buf).fname, "0123456789abcdef");
    }

    #[test]
    fn test_read_psinfo_short_and_missing() {
        let dir = tempdir().expect("Failed to create temp dir");
        let pid_dir = dir.path().join("4321");
        std::fs::create_dir(&pid_dir).unwrap();
        let table = FsProcessTable::new(dir.path());

        assert!(read_psinfo(&table, "4321", 4096).is_none());

        std::fs::write(pid_dir.join("psinfo"), &sample().encode()[..200]).unwrap();
        assert!(read_psinfo(&table, "4321", 4096).is_none());

        std::fs::write(pid_dir.join("psinfo"), sample().encode()).unwrap();
        assert_eq!(read_psinfo(&table, "4321", 4096), Some(sample()));
    }
}
