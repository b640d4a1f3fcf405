//! Platform backends behind a single record/region interface.
//!
//! The aggregation engine only talks to [`ProcBackend`]. [`TextBackend`] reads
//! the Linux/Cygwin text formats (`stat`, `maps`), [`BinaryBackend`] reads the
//! Solaris/illumos binary formats (`psinfo`, `map`).

use crate::process::hex::HexAlphabet;
use crate::process::maps::MapsStream;
use crate::process::prmap::PrMapStream;
use crate::process::psinfo::read_psinfo;
use crate::process::record::{ProcessRecord, RegionStream};
use crate::process::stat::read_stat;
use crate::process::table::ProcessTable;
use once_cell::sync::Lazy;
use std::fmt;
use std::io::BufReader;
use std::str::FromStr;
use tracing::debug;

/// Default read buffer for per-process files.
pub const DEFAULT_BUFFER_BYTES: usize = 16 * 1024;

/// Accounting page size on Cygwin. The reported 64 KiB page size is the
/// allocation granularity, not the unit of the `rss` field.
#[cfg(target_os = "cygwin")]
const CYGWIN_PAGE_SIZE: u64 = 4096;

#[cfg(target_os = "cygwin")]
fn get_page_size() -> u64 {
    CYGWIN_PAGE_SIZE
}

#[cfg(not(target_os = "cygwin"))]
fn get_page_size() -> u64 {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE
    // Returns -1 on error, which is handled by the > 0 check
    unsafe {
        let size = libc::sysconf(libc::_SC_PAGESIZE);
        if size > 0 {
            return size as u64;
        }
    }
    4096
}

/// Page size used to scale `stat` resident page counts to bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Per-process record and region access for one platform.
pub trait ProcBackend {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Decodes the status record of `entry`, or `None` if it is unreadable or
    /// malformed.
    fn read_record(&self, table: &dyn ProcessTable, entry: &str) -> Option<ProcessRecord>;

    /// Opens the region listing of `entry` as a lazy stream.
    fn read_regions<'t>(
        &self,
        table: &'t dyn ProcessTable,
        entry: &str,
    ) -> Option<Box<dyn RegionStream + 't>>;

    /// Resident memory of `record` in bytes.
    fn resident_bytes(&self, record: &ProcessRecord) -> u64;
}

/// Backend for the text formats.
#[derive(Debug, Clone)]
pub struct TextBackend {
    page_size: u64,
    alphabet: HexAlphabet,
    buffer_bytes: usize,
}

impl TextBackend {
    pub fn new(page_size: u64, alphabet: HexAlphabet, buffer_bytes: usize) -> Self {
        Self {
            page_size,
            alphabet,
            buffer_bytes,
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

impl Default for TextBackend {
    fn default() -> Self {
        Self::new(*PAGE_SIZE, HexAlphabet::default(), DEFAULT_BUFFER_BYTES)
    }
}

impl ProcBackend for TextBackend {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn read_record(&self, table: &dyn ProcessTable, entry: &str) -> Option<ProcessRecord> {
        read_stat(table, entry, self.buffer_bytes).map(|s| s.into_record())
    }

    fn read_regions<'t>(
        &self,
        table: &'t dyn ProcessTable,
        entry: &str,
    ) -> Option<Box<dyn RegionStream + 't>> {
        match table.open(entry, "maps") {
            Ok(file) => {
                let reader = BufReader::with_capacity(self.buffer_bytes, file);
                Some(Box::new(MapsStream::new(reader, self.alphabet)))
            }
            Err(e) => {
                debug!("Cannot open maps for entry {}: {}", entry, e);
                None
            }
        }
    }

    fn resident_bytes(&self, record: &ProcessRecord) -> u64 {
        record.resident.bytes(self.page_size)
    }
}

/// Backend for the binary formats.
#[derive(Debug, Clone)]
pub struct BinaryBackend {
    buffer_bytes: usize,
}

impl BinaryBackend {
    pub fn new(buffer_bytes: usize) -> Self {
        Self { buffer_bytes }
    }
}

impl Default for BinaryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_BYTES)
    }
}

impl ProcBackend for BinaryBackend {
    fn name(&self) -> &'static str {
        "solaris"
    }

    fn read_record(&self, table: &dyn ProcessTable, entry: &str) -> Option<ProcessRecord> {
        read_psinfo(table, entry, self.buffer_bytes).map(|p| p.into_record())
    }

    fn read_regions<'t>(
        &self,
        table: &'t dyn ProcessTable,
        entry: &str,
    ) -> Option<Box<dyn RegionStream + 't>> {
        match table.open(entry, "map") {
            Ok(file) => {
                let reader = BufReader::with_capacity(self.buffer_bytes, file);
                Some(Box::new(PrMapStream::new(reader)))
            }
            Err(e) => {
                debug!("Cannot open map for entry {}: {}", entry, e);
                None
            }
        }
    }

    fn resident_bytes(&self, record: &ProcessRecord) -> u64 {
        // psinfo sizes are already in KiB; the page size is irrelevant here
        record.resident.bytes(0)
    }
}

/// Which process table format to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `stat` + `maps` text files (Linux, Cygwin).
    Text,
    /// `psinfo` + `map` binary files (Solaris, illumos).
    Binary,
}

impl Platform {
    /// Format of the host this binary was built for.
    pub fn native() -> Self {
        if cfg!(any(target_os = "solaris", target_os = "illumos")) {
            Platform::Binary
        } else {
            Platform::Text
        }
    }

    /// Resolves a configured platform name, where `None` and `"auto"` mean
    /// [`Platform::native`].
    pub fn from_config(name: Option<&str>) -> Result<Self, String> {
        match name {
            None => Ok(Self::native()),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::native()),
            "linux" | "text" => Ok(Platform::Text),
            "solaris" | "binary" => Ok(Platform::Binary),
            other => Err(format!(
                "Invalid platform '{}', expected 'auto', 'linux' or 'solaris'",
                other
            )),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Text => f.write_str("linux"),
            Platform::Binary => f.write_str("solaris"),
        }
    }
}

/// Tunables shared by both backends.
#[derive(Debug, Clone, Copy)]
pub struct BackendOptions {
    /// Overrides [`PAGE_SIZE`] for the text backend.
    pub page_size: Option<u64>,
    pub hex_alphabet: HexAlphabet,
    pub buffer_bytes: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            page_size: None,
            hex_alphabet: HexAlphabet::default(),
            buffer_bytes: DEFAULT_BUFFER_BYTES,
        }
    }
}

/// Builds the backend for `platform`.
pub fn backend_for(platform: Platform, opts: &BackendOptions) -> Box<dyn ProcBackend> {
    match platform {
        Platform::Text => Box::new(TextBackend::new(
            opts.page_size.unwrap_or(*PAGE_SIZE),
            opts.hex_alphabet,
            opts.buffer_bytes,
        )),
        Platform::Binary => Box::new(BinaryBackend::new(opts.buffer_bytes)),
    }
}
