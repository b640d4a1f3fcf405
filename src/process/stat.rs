//! Text status record reader for `/proc/<pid>/stat`.
//!
//! The first 24 fields are decoded positionally in their fixed order. Only
//! `pid`, `comm` and `rss` are consumed by the aggregation engine; the rest are
//! kept so the decoder stays aligned with the kernel's field layout.

use crate::process::record::{cap_name, ProcessRecord, Resident};
use crate::process::table::ProcessTable;
use std::io::{BufReader, Read};
use std::str::{FromStr, SplitAsciiWhitespace};
use tracing::debug;

/// Number of leading fields decoded from a stat line.
pub const STAT_FIELDS: usize = 24;

/// Decoded leading fields of `/proc/<pid>/stat`.
///
/// Fields after the first parse failure are left at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinuxStat {
    pub pid: i32,
    pub comm: String,
    pub state: char,
    pub ppid: i32,
    pub pgrp: i32,
    pub session: i32,
    pub tty_nr: i32,
    pub tpgid: i32,
    pub flags: u32,
    pub minflt: u64,
    pub cminflt: u64,
    pub majflt: u64,
    pub cmajflt: u64,
    pub utime: u64,
    pub stime: u64,
    pub cutime: i64,
    pub cstime: i64,
    pub priority: i64,
    pub nice: i64,
    pub num_threads: i64,
    pub itrealvalue: i64,
    pub starttime: u64,
    pub vsize: u64,
    pub rss: i64,
    /// How many of the [`STAT_FIELDS`] fields were decoded.
    pub fields_parsed: usize,
}

impl LinuxStat {
    /// Resident pages, with a negative count treated as zero.
    pub fn rss_pages(&self) -> u64 {
        u64::try_from(self.rss).unwrap_or(0)
    }

    pub fn into_record(self) -> ProcessRecord {
        let resident = Resident::Pages(self.rss_pages());
        ProcessRecord {
            pid: self.pid,
            name: self.comm,
            resident,
        }
    }
}

/// Positional cursor that stops at the first field that fails to parse.
struct Fields<'a> {
    tokens: SplitAsciiWhitespace<'a>,
    parsed: usize,
    failed: bool,
}

impl<'a> Fields<'a> {
    fn new(rest: &'a str, parsed: usize) -> Self {
        Self {
            tokens: rest.split_ascii_whitespace(),
            parsed,
            failed: false,
        }
    }

    fn next<T: FromStr + Default>(&mut self) -> T {
        if self.failed {
            return T::default();
        }
        match self.tokens.next().and_then(|t| t.parse().ok()) {
            Some(v) => {
                self.parsed += 1;
                v
            }
            None => {
                self.failed = true;
                T::default()
            }
        }
    }
}

/// Splits the raw name field off the front of `rest`.
///
/// A parenthesized name extends to the last `)` on the line, since the name
/// itself may contain spaces and parentheses. Without an opening mark the
/// next whitespace-delimited token is taken.
fn split_comm(rest: &str) -> Option<(&str, &str)> {
    if rest.is_empty() {
        return None;
    }
    if rest.starts_with('(') {
        if let Some(close) = rest.rfind(')') {
            return Some((&rest[..=close], &rest[close + 1..]));
        }
    }
    let end = rest
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(rest.len());
    Some((&rest[..end], &rest[end..]))
}

/// Strips exactly one leading `(` and one trailing `)`, when present.
pub fn strip_name_marks(raw: &str) -> &str {
    let s = raw.strip_prefix('(').unwrap_or(raw);
    s.strip_suffix(')').unwrap_or(s)
}

/// Parses the content of a stat file.
///
/// Returns `None` unless both the pid and the name were decoded; later fields
/// that fail to parse are reported as zero.
pub fn parse_stat(content: &str) -> Option<LinuxStat> {
    let content = content.trim_start();
    let pid_end = content
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(content.len());
    let pid: i32 = content[..pid_end].parse().ok()?;

    let (raw_comm, rest) = split_comm(content[pid_end..].trim_start())?;
    let comm = cap_name(strip_name_marks(raw_comm));

    let mut f = Fields::new(rest, 2);
    let mut stat = LinuxStat {
        pid,
        comm,
        ..LinuxStat::default()
    };
    stat.state = f.next();
    stat.ppid = f.next();
    stat.pgrp = f.next();
    stat.session = f.next();
    stat.tty_nr = f.next();
    stat.tpgid = f.next();
    stat.flags = f.next();
    stat.minflt = f.next();
    stat.cminflt = f.next();
    stat.majflt = f.next();
    stat.cmajflt = f.next();
    stat.utime = f.next();
    stat.stime = f.next();
    stat.cutime = f.next();
    stat.cstime = f.next();
    stat.priority = f.next();
    stat.nice = f.next();
    stat.num_threads = f.next();
    stat.itrealvalue = f.next();
    stat.starttime = f.next();
    stat.vsize = f.next();
    stat.rss = f.next();
    stat.fields_parsed = f.parsed;

    Some(stat)
}

/// Reads and decodes `<entry>/stat` from the process table.
pub fn read_stat(table: &dyn ProcessTable, entry: &str, buf_bytes: usize) -> Option<LinuxStat> {
    let file = match table.open(entry, "stat") {
        Ok(f) => f,
        Err(e) => {
            debug!("Cannot open stat for entry {}: {}", entry, e);
            return None;
        }
    };

    let mut reader = BufReader::with_capacity(buf_bytes, file);
    let mut raw = Vec::new();
    if let Err(e) = reader.read_to_end(&mut raw) {
        debug!("Failed to read stat for entry {}: {}", entry, e);
        return None;
    }

    let stat = parse_stat(&String::from_utf8_lossy(&raw));
    if stat.is_none() {
        debug!("Malformed stat record for entry {}", entry);
    }
    stat
}
