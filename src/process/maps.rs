//! Text memory-map reader for `/proc/<pid>/maps`.
//!
//! Each line looks like `55d4c3a2e000-55d4c3a50000 r--p 00000000 fd:01 1234 /usr/bin/bash`.
//! Only the address range and the permission column are used.

use crate::process::hex::{parse_hex, HexAlphabet};
use crate::process::perms::decode_token;
use crate::process::record::{MemoryRegion, RegionStream};
use std::io::{BufRead, ErrorKind};
use tracing::trace;

/// Parses one maps line into a region.
///
/// The start address runs up to the first `-`; end address and permission
/// token are the next two whitespace-delimited tokens. Returns `None` when a
/// token is missing, an address is not valid hex in `alphabet`, the
/// permission token is empty, or the range is inverted.
pub fn parse_maps_line(line: &str, alphabet: HexAlphabet) -> Option<MemoryRegion> {
    let line = line.trim_start_matches('-');
    let (start_tok, rest) = line.split_once('-')?;

    let mut tokens = rest.split_ascii_whitespace();
    let end_tok = tokens.next()?;
    let perms_tok = tokens.next()?;

    let start = parse_hex(start_tok, alphabet)?;
    let end = parse_hex(end_tok, alphabet)?;
    let perms = decode_token(perms_tok)?;

    if end < start {
        return None;
    }

    Some(MemoryRegion { start, end, perms })
}

/// Lazy region stream over a buffered maps source.
///
/// Lines are read one at a time into a reused buffer; nothing beyond the
/// current line is held in memory.
pub struct MapsStream<R> {
    reader: R,
    line: Vec<u8>,
    alphabet: HexAlphabet,
    skipped: u64,
    interrupted: bool,
    done: bool,
}

impl<R: BufRead> MapsStream<R> {
    pub fn new(reader: R, alphabet: HexAlphabet) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(256),
            alphabet,
            skipped: 0,
            interrupted: false,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for MapsStream<R> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        while !self.done {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let text = match std::str::from_utf8(&self.line) {
                        Ok(t) => t.trim_end_matches(['\n', '\r']),
                        Err(_) => {
                            self.skipped += 1;
                            continue;
                        }
                    };
                    if text.trim().is_empty() {
                        continue;
                    }
                    match parse_maps_line(text, self.alphabet) {
                        Some(region) => return Some(region),
                        None => {
                            trace!("Skipping malformed maps line: {:?}", text);
                            self.skipped += 1;
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    trace!("Maps read failed: {}", e);
                    self.interrupted = true;
                    self.done = true;
                }
            }
        }
        None
    }
}

impl<R: BufRead> RegionStream for MapsStream<R> {
    fn skipped(&self) -> u64 {
        self.skipped
    }

    fn interrupted(&self) -> bool {
        self.interrupted
    }
}
