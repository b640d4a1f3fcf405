//! Process table access and per-process decoding.
//!
//! This module provides:
//! - `table`: Process table root abstraction (listing, stat, open)
//! - `filter`: Entry filtering and user name resolution
//! - `stat` / `psinfo`: Status record readers (text / binary)
//! - `maps` / `prmap`: Memory region readers (text / binary)
//! - `perms` / `hex`: Permission and address token decoding
//! - `backend`: Platform selection behind a single interface

pub mod backend;
pub mod filter;
pub mod hex;
pub mod maps;
pub mod perms;
pub mod prmap;
pub mod psinfo;
pub mod record;
pub mod stat;
pub mod table;

// Re-export commonly used types
pub use backend::{
    backend_for, BackendOptions, BinaryBackend, Platform, ProcBackend, TextBackend,
    DEFAULT_BUFFER_BYTES, PAGE_SIZE,
};
pub use filter::{is_candidate, resolve_owner, OwnerFilter, SystemUsers, UserDatabase};
pub use hex::{hex_to_u64, parse_hex, HexAlphabet};
pub use perms::{decode_flags, decode_token, PermissionSet};
pub use record::{MemoryRegion, ProcessRecord, RegionStream, Resident};
pub use table::{EntryMeta, FsProcessTable, ProcessTable, DEFAULT_PROC_ROOT};
