//! Region permission decoding.
//!
//! Both map formats are normalized into a [`PermissionSet`] before a region is
//! handed to the aggregation engine: the text permission column of
//! `/proc/<pid>/maps` and the `pr_mflags` word of a Solaris `prmap_t`.

use serde::Serialize;

/// Normalized capability set of a memory region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub shared: bool,
    pub private: bool,
}

impl PermissionSet {
    /// True when the region is both readable and writable.
    pub fn is_read_write(&self) -> bool {
        self.readable && self.writable
    }
}

/// `pr_mflags` bits from `<sys/procfs.h>`.
pub mod mflags {
    pub const MA_EXEC: u32 = 0x01;
    pub const MA_WRITE: u32 = 0x02;
    pub const MA_READ: u32 = 0x04;
    pub const MA_SHARED: u32 = 0x08;
    pub const MA_SHM: u32 = 0x200;
}

/// Decodes a text permission token such as `rw-p` or `r-xs`.
///
/// Characters are mapped independently and anything unrecognized (including
/// the `-` placeholder) is ignored. `x` and `e` both mark the region
/// executable. An empty token yields `None`.
pub fn decode_token(token: &str) -> Option<PermissionSet> {
    if token.is_empty() {
        return None;
    }

    let mut perms = PermissionSet::default();
    for c in token.chars() {
        match c {
            'r' => perms.readable = true,
            'w' => perms.writable = true,
            'x' | 'e' => perms.executable = true,
            's' => perms.shared = true,
            'p' => perms.private = true,
            _ => {}
        }
    }
    Some(perms)
}

fn has_all(flags: u32, mask: u32) -> bool {
    flags & mask == mask
}

/// Decodes a `pr_mflags` word.
///
/// Shared is set for either `MA_SHARED` or `MA_SHM`. A region that is not
/// shared is reported as private.
pub fn decode_flags(flags: u32) -> PermissionSet {
    let shared = has_all(flags, mflags::MA_SHARED) || has_all(flags, mflags::MA_SHM);
    PermissionSet {
        readable: has_all(flags, mflags::MA_READ),
        writable: has_all(flags, mflags::MA_WRITE),
        executable: has_all(flags, mflags::MA_EXEC),
        shared,
        private: !shared,
    }
}
