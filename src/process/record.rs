//! Normalized per-process records and memory regions shared by both platform
//! backends.

use crate::process::perms::PermissionSet;

/// Longest executable short name kept from any status source.
pub const MAX_NAME_LEN: usize = 255;

/// Resident set size in the unit the status source reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resident {
    /// Memory pages (`/proc/<pid>/stat` field 24).
    Pages(u64),
    /// Kilobytes (`psinfo.pr_rssize`).
    Kilobytes(u64),
}

impl Resident {
    /// Converts to bytes. `page_size` only applies to [`Resident::Pages`].
    pub fn bytes(self, page_size: u64) -> u64 {
        match self {
            Resident::Pages(pages) => pages.saturating_mul(page_size),
            Resident::Kilobytes(kb) => kb.saturating_mul(1024),
        }
    }
}

/// Identity and resident size of one process, decoded from its status source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: i32,
    /// Short executable name with any enclosing marks already stripped.
    pub name: String,
    pub resident: Resident,
}

impl ProcessRecord {
    /// Exact byte-for-byte comparison against a requested name.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_bytes() == name.as_bytes()
    }
}

/// One contiguous virtual address range with uniform permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: PermissionSet,
}

impl MemoryRegion {
    /// Span of the region in bytes.
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Single-pass stream of a process's memory regions.
///
/// Malformed regions are dropped inside the stream and only show up in
/// [`RegionStream::skipped`].
pub trait RegionStream: Iterator<Item = MemoryRegion> {
    /// Regions dropped so far because their source could not be decoded.
    fn skipped(&self) -> u64;

    /// True once the underlying read failed before end-of-source.
    fn interrupted(&self) -> bool;
}

/// Truncates a decoded name to [`MAX_NAME_LEN`] bytes on a char boundary.
pub(crate) fn cap_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resident_bytes() {
        assert_eq!(Resident::Pages(3).bytes(4096), 12288);
        assert_eq!(Resident::Kilobytes(3).bytes(65536), 3072);
        assert_eq!(Resident::Pages(u64::MAX).bytes(4096), u64::MAX);
    }

    #[test]
    fn test_is_named_exact() {
        let rec = ProcessRecord {
            pid: 1,
            name: "java2".into(),
            resident: Resident::Pages(0),
        };
        assert!(rec.is_named("java2"));
        assert!(!rec.is_named("java"));
        assert!(!rec.is_named("java23"));
        assert!(!rec.is_named("Java2"));
    }

    #[test]
    fn test_region_size() {
        let r = MemoryRegion {
            start: 0x1000,
            end: 0x3000,
            perms: PermissionSet::default(),
        };
        assert_eq!(r.size(), 0x2000);
    }

    #[test]
    fn test_cap_name() {
        assert_eq!(cap_name("bash"), "bash");
        let long = "x".repeat(300);
        assert_eq!(cap_name(&long).len(), MAX_NAME_LEN);
        // Multi-byte char straddling the limit is dropped whole
        let mut mixed = "y".repeat(MAX_NAME_LEN - 1);
        mixed.push('é');
        assert_eq!(cap_name(&mixed).len(), MAX_NAME_LEN - 1);
    }
}
