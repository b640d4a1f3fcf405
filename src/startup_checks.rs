//! Runtime requirement validation for herakles-procinf.
//!
//! This module validates that the process table can be read and that this
//! process's own record and memory regions decode with the selected backend.

use herakles_procinf::process::{is_candidate, OwnerFilter, ProcessRecord};
use herakles_procinf::Aggregator;
use nix::unistd::geteuid;
use std::io;
use tracing::{debug, error, info, warn};

/// What the memory check found for this process.
#[derive(Debug, Clone)]
pub struct SelfScan {
    pub record: ProcessRecord,
    pub resident_bytes: u64,
    pub regions: u64,
    pub mapped_bytes: u64,
    pub skipped: u64,
}

/// Check if running with sufficient privileges
pub fn check_user_privileges() -> bool {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - processes of other users may be unreadable");
        false
    } else {
        info!("✅ Running as root (uid=0)");
        true
    }
}

/// Lists the process table and returns how many process directories it holds.
pub fn check_proc_access(aggregator: &Aggregator) -> Result<usize, ValidationError> {
    let table = aggregator.table();
    let entries = match table.entries() {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot list {} - insufficient permissions", table.root().display());
            return Err(ValidationError::InsufficientPermissions(e.to_string()));
        }
        Err(e) => {
            error!("❌ Cannot list {}: {}", table.root().display(), e);
            return Err(ValidationError::TableUnreadable(
                table.root().display().to_string(),
                e.to_string(),
            ));
        }
    };

    let processes = entries
        .iter()
        .filter(|e| is_candidate(table, e, OwnerFilter::Any))
        .count();
    debug!(
        "{} entries, {} process directories under {}",
        entries.len(),
        processes,
        table.root().display()
    );

    if processes == 0 {
        return Err(ValidationError::NoProcesses(table.root().display().to_string()));
    }
    Ok(processes)
}

/// Decodes `entry`'s record and walks its regions with the configured backend.
pub fn check_process_decodes(
    aggregator: &Aggregator,
    entry: &str,
) -> Result<SelfScan, ValidationError> {
    let table = aggregator.table();
    let backend = aggregator.backend();

    let record = backend
        .read_record(table, entry)
        .ok_or_else(|| ValidationError::RecordUndecodable(entry.to_string()))?;
    let resident_bytes = backend.resident_bytes(&record);

    let mut stream = backend
        .read_regions(table, entry)
        .ok_or_else(|| ValidationError::RegionsUnreadable(entry.to_string()))?;

    let mut regions = 0;
    let mut mapped_bytes: u64 = 0;
    for region in stream.by_ref() {
        regions += 1;
        mapped_bytes = mapped_bytes.saturating_add(region.size());
    }
    if stream.interrupted() {
        return Err(ValidationError::RegionsUnreadable(entry.to_string()));
    }

    Ok(SelfScan {
        record,
        resident_bytes,
        regions,
        mapped_bytes,
        skipped: stream.skipped(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Process table {0} not readable: {1}")]
    TableUnreadable(String, String),

    #[error("No process directories found under {0}")]
    NoProcesses(String),

    #[error("Status record of entry {0} could not be decoded")]
    RecordUndecodable(String),

    #[error("Memory regions of entry {0} could not be read")]
    RegionsUnreadable(String),
}
