//! Aggregation engine.
//!
//! Sums one memory metric over every process in the table whose short
//! executable name equals the requested name, optionally restricted to
//! processes owned by one user.
//!
//! The public contract is total: every failure mode collapses to a zero
//! contribution, so a result of `0` can mean "no such process", "unknown
//! user", "process table unreadable" or genuine zero usage. [`ScanStats`]
//! tells these apart for callers that need to.

use crate::error::RequestError;
use crate::process::{
    backend_for, is_candidate, resolve_owner, BackendOptions, FsProcessTable, PermissionSet,
    Platform, ProcBackend, ProcessRecord, ProcessTable, SystemUsers, UserDatabase,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace, warn};

/// Metric to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Resident set size.
    #[serde(rename = "vmrss", alias = "rss")]
    ResidentMemory,
    /// Every mapped region.
    #[serde(rename = "allmap", alias = "map")]
    AllMappings,
    /// Shared regions only.
    #[serde(rename = "shmap", alias = "shared")]
    SharedMappings,
    /// Readable and writable regions only.
    #[serde(rename = "rwmap", alias = "rw")]
    ReadWriteMappings,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::ResidentMemory,
        Metric::AllMappings,
        Metric::ReadWriteMappings,
        Metric::SharedMappings,
    ];

    /// True for the metrics computed from memory regions.
    pub fn is_mapping(&self) -> bool {
        !matches!(self, Metric::ResidentMemory)
    }

    /// Whether a region with `perms` contributes to this metric.
    pub fn counts(&self, perms: &PermissionSet) -> bool {
        match self {
            Metric::ResidentMemory => false,
            Metric::AllMappings => true,
            Metric::SharedMappings => perms.shared,
            Metric::ReadWriteMappings => perms.is_read_write(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ResidentMemory => "vmrss",
            Metric::AllMappings => "allmap",
            Metric::SharedMappings => "shmap",
            Metric::ReadWriteMappings => "rwmap",
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vmrss" | "rss" => Ok(Metric::ResidentMemory),
            "allmap" | "map" => Ok(Metric::AllMappings),
            "shmap" | "shared" => Ok(Metric::SharedMappings),
            "rwmap" | "rw" => Ok(Metric::ReadWriteMappings),
            other => Err(format!(
                "Invalid metric '{}', expected one of: vmrss, allmap, rwmap, shmap",
                other
            )),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated aggregation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    process_name: String,
    user_name: Option<String>,
    metric: Metric,
}

impl AggregationRequest {
    pub fn new(
        process_name: impl Into<String>,
        user_name: Option<String>,
        metric: Metric,
    ) -> Result<Self, RequestError> {
        let process_name = process_name.into();
        if process_name.is_empty() {
            return Err(RequestError::EmptyProcessName);
        }
        Ok(Self {
            process_name,
            user_name,
            metric,
        })
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }
}

/// Counters describing what one scan saw and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// The process table root could not be listed.
    pub table_unavailable: bool,
    /// A user name was given and did not resolve.
    pub unknown_user: bool,
    pub entries_seen: u64,
    /// Not a directory, not owned by the filtered user, or vanished before stat.
    pub entries_rejected: u64,
    /// Status record missing or malformed.
    pub records_unreadable: u64,
    pub name_mismatches: u64,
    /// Includes matches reached through symlinked entries, see `linked_matches`.
    pub processes_matched: u64,
    /// Matches whose entry is a symlink. On a live `/proc`, `self` and
    /// `thread-self` resolve to the scanning process, so it is counted once
    /// more per link when its own name is requested.
    pub linked_matches: u64,
    /// Matched processes whose region listing could not be opened.
    pub maps_unreadable: u64,
    pub regions_counted: u64,
    /// Well-formed regions that the metric's predicate excluded.
    pub regions_ignored: u64,
    /// Malformed regions dropped by the reader.
    pub regions_skipped: u64,
    /// Region listings that failed mid-read; their partial sums were discarded.
    pub streams_interrupted: u64,
}

/// Result of [`Aggregator::aggregate_with_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    /// Sum in bytes.
    pub total: u64,
    pub stats: ScanStats,
}

/// Aggregation engine bound to a process table, user database and backend.
pub struct Aggregator {
    table: Box<dyn ProcessTable>,
    users: Box<dyn UserDatabase>,
    backend: Box<dyn ProcBackend>,
}

impl Aggregator {
    pub fn new(
        table: Box<dyn ProcessTable>,
        users: Box<dyn UserDatabase>,
        backend: Box<dyn ProcBackend>,
    ) -> Self {
        Self {
            table,
            users,
            backend,
        }
    }

    /// Engine over `/proc`, the host user database and the native backend.
    pub fn system() -> Self {
        Self::new(
            Box::new(FsProcessTable::default()),
            Box::new(SystemUsers),
            backend_for(Platform::native(), &BackendOptions::default()),
        )
    }

    pub fn table(&self) -> &dyn ProcessTable {
        self.table.as_ref()
    }

    pub fn backend(&self) -> &dyn ProcBackend {
        self.backend.as_ref()
    }

    /// Total in bytes for `request`.
    ///
    /// Every entry of the table except `.` and `..` is considered. Symlinked
    /// entries that resolve to a process directory are counted like any other,
    /// so on a live `/proc` the calling process contributes once per link
    /// (`self`, `thread-self`) in addition to its pid entry.
    pub fn aggregate(&self, request: &AggregationRequest) -> u64 {
        self.aggregate_with_stats(request).total
    }

    /// Total in bytes for `request`, with scan diagnostics.
    pub fn aggregate_with_stats(&self, request: &AggregationRequest) -> Aggregation {
        let mut out = Aggregation::default();

        let owner = match resolve_owner(self.users.as_ref(), request.user_name()) {
            Some(owner) => owner,
            None => {
                warn!(
                    "Unknown user '{}', nothing to aggregate",
                    request.user_name().unwrap_or_default()
                );
                out.stats.unknown_user = true;
                return out;
            }
        };

        let entries = match self.table.entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Cannot read process table {}: {}",
                    self.table.root().display(),
                    e
                );
                out.stats.table_unavailable = true;
                return out;
            }
        };

        for entry in entries.iter().map(String::as_str) {
            if entry == "." || entry == ".." {
                continue;
            }
            out.stats.entries_seen += 1;

            if !is_candidate(self.table.as_ref(), entry, owner) {
                out.stats.entries_rejected += 1;
                continue;
            }

            let contribution = if request.metric().is_mapping() {
                self.mapped_bytes(entry, request, &mut out.stats)
            } else {
                self.resident_bytes(entry, request, &mut out.stats)
            };
            out.total = out.total.saturating_add(contribution);
        }

        debug!(
            "Aggregated {} for '{}' (owner {:?}) via {}: {} bytes over {} processes",
            request.metric(),
            request.process_name(),
            owner,
            self.backend.name(),
            out.total,
            out.stats.processes_matched
        );
        out
    }

    /// Reads the record of `entry` and checks it against the requested name.
    fn matching_record(
        &self,
        entry: &str,
        request: &AggregationRequest,
        stats: &mut ScanStats,
    ) -> Option<ProcessRecord> {
        let record = match self.backend.read_record(self.table.as_ref(), entry) {
            Some(r) => r,
            None => {
                stats.records_unreadable += 1;
                return None;
            }
        };
        if !record.is_named(request.process_name()) {
            stats.name_mismatches += 1;
            return None;
        }
        stats.processes_matched += 1;
        if self.table.metadata(entry).map_or(false, |m| m.is_link) {
            debug!("Entry {} is a symlink to pid {}", entry, record.pid);
            stats.linked_matches += 1;
        }
        Some(record)
    }

    fn resident_bytes(
        &self,
        entry: &str,
        request: &AggregationRequest,
        stats: &mut ScanStats,
    ) -> u64 {
        match self.matching_record(entry, request, stats) {
            Some(record) => {
                let bytes = self.backend.resident_bytes(&record);
                trace!("pid {} ({}): {} resident bytes", record.pid, record.name, bytes);
                bytes
            }
            None => 0,
        }
    }

    fn mapped_bytes(&self, entry: &str, request: &AggregationRequest, stats: &mut ScanStats) -> u64 {
        let record = match self.matching_record(entry, request, stats) {
            Some(r) => r,
            None => return 0,
        };

        let mut regions = match self.backend.read_regions(self.table.as_ref(), entry) {
            Some(r) => r,
            None => {
                stats.maps_unreadable += 1;
                return 0;
            }
        };

        let metric = request.metric();
        let mut subtotal: u64 = 0;
        let mut counted = 0;
        let mut ignored = 0;
        for region in regions.by_ref() {
            if metric.counts(&region.perms) {
                subtotal = subtotal.saturating_add(region.size());
                counted += 1;
            } else {
                ignored += 1;
            }
        }
        stats.regions_skipped += regions.skipped();

        if regions.interrupted() {
            debug!(
                "Region listing of pid {} interrupted, discarding {} bytes",
                record.pid, subtotal
            );
            stats.streams_interrupted += 1;
            return 0;
        }

        stats.regions_counted += counted;
        stats.regions_ignored += ignored;
        trace!("pid {} ({}): {} {} bytes", record.pid, record.name, subtotal, metric);
        subtotal
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("root", &self.table.root())
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Aggregates `metric` over the live process table of this host.
///
/// Returns bytes. Never fails: an empty process name, an unknown user or an
/// unreadable process table all yield `0`.
pub fn aggregate(process_name: &str, user_name: Option<&str>, metric: Metric) -> u64 {
    match AggregationRequest::new(process_name, user_name.map(str::to_string), metric) {
        Ok(request) => Aggregator::system().aggregate(&request),
        Err(e) => {
            warn!("Rejected aggregation request: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::decode_token;

    // -------------------------------------------------------------------------
    // Tests for Metric
    // -------------------------------------------------------------------------

    #[test]
    fn test_metric_predicates() {
        let rw = decode_token("rw-p").unwrap();
        let shared = decode_token("---s").unwrap();
        let ro = decode_token("r--p").unwrap();

        for perms in [&rw, &shared, &ro] {
            assert!(Metric::AllMappings.counts(perms));
            assert!(!Metric::ResidentMemory.counts(perms));
        }
        assert!(Metric::ReadWriteMappings.counts(&rw));
        assert!(!Metric::ReadWriteMappings.counts(&shared));
        assert!(!Metric::ReadWriteMappings.counts(&ro));
        assert!(Metric::SharedMappings.counts(&shared));
        assert!(!Metric::SharedMappings.counts(&rw));
        assert!(!Metric::SharedMappings.counts(&ro));
        assert!(!Metric::ResidentMemory.is_mapping());
    }

    #[test]
    fn test_metric_parse_and_display() {
        for m in Metric::ALL {
            assert_eq!(m.to_string().parse::<Metric>(), Ok(m));
        }
        assert_eq!("rss".parse::<Metric>(), Ok(Metric::ResidentMemory));
        assert_eq!("map".parse::<Metric>(), Ok(Metric::AllMappings));
        assert!("swap".parse::<Metric>().is_err());
    }

    // -------------------------------------------------------------------------
    // Tests for AggregationRequest
    // -------------------------------------------------------------------------

    #[test]
    fn test_request_rejects_empty_name() {
        assert_eq!(
            AggregationRequest::new("", None, Metric::ResidentMemory),
            Err(RequestError::EmptyProcessName)
        );
        let req =
            AggregationRequest::new("bash", Some("root".into()), Metric::SharedMappings).unwrap();
        assert_eq!(req.process_name(), "bash");
        assert_eq!(req.user_name(), Some("root"));
        assert_eq!(req.metric(), Metric::SharedMappings);
    }

    #[test]
    fn test_aggregate_empty_name_is_zero() {
        assert_eq!(aggregate("", None, Metric::ResidentMemory), 0);
    }

    #[test]
    fn test_aggregate_unknown_user_is_zero() {
        assert_eq!(
            aggregate("bash", Some("herakles-no-such-user-0815"), Metric::AllMappings),
            0
        );
    }
}
