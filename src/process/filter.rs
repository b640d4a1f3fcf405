//! Process table entry filtering and owner resolution.

use crate::process::table::ProcessTable;
use nix::unistd::User;
use tracing::{debug, trace};

/// Name to uid lookup against a user database.
pub trait UserDatabase {
    fn uid_by_name(&self, name: &str) -> Option<u32>;
}

/// The host's user database (`getpwnam`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUsers;

impl UserDatabase for SystemUsers {
    fn uid_by_name(&self, name: &str) -> Option<u32> {
        match User::from_name(name) {
            Ok(Some(user)) => Some(user.uid.as_raw()),
            Ok(None) => None,
            Err(e) => {
                debug!("User lookup for '{}' failed: {}", name, e);
                None
            }
        }
    }
}

/// Ownership constraint applied to process table entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter {
    Any,
    Uid(u32),
}

/// Resolves an optional user name once per request.
///
/// `None` means a name was given but does not exist; the caller must treat
/// that as "nothing matches" rather than falling back to an unfiltered scan.
pub fn resolve_owner(users: &dyn UserDatabase, user_name: Option<&str>) -> Option<OwnerFilter> {
    match user_name {
        None => Some(OwnerFilter::Any),
        Some(name) => users.uid_by_name(name).map(OwnerFilter::Uid),
    }
}

/// Decides whether `entry` is a process directory owned by the filtered user.
///
/// Any stat failure, including a process that exited after being listed,
/// excludes the entry.
pub fn is_candidate(table: &dyn ProcessTable, entry: &str, owner: OwnerFilter) -> bool {
    let meta = match table.metadata(entry) {
        Ok(m) => m,
        Err(e) => {
            trace!("stat failed for entry {}: {}", entry, e);
            return false;
        }
    };

    match owner {
        OwnerFilter::Any => meta.is_dir,
        OwnerFilter::Uid(uid) => meta.is_dir && meta.uid == uid,
    }
}
