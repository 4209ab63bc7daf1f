//! Expiry sweeping.
//!
//! Resolution already ignores expired records, so sweeping is purely
//! housekeeping: it keeps the registries and their snapshots small.

use warden_core::Timestamp;

use crate::groups::GroupRegistry;
use crate::principals::PrincipalRegistry;

/// What a sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Direct records removed from principals.
    pub principal_records: usize,
    /// Principals that lost at least one record.
    pub principals_touched: usize,
    /// Records removed from groups.
    pub group_records: usize,
    /// Groups that lost at least one record.
    pub groups_touched: usize,
}

impl SweepReport {
    /// Total records removed.
    pub fn total(&self) -> usize {
        self.principal_records + self.group_records
    }

    /// Whether nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Remove every record expired at `now` from both registries.
///
/// Only principals that actually lose a record get `last_updated` bumped.
/// Group purges never touch principals.
pub fn sweep_expired(
    groups: &mut GroupRegistry,
    principals: &mut PrincipalRegistry,
    now: Timestamp,
) -> SweepReport {
    let mut report = SweepReport::default();

    for principal in principals.iter_mut() {
        let removed = principal.purge_expired(now);
        if removed > 0 {
            report.principal_records += removed;
            report.principals_touched += 1;
        }
    }

    for group in groups.iter_mut() {
        let removed = group.purge_expired(now);
        if removed > 0 {
            report.group_records += removed;
            report.groups_touched += 1;
        }
    }

    report
}
