//! Merge engine for quote synchronization.
//!
//! Reconciles the local collection against a snapshot fetched from the
//! remote source. The version number is the sole authority:
//! - unknown id: the remote record is appended
//! - remote version newer: the remote record replaces the local one
//! - remote version older: nothing happens (local is kept)
//! - same version, different content: the local record is flagged as a
//!   conflict and a [`ConflictEntry`] is produced; the record itself is
//!   left as-is until the conflict is resolved
//!
//! No timestamps or vector clocks take part in the decision.

use std::collections::HashMap;

use crate::models::{ConflictEntry, Quote, SyncStats};

/// Result of reconciling one remote snapshot.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// The updated local collection, in local order with new records appended
    pub quotes: Vec<Quote>,
    /// Conflicts detected in this pass
    pub conflicts: Vec<ConflictEntry>,
    pub stats: SyncStats,
}

/// Merge a remote snapshot into a copy of the local collection.
///
/// A local record that already carries the conflict flag does not produce a
/// second entry; its divergence is already queued.
pub fn reconcile(local: &[Quote], remote: &[Quote]) -> Reconciliation {
    let mut quotes = local.to_vec();
    let mut index: HashMap<String, usize> = quotes
        .iter()
        .enumerate()
        .map(|(i, q)| (q.id.clone(), i))
        .collect();

    let mut conflicts = Vec::new();
    let mut stats = SyncStats::default();

    for remote_quote in remote {
        let Some(i) = index.get(&remote_quote.id).copied() else {
            tracing::trace!("merge: add {}", remote_quote.id);
            index.insert(remote_quote.id.clone(), quotes.len());
            quotes.push(remote_quote.clone());
            stats.added += 1;
            continue;
        };

        let local_quote = &mut quotes[i];

        if remote_quote.version > local_quote.version {
            tracing::trace!(
                "merge: update {} v{} -> v{}",
                remote_quote.id,
                local_quote.version,
                remote_quote.version
            );
            *local_quote = remote_quote.clone();
            stats.updated += 1;
        } else if remote_quote.version < local_quote.version {
            // Local is ahead. A clean record here is never pushed; only dirty
            // records are uploaded.
            if !local_quote.dirty {
                tracing::trace!(
                    "merge: local {} v{} ahead of remote v{}, left unchanged",
                    local_quote.id,
                    local_quote.version,
                    remote_quote.version
                );
            }
        } else if !remote_quote.same_content(local_quote) {
            if local_quote.conflict {
                continue;
            }
            tracing::trace!("merge: conflict on {} at v{}", local_quote.id, local_quote.version);
            conflicts.push(ConflictEntry {
                id: local_quote.id.clone(),
                local: local_quote.clone(),
                remote: remote_quote.clone(),
            });
            local_quote.conflict = true;
            stats.conflicts += 1;
        }
    }

    Reconciliation {
        quotes,
        conflicts,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Origin;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn local_quote(id: &str, text: &str, version: u64) -> Quote {
        let mut quote = Quote::remote(id, text, "Work", version);
        quote.origin = Origin::Local;
        quote
    }

    #[test]
    fn test_remote_newer_version_wins() {
        let local = vec![local_quote("1", "A", 1)];
        let remote = vec![Quote::remote("1", "B", "Work", 2)];

        let result = reconcile(&local, &remote);

        assert_eq!(result.quotes, remote);
        assert_eq!(result.stats.updated, 1);
        assert_eq!(result.stats.added, 0);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_same_version_different_content_conflicts() {
        let local = vec![local_quote("2", "X", 1)];
        let remote = vec![Quote::remote("2", "Y", "Work", 1)];

        let result = reconcile(&local, &remote);

        let merged = &result.quotes[0];
        assert_eq!(merged.text, "X");
        assert_eq!(merged.version, 1);
        assert!(merged.conflict);

        assert_eq!(result.conflicts.len(), 1);
        let entry = &result.conflicts[0];
        assert_eq!(entry.id, "2");
        assert_eq!(entry.local.text, "X");
        assert!(!entry.local.conflict, "local copy is taken before flagging");
        assert_eq!(entry.remote.text, "Y");
        assert_eq!(result.stats.conflicts, 1);
    }

    #[test]
    fn test_unknown_remote_is_appended() {
        let local = vec![local_quote("1", "A", 1)];
        let remote = vec![Quote::remote("9", "Z", "Life", 5)];

        let result = reconcile(&local, &remote);

        assert_eq!(result.quotes.len(), 2);
        assert_eq!(result.quotes[0].id, "1");
        assert_eq!(result.quotes[1], remote[0]);
        assert_eq!(result.stats.added, 1);
    }

    #[test]
    fn test_older_remote_is_ignored() {
        let local = vec![local_quote("1", "Newer", 3)];
        let remote = vec![Quote::remote("1", "Older", "Work", 2)];

        let result = reconcile(&local, &remote);

        assert_eq!(result.quotes, local);
        assert_eq!(result.stats, SyncStats::default());
    }

    #[test]
    fn test_dirty_local_is_replaced_by_newer_remote() {
        let mut dirty = local_quote("1", "Edited", 2);
        dirty.dirty = true;
        let remote = vec![Quote::remote("1", "Server", "Work", 3)];

        let result = reconcile(&[dirty], &remote);

        assert_eq!(result.quotes, remote);
        assert!(!result.quotes[0].dirty);
    }

    #[test]
    fn test_identical_records_are_noop() {
        let local = vec![local_quote("1", "Same", 2)];
        let remote = vec![Quote::remote("1", "Same", "Work", 2)];

        let result = reconcile(&local, &remote);

        assert_eq!(result.quotes, local);
        assert_eq!(result.stats, SyncStats::default());
    }

    #[test]
    fn test_already_flagged_conflict_is_not_requeued() {
        let local = vec![local_quote("2", "X", 1)];
        let remote = vec![Quote::remote("2", "Y", "Work", 1)];

        let first = reconcile(&local, &remote);
        let second = reconcile(&first.quotes, &remote);

        assert!(second.conflicts.is_empty());
        assert_eq!(second.quotes, first.quotes);
    }

    fn collection(entries: BTreeMap<u8, (u64, String)>, origin: Origin) -> Vec<Quote> {
        entries
            .into_iter()
            .map(|(id, (version, text))| {
                let mut quote = Quote::remote(id.to_string(), text, "Cat", version);
                quote.origin = origin;
                quote
            })
            .collect()
    }

    fn snapshot() -> impl Strategy<Value = BTreeMap<u8, (u64, String)>> {
        prop::collection::btree_map(0u8..12, (1u64..4, "[a-c]{1,2}"), 0..10)
    }

    proptest! {
        #[test]
        fn reconcile_follows_version_rules(local in snapshot(), remote in snapshot()) {
            let local = collection(local, Origin::Local);
            let remote = collection(remote, Origin::Remote);

            let result = reconcile(&local, &remote);

            let mut added = 0;
            for r in &remote {
                let matches: Vec<&Quote> = result.quotes.iter().filter(|q| q.id == r.id).collect();
                prop_assert_eq!(matches.len(), 1);
                let merged = matches[0];
                let queued = result.conflicts.iter().filter(|c| c.id == r.id).count();

                match local.iter().find(|l| l.id == r.id) {
                    None => {
                        added += 1;
                        prop_assert_eq!(merged, r);
                    }
                    Some(l) if r.version > l.version => prop_assert_eq!(merged, r),
                    Some(l) if r.version == l.version && !r.same_content(l) => {
                        prop_assert!(merged.same_content(l));
                        prop_assert!(merged.conflict);
                        prop_assert_eq!(queued, 1);
                    }
                    Some(l) => {
                        prop_assert_eq!(merged, l);
                        prop_assert_eq!(queued, 0);
                    }
                }
            }

            prop_assert_eq!(result.stats.added, added);
            prop_assert_eq!(result.quotes.len(), local.len() + added);
            prop_assert_eq!(result.stats.conflicts, result.conflicts.len());
        }

        #[test]
        fn reconcile_is_idempotent(local in snapshot(), remote in snapshot()) {
            let local = collection(local, Origin::Local);
            let remote = collection(remote, Origin::Remote);

            let first = reconcile(&local, &remote);
            let second = reconcile(&first.quotes, &remote);

            prop_assert!(second.conflicts.is_empty());
            prop_assert_eq!(second.stats, SyncStats::default());
            prop_assert_eq!(second.quotes, first.quotes);
        }
    }
}
