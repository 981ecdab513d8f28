//! Collapses overlapping relay responses into one canonical live set.
//!
//! Everything here is a pure function over immutable records, so the result
//! does not depend on which relay answered first.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::constants::kinds;
use crate::models::{IdentityKey, KindClass, Record};

/// Whether `candidate` wins over `current` for the same identity.
///
/// Later `created_at` wins; on a tie the lexicographically smaller id wins so
/// the fold stays commutative.
fn supersedes(candidate: &Record, current: &Record) -> bool {
    candidate.created_at > current.created_at
        || (candidate.created_at == current.created_at && candidate.id < current.id)
}

/// Keep one record per identity key: the newest version.
///
/// Output is ordered newest first, ties by id.
pub fn deduplicate(records: impl IntoIterator<Item = Record>) -> Vec<Record> {
    let mut seen: HashMap<IdentityKey, Record> = HashMap::new();

    for record in records {
        let key = record.identity_key();
        match seen.get(&key) {
            Some(existing) if !supersedes(&record, existing) => {}
            _ => {
                seen.insert(key, record);
            }
        }
    }

    let mut survivors: Vec<Record> = seen.into_values().collect();
    sort_newest_first(&mut survivors);
    survivors
}

pub fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| {
        Reverse(a.created_at)
            .cmp(&Reverse(b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Retractions collected from a batch of NIP-09 deletion records.
///
/// Every entry remembers who asked for the deletion, so only self-authored
/// deletions can ever match.
#[derive(Debug, Default, Clone)]
pub struct Tombstones {
    /// (deleter pubkey, event id)
    ids: HashSet<(String, String)>,
    /// `deleter:kind:author:d`
    coordinates: HashSet<String>,
}

impl Tombstones {
    pub fn from_deletions<'a>(deletions: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut tombstones = Self::default();

        for deletion in deletions {
            if deletion.kind != kinds::DELETION {
                continue;
            }

            for tag in &deletion.tags {
                let (Some(name), Some(value)) = (tag.first(), tag.get(1)) else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "e" => {
                        tombstones
                            .ids
                            .insert((deletion.pubkey.clone(), value.clone()));
                    }
                    "a" => {
                        if value.split(':').nth(1) != Some(deletion.pubkey.as_str()) {
                            tracing::debug!(
                                "Deletion {} targets {} authored by someone else; it will not match",
                                deletion.id,
                                value
                            );
                        }
                        tombstones
                            .coordinates
                            .insert(format!("{}:{}", deletion.pubkey, value));
                    }
                    _ => {}
                }
            }
        }

        tombstones
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.coordinates.is_empty()
    }

    fn retracts_id(&self, record: &Record) -> bool {
        self.ids
            .contains(&(record.pubkey.clone(), record.id.clone()))
    }

    /// Whether the record's own author has retracted it
    pub fn retracts(&self, record: &Record) -> bool {
        if self.retracts_id(record) {
            return true;
        }

        if record.class() == KindClass::Addressable {
            let coordinate = format!(
                "{}:{}:{}:{}",
                record.pubkey,
                record.kind,
                record.pubkey,
                record.d_tag()
            );
            return self.coordinates.contains(&coordinate);
        }

        false
    }
}

/// Drop records retracted by a self-authored deletion.
///
/// A replaceable or addressable version retracted by id also takes every
/// version it supersedes, so filtering before or after [`deduplicate`] yields
/// the same live set.
pub fn filter_deleted(records: Vec<Record>, deletions: &[Record]) -> Vec<Record> {
    let tombstones = Tombstones::from_deletions(deletions);
    if tombstones.is_empty() {
        return records;
    }

    // Strongest retracted version per identity
    let mut retracted_heads: HashMap<IdentityKey, Record> = HashMap::new();
    for record in records.iter().filter(|r| tombstones.retracts_id(r)) {
        if !matches!(record.class(), KindClass::Replaceable | KindClass::Addressable) {
            continue;
        }
        let key = record.identity_key();
        match retracted_heads.get(&key) {
            Some(head) if !supersedes(record, head) => {}
            _ => {
                retracted_heads.insert(key, record.clone());
            }
        }
    }

    records
        .into_iter()
        .filter(|record| {
            let superseded_by_retracted = retracted_heads
                .get(&record.identity_key())
                .is_some_and(|head| supersedes(head, record));
            !tombstones.retracts(record) && !superseded_by_retracted
        })
        .collect()
}

/// Deduplicate, then apply deletions. This is the order every feed uses.
pub fn reconcile(records: impl IntoIterator<Item = Record>, deletions: &[Record]) -> Vec<Record> {
    filter_deleted(deduplicate(records), deletions)
}
