//! Fingerprint reconciliation and bulk appends.
//!
//! For each natural key in a batch the reconciler reads every stored row for
//! that key, computes a [`KeyPlan`] from content fingerprints, and applies it.
//! Rows are never removed; disappearing content is soft-deleted.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::{
  ColumnDef, Destination, Error, Result, RowSet, Value,
  fingerprint::{fingerprint, fingerprint_columns},
};

// ─── Planning ────────────────────────────────────────────────────────────────

/// A stored row reduced to what planning needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
  pub id:          i64,
  pub deleted:     bool,
  pub fingerprint: String,
}

/// The writes needed to bring one key's rows in line with a batch.
///
/// Row references are indexes into the incoming fingerprint slice given to
/// [`plan_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPlan {
  /// Active rows whose content is unchanged: `(id, incoming)`.
  pub matched:      Vec<(i64, usize)>,
  /// Soft-deleted rows whose content reappeared: `(id, incoming)`.
  pub revived:      Vec<(i64, usize)>,
  /// Spare active rows repurposed for new content: `(id, incoming)`.
  pub overwritten:  Vec<(i64, usize)>,
  /// Incoming rows that need a freshly allocated id.
  pub inserted:     Vec<usize>,
  /// Active rows with no counterpart in the batch.
  pub soft_deleted: Vec<i64>,
}

/// Plan one key.
///
/// Priority for each incoming row: the oldest active row with the same
/// fingerprint, then the oldest soft-deleted row with the same fingerprint,
/// then the oldest unmatched active row (overwritten in place), then a new
/// id. Unmatched active rows left over are soft-deleted.
pub fn plan_key(slots: &[Slot], incoming: &[String]) -> KeyPlan {
  let mut ordered: Vec<&Slot> = slots.iter().collect();
  ordered.sort_by_key(|s| s.id);

  let mut active: HashMap<&str, VecDeque<i64>> = HashMap::new();
  let mut dormant: HashMap<&str, VecDeque<i64>> = HashMap::new();
  for slot in &ordered {
    let queues = if slot.deleted { &mut dormant } else { &mut active };
    queues
      .entry(slot.fingerprint.as_str())
      .or_default()
      .push_back(slot.id);
  }

  let mut plan = KeyPlan::default();
  let mut matched: HashSet<i64> = HashSet::new();
  let mut pending: Vec<usize> = vec![];

  for (idx, fp) in incoming.iter().enumerate() {
    match active.get_mut(fp.as_str()).and_then(VecDeque::pop_front) {
      Some(id) => {
        matched.insert(id);
        plan.matched.push((id, idx));
      }
      None => pending.push(idx),
    }
  }

  let mut spare: VecDeque<i64> = ordered
    .iter()
    .filter(|s| !s.deleted && !matched.contains(&s.id))
    .map(|s| s.id)
    .collect();

  for idx in pending {
    let fp = incoming[idx].as_str();
    if let Some(id) = dormant.get_mut(fp).and_then(VecDeque::pop_front) {
      plan.revived.push((id, idx));
    } else if let Some(id) = spare.pop_front() {
      plan.overwritten.push((id, idx));
    } else {
      plan.inserted.push(idx);
    }
  }

  plan.soft_deleted = spare.into_iter().collect();
  plan
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Row counts produced by reconciling or appending a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
  pub keys:         usize,
  pub matched:      usize,
  pub revived:      usize,
  pub overwritten:  usize,
  pub inserted:     usize,
  pub soft_deleted: usize,
  /// Rows appended without matching (no key column, or a null key).
  pub appended:     usize,
}

impl ReconcileStats {
  fn absorb(&mut self, plan: &KeyPlan) {
    self.keys += 1;
    self.matched += plan.matched.len();
    self.revived += plan.revived.len();
    self.overwritten += plan.overwritten.len();
    self.inserted += plan.inserted.len();
    self.soft_deleted += plan.soft_deleted.len();
  }
}

// ─── Applying ────────────────────────────────────────────────────────────────

/// Reconcile a normalised row-set carrying `key_column` against `table`.
///
/// `columns` are the row-set's columns with their destination types, in
/// row-set order. Rows with a null key cannot be matched and are appended.
pub fn reconcile<D: Destination>(
  dest: &D,
  table: &str,
  set: &RowSet,
  columns: &[ColumnDef],
  key_column: &str,
  modified_field: &str,
) -> Result<ReconcileStats> {
  let mut stats = ReconcileStats::default();
  let Some(key_idx) = set.column_index(key_column) else {
    stats.appended = append_rows(dest, table, set.columns(), set.rows().iter())?;
    return Ok(stats);
  };

  let fp_idx: Vec<usize> = fingerprint_columns(set.columns(), modified_field)
    .into_iter()
    .filter_map(|c| set.column_index(c))
    .collect();
  let modified_idx = set.column_index(modified_field);
  let digest = |row: &[Value]| fingerprint(fp_idx.iter().map(|&i| &row[i]));

  let (groups, orphans) = group_by_key(set, key_idx);

  for (key, rows) in groups {
    let stored = dest
      .rows_for_key(table, key_column, &set.rows()[rows[0]][key_idx], columns)
      .map_err(Error::destination)?;

    let slots: Vec<Slot> = stored
      .iter()
      .map(|r| Slot {
        id:          r.id,
        deleted:     r.deleted,
        fingerprint: digest(&r.values),
      })
      .collect();
    let incoming: Vec<String> = rows.iter().map(|&r| digest(&set.rows()[r])).collect();

    let plan = plan_key(&slots, &incoming);
    debug!(
      table,
      key = %key,
      matched = plan.matched.len(),
      revived = plan.revived.len(),
      overwritten = plan.overwritten.len(),
      inserted = plan.inserted.len(),
      soft_deleted = plan.soft_deleted.len(),
      "key reconciled"
    );

    let row_of = |idx: usize| &set.rows()[rows[idx]];

    for &(id, idx) in plan.matched.iter().chain(&plan.revived) {
      let modified = modified_idx.map(|m| (modified_field, &row_of(idx)[m]));
      dest.reactivate(table, id, modified).map_err(Error::destination)?;
    }
    for &(id, idx) in &plan.overwritten {
      dest
        .overwrite_row(table, id, set.columns(), row_of(idx))
        .map_err(Error::destination)?;
    }
    for &idx in &plan.inserted {
      let id = dest.allocate_id(table).map_err(Error::destination)?;
      dest
        .insert_row(table, id, set.columns(), row_of(idx))
        .map_err(Error::destination)?;
    }
    if !plan.soft_deleted.is_empty() {
      dest
        .soft_delete_ids(table, &plan.soft_deleted)
        .map_err(Error::destination)?;
    }

    stats.absorb(&plan);
  }

  if !orphans.is_empty() {
    warn!(table, rows = orphans.len(), column = key_column, "rows without a key appended");
    let orphan_rows = orphans.iter().map(|&r| &set.rows()[r]);
    stats.appended = append_rows(dest, table, set.columns(), orphan_rows)?;
  }

  Ok(stats)
}

/// Row indexes grouped by key text in first-appearance order, plus the
/// indexes of rows whose key is null.
fn group_by_key(set: &RowSet, key_idx: usize) -> (Vec<(String, Vec<usize>)>, Vec<usize>) {
  let mut groups: Vec<(String, Vec<usize>)> = vec![];
  let mut position: HashMap<String, usize> = HashMap::new();
  let mut orphans = vec![];

  for (r, row) in set.rows().iter().enumerate() {
    let Some(key) = row[key_idx].canonical() else {
      orphans.push(r);
      continue;
    };
    match position.get(&key) {
      Some(&g) => groups[g].1.push(r),
      None => {
        position.insert(key.clone(), groups.len());
        groups.push((key, vec![r]));
      }
    }
  }

  (groups, orphans)
}

/// Append `rows` under a block of fresh ids starting one past the table
/// maximum. Returns the number of rows written.
pub fn append_rows<'a, D: Destination>(
  dest: &D,
  table: &str,
  columns: &[String],
  rows: impl Iterator<Item = &'a Vec<Value>>,
) -> Result<usize> {
  let first = dest.allocate_id(table).map_err(Error::destination)?;
  let mut written = 0;
  for (offset, row) in rows.enumerate() {
    dest
      .insert_row(table, first + offset as i64, columns, row)
      .map_err(Error::destination)?;
    written += 1;
  }
  Ok(written)
}
