//! Persistent cache of solved quantiles.
//!
//! Inverting an asymptotic distribution function is expensive (the Ln series
//! alone is quadratic in the number of terms), so every solved quantile is
//! memoised in a [`QuantileTable`] owned by the test variant that produced it.
//!
//! Entries are keyed by alpha and kept sorted for binary search. An entry
//! records the precision it was solved with; a lookup only hits when the
//! stored entry is at least as precise as requested:
//!
//! ```text
//! A dominates B  ⇔  A.alpha = B.alpha ∧ A.epsilon ≤ B.epsilon ∧ A.max_iter ≥ B.max_iter
//! ```
//!
//! # File format
//!
//! One `<test name>.csv` per test, `;`-separated, with the header
//! `alpha;value;epsilon;max_iter`. Decimal commas are accepted on load.
//! Missing or corrupt files are logged and treated as an empty table: the
//! cache is an optimisation, never a source of truth.
//!
//! # Examples
//!
//! ```
//! use u_uniformity::quantile_table::{QuantileTable, QuantileTableEntry};
//!
//! let mut table = QuantileTable::new("demo");
//! table.append(QuantileTableEntry::new(0.9, 1.2238, 1e-4, 100));
//! assert_eq!(table.get(0.9, 1e-3, 50).map(|e| e.value), Some(1.2238));
//! // Stored entry is less precise than requested.
//! assert!(table.get(0.9, 1e-6, 50).is_none());
//! ```

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::error::{invalid, Result};

/// Header row of a quantile cache file.
pub const CSV_HEADER: [&str; 4] = ["alpha", "value", "epsilon", "max_iter"];

const SEPARATOR: u8 = b';';

/// Rounds alpha to 10 decimal places so that e.g. `1.0 - 0.1` and `0.9`
/// address the same entry.
pub fn normalize_alpha(alpha: f64) -> f64 {
    (alpha * 1e10).round() / 1e10
}

/// "The alpha-quantile, solved to precision `epsilon` with `max_iter`
/// series terms, equals `value`."
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileTableEntry {
    /// Probability level, normalised to 10 decimal places.
    pub alpha: f64,
    /// The quantile.
    pub value: f64,
    /// Solver tolerance on |F(value) − alpha|.
    pub epsilon: f64,
    /// Number of series terms used by the distribution function.
    pub max_iter: usize,
}

impl QuantileTableEntry {
    /// Creates an entry, normalising `alpha`.
    pub fn new(alpha: f64, value: f64, epsilon: f64, max_iter: usize) -> Self {
        Self {
            alpha: normalize_alpha(alpha),
            value,
            epsilon,
            max_iter,
        }
    }

    /// True if `self` is at the same alpha and at least as precise and at
    /// least as convergent as `other`.
    pub fn dominates(&self, other: &Self) -> bool {
        self.alpha == other.alpha && self.satisfies(other.epsilon, other.max_iter)
    }

    /// True if the entry meets a request for `(epsilon, max_iter)`.
    pub fn satisfies(&self, epsilon: f64, max_iter: usize) -> bool {
        self.epsilon <= epsilon && self.max_iter >= max_iter
    }
}

/// Sorted, alpha-keyed cache of quantiles with optional file backing.
///
/// # Invariants
///
/// - Entries are sorted by alpha.
/// - At most one entry per alpha, always the best known one.
#[derive(Debug, Clone, Default)]
pub struct QuantileTable {
    name: String,
    path: Option<PathBuf>,
    entries: Vec<QuantileTableEntry>,
}

impl QuantileTable {
    /// Creates an empty in-memory table for the test called `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            path: None,
            entries: Vec::new(),
        }
    }

    /// Opens the table for `name` stored under `dir`.
    ///
    /// A missing or unreadable file yields an empty table and a warning.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Self {
        let mut table = Self::new(name);
        table.path = Some(dir.as_ref().join(file_name(name)));
        if let Err(e) = table.try_load() {
            tracing::warn!(table = %table.name, error = %e, "quantile table not loaded, starting empty");
            table.entries.clear();
        }
        table
    }

    /// Name of the owning test.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All entries, sorted by alpha.
    pub fn entries(&self) -> &[QuantileTableEntry] {
        &self.entries
    }

    /// Number of cached quantiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, alpha: f64) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|e| e.alpha.partial_cmp(&alpha).unwrap_or(Ordering::Less))
    }

    /// Looks up the entry at `alpha` if it satisfies the requested precision.
    pub fn get(&self, alpha: f64, epsilon: f64, max_iter: usize) -> Option<&QuantileTableEntry> {
        let idx = self.position(normalize_alpha(alpha)).ok()?;
        let entry = &self.entries[idx];
        entry.satisfies(epsilon, max_iter).then_some(entry)
    }

    /// Inserts `entry`, or replaces the existing entry at its alpha if `entry`
    /// dominates it. Returns true if the table changed.
    pub fn append(&mut self, entry: QuantileTableEntry) -> bool {
        let entry = QuantileTableEntry::new(entry.alpha, entry.value, entry.epsilon, entry.max_iter);
        match self.position(entry.alpha) {
            Ok(idx) => {
                if entry.dominates(&self.entries[idx]) && entry != self.entries[idx] {
                    self.entries[idx] = entry;
                    true
                } else {
                    false
                }
            }
            Err(idx) => {
                self.entries.insert(idx, entry);
                true
            }
        }
    }

    /// Replaces the in-memory entries with the backing file's content.
    ///
    /// Does nothing for an in-memory table.
    ///
    /// # Errors
    ///
    /// I/O or parse failure; the table is left unchanged in that case.
    pub fn try_load(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(SEPARATOR)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut loaded = QuantileTable::new(&self.name);
        for record in reader.records() {
            let record = record?;
            let entry = QuantileTableEntry::new(
                parse_decimal(field(&record, 0)?)?,
                parse_decimal(field(&record, 1)?)?,
                parse_decimal(field(&record, 2)?)?,
                field(&record, 3)?
                    .parse::<usize>()
                    .map_err(|e| invalid(format!("max_iter: {e}")))?,
            );
            loaded.append(entry);
        }
        self.entries = loaded.entries;
        tracing::debug!(table = %self.name, entries = self.entries.len(), "quantile table loaded");
        Ok(())
    }

    /// Writes the table to its backing file.
    ///
    /// Does nothing for an in-memory table.
    pub fn try_save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(SEPARATOR)
            .from_path(path)?;
        writer.write_record(CSV_HEADER)?;
        for e in &self.entries {
            writer.write_record([
                e.alpha.to_string(),
                e.value.to_string(),
                e.epsilon.to_string(),
                e.max_iter.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the table, logging instead of failing.
    pub fn save(&self) {
        if let Err(e) = self.try_save() {
            tracing::warn!(table = %self.name, error = %e, "quantile table not saved");
        }
    }

    /// Renders quantiles for alpha = 0.01, ..., 0.99 as a three-column LaTeX
    /// tabular.
    ///
    /// Returns `None` if any of those alphas is missing.
    pub fn latex_tabular(&self) -> Option<String> {
        let mut out = String::from(
            "\\begin{tabular}{l|l||l|l||l|l}\n\
             $\\alpha$ & $\\alpha$-quantile & $\\alpha$ & $\\alpha$-quantile & $\\alpha$ & $\\alpha$-quantile \\\\\n\
             \\hline\n",
        );
        for i in 1..34 {
            let row: Option<Vec<String>> = [i, i + 33, i + 66]
                .iter()
                .map(|&k| {
                    let alpha = normalize_alpha(k as f64 * 0.01);
                    let idx = self.position(alpha).ok()?;
                    Some(format!("{alpha} & {:.10}", self.entries[idx].value))
                })
                .collect();
            out.push_str(&row?.join(" & "));
            out.push_str("\\\\\n");
        }
        out.push_str("\\end{tabular}");
        Some(out)
    }
}

/// File name of the table for the test called `name`.
pub fn file_name(name: &str) -> String {
    format!("{}.csv", name.trim())
}

fn field(record: &csv::StringRecord, i: usize) -> Result<&str> {
    record
        .get(i)
        .ok_or_else(|| invalid(format!("quantile table row has {} fields", record.len())))
}

fn parse_decimal(s: &str) -> Result<f64> {
    s.replace(',', ".")
        .parse::<f64>()
        .map_err(|e| invalid(format!("'{s}' is not a number: {e}")))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn unique_sorted_and_best(
            ops in proptest::collection::vec((1u32..20, 1u32..5, 1usize..5), 1..60)
        ) {
            let mut t = QuantileTable::new("p");
            for &(a, e, m) in &ops {
                t.append(QuantileTableEntry::new(a as f64 / 20.0, 0.0, 10f64.powi(-(e as i32)), m * 50));
            }
            for w in t.entries().windows(2) {
                prop_assert!(w[0].alpha < w[1].alpha);
            }
            // No appended entry strictly dominates the one kept.
            for &(a, e, m) in &ops {
                let cand = QuantileTableEntry::new(a as f64 / 20.0, 0.0, 10f64.powi(-(e as i32)), m * 50);
                let kept = t.entries().iter().find(|k| k.alpha == cand.alpha).unwrap();
                prop_assert!(!(cand.dominates(kept) && !kept.dominates(&cand)));
            }
        }
    }
}
