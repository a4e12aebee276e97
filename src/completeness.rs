//! Completeness filtering
//!
//! A subject is excluded when any of its state or weight-model variables is
//! missing. The mask is computed once and applied to whole subject records, so
//! labels and both output tables keep the same subjects in the same order.

use crate::error::{CohortError, Result};
use crate::types::{CompleteSubject, SubjectRecord};

/// Filter for removing incomplete subjects
pub struct CompletenessFilter;

impl CompletenessFilter {
    /// Build the exclusion mask over equally long variable columns.
    ///
    /// `mask[i]` is true when any column holds a missing value at index `i`.
    pub fn incomplete_mask(tables: &[Vec<Option<f64>>]) -> Result<Vec<bool>> {
        let Some(first) = tables.first() else {
            return Ok(Vec::new());
        };
        let len = first.len();
        if let Some(bad) = tables.iter().position(|t| t.len() != len) {
            return Err(CohortError::DataError(format!(
                "variable column {bad} has {} entries, expected {len}",
                tables[bad].len()
            )));
        }

        let mut mask = vec![false; len];
        for table in tables {
            for (excluded, value) in mask.iter_mut().zip(table) {
                *excluded |= value.is_none();
            }
        }
        Ok(mask)
    }

    /// Stable filter keeping the items whose mask entry is false
    pub fn apply_mask<T>(items: Vec<T>, mask: &[bool]) -> Result<Vec<T>> {
        if items.len() != mask.len() {
            return Err(CohortError::DataError(format!(
                "mask has {} entries for {} items",
                mask.len(),
                items.len()
            )));
        }
        Ok(items
            .into_iter()
            .zip(mask)
            .filter(|(_, excluded)| !**excluded)
            .map(|(item, _)| item)
            .collect())
    }

    /// Column-major view of all state and weight-model variables
    pub fn columns(records: &[SubjectRecord]) -> Vec<Vec<Option<f64>>> {
        let width = records.first().map_or(0, |r| r.columns().count());
        let mut columns = vec![Vec::with_capacity(records.len()); width];
        for record in records {
            for (column, value) in columns.iter_mut().zip(record.columns()) {
                column.push(value);
            }
        }
        columns
    }

    /// Remove incomplete subjects, returning the survivors and the mask used
    pub fn retain_complete(
        records: Vec<SubjectRecord>,
    ) -> Result<(Vec<CompleteSubject>, Vec<bool>)> {
        let mask = Self::incomplete_mask(&Self::columns(&records))?;
        let complete = Self::apply_mask(records, &mask)?
            .into_iter()
            .map(|record| {
                let id = record.subject_id.clone();
                record.into_complete().ok_or_else(|| {
                    CohortError::DataError(format!(
                        "subject {id} passed the completeness mask with a missing field"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((complete, mask))
    }
}
