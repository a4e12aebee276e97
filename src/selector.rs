//! Cohort selection
//!
//! Read-only slices of the output tables, by ethnic group or by random
//! subsample. Rows keep their cohort order in every slice.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{CohortError, Result};
use crate::types::{CohortSlice, CohortTables, Ethnicity};

/// Selector over the rows of one pipeline run
#[derive(Debug, Clone, Copy)]
pub struct CohortSelector<'a> {
    tables: &'a CohortTables,
}

impl CohortTables {
    pub fn selector(&self) -> CohortSelector<'_> {
        CohortSelector { tables: self }
    }
}

impl<'a> CohortSelector<'a> {
    pub fn new(tables: &'a CohortTables) -> Self {
        Self { tables }
    }

    /// Rows of one ethnic group, selected by its label (NL, HIND or MAROK)
    pub fn by_ethnicity(&self, label: &str) -> Result<CohortSlice> {
        let group: Ethnicity = label.parse()?;
        Ok(self.by_group(group))
    }

    /// Rows whose ethnicity equals `group`
    pub fn by_group(&self, group: Ethnicity) -> CohortSlice {
        let slice = CohortSlice::from_rows(
            self.tables
                .rows()
                .iter()
                .filter(|row| row.ethnicity == group),
        );
        debug!("Selected {} subjects for group {group}", slice.len());
        slice
    }

    /// `n` rows drawn uniformly without replacement, reproducible from `seed`
    pub fn random(&self, n: usize, seed: u64) -> Result<CohortSlice> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.random_with_rng(n, &mut rng)
    }

    /// `n` rows drawn uniformly without replacement from the given generator
    pub fn random_with_rng<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<CohortSlice> {
        let rows = self.tables.rows();
        if n > rows.len() {
            return Err(CohortError::RangeError {
                requested: n,
                available: rows.len(),
            });
        }

        let mut picked = index::sample(rng, rows.len(), n).into_vec();
        picked.sort_unstable();
        Ok(CohortSlice::from_rows(picked.into_iter().map(|i| &rows[i])))
    }
}
