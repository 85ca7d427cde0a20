//! The waiting-list time series: one record per specialty per month.
use crate::error::PlanningError;
use crate::id::SpecialtyID;
use crate::month::Month;
use crate::period::BaselinePeriod;
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeMap;

/// Observed waiting-list activity for one specialty in one month
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRecord {
    /// The specialty the record refers to
    pub specialty: SpecialtyID,
    /// The calendar month
    pub month: Month,
    /// Patients added to the waiting list during the month
    pub additions: u32,
    /// Patients removed from the waiting list during the month
    pub removals: u32,
    /// Size of the waiting list at month end.
    ///
    /// This is measured independently and is not assumed to equal a running sum of additions and
    /// removals.
    pub total_size: u32,
    /// Clinical sessions which went ahead
    pub sessions: u32,
    /// Clinical sessions which were cancelled
    pub cancelled_sessions: u32,
    /// Session minutes used for clinical activity
    pub minutes_utilised: f64,
    /// Cases completed
    pub cases: u32,
    /// Patients waiting 18 weeks or more at month end
    pub backlog_18: u32,
    /// Patients waiting 40 weeks or more at month end
    pub backlog_40: u32,
    /// Patients waiting 52 weeks or more at month end
    pub backlog_52: u32,
}

/// Monthly records, grouped by specialty and ordered by month within each specialty.
///
/// Gaps in the months are tolerated: a missing month is simply absent, never treated as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaitingListSeries(IndexMap<SpecialtyID, BTreeMap<Month, MonthlyRecord>>);

impl WaitingListSeries {
    /// Build a series from records, checking there is at most one record per specialty per month
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = MonthlyRecord>,
    {
        let mut map: IndexMap<SpecialtyID, BTreeMap<Month, MonthlyRecord>> = IndexMap::new();
        for record in records {
            let by_month = map.entry(record.specialty.clone()).or_default();
            ensure!(
                !by_month.contains_key(&record.month),
                "Duplicate record for specialty {} in month {}",
                record.specialty,
                record.month
            );
            by_month.insert(record.month, record);
        }

        Ok(Self(map))
    }

    /// Whether there are no records at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The total number of records
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// The specialties present, in the order they were first seen
    pub fn specialties(&self) -> impl Iterator<Item = &SpecialtyID> {
        self.0.keys()
    }

    /// The set of specialty IDs present
    pub fn specialty_ids(&self) -> IndexSet<SpecialtyID> {
        self.0.keys().cloned().collect()
    }

    /// All records for a specialty, in month order (empty if the specialty is unknown)
    pub fn records<'a>(
        &'a self,
        specialty: &SpecialtyID,
    ) -> impl DoubleEndedIterator<Item = &'a MonthlyRecord> + use<'a> {
        self.0.get(specialty).into_iter().flat_map(BTreeMap::values)
    }

    /// Records for a specialty which fall within `period`, in month order
    pub fn records_in<'a>(
        &'a self,
        specialty: &SpecialtyID,
        period: &BaselinePeriod,
    ) -> impl DoubleEndedIterator<Item = &'a MonthlyRecord> + use<'a> {
        let range = period.start()..=period.end();
        self.0
            .get(specialty)
            .into_iter()
            .flat_map(move |by_month| by_month.range(range.clone()).map(|(_, record)| record))
    }

    /// The record for a specialty in a given month, if there is one
    pub fn get(&self, specialty: &SpecialtyID, month: Month) -> Option<&MonthlyRecord> {
        self.0.get(specialty)?.get(&month)
    }

    /// The most recent record for a specialty at or before `month`
    pub fn latest_at_or_before(
        &self,
        specialty: &SpecialtyID,
        month: Month,
    ) -> Option<&MonthlyRecord> {
        self.0
            .get(specialty)?
            .range(..=month)
            .next_back()
            .map(|(_, record)| record)
    }

    /// The last month with data for a specialty
    pub fn latest_month(&self, specialty: &SpecialtyID) -> Option<Month> {
        self.0.get(specialty)?.keys().next_back().copied()
    }

    /// Waiting-list size to start a projection from: the last observed size at or before `month`
    pub fn starting_total(
        &self,
        specialty: &SpecialtyID,
        month: Month,
    ) -> Result<f64, PlanningError> {
        self.latest_at_or_before(specialty, month)
            .map(|record| record.total_size as f64)
            .ok_or_else(|| PlanningError::NoDataBefore {
                specialty: specialty.to_string(),
                month,
            })
    }
}
