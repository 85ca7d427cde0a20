//! The procedure catalog: referral volumes and durations for each procedure.
use crate::id::{ProcedureID, SpecialtyID};
use crate::month::Month;
use crate::period::BaselinePeriod;

/// Referral volume and mean duration for one procedure in one specialty
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureRecord {
    /// The specialty which performs the procedure
    pub specialty: SpecialtyID,
    /// The procedure
    pub procedure: ProcedureID,
    /// The month the referrals were observed in, if the catalog is broken down by month
    pub month: Option<Month>,
    /// Number of referrals (decisions to admit)
    pub total_referrals: u32,
    /// Average duration of one case in minutes
    pub average_duration: f64,
}

impl ProcedureRecord {
    /// Whether the duration can be used as a divisor or as a session-fitting draw
    pub fn has_usable_duration(&self) -> bool {
        self.average_duration.is_finite() && self.average_duration > 0.0
    }
}

/// All procedure records, in the order they were read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureCatalog(Vec<ProcedureRecord>);

impl ProcedureCatalog {
    /// Create a catalog from records
    pub fn new(records: Vec<ProcedureRecord>) -> Self {
        Self(records)
    }

    /// Whether the catalog has no records
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over every record
    pub fn iter(&self) -> impl Iterator<Item = &ProcedureRecord> {
        self.0.iter()
    }

    /// Records for one specialty
    pub fn for_specialty<'a>(
        &'a self,
        specialty: &'a SpecialtyID,
    ) -> impl Iterator<Item = &'a ProcedureRecord> {
        self.0.iter().filter(move |record| record.specialty == *specialty)
    }

    /// Whether any record for the specialty is broken down by month
    pub fn is_monthly(&self, specialty: &SpecialtyID) -> bool {
        self.for_specialty(specialty)
            .any(|record| record.month.is_some())
    }

    /// Records for one specialty which fall in `period`.
    ///
    /// Records without a month are always included.
    pub fn in_period<'a>(
        &'a self,
        specialty: &'a SpecialtyID,
        period: &'a BaselinePeriod,
    ) -> impl Iterator<Item = &'a ProcedureRecord> {
        self.for_specialty(specialty)
            .filter(move |record| record.month.is_none_or(|month| period.contains(month)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{month, procedure};

    #[test]
    fn test_in_period() {
        let mut monthly = procedure("Urology", "Cystoscopy", 10, 30.0);
        monthly.month = Some(month(2024, 5));
        let mut outside = procedure("Urology", "Cystoscopy", 20, 30.0);
        outside.month = Some(month(2023, 5));
        let catalog = ProcedureCatalog::new(vec![
            monthly,
            outside,
            procedure("Urology", "TURP", 5, 90.0),
            procedure("ENT", "Tonsillectomy", 8, 45.0),
        ]);

        let specialty = SpecialtyID::new("Urology");
        let period = BaselinePeriod::new(month(2024, 4), month(2024, 9)).unwrap();
        let referrals: Vec<_> = catalog
            .in_period(&specialty, &period)
            .map(|record| record.total_referrals)
            .collect();
        assert_eq!(referrals, [10, 5]);
        assert!(catalog.is_monthly(&specialty));
        assert!(!catalog.is_monthly(&"ENT".into()));
    }

    #[test]
    fn test_has_usable_duration() {
        assert!(procedure("Urology", "TURP", 5, 90.0).has_usable_duration());
        assert!(!procedure("Urology", "TURP", 5, 0.0).has_usable_duration());
        assert!(!procedure("Urology", "TURP", 5, f64::NAN).has_usable_duration());
    }
}
