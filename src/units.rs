//! This module defines various unit types and their conversions.
//!
//! Counts of patients and sessions are kept as `f64` because most of the quantities derived from
//! them (12-month equivalents, per-week rates, proportional removals) are fractional.

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl float_cmp::ApproxEq for $name {
            type Margin = float_cmp::F64Margin;

            fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
                float_cmp::ApproxEq::approx_eq(self.0, other.0, margin)
            }
        }
    };
}

macro_rules! impl_dimensionless_ops {
    ($name:ident) => {
        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::ops::Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

unit_struct!(Dimensionless);

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl From<Dimensionless> for f64 {
    fn from(val: Dimensionless) -> Self {
        val.0
    }
}

// Base quantities
unit_struct!(Patients);
unit_struct!(Minutes);
unit_struct!(Sessions);
unit_struct!(Weeks);

// Derived quantities
unit_struct!(MinutesPerSession);
unit_struct!(PatientsPerSession);
unit_struct!(MinutesPerPatient);
unit_struct!(SessionsPerWeek);

impl_dimensionless_ops!(Patients);
impl_dimensionless_ops!(Minutes);
impl_dimensionless_ops!(Sessions);
impl_dimensionless_ops!(Weeks);
impl_dimensionless_ops!(MinutesPerSession);
impl_dimensionless_ops!(PatientsPerSession);
impl_dimensionless_ops!(MinutesPerPatient);
impl_dimensionless_ops!(SessionsPerWeek);

// Division rules
impl_div!(Minutes, Sessions, MinutesPerSession);
impl_div!(Patients, Sessions, PatientsPerSession);
impl_div!(Minutes, Patients, MinutesPerPatient);
impl_div!(Sessions, Weeks, SessionsPerWeek);
impl_div!(Minutes, MinutesPerSession, Sessions);

// Multiplication rules
impl_mul!(MinutesPerSession, Sessions, Minutes);
impl_mul!(PatientsPerSession, Sessions, Patients);
impl_mul!(MinutesPerPatient, Patients, Minutes);
impl_mul!(SessionsPerWeek, Weeks, Sessions);

/// Minutes in an hour
pub const MINUTES_PER_HOUR: f64 = 60.0;

impl MinutesPerSession {
    /// Session length given in hours
    pub fn from_hours(hours: f64) -> Self {
        Self(hours * MINUTES_PER_HOUR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_unit_arithmetic() {
        let per_session = MinutesPerSession::from_hours(4.0);
        let sessions = Sessions(10.0);
        let minutes: Minutes = per_session * sessions;
        assert_approx_eq!(Minutes, minutes, Minutes(2400.0));
        assert_approx_eq!(Sessions, minutes / per_session, sessions);
        assert_approx_eq!(
            MinutesPerSession,
            per_session * Dimensionless(0.8),
            MinutesPerSession(192.0)
        );
        assert_approx_eq!(Dimensionless, Patients(30.0) / Patients(60.0), Dimensionless(0.5));
    }

    #[test]
    fn test_sum() {
        let total: Patients = [Patients(1.0), Patients(2.5)].into_iter().sum();
        assert_eq!(total, Patients(3.5));
    }
}
