//! Element type bound shared by fixtures, engines and reports

use scirs2_core::numeric::{Num, NumCast};
use std::fmt::Debug;
use std::ops::AddAssign;

/// Value type a tensor can hold
///
/// Integer types give bit-identical results regardless of summation order,
/// which is what the schedule-invariance tests rely on.
pub trait Scalar:
    Copy + Send + Sync + Debug + PartialEq + Num + NumCast + AddAssign + 'static
{
    /// Convert from an `i64` literal, falling back to one if unrepresentable
    fn from_i64(value: i64) -> Self {
        <Self as NumCast>::from(value).unwrap_or_else(Self::one)
    }
}

impl<T> Scalar for T where
    T: Copy + Send + Sync + Debug + PartialEq + Num + NumCast + AddAssign + 'static
{
}
