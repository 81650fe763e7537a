//! Segment ladders: the relative lengths of the restart segments.
//!
//! The default ladder follows the sexagesimal reciprocal table on tablet
//! AO 6456 (60, 30, 15, 15, 6, 6, 6, 3, ...), padded with unit segments to
//! 59 entries so the boundary table has 60 breakpoints.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Number of segments in the default ladder.
pub const AO_6456_SEGMENTS: usize = 59;

/// The tablet ladder: 16 recorded lengths followed by 43 unit segments.
pub const AO_6456: [usize; AO_6456_SEGMENTS] = [
    60, 30, 15, 15, 6, 6, 6, //
    3, 3, 3, 3, //
    2, 2, 2, 2, 2, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1,
];

/// Ordered, strictly positive segment proportions.
///
/// Proportions are relative durations; [`crate::BoundaryTable::build`] scales
/// them onto an absolute step count. A ladder is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct SegmentLadder {
    proportions: Vec<usize>,
}

impl SegmentLadder {
    /// Build a ladder, rejecting empty ladders, zero-length proportions and
    /// ladders whose sum does not fit in `usize`.
    pub fn new(proportions: Vec<usize>) -> Result<Self> {
        if proportions.is_empty() {
            return Err(ScheduleError::invalid_configuration(
                "segment ladder must contain at least one proportion",
            ));
        }
        if let Some(i) = proportions.iter().position(|&p| p == 0) {
            return Err(ScheduleError::invalid_configuration(format!(
                "segment proportion {i} is zero; proportions must be positive"
            )));
        }
        if proportions
            .iter()
            .try_fold(0usize, |acc, &p| acc.checked_add(p))
            .is_none()
        {
            return Err(ScheduleError::invalid_configuration(
                "segment proportions overflow when summed",
            ));
        }
        Ok(Self { proportions })
    }

    /// The tablet ladder ([`AO_6456`]).
    pub fn ao_6456() -> Self {
        Self {
            proportions: AO_6456.to_vec(),
        }
    }

    pub fn proportions(&self) -> &[usize] {
        &self.proportions
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.proportions.len()
    }

    /// Always false: empty ladders are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.proportions.is_empty()
    }

    /// Sum `S` of all proportions.
    pub fn total(&self) -> usize {
        self.proportions.iter().sum()
    }

    /// Cumulative sums prefixed with zero: `len() + 1` values ending at `total()`.
    pub fn cumulative(&self) -> Vec<usize> {
        let mut cumulative = Vec::with_capacity(self.proportions.len() + 1);
        cumulative.push(0);
        let mut acc = 0usize;
        for &p in &self.proportions {
            acc += p;
            cumulative.push(acc);
        }
        cumulative
    }
}

impl Default for SegmentLadder {
    fn default() -> Self {
        Self::ao_6456()
    }
}

impl TryFrom<Vec<usize>> for SegmentLadder {
    type Error = ScheduleError;

    fn try_from(proportions: Vec<usize>) -> Result<Self> {
        Self::new(proportions)
    }
}

impl From<SegmentLadder> for Vec<usize> {
    fn from(ladder: SegmentLadder) -> Self {
        ladder.proportions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tablet_ladder_shape() {
        let ladder = SegmentLadder::default();
        assert_eq!(ladder.len(), 59);
        assert_eq!(ladder.total(), 203);
        assert_eq!(&ladder.proportions()[..4], &[60, 30, 15, 15]);
        assert!(ladder.proportions().windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn cumulative_starts_at_zero_and_ends_at_total() {
        let ladder = SegmentLadder::new(vec![3, 2, 1]).unwrap();
        assert_eq!(ladder.cumulative(), vec![0, 3, 5, 6]);
    }

    #[test]
    fn rejects_empty_and_zero() {
        assert!(matches!(
            SegmentLadder::new(vec![]),
            Err(ScheduleError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            SegmentLadder::new(vec![4, 0, 1]),
            Err(ScheduleError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn rejects_overflowing_sum() {
        let err = SegmentLadder::new(vec![usize::MAX, 1]).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidConfiguration { .. }));

        let ladder = SegmentLadder::new(vec![usize::MAX]).unwrap();
        assert_eq!(ladder.total(), usize::MAX);
    }

    #[test]
    fn serde_is_a_plain_list() {
        let ladder = SegmentLadder::new(vec![2, 1]).unwrap();
        let json = serde_json::to_string(&ladder).unwrap();
        assert_eq!(json, "[2,1]");

        let bad: std::result::Result<SegmentLadder, _> = serde_json::from_str("[2,0]");
        assert!(bad.is_err());

        let json = format!("[{},1]", usize::MAX);
        let overflow: std::result::Result<SegmentLadder, _> = serde_json::from_str(&json);
        assert!(overflow.is_err());
    }
}
