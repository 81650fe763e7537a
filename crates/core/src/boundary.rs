//! Boundary table: the ladder scaled onto an absolute step count.
//!
//! `ends[i] = round(C[i] * total_steps / S)` where `C` are the cumulative
//! ladder proportions and `S` their sum. Rounding is half away from zero and is
//! carried out in integer arithmetic, so the table is exact for every
//! `total_steps` and the last entry always equals `total_steps`.

use crate::error::{Result, ScheduleError};
use crate::ladder::SegmentLadder;

/// One restart segment: the steps in `(start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// 1-based segment index `k` (the segment ending at `ends[k]`).
    pub index: usize,
    /// `ends[k - 1]`, exclusive.
    pub start: usize,
    /// `ends[k]`, inclusive.
    pub end: usize,
}

impl Segment {
    /// Number of steps in the segment.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Zero-length segment (rounding collapsed it).
    pub fn is_degenerate(&self) -> bool {
        self.end == self.start
    }

    /// Alias of [`Segment::is_degenerate`].
    pub fn is_empty(&self) -> bool {
        self.is_degenerate()
    }

    /// Position of step `t` inside the segment: `(t - start) / (end - start)`.
    ///
    /// Returns `None` for degenerate segments.
    pub fn local_position(&self, t: usize) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        Some(t.saturating_sub(self.start) as f64 / self.len() as f64)
    }

    /// Whether `t` belongs to this segment.
    pub fn contains(&self, t: usize) -> bool {
        t > self.start && t <= self.end
    }
}

/// Non-decreasing segment boundaries, `ends[0] = 0`, `ends[N] = total_steps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryTable {
    ends: Vec<usize>,
}

impl BoundaryTable {
    /// Scale `ladder` onto `total_steps`.
    pub fn build(total_steps: usize, ladder: &SegmentLadder) -> Result<Self> {
        if total_steps == 0 {
            return Err(ScheduleError::invalid_configuration(
                "total_steps must be positive",
            ));
        }

        let sum = ladder.total() as u128;
        let total = total_steps as u128;
        let mut ends: Vec<usize> = ladder
            .cumulative()
            .into_iter()
            .map(|c| {
                // c * total < 2^128 for any usize operands; 2 * rem < 2 * sum.
                let scaled = c as u128 * total;
                let (quot, rem) = (scaled / sum, scaled % sum);
                (quot + u128::from(2 * rem >= sum)) as usize
            })
            .collect();
        if let Some(last) = ends.last_mut() {
            *last = total_steps;
        }

        let table = Self { ends };
        tracing::debug!(
            total_steps,
            segments = table.num_segments(),
            degenerate = table.degenerate_count(),
            "Built sexagesimal boundary table"
        );
        Ok(table)
    }

    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    /// Last boundary.
    pub fn total_steps(&self) -> usize {
        self.ends[self.ends.len() - 1]
    }

    pub fn num_segments(&self) -> usize {
        self.ends.len() - 1
    }

    /// Segment `k` for `k` in `1..=num_segments()`.
    pub fn segment(&self, k: usize) -> Option<Segment> {
        if k == 0 || k >= self.ends.len() {
            return None;
        }
        Some(Segment {
            index: k,
            start: self.ends[k - 1],
            end: self.ends[k],
        })
    }

    /// All segments in order, degenerate ones included.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.ends.windows(2).enumerate().map(|(i, w)| Segment {
            index: i + 1,
            start: w[0],
            end: w[1],
        })
    }

    /// Segment that owns step `t`: the smallest `k >= 1` with `t <= ends[k]`.
    ///
    /// A step equal to a boundary belongs to the segment ending there. Step 0
    /// resolves to the first segment. Returns `None` past the last boundary.
    pub fn locate(&self, t: usize) -> Option<Segment> {
        let k = self.ends.partition_point(|&end| end < t).max(1);
        self.segment(k)
    }

    /// Number of zero-length segments.
    pub fn degenerate_count(&self) -> usize {
        self.segments().filter(Segment::is_degenerate).count()
    }
}

/// Build the boundary table for `total_steps` from `ladder`.
pub fn build_boundaries(total_steps: usize, ladder: &SegmentLadder) -> Result<BoundaryTable> {
    BoundaryTable::build(total_steps, ladder)
}
