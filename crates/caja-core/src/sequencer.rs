//! # Invoice Sequencer
//!
//! Finds the next free fiscal invoice number inside a CAI range.
//!
//! The sequencer owns no storage. It proposes numbers and the caller
//! answers whether each one is taken, which keeps the search testable
//! and lets the storage layer decide what "taken" means (issued invoice,
//! pending payment, reservation row).
//!
//! ## Allocation Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  candidate_start = max(range.start - 1, issued...) + 1                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌─► probe() ──► candidate > range.end ? ──yes──► LimitReached          │
//! │  │      │                                                               │
//! │  │      ├──► attempts ≥ max ? ──yes──► RetryExceeded                    │
//! │  │      │                                                               │
//! │  │      ▼                                                               │
//! │  │   Check(n) ──► caller: taken? ──no──► n is allocated                 │
//! │  │                      │                                               │
//! │  │                     yes                                              │
//! │  └──── reject() ◄───────┘   (n + 1)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use caja_core::sequencer::{allocate_with, candidate_start, InvoiceSequencer};
//! use caja_core::types::{InvoiceNumber, InvoiceRange};
//!
//! let range = InvoiceRange::new(1, 100).unwrap();
//! let issued = [InvoiceNumber::new(1), InvoiceNumber::new(2)];
//! let start = candidate_start(range, issued);
//! assert_eq!(start.value(), 3);
//!
//! // 3 is in flight on another terminal
//! let mut sequencer = InvoiceSequencer::new(range, start, 1000);
//! let number = allocate_with(&mut sequencer, |n| n.value() == 3).unwrap();
//! assert_eq!(number.value(), 4);
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{InvoiceNumber, InvoiceRange};

/// Attempt cap for one allocation; large enough to skip any realistic run
/// of in-flight numbers, small enough to stop on an inconsistent store.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// First number worth probing: one past the highest issued number, or the
/// start of the range when nothing has been issued.
pub fn candidate_start(range: InvoiceRange, issued: impl IntoIterator<Item = InvoiceNumber>) -> InvoiceNumber {
    let last = issued
        .into_iter()
        .map(|n| n.value())
        .fold(range.start() - 1, i64::max);
    InvoiceNumber::new(last + 1)
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerStep {
    /// Ask storage whether this number is free.
    Check(InvoiceNumber),
    /// Candidate went past the end of the range. Terminal until renewal.
    LimitReached,
    /// Too many numbers were reported taken.
    RetryExceeded { attempts: u32 },
}

/// Walks candidates upward from a starting number.
#[derive(Debug, Clone)]
pub struct InvoiceSequencer {
    range: InvoiceRange,
    candidate: InvoiceNumber,
    attempts: u32,
    max_attempts: u32,
}

impl InvoiceSequencer {
    pub fn new(range: InvoiceRange, candidate_start: InvoiceNumber, max_attempts: u32) -> Self {
        InvoiceSequencer {
            range,
            candidate: candidate_start,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn range(&self) -> InvoiceRange {
        self.range
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Proposes the current candidate, counting it as an attempt.
    ///
    /// The range check comes first: a candidate past the end is reported
    /// as `LimitReached` without ever becoming a `Check`.
    pub fn probe(&mut self) -> SequencerStep {
        if self.candidate.value() > self.range.end() {
            return SequencerStep::LimitReached;
        }
        if self.attempts >= self.max_attempts {
            return SequencerStep::RetryExceeded {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        SequencerStep::Check(self.candidate)
    }

    /// The last checked number is taken; move to the next one.
    pub fn reject(&mut self) {
        self.candidate = self.candidate.next();
    }
}

/// Runs the loop against a synchronous `is_taken` check.
///
/// Storage-backed callers drive [`InvoiceSequencer`] directly so they can
/// await between probes.
pub fn allocate_with<F>(sequencer: &mut InvoiceSequencer, mut is_taken: F) -> CoreResult<InvoiceNumber>
where
    F: FnMut(InvoiceNumber) -> bool,
{
    loop {
        match sequencer.probe() {
            SequencerStep::Check(number) => {
                if !is_taken(number) {
                    return Ok(number);
                }
                sequencer.reject();
            }
            SequencerStep::LimitReached => {
                return Err(CoreError::AllocationExhausted {
                    range_end: sequencer.range().end(),
                })
            }
            SequencerStep::RetryExceeded { attempts } => {
                return Err(CoreError::AllocationRetryExceeded { attempts })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn range(start: i64, end: i64) -> InvoiceRange {
        InvoiceRange::new(start, end).unwrap()
    }

    #[test]
    fn test_candidate_start_defaults_to_range_start() {
        assert_eq!(candidate_start(range(1001, 1500), []).value(), 1001);
    }

    #[test]
    fn test_candidate_start_ignores_numbers_below_range() {
        let issued = [InvoiceNumber::new(3), InvoiceNumber::new(40)];
        assert_eq!(candidate_start(range(1001, 1500), issued).value(), 1001);

        let issued = [InvoiceNumber::new(1001), InvoiceNumber::new(1007), InvoiceNumber::new(1003)];
        assert_eq!(candidate_start(range(1001, 1500), issued).value(), 1008);
    }

    #[test]
    fn test_past_end_reports_limit_without_checking() {
        let mut sequencer = InvoiceSequencer::new(range(1, 10), InvoiceNumber::new(11), 1000);
        let mut checks = 0;
        let result = allocate_with(&mut sequencer, |_| {
            checks += 1;
            false
        });
        assert!(matches!(result, Err(CoreError::AllocationExhausted { range_end: 10 })));
        assert_eq!(checks, 0);
        assert_eq!(sequencer.attempts(), 0);
    }

    #[test]
    fn test_skips_taken_numbers() {
        let taken: HashSet<i64> = [5, 6, 7].into_iter().collect();
        let mut sequencer = InvoiceSequencer::new(range(1, 10), InvoiceNumber::new(5), 1000);
        let number = allocate_with(&mut sequencer, |n| taken.contains(&n.value())).unwrap();
        assert_eq!(number.value(), 8);
        assert_eq!(sequencer.attempts(), 4);
    }

    #[test]
    fn test_all_taken_to_end_is_exhausted() {
        let mut sequencer = InvoiceSequencer::new(range(1, 10), InvoiceNumber::new(8), 1000);
        let result = allocate_with(&mut sequencer, |_| true);
        assert!(matches!(result, Err(CoreError::AllocationExhausted { .. })));
    }

    #[test]
    fn test_attempt_cap() {
        let mut sequencer = InvoiceSequencer::new(range(1, 10_000), InvoiceNumber::new(1), 25);
        let result = allocate_with(&mut sequencer, |_| true);
        assert!(matches!(
            result,
            Err(CoreError::AllocationRetryExceeded { attempts: 25 })
        ));
    }

    #[test]
    fn test_repeated_allocation_never_repeats_until_exhausted() {
        let r = range(1, 50);
        let mut issued: Vec<InvoiceNumber> = Vec::new();

        loop {
            let start = candidate_start(r, issued.iter().copied());
            let mut sequencer = InvoiceSequencer::new(r, start, DEFAULT_MAX_ATTEMPTS);
            match allocate_with(&mut sequencer, |n| issued.contains(&n)) {
                Ok(number) => {
                    assert!(!issued.contains(&number));
                    assert!(r.contains(number));
                    issued.push(number);
                }
                Err(CoreError::AllocationExhausted { .. }) => break,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(issued.len(), 50);
        let unique: HashSet<_> = issued.iter().collect();
        assert_eq!(unique.len(), 50);
    }
}
