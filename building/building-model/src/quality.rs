//! Alignment quality scoring.

use std::fmt;

use tracing::{info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{AlignmentResult, ModelError, ModelResult};

/// Configuration for quality assessment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QualityParams {
    /// Pairs with confidence strictly below this are reported as issues.
    pub low_confidence_threshold: f64,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.7,
        }
    }
}

impl QualityParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the low-confidence threshold.
    #[must_use]
    pub const fn with_low_confidence_threshold(mut self, threshold: f64) -> Self {
        self.low_confidence_threshold = threshold;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if the threshold is outside [0, 1].
    pub fn validate(&self) -> ModelResult<()> {
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            return Err(ModelError::InvalidConfig(format!(
                "low_confidence_threshold must be in [0, 1], got {}",
                self.low_confidence_threshold
            )));
        }
        Ok(())
    }
}

/// A room pair whose alignment is not trustworthy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QualityIssue {
    /// Room that was moved.
    pub source_room: usize,
    /// Room it was aligned to.
    pub target_room: usize,
    /// Confidence of the pair.
    pub confidence: f64,
    /// The rooms did not overlap at all.
    pub no_correspondences: bool,
    /// The pair is the last-to-first loop closure, left out of the pose graph.
    pub loop_closure: bool,
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.loop_closure {
            write!(
                f,
                "Loop closure between rooms {} and {} rejected ({:.2})",
                self.target_room, self.source_room, self.confidence
            )
        } else if self.no_correspondences {
            write!(
                f,
                "Rooms {} and {} do not overlap; alignment failed",
                self.target_room, self.source_room
            )
        } else {
            write!(
                f,
                "Low confidence alignment between rooms {} and {} ({:.2})",
                self.target_room, self.source_room, self.confidence
            )
        }
    }
}

/// Aggregate quality of a set of pairwise alignments.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlignmentQuality {
    /// Mean pair confidence in [0, 1]; 0.0 when there are no pairs.
    pub overall_score: f64,
    /// Confidence of each pair, in alignment order.
    pub pair_scores: Vec<f64>,
    /// Pairs below the threshold.
    pub issues: Vec<QualityIssue>,
}

impl AlignmentQuality {
    /// Whether no issue was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues rendered as messages.
    #[must_use]
    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    /// Rooms appearing in any issue, ascending and deduplicated.
    #[must_use]
    pub fn flagged_rooms(&self) -> Vec<usize> {
        let mut rooms: Vec<usize> = self
            .issues
            .iter()
            .flat_map(|issue| [issue.target_room, issue.source_room])
            .collect();
        rooms.sort_unstable();
        rooms.dedup();
        rooms
    }

    /// Adds an issue for a loop closure the frame builder rejected.
    ///
    /// The score and pair scores still cover the chain only.
    #[must_use]
    pub fn with_rejected_loop_closure(mut self, closure: &AlignmentResult) -> Self {
        let issue = QualityIssue {
            source_room: closure.source_room,
            target_room: closure.target_room,
            confidence: closure.confidence,
            no_correspondences: !closure.has_overlap(),
            loop_closure: true,
        };
        warn!(
            source_room = issue.source_room,
            target_room = issue.target_room,
            confidence = issue.confidence,
            "{issue}"
        );
        self.issues.push(issue);
        self
    }
}

impl fmt::Display for AlignmentQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "score {:.3} over {} pairs, {} issues",
            self.overall_score,
            self.pair_scores.len(),
            self.issues.len()
        )
    }
}

/// Scores `alignments` and flags every pair below the threshold.
///
/// # Example
///
/// ```
/// use building_model::{assess_alignment, AlignmentResult, QualityParams};
///
/// let failed = [AlignmentResult::degenerate(1, 0)];
/// let quality = assess_alignment(&failed, &QualityParams::default());
/// assert_eq!(quality.overall_score, 0.0);
/// assert_eq!(quality.issues.len(), 1);
/// assert!(quality.issues[0].no_correspondences);
/// ```
#[must_use]
pub fn assess_alignment(
    alignments: &[AlignmentResult],
    params: &QualityParams,
) -> AlignmentQuality {
    let pair_scores: Vec<f64> = alignments.iter().map(|a| a.confidence).collect();

    if pair_scores.is_empty() {
        return AlignmentQuality::default();
    }

    #[allow(clippy::cast_precision_loss)]
    let overall_score = pair_scores.iter().sum::<f64>() / pair_scores.len() as f64;

    let issues: Vec<QualityIssue> = alignments
        .iter()
        .filter(|a| a.confidence < params.low_confidence_threshold)
        .map(|a| QualityIssue {
            source_room: a.source_room,
            target_room: a.target_room,
            confidence: a.confidence,
            no_correspondences: !a.has_overlap(),
            loop_closure: false,
        })
        .collect();

    for issue in &issues {
        warn!(
            source_room = issue.source_room,
            target_room = issue.target_room,
            confidence = issue.confidence,
            "{issue}"
        );
    }
    info!(
        pairs = pair_scores.len(),
        overall_score,
        issues = issues.len(),
        "assessed alignment quality"
    );

    AlignmentQuality {
        overall_score,
        pair_scores,
        issues,
    }
}
