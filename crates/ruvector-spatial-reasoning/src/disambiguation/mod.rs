//! Disambiguation: deciding which of several same-typed objects is meant.
//!
//! - [`HeuristicAmbiguityDetector`] applies rule chains over spatial
//!   patterns, visibility and distance.
//! - [`EnhancedAmbiguityResolver`] maps numbered model replies such as
//!   `"vase2"` onto candidates, falling back to spatial sorting.
//! - [`ClarificationDialog`] asks a user to choose when neither is
//!   confident, through the [`UserChannel`] and [`ModelService`] seams.

pub mod detector;
pub mod interaction;
pub mod vlm_parser;

pub use detector::{HeuristicAmbiguityDetector, PatternFamily, SpatialPatterns};
pub use interaction::{
    CandidateAnalysis, ChoiceSource, ClarificationDialog, DialogOutcome,
};
pub use vlm_parser::{
    EnhancedAmbiguityResolver, ResolutionMethod, ResolvedReference, SmartObjectSorting,
    SortStrategy, VlmResponseParser,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::bridge::{AmbiguityConfig, CandidateObject};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Why a disambiguation call ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityReason {
    NoCandidates,
    SingleCandidate,
    ResolvedBySpatialConstraints,
    LowSpatialConfidence,
    UnresolvedSpatialConstraints,
    CalculatorUnavailable,
    NoSpatialConstraints,
    OnlyOneVisible,
    SpatialHeuristic,
    SelectedClosest,
    DefaultSelection,
}

impl AmbiguityReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoCandidates => "No candidate objects",
            Self::SingleCandidate => "Single candidate object",
            Self::ResolvedBySpatialConstraints => "Resolved using spatial constraints",
            Self::LowSpatialConfidence => "Low confidence in spatial resolution",
            Self::UnresolvedSpatialConstraints => "Cannot resolve spatial constraints",
            Self::CalculatorUnavailable => {
                "Spatial constraints detected but no spatial calculator available"
            }
            Self::NoSpatialConstraints => "Multiple objects of same type, no spatial constraints",
            Self::OnlyOneVisible => "Only one visible object",
            Self::SpatialHeuristic => "Spatial heuristic selection",
            Self::SelectedClosest => "Multiple candidates, selected closest",
            Self::DefaultSelection => "Multiple candidates, using default selection",
        }
    }
}

impl std::fmt::Display for AmbiguityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Outcome of ambiguity detection or heuristic selection.
///
/// A non-ambiguous result always names an object, except for
/// [`AmbiguityReason::NoCandidates`], which carries no object and zero
/// confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityResult {
    pub has_ambiguity: bool,
    pub reason: AmbiguityReason,
    pub selected_object_id: Option<String>,
    pub confidence: f64,
    pub clarification_question: Option<String>,
    pub alternative_objects: Option<Vec<String>>,
}

impl AmbiguityResult {
    pub fn no_candidates() -> Self {
        Self {
            has_ambiguity: false,
            reason: AmbiguityReason::NoCandidates,
            selected_object_id: None,
            confidence: 0.0,
            clarification_question: None,
            alternative_objects: None,
        }
    }

    pub fn resolved(reason: AmbiguityReason, object_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            has_ambiguity: false,
            reason,
            selected_object_id: Some(object_id.into()),
            confidence: confidence.clamp(0.0, 1.0),
            clarification_question: None,
            alternative_objects: None,
        }
    }

    /// Ambiguous result; every candidate other than the recommendation is
    /// listed as an alternative.
    pub fn ambiguous(
        reason: AmbiguityReason,
        recommended: Option<String>,
        confidence: f64,
        question: String,
        candidates: &[CandidateObject],
    ) -> Self {
        let alternatives = candidates
            .iter()
            .map(|c| c.object_id.clone())
            .filter(|id| recommended.as_deref() != Some(id.as_str()))
            .collect();
        Self {
            has_ambiguity: true,
            reason,
            selected_object_id: recommended,
            confidence: confidence.clamp(0.0, 1.0),
            clarification_question: Some(question),
            alternative_objects: Some(alternatives),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule chains
// ---------------------------------------------------------------------------

/// Ordered rules of heuristic selection. The first rule that yields a
/// result wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    NoCandidates,
    SingleCandidate,
    SingleVisible,
    SpatialMatch,
    Closest,
    DefaultFirst,
}

impl SelectionRule {
    pub const CHAIN: [SelectionRule; 6] = [
        Self::NoCandidates,
        Self::SingleCandidate,
        Self::SingleVisible,
        Self::SpatialMatch,
        Self::Closest,
        Self::DefaultFirst,
    ];
}

/// Band a spatial-match confidence falls into for `detect_ambiguity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    /// Above the resolve threshold.
    Resolved,
    /// Between the thresholds: recommend but still ask.
    Recommend,
    /// At or below the recommend threshold.
    Unresolved,
}

impl ConfidenceBand {
    pub fn classify(confidence: f64, config: &AmbiguityConfig) -> Self {
        if confidence > config.resolved_threshold {
            Self::Resolved
        } else if confidence > config.recommend_threshold {
            Self::Recommend
        } else {
            Self::Unresolved
        }
    }
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Failure of the remote model service.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Model service unavailable: {0}")]
    Unavailable(String),
}

/// Remote vision-language model: image plus task text in, free text out.
pub trait ModelService: Send + Sync {
    fn query(&self, image: &[u8], task: &str, timeout: Duration) -> Result<String, ModelError>;
}

/// A person who can answer a clarification question.
pub trait UserChannel: Send + Sync {
    /// Show `message` and wait up to `timeout` for a reply. `None` means no
    /// reply arrived in time.
    fn prompt(&self, message: &str, timeout: Duration) -> Option<String>;
}

/// Moves the agent to look at a candidate and returns the captured image,
/// or `None` when the candidate cannot be observed.
pub trait ObservationProvider: Send + Sync {
    fn capture(&self, candidate: &CandidateObject) -> Option<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Point3D;

    #[test]
    fn test_bands() {
        let cfg = AmbiguityConfig::default();
        assert_eq!(ConfidenceBand::classify(0.71, &cfg), ConfidenceBand::Resolved);
        assert_eq!(ConfidenceBand::classify(0.7, &cfg), ConfidenceBand::Recommend);
        assert_eq!(ConfidenceBand::classify(0.41, &cfg), ConfidenceBand::Recommend);
        assert_eq!(ConfidenceBand::classify(0.4, &cfg), ConfidenceBand::Unresolved);
        assert_eq!(ConfidenceBand::classify(0.0, &cfg), ConfidenceBand::Unresolved);
    }

    #[test]
    fn test_ambiguous_lists_alternatives() {
        let cands = vec![
            CandidateObject::new("A", "Cup", Point3D::origin()),
            CandidateObject::new("B", "Cup", Point3D::origin()),
            CandidateObject::new("C", "Cup", Point3D::origin()),
        ];
        let r = AmbiguityResult::ambiguous(
            AmbiguityReason::SelectedClosest,
            Some("B".into()),
            0.4,
            "which?".into(),
            &cands,
        );
        assert!(r.has_ambiguity);
        assert_eq!(r.alternative_objects, Some(vec!["A".to_string(), "C".to_string()]));
    }

    #[test]
    fn test_no_candidates_shape() {
        let r = AmbiguityResult::no_candidates();
        assert!(!r.has_ambiguity);
        assert!(r.selected_object_id.is_none());
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.reason.to_string(), "No candidate objects");
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(SelectionRule::CHAIN[0], SelectionRule::NoCandidates);
        assert_eq!(SelectionRule::CHAIN[5], SelectionRule::DefaultFirst);
    }
}
