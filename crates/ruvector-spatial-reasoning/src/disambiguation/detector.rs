//! Heuristic ambiguity detection and rule-chain selection.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use regex::Regex;

use crate::bridge::{AmbiguityConfig, CandidateObject};
use crate::relations::SpatialRelationCalculator;

use super::{AmbiguityReason, AmbiguityResult, ConfidenceBand, SelectionRule};

// ---------------------------------------------------------------------------
// Spatial pattern families
// ---------------------------------------------------------------------------

/// Family of spatial expression found in an instruction. Declaration order
/// is the priority used when choosing a clarification question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternFamily {
    Directional,
    Proximity,
    Landmark,
    Container,
}

const DIRECTIONAL: &[&str] = &[
    r"(左|左边|left|左侧)",
    r"(右|右边|right|右侧)",
    r"(前|前面|front|ahead|前方)",
    r"(后|后面|back|behind|后方)",
];

const PROXIMITY: &[&str] = &[
    r"(靠近|附近|near|close|nearby)",
    r"(远|远离|far|distant)",
    r"(旁边|beside|next to)",
    r"(之间|between)",
];

const LANDMARK: &[&str] = &[
    r"(窗户|window).*?(旁|边|附近|near)",
    r"(门|door).*?(旁|边|附近|near)",
    r"(墙|wall).*?(旁|边|附近|near)",
];

const CONTAINER: &[&str] = &[
    r"(桌|table).*?(上|on)",
    r"(架|shelf).*?(上|on|里|in)",
    r"(柜|cabinet).*?(里|in)",
    r"(抽屉|drawer).*?(里|in)",
];

/// Compiled regular expressions for every [`PatternFamily`].
#[derive(Debug, Clone)]
pub struct SpatialPatterns {
    families: Vec<(PatternFamily, Vec<Regex>)>,
}

impl Default for SpatialPatterns {
    fn default() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
                .collect()
        };
        Self {
            families: vec![
                (PatternFamily::Directional, compile(DIRECTIONAL)),
                (PatternFamily::Proximity, compile(PROXIMITY)),
                (PatternFamily::Landmark, compile(LANDMARK)),
                (PatternFamily::Container, compile(CONTAINER)),
            ],
        }
    }
}

impl SpatialPatterns {
    /// Every family with at least one match, with the matched text.
    pub fn detect(&self, instruction: &str) -> BTreeMap<PatternFamily, Vec<String>> {
        let lowered = instruction.to_lowercase();
        let mut found = BTreeMap::new();
        for (family, regexes) in &self.families {
            let matches: Vec<String> = regexes
                .iter()
                .flat_map(|re| re.find_iter(&lowered).map(|m| m.as_str().to_string()))
                .collect();
            if !matches.is_empty() {
                found.insert(*family, matches);
            }
        }
        found
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Detects whether an instruction picks out one candidate and, if not,
/// produces a clarification question.
///
/// The relation calculator is optional; without it spatial expressions can
/// be detected but not resolved.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAmbiguityDetector {
    config: AmbiguityConfig,
    calculator: Option<SpatialRelationCalculator>,
    patterns: SpatialPatterns,
}

impl HeuristicAmbiguityDetector {
    pub fn new(config: AmbiguityConfig, calculator: Option<SpatialRelationCalculator>) -> Self {
        Self {
            config,
            calculator,
            patterns: SpatialPatterns::default(),
        }
    }

    pub fn set_spatial_calculator(&mut self, calculator: SpatialRelationCalculator) {
        self.calculator = Some(calculator);
    }

    pub fn calculator(&self) -> Option<&SpatialRelationCalculator> {
        self.calculator.as_ref()
    }

    pub fn config(&self) -> &AmbiguityConfig {
        &self.config
    }

    /// Decide whether `instruction` singles out one of `candidates`.
    pub fn detect_ambiguity(
        &self,
        instruction: &str,
        candidates: &[CandidateObject],
    ) -> AmbiguityResult {
        match candidates {
            [] => return AmbiguityResult::no_candidates(),
            [only] => {
                return AmbiguityResult::resolved(
                    AmbiguityReason::SingleCandidate,
                    only.object_id.clone(),
                    1.0,
                )
            }
            _ => {}
        }

        let families = self.patterns.detect(instruction);
        if families.is_empty() {
            return AmbiguityResult::ambiguous(
                AmbiguityReason::NoSpatialConstraints,
                None,
                0.0,
                self.simple_clarification(candidates),
                candidates,
            );
        }

        let Some(calculator) = &self.calculator else {
            tracing::warn!(
                "Spatial constraints in '{}' but no relation calculator, asking for clarification",
                instruction
            );
            return AmbiguityResult::ambiguous(
                AmbiguityReason::CalculatorUnavailable,
                None,
                0.0,
                self.clarification_question(candidates, &families),
                candidates,
            );
        };

        let (best, confidence) = calculator.find_best_spatial_match(candidates, instruction);
        let band = ConfidenceBand::classify(confidence, &self.config);
        tracing::debug!(
            best = ?best,
            confidence,
            band = ?band,
            "spatial resolution"
        );

        match (band, best) {
            (ConfidenceBand::Resolved, Some(id)) => {
                tracing::info!("Resolved '{}' to {} ({:.2})", instruction, id, confidence);
                AmbiguityResult::resolved(AmbiguityReason::ResolvedBySpatialConstraints, id, confidence)
            }
            (ConfidenceBand::Recommend, Some(id)) => AmbiguityResult::ambiguous(
                AmbiguityReason::LowSpatialConfidence,
                Some(id),
                confidence,
                self.clarification_question(candidates, &families),
                candidates,
            ),
            _ => AmbiguityResult::ambiguous(
                AmbiguityReason::UnresolvedSpatialConstraints,
                None,
                0.0,
                self.clarification_question(candidates, &families),
                candidates,
            ),
        }
    }

    /// Pick a candidate by walking [`SelectionRule::CHAIN`].
    pub fn heuristic_object_selection(
        &self,
        instruction: &str,
        candidates: &[CandidateObject],
    ) -> AmbiguityResult {
        SelectionRule::CHAIN
            .iter()
            .find_map(|rule| self.apply_rule(*rule, instruction, candidates))
            .unwrap_or_else(AmbiguityResult::no_candidates)
    }

    fn apply_rule(
        &self,
        rule: SelectionRule,
        instruction: &str,
        candidates: &[CandidateObject],
    ) -> Option<AmbiguityResult> {
        match rule {
            SelectionRule::NoCandidates => {
                candidates.is_empty().then(AmbiguityResult::no_candidates)
            }
            SelectionRule::SingleCandidate => match candidates {
                [only] => Some(AmbiguityResult::resolved(
                    AmbiguityReason::SingleCandidate,
                    only.object_id.clone(),
                    1.0,
                )),
                _ => None,
            },
            SelectionRule::SingleVisible => {
                let mut visible = candidates.iter().filter(|c| c.visible);
                match (visible.next(), visible.next()) {
                    (Some(only), None) => Some(AmbiguityResult::resolved(
                        AmbiguityReason::OnlyOneVisible,
                        only.object_id.clone(),
                        self.config.single_visible_confidence,
                    )),
                    _ => None,
                }
            }
            SelectionRule::SpatialMatch => {
                let calculator = self.calculator.as_ref()?;
                if self.patterns.detect(instruction).is_empty() {
                    return None;
                }
                let (best, confidence) = calculator.find_best_spatial_match(candidates, instruction);
                if confidence > self.config.heuristic_spatial_threshold {
                    best.map(|id| {
                        AmbiguityResult::resolved(AmbiguityReason::SpatialHeuristic, id, confidence)
                    })
                } else {
                    None
                }
            }
            SelectionRule::Closest => {
                let calculator = self.calculator.as_ref()?;
                let relations = calculator.calculate_relative_positions(candidates, None);
                let closest = relations.iter().min_by(|a, b| {
                    a.distance_to_agent
                        .partial_cmp(&b.distance_to_agent)
                        .unwrap_or(Ordering::Equal)
                })?;
                Some(AmbiguityResult::ambiguous(
                    AmbiguityReason::SelectedClosest,
                    Some(closest.object_id.clone()),
                    self.config.closest_confidence,
                    self.simple_clarification(candidates),
                    candidates,
                ))
            }
            SelectionRule::DefaultFirst => {
                let first = candidates.first()?;
                tracing::warn!(
                    "No relation calculator, defaulting to first of {} candidates",
                    candidates.len()
                );
                Some(AmbiguityResult::ambiguous(
                    AmbiguityReason::DefaultSelection,
                    Some(first.object_id.clone()),
                    self.config.default_selection_confidence,
                    self.simple_clarification(candidates),
                    candidates,
                ))
            }
        }
    }

    // -- clarification text ---------------------------------------------------

    /// Question tailored to the highest-priority pattern family present.
    pub fn clarification_question(
        &self,
        candidates: &[CandidateObject],
        families: &BTreeMap<PatternFamily, Vec<String>>,
    ) -> String {
        let (count, object_type) = count_and_type(candidates);
        let ask = match families.keys().next() {
            Some(PatternFamily::Directional) => {
                "Could you specify which direction you mean (left, right, front, or back)?"
            }
            Some(PatternFamily::Proximity) => {
                "Could you specify which one is closer to you or a landmark?"
            }
            Some(PatternFamily::Landmark) => {
                "Could you clarify which landmark you're referring to?"
            }
            Some(PatternFamily::Container) => "Could you specify which container or surface?",
            None => "Could you help me identify which one you want?",
        };
        format!("I found {count} {object_type}s. {ask}")
    }

    /// Question that lists up to `max_enumerated` candidates by distance
    /// band and direction, or a generic request for details.
    pub fn simple_clarification(&self, candidates: &[CandidateObject]) -> String {
        let (count, object_type) = count_and_type(candidates);

        if let Some(calculator) = &self.calculator {
            if count <= self.config.max_enumerated {
                let relations = calculator.calculate_relative_positions(candidates, None);
                let locations: Vec<String> = relations
                    .iter()
                    .map(|r| {
                        if r.distance_to_agent < self.config.nearby_distance {
                            format!("one nearby ({})", r.relative_direction)
                        } else {
                            format!("one farther away ({})", r.relative_direction)
                        }
                    })
                    .collect();
                if locations.len() == count {
                    return format!(
                        "I see {count} {object_type}s: {}. Which one would you like?",
                        locations.join(" and ")
                    );
                }
            }
        }

        format!(
            "I found {count} {object_type}s in the scene. Could you provide more details about which one you want?"
        )
    }
}

fn count_and_type(candidates: &[CandidateObject]) -> (usize, &str) {
    let object_type = candidates
        .first()
        .map(|c| c.object_type.as_str())
        .unwrap_or("object");
    (candidates.len(), object_type)
}
