//! Numbered object references in model replies (`"vase1"`, `"pick up book2"`)
//! and the spatial sort fallbacks used when a reply has none.
//!
//! Numbers are 1-based positions in the canonical `(x, z)` ordering of the
//! candidates whose type contains the referenced word.

use std::cmp::Ordering;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bridge::indexing::canonical_order;
use crate::bridge::{AgentPose, AmbiguityConfig, CandidateObject};

const ACTION_PATTERN: &str = r"(?:navigate to|pick up|go to|get|take)\s+([a-z]+)_?(\d+)";
const NUMBER_PATTERN: &str = r"([a-z]+)_?(\d+)";

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VlmResponseParser {
    patterns: Vec<Regex>,
}

impl Default for VlmResponseParser {
    fn default() -> Self {
        Self {
            patterns: [ACTION_PATTERN, NUMBER_PATTERN]
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }
}

impl VlmResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn number_pattern(&self) -> Option<&Regex> {
        self.patterns.last()
    }

    /// Whether the reply mentions something like `word<digits>`.
    pub fn contains_numbered_reference(&self, response: &str) -> bool {
        self.number_pattern()
            .is_some_and(|re| re.is_match(&response.to_lowercase()))
    }

    /// First `(type, number)` pair in the reply.
    pub fn extract_object_info(&self, response: &str) -> Option<(String, usize)> {
        let lowered = response.to_lowercase();
        let caps = self.number_pattern()?.captures(&lowered)?;
        let number = caps.get(2)?.as_str().parse().ok()?;
        Some((caps.get(1)?.as_str().to_string(), number))
    }

    /// Map a numbered reference onto a candidate.
    ///
    /// The action-prefixed pattern is tried first, then the bare one. A
    /// reference whose number is zero or exceeds the matching candidates
    /// falls through to the next pattern; `None` when nothing resolves.
    pub fn parse_numbered_response<'a>(
        &self,
        response: &str,
        candidates: &'a [CandidateObject],
    ) -> Option<&'a CandidateObject> {
        let lowered = response.trim().to_lowercase();
        for re in &self.patterns {
            let Some(caps) = re.captures(&lowered) else {
                continue;
            };
            let (Some(word), Some(digits)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Ok(number) = digits.as_str().parse::<usize>() else {
                continue;
            };
            let word = word.as_str();

            let mut same_type: Vec<&CandidateObject> = candidates
                .iter()
                .filter(|c| c.object_type.to_lowercase().contains(word))
                .collect();
            if number == 0 || number > same_type.len() {
                tracing::debug!(
                    "Reference {}{} out of range ({} candidates)",
                    word,
                    number,
                    same_type.len()
                );
                continue;
            }
            same_type.sort_by(|a, b| canonical_order(a, b));
            return Some(same_type[number - 1]);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Sorting strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    SpatialLeftToRight,
    DistanceBased,
    VisibilityBased,
    Default,
}

impl SortStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpatialLeftToRight => "spatial_left_to_right",
            Self::DistanceBased => "distance_based",
            Self::VisibilityBased => "visibility_based",
            Self::Default => "default",
        }
    }
}

/// Orders candidates for the fallback pick.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartObjectSorting;

impl SmartObjectSorting {
    /// Strategy implied by the instruction wording.
    pub fn optimal_strategy(&self, instruction: &str) -> SortStrategy {
        let lowered = instruction.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| lowered.contains(w));
        if any(&["left", "right", "beside", "next"]) {
            SortStrategy::SpatialLeftToRight
        } else if any(&["near", "close", "closest"]) {
            SortStrategy::DistanceBased
        } else if any(&["visible", "see", "look"]) {
            SortStrategy::VisibilityBased
        } else {
            SortStrategy::Default
        }
    }

    /// Lateral offset of `obj` in the agent's frame:
    /// `dx·cos(yaw) + dz·sin(yaw)`.
    pub fn relative_x(obj: &CandidateObject, agent: &AgentPose) -> f64 {
        let dx = obj.position.x - agent.position.x;
        let dz = obj.position.z - agent.position.z;
        let yaw = agent.yaw().to_radians();
        dx * yaw.cos() + dz * yaw.sin()
    }

    /// Agent-relative when an agent is known, world `x` otherwise.
    pub fn sort_left_to_right<'a>(
        &self,
        objects: &[&'a CandidateObject],
        agent: Option<&AgentPose>,
    ) -> Vec<&'a CandidateObject> {
        let key = |o: &CandidateObject| match agent {
            Some(a) => Self::relative_x(o, a),
            None => o.position.x,
        };
        let mut sorted = objects.to_vec();
        sorted.sort_by(|a, b| key(*a).partial_cmp(&key(*b)).unwrap_or(Ordering::Equal));
        sorted
    }

    pub fn sort_by_distance<'a>(
        &self,
        objects: &[&'a CandidateObject],
        agent: &AgentPose,
    ) -> Vec<&'a CandidateObject> {
        let mut sorted = objects.to_vec();
        sorted.sort_by(|a, b| {
            let da = a.position.ground_distance_to(&agent.position);
            let db = b.position.ground_distance_to(&agent.position);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        });
        sorted
    }

    /// Visible first, then world `x`.
    pub fn sort_by_visibility<'a>(&self, objects: &[&'a CandidateObject]) -> Vec<&'a CandidateObject> {
        let mut sorted = objects.to_vec();
        sorted.sort_by(|a, b| {
            b.visible.cmp(&a.visible).then_with(|| {
                a.position
                    .x
                    .partial_cmp(&b.position.x)
                    .unwrap_or(Ordering::Equal)
            })
        });
        sorted
    }

    /// Sort with `strategy`. Distance sorting needs an agent; without one it
    /// degrades to left-to-right.
    pub fn sort<'a>(
        &self,
        strategy: SortStrategy,
        objects: &[&'a CandidateObject],
        agent: Option<&AgentPose>,
    ) -> Vec<&'a CandidateObject> {
        match (strategy, agent) {
            (SortStrategy::DistanceBased, Some(a)) => self.sort_by_distance(objects, a),
            (SortStrategy::VisibilityBased, _) => self.sort_by_visibility(objects),
            _ => self.sort_left_to_right(objects, agent),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// How a reference was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMethod {
    NumberedResponse,
    SpatialFallback(SortStrategy),
    FallbackFailed,
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NumberedResponse => f.write_str("vlm_numbered_response"),
            Self::SpatialFallback(s) => write!(f, "spatial_fallback_{}", s.as_str()),
            Self::FallbackFailed => f.write_str("fallback_failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub selected_object_id: Option<String>,
    pub confidence: f64,
    pub method: ResolutionMethod,
    pub reasoning: String,
}

/// Resolves an instruction plus model reply to one candidate.
#[derive(Debug, Clone, Default)]
pub struct EnhancedAmbiguityResolver {
    config: AmbiguityConfig,
    parser: VlmResponseParser,
    sorter: SmartObjectSorting,
}

impl EnhancedAmbiguityResolver {
    pub fn new(config: AmbiguityConfig) -> Self {
        Self {
            config,
            parser: VlmResponseParser::default(),
            sorter: SmartObjectSorting,
        }
    }

    pub fn parser(&self) -> &VlmResponseParser {
        &self.parser
    }

    /// Numbered reference first, spatial sort fallback otherwise.
    pub fn resolve_object_reference(
        &self,
        instruction: &str,
        candidates: &[CandidateObject],
        response: &str,
        agent: Option<&AgentPose>,
    ) -> ResolvedReference {
        if self.parser.contains_numbered_reference(response) {
            if let Some(obj) = self.parser.parse_numbered_response(response, candidates) {
                tracing::info!("Model reply '{}' resolved to {}", response.trim(), obj.object_id);
                return ResolvedReference {
                    selected_object_id: Some(obj.object_id.clone()),
                    confidence: self.config.numbered_response_confidence,
                    method: ResolutionMethod::NumberedResponse,
                    reasoning: format!("Model provided numbered reference: {}", response.trim()),
                };
            }
        }
        self.fallback_to_spatial_reasoning(instruction, candidates, agent)
    }

    pub fn fallback_to_spatial_reasoning(
        &self,
        instruction: &str,
        candidates: &[CandidateObject],
        agent: Option<&AgentPose>,
    ) -> ResolvedReference {
        let refs: Vec<&CandidateObject> = candidates.iter().collect();
        let strategy = self.sorter.optimal_strategy(instruction);
        let sorted = self.sorter.sort(strategy, &refs, agent);

        match sorted.first() {
            Some(obj) => {
                tracing::debug!(
                    "Fallback using {} strategy selected {}",
                    strategy.as_str(),
                    obj.object_id
                );
                ResolvedReference {
                    selected_object_id: Some(obj.object_id.clone()),
                    confidence: self.config.spatial_fallback_confidence,
                    method: ResolutionMethod::SpatialFallback(strategy),
                    reasoning: format!(
                        "Fallback using {} strategy, selected first object",
                        strategy.as_str()
                    ),
                }
            }
            None => {
                tracing::warn!("No candidate objects to resolve '{}'", instruction);
                ResolvedReference {
                    selected_object_id: None,
                    confidence: 0.0,
                    method: ResolutionMethod::FallbackFailed,
                    reasoning: "No candidate objects available".to_string(),
                }
            }
        }
    }
}
