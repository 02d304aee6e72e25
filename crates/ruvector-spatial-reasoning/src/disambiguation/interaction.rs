//! Clarification dialog with a user, backed by per-candidate model analysis.
//!
//! Every candidate is observed and scored by the model service. When the two
//! best scores are far apart the best candidate is taken without asking;
//! otherwise the user sees a numbered list with a recommendation and may
//! reply with an option number or accept the recommendation. Timeouts and
//! unreadable replies fall back to the recommendation.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{CandidateObject, InteractionConfig, SceneView};

use super::{ModelService, ObservationProvider, UserChannel};

const CONFIDENCE_MARKER: &str = "Confidence for task:";
const OBJECTS_MARKER: &str = "Objects:";

/// Model assessment of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateAnalysis {
    pub object: CandidateObject,
    /// 1-based position in the candidate list shown to the user.
    pub index: usize,
    /// Raw model reply.
    pub analysis: String,
    /// Percentage in `[0, 100]`.
    pub confidence: u32,
    pub spatial_description: String,
}

impl CandidateAnalysis {
    /// Short description of what the model saw.
    pub fn summary(&self) -> String {
        self.analysis
            .split_once(OBJECTS_MARKER)
            .and_then(|(_, rest)| rest.lines().next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("no details")
            .to_string()
    }
}

/// Why the dialog settled on its choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceSource {
    /// Confidence gap large enough to skip asking.
    AutoSelected,
    /// The user picked an option number.
    UserIndex(usize),
    /// The user asked for the recommendation.
    Recommendation,
    /// No reply before the timeout.
    TimedOut,
    /// The reply could not be understood.
    Unrecognized,
    /// No candidate could be analysed; the first candidate was taken.
    NoAnalysis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogOutcome {
    pub object: CandidateObject,
    pub source: ChoiceSource,
}

/// Runs the clarification flow against the external collaborators.
#[derive(Clone)]
pub struct ClarificationDialog {
    config: InteractionConfig,
    model_timeout: Duration,
    scene: Option<Arc<dyn SceneView>>,
}

impl std::fmt::Debug for ClarificationDialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClarificationDialog")
            .field("config", &self.config)
            .field("model_timeout", &self.model_timeout)
            .field("has_scene", &self.scene.is_some())
            .finish()
    }
}

impl Default for ClarificationDialog {
    fn default() -> Self {
        Self::new(InteractionConfig::default(), Duration::from_secs(10))
    }
}

impl ClarificationDialog {
    pub fn new(config: InteractionConfig, model_timeout: Duration) -> Self {
        Self {
            config,
            model_timeout,
            scene: None,
        }
    }

    /// Scene used to find landmarks for spatial descriptions.
    pub fn with_scene(mut self, scene: Arc<dyn SceneView>) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.config.reply_timeout_ms)
    }

    /// Room side by the sign of `x`, plus the first landmark within the
    /// configured radius.
    pub fn spatial_description(&self, obj: &CandidateObject) -> String {
        let side = if obj.position.x < 0.0 {
            "on the left side of the room"
        } else {
            "on the right side of the room"
        };
        let landmark = self.scene.as_ref().and_then(|scene| {
            scene.objects().iter().find(|o| {
                o.object_id != obj.object_id
                    && self.config.landmark_types.iter().any(|t| *t == o.object_type)
                    && obj.position.ground_distance_to(&o.position) < self.config.landmark_radius
            })
        });
        match landmark {
            Some(l) => format!("{side}, near the {}", l.object_type.to_lowercase()),
            None => side.to_string(),
        }
    }

    /// Confidence percentage from a model reply, or the configured default.
    pub fn extract_confidence(&self, reply: &str) -> u32 {
        reply
            .rsplit_once(CONFIDENCE_MARKER)
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .and_then(|tok| tok.trim_end_matches('%').parse::<u32>().ok())
            .map(|c| c.min(100))
            .unwrap_or(self.config.default_confidence)
    }

    /// Observe and score every candidate, best first. Candidates that cannot
    /// be observed are skipped; model failures score the default confidence.
    pub fn analyze_candidates(
        &self,
        task: &str,
        candidates: &[CandidateObject],
        observer: &dyn ObservationProvider,
        model: &dyn ModelService,
    ) -> Vec<CandidateAnalysis> {
        let mut analyses = Vec::with_capacity(candidates.len());
        for (i, obj) in candidates.iter().enumerate() {
            let Some(image) = observer.capture(obj) else {
                tracing::warn!("Could not observe candidate {}", obj.object_id);
                continue;
            };
            let analysis = match model.query(&image, task, self.model_timeout) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("Model analysis of {} failed: {}", obj.object_id, e);
                    String::new()
                }
            };
            let confidence = self.extract_confidence(&analysis);
            tracing::debug!(object_id = %obj.object_id, confidence, "candidate analysed");
            analyses.push(CandidateAnalysis {
                object: obj.clone(),
                index: i + 1,
                analysis,
                confidence,
                spatial_description: self.spatial_description(obj),
            });
        }
        analyses.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        analyses
    }

    /// Message listing every analysed option with the recommendation first
    /// in line. `analyses` must be sorted best first and non-empty.
    pub fn generate_disambiguation_message(
        &self,
        task: &str,
        candidates: &[CandidateObject],
        analyses: &[CandidateAnalysis],
    ) -> String {
        let object_type = candidates
            .first()
            .map(|c| c.object_type.as_str())
            .unwrap_or("object");
        let mut msg = format!(
            "Agent: I found multiple {object_type} options and need your help.\n\n\
             Task: {task}\n\n\
             I found {} {object_type} objects in the room:\n\n",
            candidates.len()
        );
        for a in analyses {
            msg.push_str(&format!(
                "Option {i}: {object_type}_{i}\n  Location: {}\n  Analysis: {}\n  Confidence: {}%\n\n",
                a.spatial_description,
                a.summary(),
                a.confidence,
                i = a.index,
            ));
        }
        if let Some(best) = analyses.first() {
            msg.push_str(&format!(
                "I recommend Option {i} ({object_type}_{i}) - it has the highest confidence ({}%).\n\nPlease choose:",
                best.confidence,
                i = best.index,
            ));
        }
        for a in analyses {
            msg.push_str(&format!("\n  Type '{i}' for {object_type}_{i}", i = a.index));
        }
        msg.push_str("\n  Type 'auto' to use my recommendation");
        msg.push_str(&format!(
            "\n\nYou have {} seconds to respond.",
            self.reply_timeout().as_secs()
        ));
        msg
    }

    /// Interpret a reply. `None` is a timeout. Option numbers index the
    /// candidate list; `auto`, `recommend`, `best` and an empty reply accept
    /// the recommendation, as does anything unrecognised.
    pub fn parse_user_response(
        &self,
        reply: Option<&str>,
        candidates: &[CandidateObject],
        analyses: &[CandidateAnalysis],
    ) -> Option<DialogOutcome> {
        let recommended = |source| {
            analyses.first().map(|a| DialogOutcome {
                object: a.object.clone(),
                source,
            })
        };
        let Some(reply) = reply else {
            tracing::warn!("No reply before timeout, using recommendation");
            return recommended(ChoiceSource::TimedOut);
        };
        let cleaned = reply.trim().to_lowercase();
        if matches!(cleaned.as_str(), "" | "auto" | "recommend" | "best") {
            return recommended(ChoiceSource::Recommendation);
        }
        if let Ok(n) = cleaned.parse::<usize>() {
            if (1..=candidates.len()).contains(&n) {
                return Some(DialogOutcome {
                    object: candidates[n - 1].clone(),
                    source: ChoiceSource::UserIndex(n),
                });
            }
        }
        tracing::debug!("Could not understand reply '{}', using recommendation", reply);
        recommended(ChoiceSource::Unrecognized)
    }

    /// Full flow: analyse, auto-select on a wide confidence gap, otherwise
    /// ask the user. `None` only for an empty candidate list.
    pub fn request_user_disambiguation(
        &self,
        task: &str,
        candidates: &[CandidateObject],
        observer: &dyn ObservationProvider,
        model: &dyn ModelService,
        channel: &dyn UserChannel,
    ) -> Option<DialogOutcome> {
        let first = candidates.first()?;
        let analyses = self.analyze_candidates(task, candidates, observer, model);

        if analyses.is_empty() {
            tracing::warn!("No candidate could be analysed, taking {}", first.object_id);
            return Some(DialogOutcome {
                object: first.clone(),
                source: ChoiceSource::NoAnalysis,
            });
        }

        if let [best, second, ..] = analyses.as_slice() {
            let gap = best.confidence as f64 - second.confidence as f64;
            if gap > self.config.auto_select_gap {
                tracing::info!(
                    "Confidence gap {}% vs {}%, auto-selecting {}",
                    best.confidence,
                    second.confidence,
                    best.object.object_id
                );
                return Some(DialogOutcome {
                    object: best.object.clone(),
                    source: ChoiceSource::AutoSelected,
                });
            }
        }

        let message = self.generate_disambiguation_message(task, candidates, &analyses);
        let reply = channel.prompt(&message, self.reply_timeout());
        self.parse_user_response(reply.as_deref(), candidates, &analyses)
    }
}
