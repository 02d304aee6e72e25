//! Bilingual (English / Chinese) spatial keyword table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Direction;

/// Kind of spatial constraint an instruction can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    Left,
    Right,
    Front,
    Back,
    Near,
    Far,
}

impl ConstraintKind {
    /// The direction sector this constraint requires, if it is directional.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Left => Some(Direction::Left),
            Self::Right => Some(Direction::Right),
            Self::Front => Some(Direction::Front),
            Self::Back => Some(Direction::Back),
            Self::Near | Self::Far => None,
        }
    }
}

/// Constraints found in an instruction, with the keywords that matched.
pub type SpatialConstraints = BTreeMap<ConstraintKind, Vec<String>>;

/// Keyword lists per constraint kind. Matching is a case-insensitive
/// substring test, so `"左"` also fires inside `"左边"`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable {
    entries: Vec<(ConstraintKind, Vec<String>)>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let table: [(ConstraintKind, &[&str]); 6] = [
            (ConstraintKind::Left, &["left", "左", "左边", "左侧"]),
            (ConstraintKind::Right, &["right", "右", "右边", "右侧"]),
            (ConstraintKind::Front, &["front", "ahead", "前", "前面", "前方"]),
            (ConstraintKind::Back, &["back", "behind", "后", "后面", "后方"]),
            (
                ConstraintKind::Near,
                &["near", "close", "nearby", "靠近", "附近", "近"],
            ),
            (ConstraintKind::Far, &["far", "distant", "远", "远离", "远的"]),
        ];
        Self {
            entries: table
                .iter()
                .map(|(k, words)| (*k, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }
}

impl KeywordTable {
    pub fn keywords(&self, kind: ConstraintKind) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, w)| w.as_slice())
            .unwrap_or(&[])
    }

    /// Collect every constraint kind with at least one matching keyword.
    pub fn extract(&self, instruction: &str) -> SpatialConstraints {
        let lowered = instruction.to_lowercase();
        let mut constraints = SpatialConstraints::new();
        for (kind, words) in &self.entries {
            let matched: Vec<String> = words
                .iter()
                .filter(|w| lowered.contains(w.as_str()))
                .cloned()
                .collect();
            if !matched.is_empty() {
                constraints.insert(*kind, matched);
            }
        }
        constraints
    }
}
