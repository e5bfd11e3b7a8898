//! Attempt records and the acknowledgements handed back to producers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// XP granted by the optimistic local award for a correct answer.
const PROVISIONAL_XP: u32 = 10;

/// Kind of buffered attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptKind {
    /// A single vocabulary word answer.
    #[serde(rename = "word")]
    WordAttempt,
    /// A full sentence answer.
    #[serde(rename = "sentence")]
    SentenceAttempt,
}

impl AttemptKind {
    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptKind::WordAttempt => "word",
            AttemptKind::SentenceAttempt => "sentence",
        }
    }
}

/// Gem rarity tiers used by the reward system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GemRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// A single word answer produced by a game screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAttempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_vocabulary_item_id: Option<String>,
    pub word_text: String,
    #[serde(default)]
    pub translation_text: String,
    #[serde(default)]
    pub response_time_ms: u64,
    pub was_correct: bool,
    #[serde(default)]
    pub hint_used: bool,
    #[serde(default)]
    pub streak_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gem_rarity: Option<GemRarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_data: Option<serde_json::Value>,
}

/// A sentence answer produced by a game screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceAttempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_sentence_id: Option<String>,
    pub source_text: String,
    pub target_text: String,
    #[serde(default)]
    pub response_time_ms: u64,
    pub was_correct: bool,
    #[serde(default)]
    pub hint_used: bool,
    #[serde(default)]
    pub streak_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gem_rarity: Option<GemRarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_data: Option<serde_json::Value>,
    /// Some fast-paced games hand scheduling to another system.
    #[serde(default, skip_serializing)]
    pub skip_spaced_repetition: bool,
}

/// Kind-specific attempt body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttemptPayload {
    Word(WordAttempt),
    Sentence(SentenceAttempt),
}

impl AttemptPayload {
    /// Kind of this payload.
    pub fn kind(&self) -> AttemptKind {
        match self {
            AttemptPayload::Word(_) => AttemptKind::WordAttempt,
            AttemptPayload::Sentence(_) => AttemptKind::SentenceAttempt,
        }
    }

    /// Whether the producer judged the answer correct.
    pub fn was_correct(&self) -> bool {
        match self {
            AttemptPayload::Word(word) => word.was_correct,
            AttemptPayload::Sentence(sentence) => sentence.was_correct,
        }
    }

    /// Text shown alongside a reward.
    pub fn display_text(&self) -> &str {
        match self {
            AttemptPayload::Word(word) => &word.word_text,
            AttemptPayload::Sentence(sentence) => &sentence.source_text,
        }
    }
}

/// One buffered gameplay event.
///
/// Records are immutable once built; the queue only moves them.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    record_id: Uuid,
    session_id: String,
    game_type: String,
    payload: AttemptPayload,
    skip_downstream_scheduling: bool,
    enqueued_at: DateTime<Utc>,
    sequence: u64,
}

impl AttemptRecord {
    /// Build a record stamped with a fresh id and the current time.
    pub fn new(
        session_id: impl Into<String>,
        game_type: impl Into<String>,
        payload: AttemptPayload,
        skip_downstream_scheduling: bool,
        sequence: u64,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            session_id: session_id.into(),
            game_type: game_type.into(),
            payload,
            skip_downstream_scheduling,
            enqueued_at: Utc::now(),
            sequence,
        }
    }

    /// Client-generated id the backend can deduplicate on.
    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn kind(&self) -> AttemptKind {
        self.payload.kind()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn game_type(&self) -> &str {
        &self.game_type
    }

    pub fn payload(&self) -> &AttemptPayload {
        &self.payload
    }

    pub fn skip_downstream_scheduling(&self) -> bool {
        self.skip_downstream_scheduling
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Position in enqueue order for the owning coordinator.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Optimistic reward for this record, if the answer was correct.
    pub fn provisional_award(&self) -> Option<Acknowledgement> {
        if !self.payload.was_correct() {
            return None;
        }
        Some(Acknowledgement::Provisional(GemAward {
            record_id: self.record_id,
            rarity: GemRarity::Common,
            xp_value: PROVISIONAL_XP,
            word_text: self.payload.display_text().to_string(),
        }))
    }
}

/// Reward details shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GemAward {
    pub record_id: Uuid,
    pub rarity: GemRarity,
    pub xp_value: u32,
    pub word_text: String,
}

/// Acknowledgement returned to a producer.
///
/// `Provisional` is a local guess made before any network round trip and
/// must never be treated as durable. `Confirmed` is only built from data the
/// backend has reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    Provisional(GemAward),
    Confirmed(GemAward),
}

impl Acknowledgement {
    pub fn is_provisional(&self) -> bool {
        matches!(self, Acknowledgement::Provisional(_))
    }

    pub fn award(&self) -> &GemAward {
        match self {
            Acknowledgement::Provisional(award) | Acknowledgement::Confirmed(award) => award,
        }
    }

    /// Promote to `Confirmed` using the reward the backend actually granted.
    pub fn confirm(self, granted: GemAward) -> Acknowledgement {
        debug_assert_eq!(self.award().record_id, granted.record_id);
        Acknowledgement::Confirmed(granted)
    }
}
