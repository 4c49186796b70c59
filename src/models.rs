use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

pub type Document = Map<String, Value>;

pub const UNTITLED_HABIT: &str = "Untitled Habit";
pub const GUEST_OWNER: &str = "guest";

/// Identifier of a habit card.
///
/// Temporary ids are numeric tokens minted by this client and serialize as JSON
/// numbers; persisted ids come from the document store and serialize as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardId {
    Temp(u64),
    Persisted(String),
}

impl CardId {
    pub fn is_temp(&self) -> bool {
        matches!(self, CardId::Temp(_))
    }

    pub fn persisted(&self) -> Option<&str> {
        match self {
            CardId::Persisted(id) => Some(id),
            CardId::Temp(_) => None,
        }
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardId::Temp(token) => write!(f, "{token}"),
            CardId::Persisted(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCardIdError;

impl fmt::Display for ParseCardIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("card id must not be empty")
    }
}

impl std::error::Error for ParseCardIdError {}

impl FromStr for CardId {
    type Err = ParseCardIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseCardIdError);
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(token) = s.parse::<u64>() {
                return Ok(CardId::Temp(token));
            }
        }
        Ok(CardId::Persisted(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitCard {
    pub id: CardId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, deserialize_with = "deserialize_deadline")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub completions: u32,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "default_manual_progress")]
    pub manual_progress: bool,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub rotation: i8,
    #[serde(default)]
    pub owner_id: String,
    #[serde(skip)]
    pub editing: bool,
}

fn default_manual_progress() -> bool {
    true
}

// Stored deadlines may be an empty string, null, or a `YYYY-MM-DD` date.
fn deserialize_deadline<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_deadline(value).map(Some).map_err(serde::de::Error::custom),
    }
}

pub fn parse_deadline(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
}

impl HabitCard {
    /// A fresh, empty card in edit mode, as produced by the add button.
    pub fn new_temp(token: u64, correlation: String, owner_id: &str, created_at: i64, rotation: i8) -> Self {
        Self {
            id: CardId::Temp(token),
            correlation: Some(correlation),
            title: String::new(),
            details: String::new(),
            created_at,
            deadline: None,
            completions: 0,
            streak: 0,
            progress: 0,
            completed: false,
            manual_progress: true,
            x: 0,
            y: 0,
            rotation,
            owner_id: owner_id.to_owned(),
            editing: true,
        }
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.details.trim().is_empty()
    }

    /// Builds a card from a stored document, using the document key as id.
    pub fn from_document(id: &str, data: &Document) -> Result<Self, serde_json::Error> {
        let mut data = data.clone();
        data.insert("id".to_owned(), Value::String(id.to_owned()));
        serde_json::from_value(Value::Object(data))
    }

    /// Document body for persistence. The id lives in the document key, not the body.
    pub fn to_document(&self) -> Document {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("id");
                map
            }
            _ => Document::new(),
        }
    }
}

/// Per-card edit buffer, alive only while the card is in edit mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub title: String,
    pub details: String,
    pub deadline: Option<NaiveDate>,
    pub show_advanced: bool,
    pub completions: u32,
}

impl Draft {
    pub fn from_card(card: &HabitCard) -> Self {
        Self {
            title: card.title.clone(),
            details: card.details.clone(),
            deadline: card.deadline,
            show_advanced: false,
            completions: card.completions,
        }
    }
}

/// Partial draft update. An empty `deadline` string clears the deadline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPatch {
    pub title: Option<String>,
    pub details: Option<String>,
    pub deadline: Option<String>,
    pub show_advanced: Option<bool>,
    pub completions: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: String,
    pub notifications: bool,
    pub language: String,
    pub sound_effects: bool,
    pub email_reminders: bool,
    pub week_starts_on: String,
    pub time_format: String,
    pub card_view_mode: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "light".to_owned(),
            notifications: true,
            language: "en".to_owned(),
            sound_effects: true,
            email_reminders: false,
            week_starts_on: "monday".to_owned(),
            time_format: "24h".to_owned(),
            card_view_mode: "grid".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_cards: u32,
    pub completed_cards: u32,
    pub active_cards: u32,
    pub total_completions: u64,
    pub longest_streak: u32,
    pub completion_rate: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub export_date: String,
    pub user_id: String,
    pub cards: Vec<Value>,
    pub preferences: Preferences,
    pub profile: Document,
    pub goals: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgressRequest {
    pub progress: f64,
}

/// A user action to record, with free-form context.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub data: Document,
}

/// A card as shown to the page: the stored fields plus transient UI state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    #[serde(flatten)]
    pub card: HabitCard,
    pub editing: bool,
    pub percent: u8,
    pub celebrating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<Draft>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsResponse {
    pub user: Option<SessionUser>,
    pub cards: Vec<CardView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub card: CardView,
    pub celebrate: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: SessionUser,
    pub password_strength: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub agreed_to_terms: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedRequest {
    pub provider: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    Start,
    Move,
    End,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragRequest {
    pub phase: DragPhase,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DragResponse {
    pub offset: Option<Offset>,
    pub committed: bool,
}
