//! Deck service models.
//!
//! Database rows, domain types, and the JSON request/response bodies of the
//! HTTP API.

use crate::errors::DeckError;
use chrono::{DateTime, NaiveDate, Utc};
use common::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Validation limits
// ============================================================================

/// Card text length bounds, counted in Unicode scalar values after trimming.
pub const MIN_CARD_TEXT_CHARS: usize = 50;
pub const MAX_CARD_TEXT_CHARS: usize = 280;

/// Choice label length bounds.
pub const MIN_CHOICE_LABEL_CHARS: usize = 1;
pub const MAX_CHOICE_LABEL_CHARS: usize = 100;

/// Bound on the population and finance effect of a single choice.
pub const MAX_CHOICE_DELTA: i32 = 15;

/// Deck title length bounds.
pub const MIN_DECK_TITLE_CHARS: usize = 1;
pub const MAX_DECK_TITLE_CHARS: usize = 100;

// ============================================================================
// Deck
// ============================================================================

/// Curation status of a deck.
///
/// Changed only by explicit admin action. Whether a deck is actually
/// playable is computed at read time and can differ from `Playable` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckStatus {
    Planned,
    Wip,
    Pending,
    Playable,
}

impl DeckStatus {
    pub const ALL: [DeckStatus; 4] = [
        DeckStatus::Planned,
        DeckStatus::Wip,
        DeckStatus::Pending,
        DeckStatus::Playable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeckStatus::Planned => "planned",
            DeckStatus::Wip => "wip",
            DeckStatus::Pending => "pending",
            DeckStatus::Playable => "playable",
        }
    }
}

impl FromStr for DeckStatus {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(DeckStatus::Planned),
            "wip" => Ok(DeckStatus::Wip),
            "pending" => Ok(DeckStatus::Pending),
            "playable" => Ok(DeckStatus::Playable),
            other => Err(DeckError::DataIntegrity(format!(
                "unknown deck status '{}'",
                other
            ))),
        }
    }
}

/// Deck database row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeckRow {
    pub id: i64,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub card_capacity: i32,
    pub like_count: i64,
    pub status: String,
    pub owner_admin_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A deck with its status decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub id: i64,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub card_capacity: i32,
    pub like_count: i64,
    pub status: DeckStatus,
    pub owner_admin_id: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DeckRow> for Deck {
    type Error = DeckError;

    fn try_from(row: DeckRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse()?,
            id: row.id,
            title: row.title,
            start_date: row.start_date,
            end_date: row.end_date,
            card_capacity: row.card_capacity,
            like_count: row.like_count,
            owner_admin_id: row.owner_admin_id,
            created_at: row.created_at,
        })
    }
}

/// Deck row joined with its card count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeckSummaryRow {
    #[sqlx(flatten)]
    pub deck: DeckRow,
    pub card_count: i64,
}

/// A deck together with the number of cards submitted to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckSummary {
    pub deck: Deck,
    pub card_count: i64,
}

impl DeckSummary {
    pub fn is_full(&self) -> bool {
        self.card_count >= i64::from(self.deck.card_capacity)
    }
}

impl TryFrom<DeckSummaryRow> for DeckSummary {
    type Error = DeckError;

    fn try_from(row: DeckSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            deck: Deck::try_from(row.deck)?,
            card_count: row.card_count,
        })
    }
}

// ============================================================================
// Card
// ============================================================================

/// One of the two answers of a card, with its effect on the kingdom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Choice {
    pub label: String,
    pub population: i32,
    #[serde(alias = "finances")]
    pub finance: i32,
}

impl Choice {
    /// Validate label length and delta bounds.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        let label_len = self.label.trim().chars().count();
        if label_len < MIN_CHOICE_LABEL_CHARS {
            return Err("Choice label must not be empty");
        }
        if label_len > MAX_CHOICE_LABEL_CHARS {
            return Err("Choice label must be at most 100 characters");
        }
        if !(-MAX_CHOICE_DELTA..=MAX_CHOICE_DELTA).contains(&self.population) {
            return Err("Population effect must be between -15 and 15");
        }
        if !(-MAX_CHOICE_DELTA..=MAX_CHOICE_DELTA).contains(&self.finance) {
            return Err("Finance effect must be between -15 and 15");
        }
        Ok(())
    }

    /// Copy with surrounding whitespace removed from the label.
    pub fn trimmed(&self) -> Choice {
        Choice {
            label: self.label.trim().to_string(),
            ..self.clone()
        }
    }
}

/// Card database row. Choices are kept as raw JSON until decoded.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardRow {
    pub id: i64,
    pub deck_id: i64,
    pub creator_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub text: String,
    pub choice1: serde_json::Value,
    pub choice2: serde_json::Value,
    pub submission_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Who wrote a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum CardAuthor {
    Creator(i64),
    Admin(i64),
}

impl CardAuthor {
    pub fn creator_id(&self) -> Option<i64> {
        match self {
            CardAuthor::Creator(id) => Some(*id),
            CardAuthor::Admin(_) => None,
        }
    }

    pub fn admin_id(&self) -> Option<i64> {
        match self {
            CardAuthor::Admin(id) => Some(*id),
            CardAuthor::Creator(_) => None,
        }
    }
}

/// A card with typed choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: i64,
    pub deck_id: i64,
    pub author: CardAuthor,
    pub text: String,
    pub choice1: Choice,
    pub choice2: Choice,
    pub submission_order: i32,
    pub created_at: DateTime<Utc>,
}

fn decode_choice(card_id: i64, column: &str, value: serde_json::Value) -> Result<Choice, DeckError> {
    serde_json::from_value(value).map_err(|e| {
        DeckError::DataIntegrity(format!(
            "card {} has an undecodable {}: {}",
            card_id, column, e
        ))
    })
}

impl TryFrom<CardRow> for Card {
    type Error = DeckError;

    fn try_from(row: CardRow) -> Result<Self, Self::Error> {
        let author = match (row.creator_id, row.admin_id) {
            (Some(creator_id), None) => CardAuthor::Creator(creator_id),
            (None, Some(admin_id)) => CardAuthor::Admin(admin_id),
            _ => {
                return Err(DeckError::DataIntegrity(format!(
                    "card {} must have exactly one author",
                    row.id
                )))
            }
        };

        Ok(Self {
            choice1: decode_choice(row.id, "choice1", row.choice1)?,
            choice2: decode_choice(row.id, "choice2", row.choice2)?,
            id: row.id,
            deck_id: row.deck_id,
            author,
            text: row.text,
            submission_order: row.submission_order,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Random assignment
// ============================================================================

/// Persisted (deck, creator) -> card binding.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RandomAssignmentRow {
    pub deck_id: i64,
    pub creator_id: i64,
    pub card_id: i64,
    pub assigned_at: DateTime<Utc>,
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err("Gender must be one of: male, female, other"),
        }
    }
}

/// Creator database row.
#[derive(Clone, sqlx::FromRow)]
pub struct CreatorRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub gender: String,
    pub birth_date: NaiveDate,
    pub warn_count: i32,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for CreatorRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatorRow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &"[REDACTED]")
            .field("password_hash", &"[REDACTED]")
            .field("gender", &self.gender)
            .field("warn_count", &self.warn_count)
            .finish_non_exhaustive()
    }
}

/// Admin database row.
#[derive(Clone, sqlx::FromRow)]
pub struct AdminRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for AdminRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminRow")
            .field("id", &self.id)
            .field("email", &"[REDACTED]")
            .field("password_hash", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Requests
// ============================================================================

/// POST /api/v1/auth/login
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

/// POST /api/v1/creators
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterCreatorRequest {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub gender: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
}

/// POST /api/v1/admins
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAdminRequest {
    pub email: String,
    pub password: SecretString,
    pub display_name: String,
}

/// POST /api/v1/decks
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDeckRequest {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub card_capacity: i32,
}

/// PATCH /api/v1/decks/{id}
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDeckRequest {
    pub title: String,
    pub end_date: NaiveDate,
    pub card_capacity: i32,
}

/// PATCH /api/v1/decks/{id}/status
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionStatusRequest {
    pub status: DeckStatus,
}

/// POST /api/v1/decks/{id}/cards
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitCardRequest {
    pub text: String,
    pub choice1: Choice,
    pub choice2: Choice,
}

impl SubmitCardRequest {
    /// Validate card text and both choices.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), &'static str> {
        let text_len = self.text.trim().chars().count();
        if text_len < MIN_CARD_TEXT_CHARS {
            return Err("Card text must be at least 50 characters");
        }
        if text_len > MAX_CARD_TEXT_CHARS {
            return Err("Card text must be at most 280 characters");
        }
        self.choice1.validate()?;
        self.choice2.validate()?;
        Ok(())
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Health check response.
///
/// Returned by the `/api/v1/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: common::types::Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

impl From<AdminRow> for AdminResponse {
    fn from(row: AdminRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckResponse {
    pub id: i64,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub card_capacity: i32,
    pub like_count: i64,
    pub status: DeckStatus,
    pub card_count: i64,
    /// Computed at read time; independent of `status`.
    pub playable: bool,
}

impl DeckResponse {
    pub fn new(summary: &DeckSummary, playable: bool) -> Self {
        let deck = &summary.deck;
        Self {
            id: deck.id,
            title: deck.title.clone(),
            start_date: deck.start_date,
            end_date: deck.end_date,
            card_capacity: deck.card_capacity,
            like_count: deck.like_count,
            status: deck.status,
            card_count: summary.card_count,
            playable,
        }
    }
}

/// GET /api/v1/decks
///
/// Groups absent from the caller's view are omitted entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckListResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<Vec<DeckResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wip: Option<Vec<DeckResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<Vec<DeckResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playable: Option<Vec<DeckResponse>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransitionResponse {
    pub id: i64,
    pub status: DeckStatus,
    /// False when the deck already had the requested status.
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub id: i64,
    pub like_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardResponse {
    pub id: i64,
    pub deck_id: i64,
    pub author: CardAuthor,
    pub text: String,
    pub choice1: Choice,
    pub choice2: Choice,
    pub submission_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            deck_id: card.deck_id,
            author: card.author,
            text: card.text,
            choice1: card.choice1,
            choice2: card.choice2,
            submission_order: card.submission_order,
            created_at: card.created_at,
        }
    }
}

/// A deck and the cards visible to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct DeckCardsResponse {
    pub deck: DeckResponse,
    pub cards: Vec<CardResponse>,
}
