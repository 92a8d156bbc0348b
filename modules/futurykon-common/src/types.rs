use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    Yes,
    No,
}

impl ResolutionStatus {
    /// Realized binary outcome, if the question has been resolved.
    pub fn outcome(&self) -> Option<bool> {
        match self {
            ResolutionStatus::Pending => None,
            ResolutionStatus::Yes => Some(true),
            ResolutionStatus::No => Some(false),
        }
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionStatus::Pending => write!(f, "pending"),
            ResolutionStatus::Yes => write!(f, "yes"),
            ResolutionStatus::No => write!(f, "no"),
        }
    }
}

/// Outcome an admin records when resolving a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Yes,
    No,
}

impl From<Outcome> for ResolutionStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Yes => ResolutionStatus::Yes,
            Outcome::No => ResolutionStatus::No,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Agi,
    LanguageModels,
    Robotics,
    Medicine,
    AutonomousVehicles,
    Business,
    Regulation,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Agi,
        Category::LanguageModels,
        Category::Robotics,
        Category::Medicine,
        Category::AutonomousVehicles,
        Category::Business,
        Category::Regulation,
        Category::Other,
    ];

    /// Display label shown to the (Polish-speaking) community.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Agi => "AGI i Superinteligencja",
            Category::LanguageModels => "Modele językowe",
            Category::Robotics => "Robotyka",
            Category::Medicine => "AI w medycynie",
            Category::AutonomousVehicles => "Autonomiczne pojazdy",
            Category::Business => "AI w biznesie",
            Category::Regulation => "Regulacje AI",
            Category::Other => "Inne",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

// --- Identity ---

/// Display fields joined onto a user's predictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDisplay {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl UserDisplay {
    /// Display name, falling back to email, then to an anonymous label.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Anonim")
    }
}

/// Who is acting. Passed explicitly into every operation that needs it;
/// nothing in the workspace reads identity from ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
    pub display: Option<UserDisplay>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            is_admin: false,
            display: None,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            is_admin: true,
            display: None,
        }
    }

    pub fn with_display(mut self, display: UserDisplay) -> Self {
        self.display = Some(display);
        self
    }
}

// --- Domain records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub resolution_criteria: String,
    pub category: Category,
    pub close_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub resolution_status: ResolutionStatus,
    pub resolution_date: Option<DateTime<Utc>>,
    pub author_id: Option<Uuid>,
}

impl Question {
    /// A question stops accepting predictions once its close date has passed,
    /// whether or not it has been resolved.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.close_date < now
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution_status != ResolutionStatus::Pending
    }
}

/// One immutable prediction event. An "update" is a new `Prediction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    /// Event-store sequence number of the fact that recorded this prediction.
    /// Breaks ties between predictions sharing a timestamp.
    pub seq: i64,
    pub question_id: Uuid,
    pub user_id: Uuid,
    /// Percentage in [0, 100].
    pub probability: f64,
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_display: Option<UserDisplay>,
}

impl Prediction {
    /// Total order used wherever "latest" matters: timestamp, then store
    /// sequence, then id.
    pub fn version_key(&self) -> (DateTime<Utc>, i64, Uuid) {
        (self.created_at, self.seq, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSuggestion {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub close_date: DateTime<Utc>,
    pub suggested_by: Uuid,
    pub status: SuggestionStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
}
