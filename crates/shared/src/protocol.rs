use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::WalletAddress;

/// One name/value pair attached to an action message. Order matters and
/// duplicate names are allowed; the remote process resolves precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Processed result for a submitted message, as the compute unit returns it.
/// An empty `Messages` sequence means the process has not committed a
/// response yet; that is "pending", not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "Messages", default)]
    pub messages: Vec<ResultMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMessage {
    #[serde(rename = "Data", default)]
    pub data: Option<String>,
    #[serde(rename = "Tags", default)]
    pub tags: Vec<Tag>,
}

/// Profile record as the remote process stores it, snake_case on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub wallet_address: WalletAddress,
    #[serde(default)]
    pub registration_date: i64,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub fitness_level: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub height: u32,
}

impl UserProfile {
    /// A registered profile with a zero age, height or weight was never
    /// filled in and routes to the setup flow instead of the dashboard.
    pub fn is_complete(&self) -> bool {
        self.age != 0 && self.height != 0 && self.weight != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    #[serde(rename = "type")]
    pub kind: String,
    pub duration_minutes: u32,
    pub date: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionEntry {
    pub food_item: String,
    pub calories: u32,
    pub date: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub details: String,
}

/// A workout suggestion arrives in one of two shapes: the plain exercise
/// array of early agent versions, or the enriched object newer versions emit.
/// The enriched shape is recognized by the presence of both `exercises` and
/// `aiInsights`; anything else falls through to the flat form. Decoded once
/// at the boundary, never re-inspected downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestionPayload {
    Enriched {
        exercises: Vec<Exercise>,
        #[serde(rename = "aiInsights")]
        ai_insights: Value,
        #[serde(rename = "personalizationScore", default)]
        personalization_score: Option<f64>,
        #[serde(rename = "recommendedTime", default)]
        recommended_time: Option<String>,
        #[serde(rename = "difficultyLevel", default)]
        difficulty_level: Option<String>,
    },
    Flat(Vec<Exercise>),
}

impl SuggestionPayload {
    pub fn exercises(&self) -> &[Exercise] {
        match self {
            SuggestionPayload::Enriched { exercises, .. } => exercises,
            SuggestionPayload::Flat(exercises) => exercises,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Insight,
    HealthAlert,
    WorkoutReminder,
    #[serde(other)]
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
    #[serde(rename = "type", default)]
    pub kind: Option<NotificationKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCheckIn {
    pub mood: u8,
    pub sleep_hours: f32,
    pub activity_minutes: u32,
    #[serde(default)]
    pub notes: String,
    pub date: i64,
}

/// Check-in history keyed by `YYYY-MM-DD` date keys, oldest first.
pub type CheckInHistory = BTreeMap<String, DailyCheckIn>;

/// Body of a `Register` or `UpdateProfile` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterProfile {
    pub age: u32,
    pub gender: String,
    pub fitness_level: String,
    pub goal: String,
    pub weight: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogWorkoutRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogNutritionRequest {
    pub food_item: String,
    pub calories: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogCheckInRequest {
    pub mood: u8,
    pub sleep_hours: f32,
    pub activity_minutes: u32,
    pub notes: String,
    pub date: i64,
}

impl LogCheckInRequest {
    pub fn for_today(mood: u8, sleep_hours: f32, activity_minutes: u32, notes: String) -> Self {
        Self {
            mood,
            sleep_hours,
            activity_minutes,
            notes,
            date: Utc::now().timestamp_millis(),
        }
    }
}
