use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::Category,
    protocol::{
        CheckInHistory, Exercise, Notification, NutritionEntry, SuggestionPayload, UserProfile,
        Workout,
    },
};

/// Classification of a materialized profile.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileStatus {
    Complete(UserProfile),
    Incomplete(UserProfile),
}

pub fn classify_profile(profile: UserProfile) -> ProfileStatus {
    if profile.is_complete() {
        ProfileStatus::Complete(profile)
    } else {
        ProfileStatus::Incomplete(profile)
    }
}

/// UI-facing transition decided by the reconciler. User-visible failure is
/// always one of these defined states, never a raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ShowRegistration,
    CompleteProfileSetup,
    ShowDashboard,
}

/// Normalized workout suggestion. Both wire shapes collapse into this;
/// enrichment survives when the agent provided it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkoutSuggestion {
    pub exercises: Vec<Exercise>,
    pub ai_insights: Option<Value>,
    pub personalization_score: Option<f64>,
    pub recommended_time: Option<String>,
    pub difficulty_level: Option<String>,
}

impl From<SuggestionPayload> for WorkoutSuggestion {
    fn from(payload: SuggestionPayload) -> Self {
        match payload {
            SuggestionPayload::Enriched {
                exercises,
                ai_insights,
                personalization_score,
                recommended_time,
                difficulty_level,
            } => Self {
                exercises,
                ai_insights: Some(ai_insights),
                personalization_score,
                recommended_time,
                difficulty_level,
            },
            SuggestionPayload::Flat(exercises) => Self {
                exercises,
                ..Self::default()
            },
        }
    }
}

/// One category's normalized result. The reducer merges exactly one of
/// these at a time; categories never invalidate each other.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryUpdate {
    Workouts(Vec<Workout>),
    Nutrition(Vec<NutritionEntry>),
    Suggestion(WorkoutSuggestion),
    CheckIns(CheckInHistory),
    Notifications(Vec<Notification>),
}

impl CategoryUpdate {
    pub fn category(&self) -> Category {
        match self {
            CategoryUpdate::Workouts(_) => Category::Workouts,
            CategoryUpdate::Nutrition(_) => Category::Nutrition,
            CategoryUpdate::Suggestion(_) => Category::Suggestion,
            CategoryUpdate::CheckIns(_) => Category::CheckIns,
            CategoryUpdate::Notifications(_) => Category::Notifications,
        }
    }
}

/// Per-category state container. Each poll commits its own category and
/// nothing else, so partial completion is always a valid state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppData {
    pub workouts: Vec<Workout>,
    pub nutrition_logs: Vec<NutritionEntry>,
    pub suggestion: Option<WorkoutSuggestion>,
    pub check_ins: CheckInHistory,
    pub notifications: Vec<Notification>,
}

impl AppData {
    pub fn apply(&mut self, update: CategoryUpdate) {
        match update {
            CategoryUpdate::Workouts(workouts) => self.workouts = workouts,
            CategoryUpdate::Nutrition(entries) => self.nutrition_logs = entries,
            CategoryUpdate::Suggestion(suggestion) => self.suggestion = Some(suggestion),
            CategoryUpdate::CheckIns(history) => self.check_ins = history,
            CategoryUpdate::Notifications(notifications) => self.notifications = notifications,
        }
    }

    pub fn unread_notifications(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

/// Decodes one category's raw payload into its normalized update. Runs
/// inside the polling loop, so a malformed payload surfaces as a decode
/// error the loop treats as pending. The profile has its own decode path.
pub fn parse_category(category: Category, payload: &Value) -> Result<CategoryUpdate, serde_json::Error> {
    match category {
        Category::Profile => Err(serde_json::Error::custom(
            "profile payloads are reconciled through the profile flow",
        )),
        Category::Workouts => Ok(CategoryUpdate::Workouts(serde_json::from_value(
            payload.clone(),
        )?)),
        Category::Nutrition => Ok(CategoryUpdate::Nutrition(serde_json::from_value(
            payload.clone(),
        )?)),
        Category::Suggestion => {
            let suggestion: SuggestionPayload = serde_json::from_value(payload.clone())?;
            Ok(CategoryUpdate::Suggestion(suggestion.into()))
        }
        Category::CheckIns => Ok(CategoryUpdate::CheckIns(serde_json::from_value(
            payload.clone(),
        )?)),
        Category::Notifications => Ok(CategoryUpdate::Notifications(serde_json::from_value(
            payload.clone(),
        )?)),
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
