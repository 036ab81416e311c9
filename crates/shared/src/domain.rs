use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(ProcessId);
id_newtype!(MessageId);
id_newtype!(WalletAddress);
id_newtype!(LogicalKey);

/// Action names the remote wellness process understands. Serialized with
/// their PascalCase wire spelling, matching the `Action` tag values the
/// process's handlers dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    GetProfile,
    UpdateProfile,
    Register,
    GetWorkouts,
    GetNutritionLogs,
    RequestWorkout,
    LogWorkout,
    LogNutrition,
    GetDailyCheckIns,
    LogDailyCheckIn,
    GetNotifications,
    MarkNotificationsRead,
    Eval,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::GetProfile => "GetProfile",
            Action::UpdateProfile => "UpdateProfile",
            Action::Register => "Register",
            Action::GetWorkouts => "GetWorkouts",
            Action::GetNutritionLogs => "GetNutritionLogs",
            Action::RequestWorkout => "RequestWorkout",
            Action::LogWorkout => "LogWorkout",
            Action::LogNutrition => "LogNutrition",
            Action::GetDailyCheckIns => "GetDailyCheckIns",
            Action::LogDailyCheckIn => "LogDailyCheckIn",
            Action::GetNotifications => "GetNotifications",
            Action::MarkNotificationsRead => "MarkNotificationsRead",
            Action::Eval => "Eval",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data categories the remote process materializes per identity. Each is
/// fetched and reconciled independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Profile,
    Workouts,
    Nutrition,
    Suggestion,
    CheckIns,
    Notifications,
}

impl Category {
    /// Categories fetched by the dashboard fan-out, profile excluded.
    pub const APP_DATA: [Category; 5] = [
        Category::Workouts,
        Category::Nutrition,
        Category::Suggestion,
        Category::CheckIns,
        Category::Notifications,
    ];

    /// Cache key suffix appended to the wallet address. The profile snapshot
    /// lives under the bare address.
    pub fn key_suffix(self) -> &'static str {
        match self {
            Category::Profile => "",
            Category::Workouts => "-workouts",
            Category::Nutrition => "-nutrition",
            Category::Suggestion => "-suggestion",
            Category::CheckIns => "-checkins",
            Category::Notifications => "-notifications",
        }
    }

    pub fn logical_key(self, address: &WalletAddress) -> LogicalKey {
        LogicalKey(format!("{}{}", address.0, self.key_suffix()))
    }

    /// The action that asks the remote process to (re)materialize this
    /// category's snapshot.
    pub fn fetch_action(self) -> Action {
        match self {
            Category::Profile => Action::GetProfile,
            Category::Workouts => Action::GetWorkouts,
            Category::Nutrition => Action::GetNutritionLogs,
            Category::Suggestion => Action::RequestWorkout,
            Category::CheckIns => Action::GetDailyCheckIns,
            Category::Notifications => Action::GetNotifications,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Profile => "profile",
            Category::Workouts => "workouts",
            Category::Nutrition => "nutrition",
            Category::Suggestion => "suggestion",
            Category::CheckIns => "check_ins",
            Category::Notifications => "notifications",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
