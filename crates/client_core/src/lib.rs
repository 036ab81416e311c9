use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::{
    domain::{Action, Category, MessageId, WalletAddress},
    protocol::{
        LogCheckInRequest, LogNutritionRequest, LogWorkoutRequest, RegisterProfile, UserProfile,
    },
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

pub mod error;
pub mod fetch;
pub mod poll;
pub mod reconcile;
pub mod transport;

pub use error::{FetchError, SubmitError};
pub use fetch::{CacheStateFetcher, Fetched, MessageResultFetcher, PollTarget, StateFetcher};
pub use poll::{poll_until_decoded, poll_until_ready, PollBudget, PollOutcome};
pub use reconcile::{
    classify_profile, parse_category, AppData, CategoryUpdate, NextAction, ProfileStatus,
    WorkoutSuggestion,
};
pub use transport::{
    DataItemDraft, DevWalletSigner, MessengerTransport, MissingWalletSigner, WalletSigner,
};

/// Profile creation settles slower than the cached-read categories, so it
/// gets the longest budget.
pub const PROFILE_POLL_BUDGET: PollBudget = PollBudget::new(8, Duration::from_millis(1500));
pub const APP_DATA_POLL_BUDGET: PollBudget = PollBudget::new(5, Duration::from_millis(1000));
pub const SUGGESTION_POLL_BUDGET: PollBudget = PollBudget::new(6, Duration::from_millis(2000));

/// Where the profile flow currently stands for the active identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileStage {
    #[default]
    Unknown,
    Loading,
    Complete,
    Incomplete,
    Absent,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    ProfileStageChanged(ProfileStage),
    ProfileLoaded(UserProfile),
    NextAction(NextAction),
    AppDataUpdated { category: Category },
    Error(String),
}

/// Retry budgets per flow, overridable for deployments with different
/// settlement latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudgets {
    pub profile: PollBudget,
    pub app_data: PollBudget,
    pub suggestion: PollBudget,
}

impl Default for PollBudgets {
    fn default() -> Self {
        Self {
            profile: PROFILE_POLL_BUDGET,
            app_data: APP_DATA_POLL_BUDGET,
            suggestion: SUGGESTION_POLL_BUDGET,
        }
    }
}

struct CategoryPoll {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct ClientState {
    address: Option<WalletAddress>,
    profile: Option<UserProfile>,
    profile_stage: ProfileStage,
    app_data: AppData,
    setup_completed_this_session: bool,
    category_polls: HashMap<Category, CategoryPoll>,
}

/// Client for the remote wellness agent. Submits signed action messages,
/// polls for their eventually-consistent results, and reconciles whatever
/// comes back into per-category session state.
pub struct WellnessClient {
    transport: MessengerTransport,
    fetcher: Arc<dyn StateFetcher>,
    budgets: PollBudgets,
    inner: Mutex<ClientState>,
    events: broadcast::Sender<ClientEvent>,
}

impl WellnessClient {
    pub fn new(transport: MessengerTransport, fetcher: Arc<dyn StateFetcher>) -> Arc<Self> {
        Self::new_with_budgets(transport, fetcher, PollBudgets::default())
    }

    pub fn new_with_budgets(
        transport: MessengerTransport,
        fetcher: Arc<dyn StateFetcher>,
        budgets: PollBudgets,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            transport,
            fetcher,
            budgets,
            inner: Mutex::new(ClientState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.inner.lock().await.profile.clone()
    }

    pub async fn profile_stage(&self) -> ProfileStage {
        self.inner.lock().await.profile_stage
    }

    pub async fn app_data(&self) -> AppData {
        self.inner.lock().await.app_data.clone()
    }

    /// Adopts the signer's identity and loads the profile. Switching to a
    /// different wallet drops every session-scoped flag and supersedes all
    /// in-flight polls; nothing from the previous identity may leak through.
    pub async fn connect(self: &Arc<Self>) -> Result<ProfileStage, SubmitError> {
        let address = self
            .transport
            .address()
            .ok_or(SubmitError::CredentialUnavailable)?;

        {
            let mut guard = self.inner.lock().await;
            if guard.address.as_ref() != Some(&address) {
                for (_, poll) in guard.category_polls.drain() {
                    poll.task.abort();
                }
                guard.profile = None;
                guard.profile_stage = ProfileStage::Unknown;
                guard.app_data = AppData::default();
                guard.setup_completed_this_session = false;
                guard.address = Some(address.clone());
            }
        }

        info!(address = %address, "wallet connected");
        self.load_user_profile().await
    }

    pub async fn disconnect(&self) {
        let mut guard = self.inner.lock().await;
        for (_, poll) in guard.category_polls.drain() {
            poll.task.abort();
        }
        *guard = ClientState::default();
    }

    /// Fires `GetProfile` and polls for the materialized profile, then
    /// decides the follow-up flow: dashboard, setup completion, or
    /// registration. Exhaustion here means "not registered yet", a defined
    /// fallback rather than a failure.
    pub async fn load_user_profile(self: &Arc<Self>) -> Result<ProfileStage, SubmitError> {
        let address = self.active_address().await?;
        self.set_profile_stage(ProfileStage::Loading).await;

        let message_id = self.transport.submit(Action::GetProfile, &[], "").await?;
        let target = self.target(&address, Category::Profile, message_id);
        let outcome = poll_until_decoded(
            self.fetcher.as_ref(),
            &target,
            self.budgets.profile,
            |value| serde_json::from_value::<UserProfile>(value.clone()),
        )
        .await;

        let stage = match outcome {
            PollOutcome::Ready(profile) => match classify_profile(profile) {
                ProfileStatus::Complete(profile) => {
                    self.store_profile(profile, ProfileStage::Complete).await;
                    self.emit(ClientEvent::NextAction(NextAction::ShowDashboard));
                    self.load_app_data().await;
                    ProfileStage::Complete
                }
                ProfileStatus::Incomplete(profile) => {
                    let setup_done = self.inner.lock().await.setup_completed_this_session;
                    self.store_profile(profile, ProfileStage::Incomplete).await;
                    if setup_done {
                        // Setup already went through this session; the remote
                        // snapshot is just lagging. Don't send the user back
                        // into the form.
                        self.emit(ClientEvent::NextAction(NextAction::ShowDashboard));
                        self.load_app_data().await;
                    } else {
                        self.emit(ClientEvent::NextAction(NextAction::CompleteProfileSetup));
                    }
                    ProfileStage::Incomplete
                }
            },
            PollOutcome::Exhausted => {
                info!(address = %address, "no profile materialized; treating wallet as unregistered");
                self.set_profile_stage(ProfileStage::Absent).await;
                self.emit(ClientEvent::NextAction(NextAction::ShowRegistration));
                ProfileStage::Absent
            }
        };

        Ok(stage)
    }

    /// Kicks off the app-data fan-out: one fetch action plus one independent
    /// polling task per category. Categories complete in any order and a
    /// failure in one never blocks the others.
    pub async fn load_app_data(self: &Arc<Self>) {
        for category in Category::APP_DATA {
            if let Err(err) = self.refresh_category(category, self.budgets.app_data).await {
                warn!(category = %category, error = %err, "category refresh failed");
                self.emit(ClientEvent::Error(format!(
                    "failed to refresh {category}: {err}"
                )));
            }
        }
    }

    /// Asks the agent for a fresh workout suggestion, superseding any
    /// suggestion poll still in flight.
    pub async fn request_new_workout(self: &Arc<Self>) -> Result<(), SubmitError> {
        self.refresh_category(Category::Suggestion, self.budgets.suggestion)
            .await
    }

    /// Registers a new profile, then reloads it. The agent commits the
    /// profile asynchronously, so the reload goes through the same polling
    /// path as a cold start.
    pub async fn register(
        self: &Arc<Self>,
        profile: &RegisterProfile,
    ) -> Result<ProfileStage, SubmitError> {
        let data = encode_payload(profile)?;
        self.transport.submit(Action::Register, &[], &data).await?;
        self.load_user_profile().await
    }

    /// Saves setup-form data and reloads the profile. Marks setup as done
    /// for this session so a lagging remote snapshot cannot bounce the user
    /// straight back into the form.
    pub async fn update_profile(
        self: &Arc<Self>,
        profile: &RegisterProfile,
    ) -> Result<ProfileStage, SubmitError> {
        let data = encode_payload(profile)?;
        self.transport
            .submit(Action::UpdateProfile, &[], &data)
            .await?;
        self.inner.lock().await.setup_completed_this_session = true;
        self.load_user_profile().await
    }

    pub async fn log_workout(
        self: &Arc<Self>,
        entry: &LogWorkoutRequest,
    ) -> Result<(), SubmitError> {
        let data = encode_payload(entry)?;
        self.transport.submit(Action::LogWorkout, &[], &data).await?;
        self.refresh_category(Category::Workouts, self.budgets.app_data)
            .await
    }

    pub async fn log_nutrition(
        self: &Arc<Self>,
        entry: &LogNutritionRequest,
    ) -> Result<(), SubmitError> {
        let data = encode_payload(entry)?;
        self.transport
            .submit(Action::LogNutrition, &[], &data)
            .await?;
        self.refresh_category(Category::Nutrition, self.budgets.app_data)
            .await
    }

    pub async fn log_daily_check_in(
        self: &Arc<Self>,
        entry: &LogCheckInRequest,
    ) -> Result<(), SubmitError> {
        let data = encode_payload(entry)?;
        self.transport
            .submit(Action::LogDailyCheckIn, &[], &data)
            .await?;
        self.refresh_category(Category::CheckIns, self.budgets.app_data)
            .await
    }

    pub async fn mark_notifications_read(self: &Arc<Self>) -> Result<(), SubmitError> {
        self.transport
            .submit(Action::MarkNotificationsRead, &[], "")
            .await?;
        self.refresh_category(Category::Notifications, self.budgets.app_data)
            .await
    }

    /// Submits the category's fetch action and spawns a superseding poll for
    /// its snapshot.
    async fn refresh_category(
        self: &Arc<Self>,
        category: Category,
        budget: PollBudget,
    ) -> Result<(), SubmitError> {
        let address = self.active_address().await?;
        let message_id = self
            .transport
            .submit(category.fetch_action(), &[], "")
            .await?;
        let target = self.target(&address, category, message_id);
        self.spawn_category_poll(category, target, budget).await;
        Ok(())
    }

    /// Spawns the polling task for one category, aborting any in-flight poll
    /// for the same category. The generation recorded here is re-checked at
    /// commit time so a late result from a superseded poll can never
    /// overwrite newer state.
    pub async fn spawn_category_poll(
        self: &Arc<Self>,
        category: Category,
        target: PollTarget,
        budget: PollBudget,
    ) {
        let mut guard = self.inner.lock().await;
        let generation = guard
            .category_polls
            .get(&category)
            .map_or(1, |poll| poll.generation + 1);
        if let Some(prior) = guard.category_polls.remove(&category) {
            prior.task.abort();
            info!(category = %category, generation, "superseding in-flight category poll");
        }

        let client = Arc::clone(self);
        let task = tokio::spawn(async move {
            client
                .run_category_poll(category, target, budget, generation)
                .await;
        });
        guard
            .category_polls
            .insert(category, CategoryPoll { generation, task });
    }

    async fn run_category_poll(
        self: Arc<Self>,
        category: Category,
        target: PollTarget,
        budget: PollBudget,
        generation: u64,
    ) {
        let outcome = poll_until_decoded(self.fetcher.as_ref(), &target, budget, |value| {
            parse_category(category, value)
        })
        .await;

        match outcome {
            PollOutcome::Ready(update) => {
                {
                    let mut guard = self.inner.lock().await;
                    let current = guard
                        .category_polls
                        .get(&category)
                        .map(|poll| poll.generation);
                    if current != Some(generation) {
                        info!(category = %category, generation, "dropping superseded poll result");
                        return;
                    }
                    guard.app_data.apply(update);
                }
                self.emit(ClientEvent::AppDataUpdated { category });
            }
            PollOutcome::Exhausted => {
                warn!(category = %category, "category poll exhausted; keeping previous state");
            }
        }
    }

    async fn active_address(&self) -> Result<WalletAddress, SubmitError> {
        self.inner
            .lock()
            .await
            .address
            .clone()
            .ok_or(SubmitError::CredentialUnavailable)
    }

    fn target(
        &self,
        address: &WalletAddress,
        category: Category,
        message_id: MessageId,
    ) -> PollTarget {
        PollTarget {
            message_id,
            key: category.logical_key(address),
        }
    }

    async fn store_profile(&self, profile: UserProfile, stage: ProfileStage) {
        {
            let mut guard = self.inner.lock().await;
            guard.profile = Some(profile.clone());
            guard.profile_stage = stage;
        }
        self.emit(ClientEvent::ProfileLoaded(profile));
        self.emit(ClientEvent::ProfileStageChanged(stage));
    }

    async fn set_profile_stage(&self, stage: ProfileStage) {
        self.inner.lock().await.profile_stage = stage;
        self.emit(ClientEvent::ProfileStageChanged(stage));
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

fn encode_payload<T: serde::Serialize>(payload: &T) -> Result<String, SubmitError> {
    serde_json::to_string(payload).map_err(|err| SubmitError::SubmissionFailed(err.into()))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
