use super::*;
use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use shared::domain::{LogicalKey, ProcessId};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Messenger unit double that accepts every data item and mints a fresh
/// message id for it.
async fn spawn_messenger_unit() -> String {
    let app = Router::new().route(
        "/",
        post(|| async { Json(json!({ "id": Uuid::new_v4().to_string() })) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock mu");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Fetcher double scripted per logical key. The last scripted step for a
/// key is sticky; keys with no script stay pending.
struct KeyedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Fetched>>>,
}

impl KeyedFetcher {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
        }
    }

    async fn set(&self, key: &str, steps: Vec<Fetched>) {
        self.scripts
            .lock()
            .await
            .insert(key.to_string(), steps.into());
    }

    async fn ready(&self, key: &str, value: Value) {
        self.set(key, vec![Fetched::Ready(value)]).await;
    }

    async fn pending(&self, key: &str) {
        self.set(key, Vec::new()).await;
    }
}

#[async_trait]
impl StateFetcher for KeyedFetcher {
    async fn fetch(&self, target: &PollTarget) -> Result<Fetched, FetchError> {
        let mut scripts = self.scripts.lock().await;
        let Some(steps) = scripts.get_mut(&target.key.0) else {
            return Ok(Fetched::Pending);
        };
        match steps.len() {
            0 => Ok(Fetched::Pending),
            1 => Ok(steps.front().cloned().unwrap_or(Fetched::Pending)),
            _ => Ok(steps.pop_front().unwrap_or(Fetched::Pending)),
        }
    }
}

fn fast_budgets() -> PollBudgets {
    PollBudgets {
        profile: PollBudget::new(4, Duration::from_millis(5)),
        app_data: PollBudget::new(4, Duration::from_millis(5)),
        suggestion: PollBudget::new(4, Duration::from_millis(5)),
    }
}

async fn connected_client(fetcher: Arc<KeyedFetcher>) -> Arc<WellnessClient> {
    let transport = MessengerTransport::new(
        spawn_messenger_unit().await,
        ProcessId::from("proc-1"),
        Arc::new(DevWalletSigner::new("wallet-1")),
    );
    WellnessClient::new_with_budgets(transport, fetcher, fast_budgets())
}

fn complete_profile_json() -> Value {
    json!({
        "wallet_address": "wallet-1",
        "registration_date": 1_700_000_000_000_i64,
        "age": 30,
        "gender": "male",
        "fitness_level": "beginner",
        "goal": "strength",
        "weight": 80,
        "height": 180,
    })
}

fn incomplete_profile_json() -> Value {
    json!({
        "wallet_address": "wallet-1",
        "registration_date": 1_700_000_000_000_i64,
    })
}

async fn seed_app_data(fetcher: &KeyedFetcher) {
    fetcher
        .ready(
            "wallet-1-workouts",
            json!([{ "type": "cardio", "duration_minutes": 25, "date": 1 }]),
        )
        .await;
    fetcher
        .ready(
            "wallet-1-nutrition",
            json!([{ "food_item": "oats", "calories": 320, "date": 1 }]),
        )
        .await;
    fetcher
        .ready(
            "wallet-1-suggestion",
            json!([{ "name": "Plank", "details": "3x60s" }]),
        )
        .await;
    fetcher
        .ready(
            "wallet-1-checkins",
            json!({ "2026-03-01": { "mood": 4, "sleep_hours": 7.0, "activity_minutes": 20, "date": 1 } }),
        )
        .await;
    fetcher
        .ready(
            "wallet-1-notifications",
            json!([{ "id": "n1", "message": "hi", "timestamp": 1, "type": "insight" }]),
        )
        .await;
}

async fn next_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel open")
}

async fn wait_for_categories(rx: &mut broadcast::Receiver<ClientEvent>, expected: usize) {
    let mut seen = HashSet::new();
    while seen.len() < expected {
        if let ClientEvent::AppDataUpdated { category } = next_event(rx).await {
            seen.insert(category);
        }
    }
}

async fn wait_for_next_action(rx: &mut broadcast::Receiver<ClientEvent>) -> NextAction {
    loop {
        if let ClientEvent::NextAction(action) = next_event(rx).await {
            return action;
        }
    }
}

#[tokio::test]
async fn complete_profile_routes_to_dashboard_and_loads_every_category() {
    let fetcher = Arc::new(KeyedFetcher::new());
    fetcher.ready("wallet-1", complete_profile_json()).await;
    seed_app_data(&fetcher).await;

    let client = connected_client(Arc::clone(&fetcher)).await;
    let mut rx = client.subscribe_events();

    let stage = client.connect().await.expect("connect succeeds");
    assert_eq!(stage, ProfileStage::Complete);
    assert_eq!(wait_for_next_action(&mut rx).await, NextAction::ShowDashboard);
    wait_for_categories(&mut rx, Category::APP_DATA.len()).await;

    let profile = client.profile().await.expect("profile stored");
    assert_eq!(profile.wallet_address, WalletAddress::from("wallet-1"));

    let data = client.app_data().await;
    assert_eq!(data.workouts.len(), 1);
    assert_eq!(data.nutrition_logs.len(), 1);
    assert_eq!(data.check_ins.len(), 1);
    assert_eq!(data.notifications.len(), 1);
    let suggestion = data.suggestion.expect("suggestion stored");
    assert_eq!(suggestion.exercises[0].name, "Plank");
}

#[tokio::test]
async fn missing_profile_routes_to_registration() {
    let fetcher = Arc::new(KeyedFetcher::new());

    let client = connected_client(Arc::clone(&fetcher)).await;
    let mut rx = client.subscribe_events();

    let stage = client.connect().await.expect("connect succeeds");
    assert_eq!(stage, ProfileStage::Absent);
    assert_eq!(client.profile_stage().await, ProfileStage::Absent);
    assert_eq!(
        wait_for_next_action(&mut rx).await,
        NextAction::ShowRegistration
    );
    assert!(client.profile().await.is_none());
    assert_eq!(client.app_data().await, AppData::default());
}

#[tokio::test]
async fn connect_without_wallet_reports_missing_credential() {
    let transport = MessengerTransport::new(
        spawn_messenger_unit().await,
        ProcessId::from("proc-1"),
        Arc::new(MissingWalletSigner),
    );
    let client = WellnessClient::new_with_budgets(
        transport,
        Arc::new(KeyedFetcher::new()),
        fast_budgets(),
    );

    let err = client.connect().await.expect_err("must fail");
    assert!(matches!(err, SubmitError::CredentialUnavailable));
}

#[tokio::test]
async fn incomplete_profile_routes_to_setup_once_then_to_dashboard() {
    let fetcher = Arc::new(KeyedFetcher::new());
    fetcher.ready("wallet-1", incomplete_profile_json()).await;
    seed_app_data(&fetcher).await;

    let client = connected_client(Arc::clone(&fetcher)).await;
    let mut rx = client.subscribe_events();

    let stage = client.connect().await.expect("connect succeeds");
    assert_eq!(stage, ProfileStage::Incomplete);
    assert_eq!(
        wait_for_next_action(&mut rx).await,
        NextAction::CompleteProfileSetup
    );

    // The remote snapshot still lags behind the saved setup data, but a
    // finished setup must not loop the user back into the form.
    let update = RegisterProfile {
        age: 30,
        gender: "male".into(),
        fitness_level: "beginner".into(),
        goal: "strength".into(),
        weight: 80,
        height: 180,
    };
    let stage = client.update_profile(&update).await.expect("update succeeds");
    assert_eq!(stage, ProfileStage::Incomplete);
    assert_eq!(wait_for_next_action(&mut rx).await, NextAction::ShowDashboard);
    wait_for_categories(&mut rx, Category::APP_DATA.len()).await;
}

#[tokio::test]
async fn newer_category_poll_supersedes_a_slower_one() {
    let fetcher = Arc::new(KeyedFetcher::new());
    fetcher
        .set(
            "slow-key",
            vec![
                Fetched::Pending,
                Fetched::Pending,
                Fetched::Ready(json!([{ "type": "stale", "duration_minutes": 1, "date": 1 }])),
            ],
        )
        .await;
    fetcher
        .ready(
            "fast-key",
            json!([{ "type": "fresh", "duration_minutes": 2, "date": 2 }]),
        )
        .await;

    let client = connected_client(Arc::clone(&fetcher)).await;
    let budget = PollBudget::new(6, Duration::from_millis(10));
    client
        .spawn_category_poll(
            Category::Workouts,
            PollTarget {
                message_id: MessageId::from("msg-slow"),
                key: LogicalKey::from("slow-key"),
            },
            budget,
        )
        .await;
    client
        .spawn_category_poll(
            Category::Workouts,
            PollTarget {
                message_id: MessageId::from("msg-fast"),
                key: LogicalKey::from("fast-key"),
            },
            budget,
        )
        .await;

    // Give both polls time to finish, the stale one included.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let data = client.app_data().await;
    assert_eq!(data.workouts.len(), 1);
    assert_eq!(data.workouts[0].kind, "fresh");
}

#[tokio::test]
async fn one_malformed_category_does_not_block_the_others() {
    let fetcher = Arc::new(KeyedFetcher::new());
    fetcher.ready("wallet-1", complete_profile_json()).await;
    seed_app_data(&fetcher).await;
    // Workouts never yields a decodable payload.
    fetcher.ready("wallet-1-workouts", json!("garbage")).await;

    let client = connected_client(Arc::clone(&fetcher)).await;
    let mut rx = client.subscribe_events();

    client.connect().await.expect("connect succeeds");
    wait_for_categories(&mut rx, Category::APP_DATA.len() - 1).await;

    let data = client.app_data().await;
    assert!(data.workouts.is_empty());
    assert_eq!(data.nutrition_logs.len(), 1);
    assert_eq!(data.notifications.len(), 1);
}

#[tokio::test]
async fn exhausted_refresh_keeps_the_previous_snapshot() {
    let fetcher = Arc::new(KeyedFetcher::new());
    fetcher.ready("wallet-1", complete_profile_json()).await;
    seed_app_data(&fetcher).await;

    let client = connected_client(Arc::clone(&fetcher)).await;
    let mut rx = client.subscribe_events();
    client.connect().await.expect("connect succeeds");
    wait_for_categories(&mut rx, Category::APP_DATA.len()).await;

    // The refreshed suggestion never materializes; the old one must survive.
    fetcher.pending("wallet-1-suggestion").await;
    client.request_new_workout().await.expect("refresh submits");
    tokio::time::sleep(Duration::from_millis(60)).await;

    let data = client.app_data().await;
    let suggestion = data.suggestion.expect("previous suggestion kept");
    assert_eq!(suggestion.exercises[0].name, "Plank");
}

#[tokio::test]
async fn disconnect_clears_session_state() {
    let fetcher = Arc::new(KeyedFetcher::new());
    fetcher.ready("wallet-1", complete_profile_json()).await;
    seed_app_data(&fetcher).await;

    let client = connected_client(Arc::clone(&fetcher)).await;
    let mut rx = client.subscribe_events();
    client.connect().await.expect("connect succeeds");
    wait_for_categories(&mut rx, Category::APP_DATA.len()).await;

    client.disconnect().await;
    assert!(client.profile().await.is_none());
    assert_eq!(client.profile_stage().await, ProfileStage::Unknown);
    assert_eq!(client.app_data().await, AppData::default());
}

#[tokio::test]
async fn logging_a_workout_refreshes_its_category() {
    let fetcher = Arc::new(KeyedFetcher::new());
    fetcher.ready("wallet-1", complete_profile_json()).await;
    seed_app_data(&fetcher).await;

    let client = connected_client(Arc::clone(&fetcher)).await;
    let mut rx = client.subscribe_events();
    client.connect().await.expect("connect succeeds");
    wait_for_categories(&mut rx, Category::APP_DATA.len()).await;

    fetcher
        .ready(
            "wallet-1-workouts",
            json!([
                { "type": "cardio", "duration_minutes": 25, "date": 1 },
                { "type": "strength", "duration_minutes": 40, "date": 2 },
            ]),
        )
        .await;
    client
        .log_workout(&LogWorkoutRequest {
            kind: "strength".into(),
            duration_minutes: 40,
        })
        .await
        .expect("log succeeds");
    wait_for_categories(&mut rx, 1).await;

    assert_eq!(client.app_data().await.workouts.len(), 2);
}
