use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CacheStateFetcher, ClientEvent, DevWalletSigner, MessengerTransport, WellnessClient,
};
use shared::{
    domain::{Category, ProcessId},
    protocol::{LogCheckInRequest, LogNutritionRequest, LogWorkoutRequest, RegisterProfile},
};
use tokio::sync::broadcast;
use tracing::warn;

mod config;

const DASHBOARD_WAIT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(about = "Terminal client for an ao wellness agent")]
struct Cli {
    /// Overrides the wallet address from config for this invocation.
    #[arg(long)]
    wallet: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the profile and report where the flow lands.
    Profile,
    /// Load the profile plus every data category and print a summary.
    Dashboard,
    /// Register this wallet with the agent.
    Register {
        #[arg(long)]
        age: u32,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        fitness_level: String,
        #[arg(long)]
        goal: String,
        #[arg(long)]
        weight: u32,
        #[arg(long)]
        height: u32,
    },
    /// Fill in the measurements for an already registered wallet.
    Setup {
        #[arg(long)]
        age: u32,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        fitness_level: String,
        #[arg(long)]
        goal: String,
        #[arg(long)]
        weight: u32,
        #[arg(long)]
        height: u32,
    },
    /// Ask the agent for a fresh workout suggestion.
    Suggest,
    /// Record a completed workout.
    LogWorkout {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        minutes: u32,
    },
    /// Record a meal.
    LogNutrition {
        #[arg(long)]
        food: String,
        #[arg(long)]
        calories: u32,
    },
    /// Record today's check-in.
    CheckIn {
        #[arg(long)]
        mood: u8,
        #[arg(long)]
        sleep_hours: f32,
        #[arg(long)]
        activity_minutes: u32,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List notifications, optionally marking them read.
    Notifications {
        #[arg(long)]
        mark_read: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings();
    if let Some(wallet) = cli.wallet {
        settings.wallet_address = Some(wallet);
    }
    config::validate_settings(&settings)?;
    let Some(wallet) = settings.wallet_address.clone() else {
        bail!("no wallet address configured; pass --wallet or set wallet_address in wellness.toml");
    };

    let process_id = ProcessId::from(settings.process_id.clone());
    let transport = MessengerTransport::new(
        settings.messenger_unit_url.clone(),
        process_id.clone(),
        Arc::new(DevWalletSigner::new(wallet)),
    );
    let fetcher = Arc::new(CacheStateFetcher::new(
        settings.compute_unit_url.clone(),
        process_id,
    ));
    let client = WellnessClient::new(transport, fetcher);
    let mut events = client.subscribe_events();

    match cli.command {
        Command::Profile => {
            let stage = client.connect().await?;
            println!("profile stage: {stage:?}");
            if let Some(profile) = client.profile().await {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            }
        }
        Command::Dashboard => {
            client.connect().await?;
            wait_for_app_data(&mut events, Category::APP_DATA.len()).await;
            print_dashboard(&client).await?;
        }
        Command::Register {
            age,
            gender,
            fitness_level,
            goal,
            weight,
            height,
        } => {
            client.connect().await?;
            let stage = client
                .register(&RegisterProfile {
                    age,
                    gender,
                    fitness_level,
                    goal,
                    weight,
                    height,
                })
                .await?;
            println!("registered; profile stage: {stage:?}");
        }
        Command::Setup {
            age,
            gender,
            fitness_level,
            goal,
            weight,
            height,
        } => {
            client.connect().await?;
            let stage = client
                .update_profile(&RegisterProfile {
                    age,
                    gender,
                    fitness_level,
                    goal,
                    weight,
                    height,
                })
                .await?;
            println!("profile saved; profile stage: {stage:?}");
        }
        Command::Suggest => {
            client.connect().await?;
            client.request_new_workout().await?;
            if !wait_for_category(&mut events, Category::Suggestion).await {
                bail!("no suggestion arrived in time; try again in a moment");
            }
            let data = client.app_data().await;
            if let Some(suggestion) = data.suggestion {
                for exercise in &suggestion.exercises {
                    println!("- {}: {}", exercise.name, exercise.details);
                }
                if let Some(insights) = suggestion.ai_insights {
                    println!("insights: {insights}");
                }
            }
        }
        Command::LogWorkout { kind, minutes } => {
            client.connect().await?;
            client
                .log_workout(&LogWorkoutRequest {
                    kind,
                    duration_minutes: minutes,
                })
                .await?;
            wait_for_category(&mut events, Category::Workouts).await;
            println!("workout logged ({} total)", client.app_data().await.workouts.len());
        }
        Command::LogNutrition { food, calories } => {
            client.connect().await?;
            client
                .log_nutrition(&LogNutritionRequest {
                    food_item: food,
                    calories,
                })
                .await?;
            wait_for_category(&mut events, Category::Nutrition).await;
            println!(
                "meal logged ({} total)",
                client.app_data().await.nutrition_logs.len()
            );
        }
        Command::CheckIn {
            mood,
            sleep_hours,
            activity_minutes,
            notes,
        } => {
            client.connect().await?;
            client
                .log_daily_check_in(&LogCheckInRequest::for_today(
                    mood,
                    sleep_hours,
                    activity_minutes,
                    notes,
                ))
                .await?;
            wait_for_category(&mut events, Category::CheckIns).await;
            println!("check-in recorded");
        }
        Command::Notifications { mark_read } => {
            client.connect().await?;
            wait_for_category(&mut events, Category::Notifications).await;
            let data = client.app_data().await;
            for notification in &data.notifications {
                let marker = if notification.read { " " } else { "*" };
                println!("{marker} {}", notification.message);
            }
            println!("{} unread", data.unread_notifications());
            if mark_read {
                client.mark_notifications_read().await?;
                println!("marked read");
            }
        }
    }

    Ok(())
}

/// Waits until `expected` distinct categories have committed, or the
/// dashboard deadline passes. Partial data is printable; missing categories
/// just show up empty.
async fn wait_for_app_data(events: &mut broadcast::Receiver<ClientEvent>, expected: usize) {
    let mut seen = std::collections::HashSet::new();
    let deadline = tokio::time::Instant::now() + DASHBOARD_WAIT;
    while seen.len() < expected {
        let event = match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => break,
            Err(_) => {
                warn!("timed out waiting for app data; rendering what arrived");
                break;
            }
        };
        if let ClientEvent::AppDataUpdated { category } = event {
            seen.insert(category);
        }
    }
}

async fn wait_for_category(
    events: &mut broadcast::Receiver<ClientEvent>,
    wanted: Category,
) -> bool {
    let deadline = tokio::time::Instant::now() + DASHBOARD_WAIT;
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(ClientEvent::AppDataUpdated { category })) if category == wanted => {
                return true;
            }
            Ok(Ok(_)) => continue,
            Ok(Err(_)) | Err(_) => return false,
        }
    }
}

async fn print_dashboard(client: &WellnessClient) -> Result<()> {
    if let Some(profile) = client.profile().await {
        println!(
            "{} | {} | goal: {}",
            profile.wallet_address, profile.fitness_level, profile.goal
        );
    }
    let data = client.app_data().await;

    println!("\nworkouts ({}):", data.workouts.len());
    for workout in &data.workouts {
        println!("- {} for {} min", workout.kind, workout.duration_minutes);
    }

    println!("\nnutrition ({}):", data.nutrition_logs.len());
    for entry in &data.nutrition_logs {
        println!("- {} ({} kcal)", entry.food_item, entry.calories);
    }

    println!("\ncheck-ins ({}):", data.check_ins.len());
    for (date, check_in) in &data.check_ins {
        println!(
            "- {date}: mood {}/5, {}h sleep, {} active min",
            check_in.mood, check_in.sleep_hours, check_in.activity_minutes
        );
    }

    if let Some(suggestion) = &data.suggestion {
        println!("\nsuggested workout:");
        for exercise in &suggestion.exercises {
            println!("- {}: {}", exercise.name, exercise.details);
        }
    }

    println!("\nnotifications: {} unread", data.unread_notifications());
    Ok(())
}
