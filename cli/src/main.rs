//! Prizebox CLI - operational shell for local development and review

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use prizebox_core::{Event, Principal, RequestFilter, RequestStatus, RewardRequest, Role};
use prizebox_delivery::{DeliveryChannel, HttpDeliveryClient, LocalDelivery};
use prizebox_engine::RequestEngine;
use prizebox_persistence::{sqlite, Database};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "prizebox", about = "Event reward claim engine")]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "prizebox.db")]
    db: PathBuf,

    /// External delivery endpoint; grants are logged locally when omitted
    #[arg(long)]
    delivery_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load sample events and rewards for local development
    Seed,
    /// List events
    Events {
        /// Only events whose window is open right now
        #[arg(long)]
        active: bool,
    },
    /// Submit a claim for a reward
    Claim {
        #[arg(long)]
        user: String,
        #[arg(long)]
        reward: i64,
    },
    /// Approve a pending request (reviewer roles only)
    Approve {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "admin")]
        role: String,
        request: i64,
    },
    /// Reject a pending request with a reason (reviewer roles only)
    Reject {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "admin")]
        role: String,
        request: i64,
        #[arg(long)]
        reason: String,
    },
    /// List reward requests
    Requests {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "admin")]
        role: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        event: Option<i64>,
        /// Scope to one user's history
        #[arg(long)]
        of_user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prizebox=info,prizebox_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let db = Arc::new(
        Database::connect(&cli.db)
            .await
            .context("Failed to open database")?,
    );
    let delivery: Arc<dyn DeliveryChannel> = match &cli.delivery_url {
        Some(url) => Arc::new(HttpDeliveryClient::new(url)?),
        None => Arc::new(LocalDelivery),
    };
    let engine = RequestEngine::new(db.clone(), delivery);

    match cli.command {
        Command::Seed => seed(&db).await?,
        Command::Events { active } => {
            let events = if active {
                sqlite::list_active_events(db.pool(), Utc::now()).await?
            } else {
                sqlite::list_events(db.pool()).await?
            };
            for event in &events {
                print_event(event);
                for reward in sqlite::rewards_for_event(db.pool(), event.id).await? {
                    println!(
                        "    reward {}: {} ({}/{} claimed)",
                        reward.id, reward.name, reward.claimed_count, reward.total_quota
                    );
                }
            }
        }
        Command::Claim { user, reward } => {
            let request = engine.submit(&user, reward).await?;
            print_request(&request);
        }
        Command::Approve {
            user,
            role,
            request,
        } => {
            let principal = principal(&user, &role)?;
            let request = engine.approve(&principal, request).await?;
            print_request(&request);
        }
        Command::Reject {
            user,
            role,
            request,
            reason,
        } => {
            let principal = principal(&user, &role)?;
            let request = engine.reject(&principal, request, &reason).await?;
            print_request(&request);
        }
        Command::Requests {
            user,
            role,
            status,
            event,
            of_user,
        } => {
            let principal = principal(&user, &role)?;
            let filter = RequestFilter {
                status: status.as_deref().map(RequestStatus::parse).transpose()?,
                event_id: event,
                user_id: of_user,
            };
            for request in engine.list(&principal, &filter).await? {
                print_request(&request);
            }
        }
    }

    Ok(())
}

fn principal(user: &str, role: &str) -> Result<Principal> {
    Ok(Principal::new(user, Role::parse(role)?))
}

/// Sample fixtures for local development
async fn seed(db: &Database) -> Result<()> {
    let now = Utc::now();

    let summer = sqlite::insert_event(
        db.pool(),
        "Summer Quest Special",
        "Finish every summer quest to earn limited items.",
        now - Duration::days(7),
        now + Duration::days(30),
        true,
    )
    .await?;
    let welcome = sqlite::insert_event(
        db.pool(),
        "New User Welcome",
        "A special gift for newly registered users.",
        now - Duration::days(30),
        now + Duration::days(180),
        true,
    )
    .await?;
    let first_purchase = sqlite::insert_event(
        db.pool(),
        "First Purchase Bonus",
        "Extra bonus on your first purchase.",
        now - Duration::days(30),
        now + Duration::days(120),
        true,
    )
    .await?;

    sqlite::insert_reward(
        db.pool(),
        "Summer Theme Pet",
        "Limited pet granted for clearing the summer quest line.",
        summer,
        30,
    )
    .await?;
    sqlite::insert_reward(
        db.pool(),
        "Starter Package",
        "Assorted items to help new players get going.",
        welcome,
        500,
    )
    .await?;
    sqlite::insert_reward(
        db.pool(),
        "Bonus Coins",
        "Special coins granted with the first purchase.",
        first_purchase,
        1000,
    )
    .await?;

    println!("Seeded 3 events and 3 rewards");
    Ok(())
}

fn print_event(event: &Event) {
    println!(
        "event {}: {} [{} .. {}] {}",
        event.id,
        event.title,
        event.start_time.format("%Y-%m-%d %H:%M"),
        event.end_time.format("%Y-%m-%d %H:%M"),
        if event.is_active { "active" } else { "disabled" },
    );
}

fn print_request(request: &RewardRequest) {
    let outcome = match request.status {
        RequestStatus::Pending => "pending".to_string(),
        RequestStatus::Approved => format!(
            "approved at {}",
            request
                .approved_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        ),
        RequestStatus::Rejected => format!(
            "rejected: {}",
            request.rejection_reason.as_deref().unwrap_or("no reason")
        ),
    };
    println!(
        "request {}: user {} reward {} -> {}",
        request.id, request.user_id, request.reward_id, outcome
    );
}
