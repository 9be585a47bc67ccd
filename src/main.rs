use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

mod config;
mod db;
mod dispatcher;
mod interest;
mod memory;
mod models;
mod relevance;
mod reminders;
mod report;
mod repository;
mod seed;
mod service;

use config::Config;
use dispatcher::{InboxSink, NotificationDispatcher};
use interest::Interaction;
use memory::MemoryRepository;
use models::{EventType, NewEvent};
use repository::{EventRepository, RegistrationError};
use service::EventService;

#[derive(Parser)]
#[command(name = "learning-events")]
#[command(about = "Event recommendations and registration reminders for the learning platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a realistic upcoming event catalogue
    Seed,
    /// Import events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Create a single event
    CreateEvent {
        #[arg(long)]
        title: String,
        #[arg(long)]
        event_type: EventType,
        #[arg(long)]
        area: String,
        /// Start time as RFC 3339, e.g. 2026-11-03T18:00:00Z
        #[arg(long)]
        starts_at: DateTime<Utc>,
        #[arg(long, default_value_t = 60)]
        duration_minutes: i32,
        #[arg(long, default_value_t = 100)]
        capacity: i32,
        #[arg(long = "related-course")]
        related_courses: Vec<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List the event catalogue
    ListEvents,
    /// List the attendees of an event
    Attendees {
        #[arg(long)]
        event: Uuid,
    },
    /// Register an attendee for an event
    Register {
        #[arg(long)]
        event: Uuid,
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Record a user interaction in their interest profile
    #[command(group(
        ArgGroup::new("interaction")
            .args(["area", "search"])
            .required(true)
            .multiple(false)
    ))]
    Track {
        #[arg(long)]
        user: String,
        #[arg(long)]
        area: Option<String>,
        #[arg(long, requires = "area")]
        course: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Rank upcoming events for a user
    Recommend {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show delivered notifications for a user
    Inbox {
        #[arg(long)]
        user: String,
    },
    /// Deliver due reminders, polling until interrupted
    Dispatch {
        #[arg(long)]
        once: bool,
    },
    /// Generate a markdown activity report
    Report {
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn connect(config: &Config) -> anyhow::Result<Option<PgPool>> {
    let Some(url) = config.database_url.as_deref() else {
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(Some(pool))
}

async fn build_repository(pool: Option<PgPool>) -> anyhow::Result<Arc<dyn EventRepository>> {
    match pool {
        Some(pool) => Ok(Arc::new(db::PgRepository::new(pool))),
        None => {
            warn!("DATABASE_URL is not set; using an in-memory store with sample events");
            let repo = Arc::new(MemoryRepository::new());
            db::seed(repo.as_ref()).await?;
            Ok(repo)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let cli = Cli::parse();
    let pool = connect(&config).await?;
    let now = Utc::now();

    // Only the chosen arm builds the repository; init-db never needs one.
    match cli.command {
        Commands::InitDb => {
            let pool = pool.context("DATABASE_URL must be set to initialise the schema")?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let repo = build_repository(pool).await?;
            let inserted = db::seed(repo.as_ref()).await?;
            println!("Seed data inserted ({inserted} new events).");
        }
        Commands::Import { csv } => {
            let repo = build_repository(pool).await?;
            let inserted = db::import_csv(repo.as_ref(), &csv).await?;
            info!("Imported {inserted} events from {}", csv.display());
            println!("Inserted {inserted} events from {}.", csv.display());
        }
        Commands::CreateEvent {
            title,
            event_type,
            area,
            starts_at,
            duration_minutes,
            capacity,
            related_courses,
            tags,
        } => {
            let service = EventService::new(build_repository(pool).await?);
            let created = service
                .create_event(NewEvent {
                    title,
                    event_type,
                    area,
                    starts_at,
                    duration_minutes,
                    capacity,
                    related_courses,
                    tags,
                    source_key: None,
                })
                .await?;
            if let Some(event) = created {
                println!("Created event {} ({}).", event.id, event.title);
            }
        }
        Commands::ListEvents => {
            let service = EventService::new(build_repository(pool).await?);
            let events = service.list_events().await?;
            if events.is_empty() {
                println!("No events in the catalogue.");
                return Ok(());
            }
            for event in events.iter() {
                println!(
                    "- {} [{}] {} ({}) {} | {}/{} seats{}",
                    event.id,
                    event.event_type,
                    event.title,
                    event.area,
                    event.starts_at.format("%Y-%m-%d %H:%M"),
                    event.registered,
                    event.capacity,
                    if event.is_active_at(now) { "" } else { " | closed" }
                );
            }
        }
        Commands::Attendees { event } => {
            let repo = build_repository(pool).await?;
            let registrations = repo.registrations_for(event).await?;
            if registrations.is_empty() {
                println!("No attendees registered for {event}.");
                return Ok(());
            }
            for registration in registrations.iter() {
                println!(
                    "- {} <{}> ({}) at {}",
                    registration.name,
                    registration.email,
                    registration.user_id,
                    registration.registered_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Register {
            event,
            user,
            name,
            email,
        } => {
            let service = EventService::new(build_repository(pool).await?);
            match service.register(event, &user, &name, &email, now).await {
                Ok(registration) => {
                    println!(
                        "Registered {} for event {}. Four reminders scheduled.",
                        registration.email, registration.event_id
                    );
                }
                Err(RegistrationError::Storage(err)) => return Err(err),
                Err(err) => println!("Registration failed: {err}."),
            }
        }
        Commands::Track {
            user,
            area,
            course,
            search,
        } => {
            let interaction = match (area, course, search) {
                (Some(area), Some(course_id), _) => Interaction::CourseView { course_id, area },
                (Some(area), None, _) => Interaction::AreaVisit { area },
                (None, _, Some(term)) => Interaction::Search { term },
                (None, _, None) => anyhow::bail!("one of --area or --search is required"),
            };
            let service = EventService::new(build_repository(pool).await?);
            let profile = service.track(&user, interaction, now).await?;
            println!(
                "Profile for {}: {} areas, {} viewed courses, {} searches.",
                profile.user_id,
                profile.area_scores.len(),
                profile.viewed_courses.len(),
                profile.search_terms.len()
            );
        }
        Commands::Recommend { user, limit, json } => {
            let service = EventService::new(build_repository(pool).await?);
            let ranked = service.recommended_events(&user, now).await?;
            let top: Vec<_> = ranked.into_iter().take(limit).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&top)?);
                return Ok(());
            }
            if top.is_empty() {
                println!("No relevant upcoming events for {user}.");
                return Ok(());
            }

            println!("Top events for {user}:");
            for scored in top.iter() {
                println!(
                    "- {} ({}, {}) score {} starts {}",
                    scored.event.title,
                    scored.event.event_type,
                    scored.event.area,
                    scored.score,
                    scored.event.starts_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Inbox { user } => {
            let repo = build_repository(pool).await?;
            let items = repo.notifications_for(&user).await?;
            if items.is_empty() {
                println!("No notifications for {user}.");
                return Ok(());
            }
            for item in items.iter() {
                println!(
                    "- [{}] {}: {}",
                    item.created_at.format("%Y-%m-%d %H:%M"),
                    item.title,
                    item.message
                );
            }
        }
        Commands::Dispatch { once } => {
            let repo = build_repository(pool).await?;
            let sink = Arc::new(InboxSink::new(repo.clone()));
            let dispatcher = NotificationDispatcher::new(repo.clone(), sink, config.poll_interval);

            if once {
                let report = dispatcher.tick(Utc::now()).await?;
                println!(
                    "Dispatched {} reminders ({} failed, {} skipped).",
                    report.dispatched, report.failed, report.skipped
                );
                return Ok(());
            }

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handle = tokio::spawn(dispatcher.run(shutdown_rx));
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
            handle.await?;
        }
        Commands::Report { user, out } => {
            let repo = build_repository(pool).await?;
            let service = EventService::new(repo.clone());
            let events = service.list_events().await?;
            let pending = repo.pending_notifications().await?;
            let ranked = match user.as_deref() {
                Some(user_id) => Some(service.recommended_events(user_id, now).await?),
                None => None,
            };
            let recommendations = match (user.as_deref(), ranked.as_deref()) {
                (Some(user_id), Some(ranked)) => Some((user_id, ranked)),
                _ => None,
            };

            let report = report::build_report(now, &events, &pending, recommendations);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
