use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use physihome_core::{
    config_from_env_values, mailer_from_env_values, AccountService, AdminRoster, CoreConfig,
    DoctorDecision, LegacyUserDocument,
};
use physihome_store::{open_store, Store, UserRecord};
use physihome_types::normalize_email;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "physihome")]
#[command(about = "PhysiHome portal operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Make sure every configured admin email has exactly one account, then list admin ids
    ReconcileAdmins,
    /// Mark a doctor as verified
    ApproveDoctor {
        /// Doctor's email address
        email: String,
    },
    /// Mark a doctor as rejected
    RejectDoctor {
        /// Doctor's email address
        email: String,
    },
    /// Import users from a JSON array of legacy user documents
    ImportUsers {
        /// Path to the JSON file
        file: String,
    },
    /// List every doctor with their verification state
    ListDoctors,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("physihome_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'physihome --help' for commands");
        return Ok(());
    };

    let env = |name: &str| std::env::var(name).ok();
    let Some(database_url) = env("DATABASE_URL").filter(|u| !u.trim().is_empty()) else {
        bail!("DATABASE_URL must be set");
    };
    let cfg = Arc::new(config_from_env_values(env)?);
    let store = open_store(Some(&database_url)).await?;

    match command {
        Commands::ReconcileAdmins => {
            let ids = AdminRoster::new(cfg, store).admin_identities().await?;
            if ids.is_empty() {
                println!("No admin emails configured.");
            }
            for id in ids {
                println!("{}", id);
            }
        }
        Commands::ApproveDoctor { email } => {
            review(cfg, store, &email, DoctorDecision::Approve).await?;
        }
        Commands::RejectDoctor { email } => {
            review(cfg, store, &email, DoctorDecision::Reject).await?;
        }
        Commands::ImportUsers { file } => {
            let documents = read_documents(Path::new(&file))?;
            let (imported, skipped) = import_users(store.as_ref(), documents).await?;
            println!("Imported {} users, skipped {}", imported, skipped);
        }
        Commands::ListDoctors => {
            let doctors = store.list_doctors().await?;
            if doctors.is_empty() {
                println!("No doctors found.");
            }
            for d in doctors {
                let status = d
                    .doctor_verification_status
                    .as_ref()
                    .map_or("unknown", |s| s.as_str());
                println!("ID: {}, Email: {}, Status: {}", d.id, d.email, status);
            }
        }
    }

    Ok(())
}

async fn review(
    cfg: Arc<CoreConfig>,
    store: Arc<dyn Store>,
    email: &str,
    decision: DoctorDecision,
) -> anyhow::Result<()> {
    let mailer = mailer_from_env_values(|name| std::env::var(name).ok(), cfg.notify_from_email())?;
    let doctor = store
        .find_user_by_email(&normalize_email(email))
        .await?
        .with_context(|| format!("no user with email {}", email))?;
    let doctor = AccountService::new(cfg, store, mailer)
        .apply_doctor_decision(doctor, decision)
        .await?;
    println!(
        "Doctor {} is now {}",
        doctor.email,
        decision.status().as_str()
    );
    Ok(())
}

fn read_documents(path: &Path) -> anyhow::Result<Vec<LegacyUserDocument>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_documents(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn parse_documents(raw: &str) -> anyhow::Result<Vec<LegacyUserDocument>> {
    Ok(serde_json::from_str(raw)?)
}

/// Inserts each document that normalises cleanly and whose email is not already taken.
async fn import_users(
    store: &dyn Store,
    documents: Vec<LegacyUserDocument>,
) -> anyhow::Result<(usize, usize)> {
    let now = Utc::now();
    let (mut imported, mut skipped) = (0, 0);
    for (index, document) in documents.into_iter().enumerate() {
        let user: UserRecord = match document.normalize(now) {
            Ok(user) => user,
            Err(e) => {
                eprintln!("Skipping entry {}: {}", index, e);
                skipped += 1;
                continue;
            }
        };
        if store.find_user_by_email(&user.email).await?.is_some() {
            eprintln!("Skipping entry {}: {} already exists", index, user.email);
            skipped += 1;
            continue;
        }
        store.insert_user(&user).await?;
        imported += 1;
    }
    Ok((imported, skipped))
}
