use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use org_rbac::authz::{role_display_name, Rbac, Role, SqlitePolicyStore};
use org_rbac::config::Settings;
use org_rbac::models::policy::PTYPE_GROUPING;
use org_rbac::{db, events};

#[derive(Parser, Debug)]
#[command(author, version, about = "organization RBAC administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply migrations and (re)load the built-in role catalog
    Bootstrap,
    /// Give a user a role inside an organization
    AssignRole { user_id: String, org_id: String, role: Role },
    /// Take a role away from a user inside an organization
    RemoveRole { user_id: String, org_id: String, role: Role },
    /// List the roles a user holds inside an organization
    Roles { user_id: String, org_id: String },
    /// Check a role-based permission; exits with status 1 on deny
    Check { user_id: String, org_id: String, resource: String, action: String },
    /// Record a user as owner of one resource instance
    AssignOwner { user_id: String, resource_type: String, resource_id: String },
    /// Drop an ownership record
    RemoveOwner { user_id: String, resource_type: String, resource_id: String },
    /// Check ownership of one resource instance; exits with status 1 if not owned
    CheckOwner { user_id: String, resource_type: String, resource_id: String },
    /// Dump every stored policy and grouping relation
    Policies,
    /// Recompute the audit hash chain
    VerifyAudit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let pool = db::init(&settings).await.context("failed to open policy database")?;
    let store = SqlitePolicyStore::new(pool.clone());

    // Read-only over the audit table; no service, no listener.
    if let Commands::VerifyAudit = cli.command {
        return verify_audit(&pool).await;
    }

    let (bus, listener) = if settings.audit_enabled {
        let (bus, rx) = events::init_event_bus();
        let handle = tokio::spawn(events::start_audit_listener(rx, pool.clone()));
        (Some(bus), Some(handle))
    } else {
        (None, None)
    };

    let rbac = match cli.command {
        Commands::Bootstrap => Rbac::bootstrap(Arc::new(store.clone()), bus)
            .await
            .context("role catalog bootstrap failed")?,
        _ => Rbac::attach(Arc::new(store.clone()), bus)
            .await
            .context("policy database is not ready")?,
    };

    let allowed = run(cli.command, &rbac, &store).await;

    // Closing the bus lets the listener drain and exit.
    drop(rbac);
    if let Some(handle) = listener {
        handle.await.context("audit listener panicked")?;
    }

    if !allowed? {
        std::process::exit(1);
    }
    Ok(())
}

/// Returns false when a check command denied.
async fn run(command: Commands, rbac: &Rbac, store: &SqlitePolicyStore) -> anyhow::Result<bool> {
    match command {
        Commands::Bootstrap => {
            let count = rbac.policies().await?.len();
            println!("Catalog loaded ({} policies stored)", count);
        }
        Commands::AssignRole { user_id, org_id, role } => {
            let outcome = rbac.assign_role(&user_id, &org_id, role).await?;
            println!("{:?}", outcome);
        }
        Commands::RemoveRole { user_id, org_id, role } => {
            let outcome = rbac.remove_role(&user_id, &org_id, role).await?;
            println!("{:?}", outcome);
        }
        Commands::Roles { user_id, org_id } => {
            for role in rbac.get_user_roles(&user_id, &org_id).await? {
                println!("{}", role);
            }
        }
        Commands::Check { user_id, org_id, resource, action } => {
            let allowed = rbac.check_permission(&user_id, &org_id, &resource, &action).await;
            println!("{}", if allowed { "allow" } else { "deny" });
            return Ok(allowed);
        }
        Commands::AssignOwner { user_id, resource_type, resource_id } => {
            let outcome = rbac.assign_ownership(&user_id, &resource_type, &resource_id).await?;
            println!("{:?}", outcome);
        }
        Commands::RemoveOwner { user_id, resource_type, resource_id } => {
            let outcome = rbac.remove_ownership(&user_id, &resource_type, &resource_id).await?;
            println!("{:?}", outcome);
        }
        Commands::CheckOwner { user_id, resource_type, resource_id } => {
            let owns = rbac.check_ownership(&user_id, &resource_type, &resource_id).await;
            println!("{}", if owns { "owns" } else { "does-not-own" });
            return Ok(owns);
        }
        Commands::Policies => {
            println!("{:<6} {:<4} {:<32} {:<24} {:<10} {}", "Id", "Type", "Subject", "Object", "Action", "Created");
            for row in store.rows().await? {
                let object = if row.ptype == PTYPE_GROUPING { role_display_name(&row.v1) } else { row.v1.clone() };
                println!(
                    "{:<6} {:<4} {:<32} {:<24} {:<10} {}",
                    row.id,
                    row.ptype,
                    row.v0,
                    object,
                    row.v2,
                    row.created_at.to_rfc3339()
                );
            }
        }
        Commands::VerifyAudit => verify_audit(store.pool()).await?,
    }

    Ok(true)
}

async fn verify_audit(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    let report = events::verify_audit_chain(pool).await?;
    match report.first_broken {
        None => println!("Audit chain intact ({} records)", report.records),
        Some(seq) => anyhow::bail!("audit chain broken at record {} of {}", seq, report.records),
    }
    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
