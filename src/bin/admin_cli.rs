use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use purchase_requests_api::{
    auth::{Actor, AuthConfig, AuthService},
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::{sector, user},
    models::Role,
    services::{
        catalog::SectorInput,
        users::CreateUserInput,
        CatalogService, UserService,
    },
};
use serde::Serialize;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Seed(args) => handle_seed(&context, args, cli.json).await?,
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
        Commands::ListUsers => handle_list_users(&context, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "purchase-requests-admin",
    about = "Operator tasks for the purchase requests API",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Migrate, then make sure a sector and an administrator exist
    Seed(SeedArgs),
    /// Create a user in an existing sector
    CreateUser(CreateUserArgs),
    /// List active users
    ListUsers,
}

#[derive(Args)]
struct SeedArgs {
    #[arg(long, default_value = "Administration", help = "Sector for the administrator")]
    sector: String,
    #[arg(long, default_value = "Administrator")]
    admin_name: String,
    #[arg(long, help = "Administrator email")]
    admin_email: String,
    #[arg(long, help = "Administrator password (at least 6 characters)")]
    admin_password: String,
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long, value_enum, default_value_t = RoleArg::Requester)]
    role: RoleArg,
    #[arg(long, value_parser = clap::value_parser!(Uuid), help = "Sector identifier (UUID)")]
    sector_id: Uuid,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Requester,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Requester => Role::Requester,
        }
    }
}

#[derive(Serialize)]
struct SeedOutcome {
    sector: sector::Model,
    admin: user::Model,
    created_admin: bool,
}

struct CliContext {
    db: Arc<DbPool>,
    catalog: CatalogService,
    users: UserService,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let auth_config = AuthConfig::new(
            config.jwt_secret.clone(),
            Duration::from_secs(config.jwt_expiration as u64),
        );
        let auth_service = Arc::new(AuthService::new(auth_config));

        Ok(Self {
            catalog: CatalogService::new(db.clone()),
            users: UserService::new(db.clone(), auth_service),
            db,
        })
    }
}

/// Operator identity for catalog writes issued from the command line.
fn operator() -> Actor {
    Actor::new(Uuid::nil(), Role::Admin)
}

async fn handle_seed(context: &CliContext, args: SeedArgs, json: bool) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;

    let existing = context
        .catalog
        .list_sectors()
        .await
        .context("failed to list sectors")?
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(args.sector.trim()));
    let sector = match existing {
        Some(sector) => sector,
        None => context
            .catalog
            .create_sector(&operator(), SectorInput { name: args.sector.trim().to_string() })
            .await
            .context("failed to create sector")?,
    };

    let email = args.admin_email.trim().to_lowercase();
    let current = context
        .users
        .list_users(&operator())
        .await
        .context("failed to list users")?
        .into_iter()
        .find(|u| u.email == email);

    let (admin, created_admin) = match current {
        Some(found) => (found, false),
        None => {
            let created = context
                .users
                .insert_user(CreateUserInput {
                    name: args.admin_name,
                    email,
                    password: args.admin_password,
                    role: Role::Admin,
                    sector_id: sector.id,
                })
                .await
                .context("failed to create administrator")?;
            (created, true)
        }
    };

    let outcome = SeedOutcome {
        sector,
        admin,
        created_admin,
    };
    if json {
        print_json(&outcome)?;
    } else {
        println!("Sector {} ({})", outcome.sector.name, outcome.sector.id);
        println!(
            "Administrator {} <{}> {}",
            outcome.admin.name,
            outcome.admin.email,
            if outcome.created_admin {
                "created"
            } else {
                "already present"
            }
        );
    }
    Ok(())
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let created = context
        .users
        .insert_user(CreateUserInput {
            name: args.name,
            email: args.email,
            password: args.password,
            role: args.role.into(),
            sector_id: args.sector_id,
        })
        .await
        .context("failed to create user")?;

    if json {
        print_json(&created)?;
    } else {
        render_user(&created);
    }
    Ok(())
}

async fn handle_list_users(context: &CliContext, json: bool) -> Result<()> {
    let users = context
        .users
        .list_users(&operator())
        .await
        .context("failed to list users")?;

    if json {
        print_json(&users)?;
    } else if users.is_empty() {
        println!("No users");
    } else {
        for user in &users {
            render_user(user);
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_user(user: &user::Model) {
    println!(
        "- {} • {} <{}> • {} • sector {}",
        user.id, user.name, user.email, user.role, user.sector_id
    );
}
