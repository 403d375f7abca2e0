use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use cafe_pos_api::{
    config::{self, AppConfig},
    db::{self, DbConfig, DbPool},
    entities::Role,
    errors::ServiceError,
    services::{
        catalog::{CreateCategoryRequest, CreateProductRequest},
        tables::CreateTableRequest,
        users::{CreateUserRequest, UserResponse},
        CatalogService, TableService, UserService,
    },
};
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};

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
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
        Commands::ListUsers => handle_list_users(&context, cli.json).await?,
        Commands::SeedDemo(args) => handle_seed_demo(&context, args).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "pos-admin", about = "Administrative tasks for the café POS backend", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Create a staff account
    CreateUser(CreateUserArgs),
    ListUsers,
    /// Insert a small demo floor plan and menu
    SeedDemo(SeedDemoArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long, help = "Login name (stored lowercase)")]
    username: String,
    #[arg(long, help = "Password, at least 8 characters")]
    password: String,
    #[arg(long, help = "Display name shown on orders")]
    full_name: String,
    #[arg(long, default_value = "Staff", value_parser = parse_role, help = "Staff, Cashier or Manager")]
    role: Role,
}

#[derive(Args)]
struct SeedDemoArgs {
    #[arg(long, default_value_t = 8, help = "Number of dining tables to create")]
    tables: u32,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::from_str(raw).map_err(|_| format!("unknown role '{}'", raw))
}

struct CliContext {
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_with_config(&DbConfig::from(&config))
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            db: Arc::new(db_pool),
        })
    }

    fn user_service(&self) -> UserService {
        UserService::new(self.db.clone())
    }

    fn table_service(&self) -> TableService {
        TableService::new(self.db.clone())
    }

    fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.db.clone())
    }
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let user = context
        .user_service()
        .create_user(CreateUserRequest {
            username: args.username,
            password: args.password,
            full_name: args.full_name,
            role: args.role,
        })
        .await
        .map_err(|e| anyhow!("failed to create user: {}", e))?;

    if json {
        print_json(&user)?;
    } else {
        render_user(&user);
    }
    Ok(())
}

async fn handle_list_users(context: &CliContext, json: bool) -> Result<()> {
    let users = context
        .user_service()
        .list_users()
        .await
        .map_err(|e| anyhow!("failed to list users: {}", e))?;

    if json {
        print_json(&users)?;
    } else if users.is_empty() {
        println!("No users");
    } else {
        users.iter().for_each(render_user);
    }
    Ok(())
}

/// Idempotent: rows that already exist are skipped.
async fn handle_seed_demo(context: &CliContext, args: SeedDemoArgs) -> Result<()> {
    let tables = context.table_service();
    let mut created_tables = 0;
    for n in 1..=args.tables {
        let request = CreateTableRequest {
            name: format!("T{}", n),
            capacity: if n % 3 == 0 { 6 } else { 4 },
            description: None,
        };
        if skip_existing(tables.create_table(request).await)?.is_some() {
            created_tables += 1;
        }
    }

    let catalog = context.catalog_service();
    let menu: [(&str, &[(&str, Decimal)]); 3] = [
        (
            "Coffee",
            &[
                ("Espresso", dec!(2.50)),
                ("Cappuccino", dec!(3.20)),
                ("Iced Latte", dec!(3.80)),
            ],
        ),
        (
            "Tea",
            &[("Green Tea", dec!(2.20)), ("Peach Iced Tea", dec!(3.00))],
        ),
        (
            "Food",
            &[("Croissant", dec!(2.80)), ("Club Sandwich", dec!(6.50))],
        ),
    ];

    let existing = catalog
        .list_categories(true)
        .await
        .map_err(|e| anyhow!("failed to list categories: {}", e))?;

    let mut created_products = 0;
    for (category_name, products) in menu {
        let category = match existing.iter().find(|c| c.name == category_name) {
            Some(_) => {
                info!(category = category_name, "Category exists, leaving its products alone");
                continue;
            }
            None => catalog
                .create_category(CreateCategoryRequest {
                    name: category_name.to_string(),
                    description: None,
                })
                .await
                .map_err(|e| anyhow!("failed to create category {}: {}", category_name, e))?,
        };

        for (name, price) in products {
            catalog
                .create_product(CreateProductRequest {
                    name: name.to_string(),
                    price: *price,
                    category_id: category.id,
                    image_url: None,
                })
                .await
                .map_err(|e| anyhow!("failed to create product {}: {}", name, e))?;
            created_products += 1;
        }
    }

    println!(
        "Seeded {} table(s) and {} product(s)",
        created_tables, created_products
    );
    Ok(())
}

fn skip_existing<T>(result: Result<T, ServiceError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ServiceError::Conflict(msg)) => {
            warn!("{}", msg);
            Ok(None)
        }
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_user(user: &UserResponse) {
    println!(
        "- User {} • {} ({}) • {} • {}",
        user.id,
        user.username,
        user.full_name,
        user.role,
        if user.active { "active" } else { "inactive" }
    );
}
