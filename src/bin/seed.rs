use bookvault::{
    domain::{CreateBookingRequest, CreateUserRequest, LedgerEntryType, UserRole},
    notifications::NotificationManager,
    repository::{SqliteUserRepository, UserRepository},
    service::wallet_service::WalletService,
    service::ServiceContext,
};
use chrono::{Duration, NaiveTime, Utc};
use clap::Parser;
use fake::faker::name::en::Name;
use fake::Fake;
use rand::Rng;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Seed the bookvault database with demo users and bookings")]
struct Args {
    /// Database to seed
    #[arg(long, default_value = "sqlite:bookvault.db")]
    database_url: String,

    /// Number of providers to create
    #[arg(long, default_value_t = 4)]
    providers: usize,

    /// Number of clients to create
    #[arg(long, default_value_t = 8)]
    clients: usize,

    /// Opening wallet balance per client
    #[arg(long, default_value_t = 500_000)]
    opening_balance: i64,

    /// Also create a demo booking per client
    #[arg(long, default_value_t = false)]
    bookings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let mut rng = rand::thread_rng();

    println!("🧑‍🔧 Creating {} providers...", args.providers);
    let mut providers = Vec::new();
    for _ in 0..args.providers {
        let provider = user_repo
            .create(CreateUserRequest {
                full_name: Name().fake(),
                role: UserRole::Provider,
                verified: true,
                accepting_bookings: true,
                hourly_rate: Some(rng.gen_range(80..300) * 100),
            })
            .await?;
        providers.push(provider);
    }

    println!("👥 Creating {} clients...", args.clients);
    let mut clients = Vec::new();
    for _ in 0..args.clients {
        let client = user_repo
            .create(CreateUserRequest {
                full_name: Name().fake(),
                role: UserRole::Client,
                verified: true,
                accepting_bookings: false,
                hourly_rate: None,
            })
            .await?;
        clients.push(client);
    }

    println!("💰 Funding client wallets...");
    for client in &clients {
        let mut tx = db_pool.begin().await?;
        WalletService::credit(
            &mut tx,
            client.id,
            args.opening_balance,
            LedgerEntryType::TopUp,
            "Seeded opening balance".to_string(),
            None,
        )
        .await?;
        tx.commit().await?;
    }

    if args.bookings {
        println!("📅 Creating demo bookings...");
        let settings = bookvault::config::Settings::default();
        let context = ServiceContext::new(
            &settings,
            db_pool.clone(),
            None,
            Arc::new(NotificationManager::new()),
        );

        let date = (Utc::now() + Duration::days(7)).date_naive();
        for (i, client) in clients.iter().enumerate() {
            let provider = &providers[i % providers.len()];
            let start_hour = 9 + (i % 3) as u32 * 3;
            let request = CreateBookingRequest {
                payee_id: provider.id,
                date,
                start_time: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(start_hour + 2, 0, 0).unwrap(),
                location: Some("Video call".to_string()),
                notes: None,
            };
            match context.booking_service.create(client.id, request).await {
                Ok(booking) => println!("  ✅ {} booked {}", client.full_name, booking.code),
                Err(e) => println!("  ⚠️ Skipped booking for {}: {}", client.full_name, e),
            }
        }
    }

    println!("✅ Seeding complete:");
    println!("  {} providers, {} clients", providers.len(), clients.len());
    if let Some(first) = clients.first() {
        println!("  Example actor header: X-Actor-Id: {}", first.id);
    }

    Ok(())
}
