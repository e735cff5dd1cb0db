//! Integration test harness for Copper Kettle.
//!
//! These tests exercise the checkout and OTP flows against a live
//! `PostgreSQL`. They are gated on `TEST_DATABASE_URL`: without it every test
//! prints a skip notice and passes, so `cargo test` stays green on machines
//! without a database.
//!
//! # Running
//!
//! ```bash
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=ck postgres:16
//! TEST_DATABASE_URL=postgres://postgres:ck@localhost:5432/postgres \
//!     cargo test -p copper-kettle-integration-tests
//! ```

#![allow(clippy::print_stderr)]
#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use copper_kettle_core::{ProductId, StockPolicy};
use copper_kettle_storefront::config::{PaymentConfig, SmsConfig, StorefrontConfig};
use copper_kettle_storefront::db::users::UserRepository;
use copper_kettle_storefront::models::user::User;
use copper_kettle_storefront::notify::Notifier;
use copper_kettle_storefront::payments::GatewayClient;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../storefront/migrations");

/// Shared context for a live-database test.
pub struct TestContext {
    pub pool: PgPool,
    pub config: StorefrontConfig,
    pub gateway: GatewayClient,
    pub notifier: Notifier,
}

impl TestContext {
    /// Connect and migrate, or `None` when `TEST_DATABASE_URL` is unset.
    pub async fn new() -> Option<Self> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return None;
        };

        let pool = PgPool::connect(&url)
            .await
            .expect("failed to connect to TEST_DATABASE_URL");
        MIGRATOR.run(&pool).await.expect("migrations failed");

        let config = test_config(&url);
        let gateway = GatewayClient::new(&config.payment);
        let notifier = Notifier::from_config(&config).expect("notifier");

        Some(Self {
            pool,
            config,
            gateway,
            notifier,
        })
    }

    /// Insert a product and return its id.
    pub async fn create_product(&self, name: &str, price: i64, stock: i32, digital: bool) -> ProductId {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO store.products (name, price, digital, stock, category) \
             VALUES ($1, $2, $3, $4, 'Test') RETURNING id",
        )
        .bind(format!("{name} {}", short_suffix()))
        .bind(price)
        .bind(digital)
        .bind(stock)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        ProductId::new(id)
    }

    /// Register a user with a unique username and phone.
    pub async fn create_user(&self) -> User {
        let suffix = short_suffix();
        let phone = copper_kettle_core::PhoneNumber::normalize(
            &format!("9{:09}", Uuid::new_v4().as_u128() % 1_000_000_000),
            "91",
        )
        .unwrap();

        UserRepository::new(&self.pool)
            .create_with_phone(
                &format!("buyer_{suffix}"),
                &copper_kettle_core::Email::parse(&format!("buyer_{suffix}@test.invalid")).unwrap(),
                "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$AAAAAAAAAAAAAAAAAAAAAA",
                &phone,
            )
            .await
            .unwrap()
    }

    /// The stored phone number of a user.
    pub async fn phone_of(&self, user: &User) -> copper_kettle_core::PhoneNumber {
        UserRepository::new(&self.pool)
            .phone_by_user(user.id)
            .await
            .unwrap()
            .expect("user has a phone")
            .phone_number
    }
}

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// A storefront config pointing at the test database, with the SMS stub and
/// no SMTP so nothing leaves the machine.
fn test_config(database_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from(database_url.to_owned()),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("iJ8kQ2wZx9Lp4Rv7Ty1Bn6Md3Gh5Fc0S"),
        default_country_code: "91".to_owned(),
        stock_policy: StockPolicy::AllowBackorder,
        payment: PaymentConfig {
            api_base: "http://localhost:1".to_owned(),
            api_key: SecretString::from("sk_test_9a8b7c6d5e4f3g2h1j"),
            webhook_secret: SecretString::from("whsec_9a8b7c6d5e4f3g2h1j"),
            currency: "inr".to_owned(),
        },
        sms: SmsConfig {
            enabled: false,
            api_url: None,
            account: None,
            token: None,
            from: None,
        },
        smtp: None,
        sentry_dsn: None,
    }
}
