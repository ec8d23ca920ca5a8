//! Shared scaffolding for the integration tests: a throwaway migrated database per test, plus seeding helpers for
//! the records (catalog, users) whose management lives outside this engine.
#![allow(dead_code)] // not every test binary uses every helper

use boutique_payment_engine::{
    db_types::{OrderItem, ShippingAddress},
    SqliteDatabase,
};
use bps_common::Paise;
use chrono::{DateTime, Utc};
use log::debug;

/// Creates a fresh database in the system temp directory, runs the migrations, and returns a handle to it. Every
/// test gets its own file, so tests can run in parallel without stepping on each other.
pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_url();
    debug!("🚀️ Creating test database {url}");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    db
}

pub fn random_db_url() -> String {
    format!("sqlite://{}/bps_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

/// Inserts a catalog product directly. Catalog management is not part of the engine, so the tests write the row
/// themselves.
pub async fn seed_product(db: &SqliteDatabase, name: &str, price: i64, stock: i64, is_premium: bool) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO products (name, brand, price, stock_quantity, in_stock, is_premium) VALUES ($1, '', $2, $3, $4, \
         $5) RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(stock)
    .bind(stock > 0)
    .bind(is_premium)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding product");
    id
}

/// Inserts a user account directly; account creation belongs to the (external) auth service.
pub async fn seed_user(db: &SqliteDatabase, name: &str, email: &str) -> i64 {
    let (id,): (i64,) = sqlx::query_as("INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(email)
        .fetch_one(db.pool())
        .await
        .expect("Error seeding user");
    id
}

/// As [`seed_user`], but with the premium flag and expiry preset. Lets tests exercise the derived-membership rule
/// against expiries in the past.
pub async fn seed_premium_user(db: &SqliteDatabase, email: &str, expiry: DateTime<Utc>) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (name, email, is_premium, membership_expiry) VALUES ($1, $2, 1, $3) RETURNING id",
    )
    .bind("Premium member")
    .bind(email)
    .bind(expiry)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding user");
    id
}

pub async fn stock_level(db: &SqliteDatabase, product_id: i64) -> i64 {
    let (stock,): (i64,) = sqlx::query_as("SELECT stock_quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(db.pool())
        .await
        .expect("Error reading stock level");
    stock
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        street: "14 Marine Drive".into(),
        city: "Mumbai".into(),
        state: "MH".into(),
        zip_code: "400001".into(),
        country: "India".into(),
    }
}

pub fn item(product_id: i64, price: i64, quantity: i64) -> OrderItem {
    OrderItem {
        product_id,
        name: format!("Product {product_id}"),
        brand: "Test Brand".into(),
        price: Paise::from(price),
        quantity,
        image: String::new(),
        is_premium: false,
    }
}

pub fn premium_item(product_id: i64, price: i64, quantity: i64) -> OrderItem {
    OrderItem { is_premium: true, ..item(product_id, price, quantity) }
}
