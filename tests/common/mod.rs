//! Shared SQLite fixtures for integration tests.

#![allow(dead_code)]

use storefront_dal::config::DatabaseConfig;
use storefront_dal::db::{Dao, DbPool};
use tempfile::TempDir;

pub const CATALOG_SCHEMA: &[&str] = &[
    "CREATE TABLE catalog_master_category (
        master_category_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE catalog_sub_category (
        sub_category_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        master_category_id INTEGER NOT NULL REFERENCES catalog_master_category(master_category_id)
    )",
    "CREATE TABLE catalog_article_type (
        article_type_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        sub_category_id INTEGER NOT NULL REFERENCES catalog_sub_category(sub_category_id)
    )",
    "CREATE TABLE catalog_products (
        product_id INTEGER PRIMARY KEY,
        gender TEXT NOT NULL,
        year INTEGER NOT NULL,
        product_display_name TEXT NOT NULL,
        image_url TEXT,
        article_type_id INTEGER REFERENCES catalog_article_type(article_type_id)
    )",
];

pub const CATALOG_SEED: &[&str] = &[
    "INSERT INTO catalog_master_category (master_category_id, name) VALUES
        (1, 'Apparel'), (2, 'Footwear'), (3, 'Accessories')",
    "INSERT INTO catalog_sub_category (sub_category_id, name, master_category_id) VALUES
        (10, 'Topwear', 1), (11, 'Bottomwear', 1), (20, 'Shoes', 2)",
    "INSERT INTO catalog_article_type (article_type_id, name, sub_category_id) VALUES
        (100, 'Shirts', 10), (101, 'Jeans', 11), (200, 'Sneakers', 20)",
    "INSERT INTO catalog_products (product_id, gender, year, product_display_name, image_url, article_type_id) VALUES
        (1, 'Men', 2011, 'Blue Shirt', 'http://img/1.jpg', 100),
        (2, 'Women', 2012, 'Red Shirt', 'http://img/2.jpg', 100),
        (3, 'Men', 2015, 'Slim Jeans', NULL, 101),
        (4, 'Women', 2018, 'Running Sneakers', 'http://img/4.jpg', 200),
        (5, 'Unisex', 2012, 'Canvas Sneakers', 'http://img/5.jpg', 200)",
];

pub const ACCOUNTS_SCHEMA: &[&str] = &[
    "CREATE TABLE accounts_user_groups (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE accounts_users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        group_id INTEGER REFERENCES accounts_user_groups(id)
    )",
    "CREATE TABLE accounts_activation_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        user_id INTEGER NOT NULL UNIQUE REFERENCES accounts_users(id) ON DELETE CASCADE
    )",
    "CREATE TABLE accounts_password_reset_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        user_id INTEGER NOT NULL UNIQUE REFERENCES accounts_users(id) ON DELETE CASCADE
    )",
    "CREATE TABLE accounts_refresh_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        user_id INTEGER NOT NULL REFERENCES accounts_users(id) ON DELETE CASCADE
    )",
    "CREATE TABLE accounts_user_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT,
        last_name TEXT,
        avatar TEXT,
        gender TEXT,
        date_of_birth DATE,
        info TEXT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES accounts_users(id) ON DELETE CASCADE
    )",
    "INSERT INTO accounts_user_groups (id, name) VALUES (1, 'user'), (2, 'moderator'), (3, 'admin')",
];

/// A file-backed SQLite database that lives as long as the value.
pub struct TestDb {
    pub pool: DbPool,
    pub dao: Dao,
    _dir: TempDir,
}

impl TestDb {
    /// Fresh database with a four-connection pool.
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storefront.db");
        let url = format!("sqlite:{}?max_connections=4", path.display());
        let config = DatabaseConfig::parse(&url).unwrap();
        let pool = DbPool::connect(&config).await.unwrap();
        let dao = Dao::new(pool.clone());
        Self {
            pool,
            dao,
            _dir: dir,
        }
    }

    pub async fn with_statements(statements: &[&[&str]]) -> Self {
        let db = Self::new().await;
        for group in statements {
            db.run_all(group).await;
        }
        db
    }

    pub async fn run_all(&self, statements: &[&str]) {
        for sql in statements {
            self.dao.execute_statement(sql, &[]).await.unwrap();
        }
    }

    /// Another DAO instance over the same pool.
    pub fn second_dao(&self) -> Dao {
        Dao::new(self.pool.clone())
    }

    pub async fn count(&self, table: &str) -> i64 {
        let row = self
            .dao
            .fetch_optional(&format!("SELECT COUNT(*) AS n FROM {}", table), &[])
            .await
            .unwrap()
            .unwrap();
        row["n"].as_i64().unwrap()
    }
}
