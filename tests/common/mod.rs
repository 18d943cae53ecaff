#![allow(dead_code)]

use compasschat::db::{self, Role};
use compasschat::profiles::{self, ProfileCard};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};

static DB_SEQ: AtomicUsize = AtomicUsize::new(0);

pub async fn pool() -> SqlitePool {
    // Tests hold a pooled connection while also querying the pool directly,
    // so the pool needs more than one connection. Plain `sqlite::memory:`
    // gives every connection its own database; a uniquely named shared-cache
    // memory db keeps them on the same one without cross-test bleed.
    let seq = DB_SEQ.fetch_add(1, Ordering::Relaxed);
    let url = format!(
        "sqlite:file:testdb-{}-{seq}?mode=memory&cache=shared",
        std::process::id()
    );
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(2)
        .connect(&url)
        .await
        .unwrap();
    db::setup(&pool).await.unwrap();
    pool
}

pub async fn add_profile(pool: &SqlitePool, user_id: &str, role: Role, name: &str) {
    let mut conn = pool.acquire().await.unwrap();
    profiles::save(
        &mut conn,
        &ProfileCard {
            user_id: user_id.to_owned(),
            role,
            display_name: name.to_owned(),
            contact_email: format!("{user_id}@example.edu"),
            role_ref: format!("REF-{user_id}"),
        },
    )
    .await
    .unwrap();
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap();
    n
}
