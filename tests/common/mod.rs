#![allow(dead_code)]

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

use view_perms::urls::{include, path};
use view_perms::{SqlitePermissionStore, UrlConf, ViewDescriptor};

/// Keeps the temp dir alive for as long as the store is in use.
pub struct TestDb {
    pub dir: TempDir,
    pub store: SqlitePermissionStore,
}

pub async fn setup_store() -> Result<TestDb> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    // run migrations from crate migrations folder
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    Ok(TestDb {
        dir,
        store: SqlitePermissionStore::new(pool),
    })
}

/// `/`, `/blog/`, `/blog/:id`, `/blog/archive/:year`, `/shop/cart`, `/blogroll/`.
pub fn site_urlconf() -> Result<UrlConf> {
    let detail = ViewDescriptor::function("blog.views", "post_detail");

    Ok(UrlConf::new(vec![
        path("", ViewDescriptor::function("home.views", "index"))?,
        include(
            "blog",
            vec![
                path("", ViewDescriptor::class_based("blog.views", "PostList"))?.with_name("post-list"),
                path(":id", detail.clone())?.with_name("post-detail"),
                path("archive/:year", ViewDescriptor::function("blog.views", "archive"))?,
                include("legacy", vec![path("post/:id", detail)?])?,
            ],
        )?
        .with_namespace("blog"),
        include(
            "shop",
            vec![path("cart", ViewDescriptor::function("shop.views", "cart"))?],
        )?,
        path("blogroll", ViewDescriptor::function("blogroll.views", "index"))?,
    ]))
}
