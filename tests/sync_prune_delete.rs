mod common;

use anyhow::Result;

use view_perms::config::Settings;
use view_perms::i18n::Translator;
use view_perms::store::PermissionStore;
use view_perms::{sync_app, SyncMode, SyncOptions};

use common::{setup_store, site_urlconf};

#[tokio::test]
async fn delete_removes_only_the_apps_permissions() -> Result<()> {
    let db = setup_store().await?;
    let urlconf = site_urlconf()?;
    let mut translator = Translator::new("en");
    let settings = Settings::default();

    for app in ["blog", "blogroll", "shop"] {
        let options = SyncOptions::new(app, &settings).with_verbosity(0);
        sync_app(&db.store, &urlconf, &mut translator, &options, &mut Vec::new()).await?;
    }

    let options = SyncOptions::new("blog", &settings).with_mode(SyncMode::Delete);
    let mut out = Vec::new();
    let report = sync_app(&db.store, &urlconf, &mut translator, &options, &mut out).await?;
    assert_eq!(report.deleted, 3);
    assert!(String::from_utf8(out)?.trim_end().ends_with("3 permissions deleted"));

    let ct = db.store.content_type("auth", "user").await?;
    let left: Vec<String> = db
        .store
        .permissions_with_prefix(&ct, "access_view_")
        .await?
        .into_iter()
        .map(|p| p.codename)
        .collect();
    assert_eq!(
        left,
        vec!["access_view_blogroll.views.index", "access_view_shop.views.cart"]
    );
    Ok(())
}

#[tokio::test]
async fn delete_includes_records_without_views() -> Result<()> {
    let db = setup_store().await?;
    let urlconf = site_urlconf()?;
    let mut translator = Translator::new("en");
    let ct = db.store.content_type("auth", "user").await?;
    db.store.create_permission(&ct, "access_view_blog.views.gone", "gone").await?;
    db.store.create_permission(&ct, "other_prefix_blog.views.gone", "kept").await?;

    let options = SyncOptions::new("blog", &Settings::default())
        .with_mode(SyncMode::Delete)
        .with_verbosity(0);
    let report = sync_app(&db.store, &urlconf, &mut translator, &options, &mut Vec::new()).await?;
    assert_eq!(report.deleted, 1);
    assert_eq!(db.store.permissions_with_prefix(&ct, "other_prefix_").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn prune_removes_exactly_the_stale_records() -> Result<()> {
    let db = setup_store().await?;
    let urlconf = site_urlconf()?;
    let mut translator = Translator::new("en");
    let settings = Settings::default();

    let create = SyncOptions::new("blog", &settings).with_verbosity(0);
    sync_app(&db.store, &urlconf, &mut translator, &create, &mut Vec::new()).await?;

    let ct = db.store.content_type("auth", "user").await?;
    db.store.create_permission(&ct, "access_view_blog.views.old_feed", "stale").await?;
    db.store.create_permission(&ct, "access_view_blog.api.Legacy", "stale").await?;
    db.store.create_permission(&ct, "access_view_shop.views.old", "other app").await?;

    let mut prune = SyncOptions::new("blog", &settings)
        .with_mode(SyncMode::PruneStale)
        .with_verbosity(2);
    // ignored views still exist, their records are not stale
    prune.ignore_list.insert("blog.views.archive".to_string());
    let mut out = Vec::new();
    let report = sync_app(&db.store, &urlconf, &mut translator, &prune, &mut out).await?;
    assert_eq!(report.deleted, 2);

    let printed = String::from_utf8(out)?;
    assert!(printed.contains("Currently 5 view access permissions for app 'blog' exist"));
    assert!(printed.contains("View access permission is no longer necessary. 'access_view_blog.views.old_feed'"));
    assert!(printed.contains("2 permissions deleted"));
    assert!(printed.contains("started at"));

    let mut left: Vec<String> = db
        .store
        .permissions_with_prefix(&ct, "access_view_")
        .await?
        .into_iter()
        .map(|p| p.codename)
        .collect();
    left.sort();
    assert_eq!(
        left,
        vec![
            "access_view_blog.views.PostList",
            "access_view_blog.views.archive",
            "access_view_blog.views.post_detail",
            "access_view_shop.views.old",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn prune_with_nothing_stale_deletes_nothing() -> Result<()> {
    let db = setup_store().await?;
    let urlconf = site_urlconf()?;
    let mut translator = Translator::new("en");
    let settings = Settings::default();

    let create = SyncOptions::new("shop", &settings).with_verbosity(0);
    sync_app(&db.store, &urlconf, &mut translator, &create, &mut Vec::new()).await?;

    let prune = create.clone().with_mode(SyncMode::PruneStale);
    let report = sync_app(&db.store, &urlconf, &mut translator, &prune, &mut Vec::new()).await?;
    assert_eq!(report.deleted, 0);

    let ct = db.store.content_type("auth", "user").await?;
    assert_eq!(db.store.permissions_with_prefix(&ct, "access_view_shop.").await?.len(), 1);
    Ok(())
}
