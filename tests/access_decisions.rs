mod common;

use std::sync::Arc;

use anyhow::Result;

use view_perms::auth::RequestUser;
use view_perms::config::Settings;
use view_perms::errors::AppError;
use view_perms::i18n::Translator;
use view_perms::store::PermissionStore;
use view_perms::{sync_app, Decision, SyncOptions, UrlConf, ViewPermissionLayer};

use common::setup_store;

const URLS: &str = r#"[
    {"kind": "include", "route": "blog", "namespace": "blog", "patterns": [
        {"kind": "view", "route": "", "name": "post-list",
         "view": {"module": "blog.views", "name": "view",
                  "view_class": {"module": "blog.views", "name": "PostList"}}},
        {"kind": "view", "route": ":id", "name": "post-detail",
         "view": {"module": "blog.views", "name": "post_detail"}}
    ]}
]"#;

#[tokio::test]
async fn synced_permissions_drive_decisions() -> Result<()> {
    let db = setup_store().await?;
    let file = db.dir.path().join("urls.json");
    std::fs::write(&file, URLS)?;
    let urlconf = UrlConf::load(&file)?;

    let mut translator = Translator::new("en");
    let options = SyncOptions::new("blog", &Settings::default()).with_verbosity(0);
    let report = sync_app(&db.store, &urlconf, &mut translator, &options, &mut Vec::new()).await?;
    assert_eq!(report.created, 2);

    let store: Arc<dyn PermissionStore> = Arc::new(db.store.clone());
    let layer = ViewPermissionLayer::new(Arc::new(urlconf), store, Arc::new(Settings::default()));
    let guard = layer.guard();

    let reader = db.store.create_user("reader", true, false).await?;
    let ct = db.store.content_type("auth", "user").await?;
    let detail = db
        .store
        .permissions_by_codename(&ct, "access_view_blog.views.post_detail")
        .await?;
    db.store.grant_user_permission(reader.id, detail[0].id).await?;
    let reader = RequestUser::Authenticated(reader);

    assert_eq!(
        guard.check("/blog/3", Some(&reader)).await?,
        Decision::Granted {
            view_name: "blog.views.post_detail".to_string()
        }
    );
    assert_eq!(
        guard.check("/blog/", Some(&reader)).await?,
        Decision::Denied {
            view_name: "blog.views.PostList".to_string()
        }
    );
    assert_eq!(
        guard.check("/blog/3", Some(&RequestUser::Anonymous)).await?,
        Decision::Denied {
            view_name: "blog.views.post_detail".to_string()
        }
    );
    assert_eq!(guard.check("/shop/", Some(&reader)).await?, Decision::Unresolved);
    assert!(matches!(
        guard.check("/blog/3", None).await,
        Err(AppError::Configuration(_))
    ));
    Ok(())
}

#[tokio::test]
async fn deleting_permissions_reopens_views() -> Result<()> {
    let db = setup_store().await?;
    let urlconf = UrlConf::from_json_str(URLS)?;
    let mut translator = Translator::new("en");
    let settings = Settings::default();

    let create = SyncOptions::new("blog", &settings).with_verbosity(0);
    sync_app(&db.store, &urlconf, &mut translator, &create, &mut Vec::new()).await?;

    let store: Arc<dyn PermissionStore> = Arc::new(db.store.clone());
    let layer = ViewPermissionLayer::new(Arc::new(urlconf.clone()), store, Arc::new(settings.clone()));
    assert!(!layer.guard().check("/blog", Some(&RequestUser::Anonymous)).await?.is_allowed());

    let delete = create.with_mode(view_perms::SyncMode::Delete);
    sync_app(&db.store, &urlconf, &mut translator, &delete, &mut Vec::new()).await?;

    assert_eq!(
        layer.guard().check("/blog", Some(&RequestUser::Anonymous)).await?,
        Decision::Unprotected {
            view_name: "blog.views.PostList".to_string()
        }
    );
    Ok(())
}
