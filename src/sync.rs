//! Reconciles view permissions of one application against the store.
//!
//! Three mutually exclusive modes:
//!
//! * create/update: every app view outside the ignore list gets a permission
//!   named after it, existing names are re-translated, records of ignored
//!   views are removed;
//! * delete: every record of the app is removed;
//! * prune-stale: records without a matching current view are removed.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::io::Write;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{ModelRef, Settings};
use crate::i18n::Translator;
use crate::models::permission::ContentType;
use crate::store::{PermissionStore, StoreError};
use crate::urls::{app_views, UrlConf, ViewDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("no installed app with label '{0}'")]
    UnknownApp(String),
    #[error("error when finding user content type: '{0}'")]
    ContentType(#[source] StoreError),
    #[error("{count} permissions share the codename '{codename}'")]
    DuplicatePermission { codename: String, count: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write command output: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    CreateOrUpdate,
    Delete,
    PruneStale,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub app: String,
    pub perm_prefix: String,
    /// Language for display names; `None` keeps the translator's default.
    pub language: Option<String>,
    pub update_trans: bool,
    pub mode: SyncMode,
    pub verbosity: u8,
    pub ignore_list: BTreeSet<String>,
    pub user_model: ModelRef,
}

impl SyncOptions {
    pub fn new(app: impl Into<String>, settings: &Settings) -> Self {
        Self {
            app: app.into(),
            perm_prefix: settings.perm_prefix.clone(),
            language: None,
            update_trans: false,
            mode: SyncMode::default(),
            verbosity: 1,
            ignore_list: settings.ignore_list.clone(),
            user_model: settings.user_model.clone(),
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_perm_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.perm_prefix = prefix.into();
        self
    }

    fn app_prefix(&self) -> String {
        format!("{}{}.", self.perm_prefix, self.app)
    }

    fn codename(&self, view_name: &str) -> String {
        format!("{}{}", self.perm_prefix, view_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub total_views: usize,
    pub app_views: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub ignored: usize,
}

/// Fails unless `app` is listed in `INSTALLED_APPS`; no list means any app goes.
pub fn ensure_installed(app: &str, settings: &Settings) -> Result<(), CommandError> {
    match &settings.installed_apps {
        Some(apps) if !apps.contains(app) => Err(CommandError::UnknownApp(app.to_string())),
        _ => Ok(()),
    }
}

struct Console<'w, W: Write + ?Sized> {
    out: &'w mut W,
    verbosity: u8,
}

impl<W: Write + ?Sized> Console<'_, W> {
    fn say(&mut self, level: u8, message: impl Display) -> std::io::Result<()> {
        if self.verbosity >= level {
            writeln!(self.out, "{message}")?;
        }
        Ok(())
    }
}

pub async fn sync_app<S, W>(
    store: &S,
    urlconf: &UrlConf,
    translator: &mut Translator,
    options: &SyncOptions,
    out: &mut W,
) -> Result<SyncReport, CommandError>
where
    S: PermissionStore + ?Sized,
    W: Write + ?Sized,
{
    let started = Instant::now();
    let started_at = Utc::now();
    info!(app = %options.app, mode = ?options.mode, "view permission sync started at {started_at}");

    let mut console = Console {
        out,
        verbosity: options.verbosity,
    };
    console.say(2, format!("started at {started_at}"))?;

    if options.update_trans {
        warn!("--update-trans has no effect; create/update already refreshes translated names");
    }

    let requested = options
        .language
        .clone()
        .unwrap_or_else(|| translator.default_language().to_string());
    console.say(1, format!("Trying to set the language to '{requested}'"))?;
    let active = translator.activate(&requested).to_string();
    console.say(1, format!("Language set to '{active}'"))?;

    let all_views = urlconf.views();
    let views = app_views(&all_views, &options.app);
    console.say(
        0,
        format!(
            "Total of {} views found, {} of which belong in app '{}'",
            all_views.len(),
            views.len(),
            options.app
        ),
    )?;

    // view permissions are anchored to the user model; the store needs some model
    let model = &options.user_model;
    let content_type = store
        .content_type(&model.app_label, &model.model)
        .await
        .map_err(CommandError::ContentType)?;

    let mut report = SyncReport {
        mode: options.mode,
        total_views: all_views.len(),
        app_views: views.len(),
        ..SyncReport::default()
    };

    match options.mode {
        SyncMode::Delete => delete_all(store, &content_type, options, &mut console, &mut report).await?,
        SyncMode::PruneStale => {
            prune_stale(store, &content_type, &views, options, &mut console, &mut report).await?
        }
        SyncMode::CreateOrUpdate => {
            create_or_update(store, &content_type, &views, translator, options, &mut console, &mut report).await?
        }
    }

    let finished_at = Utc::now();
    info!(
        app = %options.app,
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        "view permission sync finished at {finished_at}, took {:?}",
        started.elapsed()
    );
    console.say(2, format!("finished at {finished_at}, took {:?}", started.elapsed()))?;

    Ok(report)
}

async fn delete_all<S, W>(
    store: &S,
    content_type: &ContentType,
    options: &SyncOptions,
    console: &mut Console<'_, W>,
    report: &mut SyncReport,
) -> Result<(), CommandError>
where
    S: PermissionStore + ?Sized,
    W: Write + ?Sized,
{
    let deleted = store
        .delete_permissions_with_prefix(content_type, &options.app_prefix())
        .await?;
    report.deleted = deleted as usize;
    console.say(0, format!("{} permissions deleted", report.deleted))?;
    Ok(())
}

async fn prune_stale<S, W>(
    store: &S,
    content_type: &ContentType,
    views: &[&ViewDescriptor],
    options: &SyncOptions,
    console: &mut Console<'_, W>,
    report: &mut SyncReport,
) -> Result<(), CommandError>
where
    S: PermissionStore + ?Sized,
    W: Write + ?Sized,
{
    let perms = store
        .permissions_with_prefix(content_type, &options.app_prefix())
        .await?;
    // ignored views still exist, so their records are not stale
    let current: HashSet<String> = views
        .iter()
        .map(|view| options.codename(&view.identity()))
        .collect();

    console.say(
        2,
        format!(
            "Currently {} view access permissions for app '{}' exist",
            perms.len(),
            options.app
        ),
    )?;

    for perm in perms.iter().filter(|perm| !current.contains(&perm.codename)) {
        console.say(
            1,
            format!("View access permission is no longer necessary. '{}'", perm.codename),
        )?;
        store.delete_permission(perm.id).await?;
        debug!(codename = %perm.codename, "stale view permission deleted");
        report.deleted += 1;
    }

    console.say(0, format!("{} permissions deleted", report.deleted))?;
    Ok(())
}

async fn create_or_update<S, W>(
    store: &S,
    content_type: &ContentType,
    views: &[&ViewDescriptor],
    translator: &Translator,
    options: &SyncOptions,
    console: &mut Console<'_, W>,
    report: &mut SyncReport,
) -> Result<(), CommandError>
where
    S: PermissionStore + ?Sized,
    W: Write + ?Sized,
{
    for view in views {
        let view_name = view.identity();
        let codename = options.codename(&view_name);

        if options.ignore_list.contains(&view_name) {
            report.ignored += 1;
            console.say(1, format!("View access permission ignored for '{view_name}'"))?;

            for perm in store.permissions_by_codename(content_type, &codename).await? {
                store.delete_permission(perm.id).await?;
                report.deleted += 1;
                console.say(
                    1,
                    format!(
                        "Deleted view access permission for '{view_name}', since it was in the ignore list"
                    ),
                )?;
            }
            continue;
        }

        let name = translator.permission_name(&view.display_name());
        let existing = store.permissions_by_codename(content_type, &codename).await?;

        match existing.as_slice() {
            [] => {
                store.create_permission(content_type, &codename, &name).await?;
                report.created += 1;
                console.say(1, format!("View access permission created for '{view_name}'"))?;
            }
            [perm] => {
                console.say(1, format!("View access permission already exists for '{view_name}'"))?;
                if perm.name != name {
                    store.rename_permission(perm.id, &name).await?;
                    report.updated += 1;
                    console.say(1, format!("Updated access permission name for '{view_name}'."))?;
                }
            }
            many => {
                return Err(CommandError::DuplicatePermission {
                    codename,
                    count: many.len(),
                });
            }
        }
    }

    console.say(0, format!("{} permissions created", report.created))?;
    if report.updated > 0 {
        console.say(1, format!("{} permission names updated", report.updated))?;
    }
    Ok(())
}
