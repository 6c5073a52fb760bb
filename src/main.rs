use std::io::Write;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use view_perms::config::Settings;
use view_perms::i18n::Translator;
use view_perms::store::SqlitePermissionStore;
use view_perms::sync::{ensure_installed, sync_app, SyncMode, SyncOptions};
use view_perms::db;
use view_perms::urls::{app_views, UrlConf};

#[derive(Parser, Debug)]
#[command(author, version, about = "per-view permission management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a permission for every view endpoint in an app, if not exist
    CreateViewPerms(CreateViewPermsArgs),
    /// List the views found in the url configuration
    ShowViews {
        /// Only list views belonging to this app
        #[arg(long)]
        app: Option<String>,
    },
    /// Apply pending migrations and register the AUTH_USER_MODEL content type
    Migrate,
}

#[derive(Args, Debug)]
struct CreateViewPermsArgs {
    /// Dotted app names, e.g. `blog` or `shop.api`
    #[arg(required = true, value_name = "APP")]
    apps: Vec<String>,
    /// Prefix added before the permission codename [default: VIEW_PERMS_PREFIX or access_view_]
    #[arg(long = "perm-prefix")]
    perm_prefix: Option<String>,
    /// Language to translate permission names to [default: LANGUAGE_CODE]
    #[arg(long)]
    language: Option<String>,
    /// Read the updated translation for permission names (currently has no effect)
    #[arg(long = "update-trans")]
    update_trans: bool,
    /// Remove all view permissions previously created for the app
    #[arg(long = "delete-perms", conflicts_with = "prune_stale")]
    delete_perms: bool,
    /// Remove permissions which no longer have a corresponding view
    #[arg(long = "prune-stale")]
    prune_stale: bool,
    /// 0 = minimal, 1 = normal, 2 and 3 = verbose
    #[arg(short = 'v', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    verbosity: u8,
}

impl CreateViewPermsArgs {
    fn mode(&self) -> SyncMode {
        if self.delete_perms {
            SyncMode::Delete
        } else if self.prune_stale {
            SyncMode::PruneStale
        } else {
            SyncMode::CreateOrUpdate
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::CreateViewPerms(args) => create_view_perms(&settings, args).await?,
        Commands::ShowViews { app } => show_views(&settings, app.as_deref())?,
        Commands::Migrate => migrate(&settings).await?,
    }

    Ok(())
}

async fn create_view_perms(settings: &Settings, args: CreateViewPermsArgs) -> anyhow::Result<()> {
    for app in &args.apps {
        ensure_installed(app, settings)?;
    }

    let urlconf = load_urlconf(settings)?;
    let database_url = settings.database_url.as_deref().context("DATABASE_URL not set")?;
    let store = SqlitePermissionStore::new(db::connect(database_url).await?);
    let mut translator = Translator::with_locale_paths(&settings.language_code, &settings.locale_paths)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for app in &args.apps {
        let mut options = SyncOptions::new(app.clone(), settings)
            .with_mode(args.mode())
            .with_verbosity(args.verbosity);
        if let Some(prefix) = &args.perm_prefix {
            options = options.with_perm_prefix(prefix.clone());
        }
        if let Some(language) = &args.language {
            options = options.with_language(language.clone());
        }
        options.update_trans = args.update_trans;

        sync_app(&store, &urlconf, &mut translator, &options, &mut out)
            .await
            .with_context(|| format!("create-view-perms failed for app '{app}'"))?;
    }

    out.flush()?;
    Ok(())
}

async fn migrate(settings: &Settings) -> anyhow::Result<()> {
    let database_url = settings.database_url.as_deref().context("DATABASE_URL not set")?;
    let store = SqlitePermissionStore::new(db::init(database_url).await?);
    println!("Migrations applied");

    let model = &settings.user_model;
    let content_type = store
        .register_content_type(&model.app_label, &model.model)
        .await
        .with_context(|| format!("failed to register content type '{}.{}'", model.app_label, model.model))?;
    println!("Content type '{}.{}' registered", content_type.app_label, content_type.model);
    Ok(())
}

fn show_views(settings: &Settings, app: Option<&str>) -> anyhow::Result<()> {
    let urlconf = load_urlconf(settings)?;
    let views = urlconf.views();
    let selected: Vec<_> = match app {
        Some(app) => app_views(&views, app),
        None => views.iter().collect(),
    };

    println!("{:<8} {:<50} {}", "Status", "View", "Permission");
    for view in selected {
        let name = view.identity();
        let status = if settings.is_ignored(&name) { "ignored" } else { "managed" };
        println!("{:<8} {:<50} {}", status, name, settings.perm_codename(&name));
    }

    Ok(())
}

fn load_urlconf(settings: &Settings) -> anyhow::Result<UrlConf> {
    let path = settings.root_urlconf.as_ref().context("ROOT_URLCONF not set")?;
    UrlConf::load(path).with_context(|| format!("failed to load ROOT_URLCONF {}", path.display()))
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
