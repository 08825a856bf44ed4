//! TAO Publisher CLI
//!
//! Validates publish files and registers containers and components on a
//! processing platform.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tao_publisher::client::models::{ComponentRecord, ContainerRecord};
use tao_publisher::client::pagination::{PageCursor, Paginator, SortDirection};
use tao_publisher::core::{ClientConfig, ConfigLoadOptions, ConfigLoader, PublishError};
use tao_publisher::orchestration::{CancelFlag, PublishOptions, init_project, publish_file};
use tao_publisher::security::{Credentials, SessionManager, mask_token};
use tao_publisher::validation::{DocumentFormat, read_publish_file};
use tao_publisher::{ApiClient, ResourceKind};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Publishing client for the TAO processing platform
#[derive(Parser)]
#[command(name = "tao-publisher")]
#[command(version)]
#[command(about = "Publishing client for the TAO processing platform", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "TAO_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or update the client configuration
    Config {
        /// Platform base URL
        #[arg(long)]
        url: Option<String>,

        /// Default login name
        #[arg(long)]
        user: Option<String>,
    },

    /// Log in and persist the session token
    Login {
        /// Login name (defaults to the configured user)
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short, long, env = "TAO_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Write an example publish file
    Init {
        /// Container name
        name: String,

        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Write JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Validate a publish file
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Register the container and components of a publish file
    Publish {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Concurrent uploads/registrations (overrides the configuration)
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// List registered resources
    List {
        #[arg(value_enum)]
        kind: ListKind,

        /// Fetch only this page (0-based)
        #[arg(long)]
        page: Option<u32>,

        /// Page size; without --page every page is fetched
        #[arg(long)]
        page_size: Option<NonZeroU32>,

        /// Sort field (paginated listing only)
        #[arg(long)]
        sort_by: Option<String>,

        /// Sort descending
        #[arg(long, requires = "sort_by")]
        desc: bool,

        /// Print as JSON
        #[arg(short, long)]
        json_format: bool,
    },

    /// Show registered resources by id
    Get {
        #[arg(value_enum)]
        kind: ListKind,

        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,

        /// Print as JSON
        #[arg(short, long)]
        json_format: bool,
    },

    /// Delete registered resources by id
    Delete {
        #[arg(value_enum)]
        kind: ListKind,

        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,

        /// Delete without asking
        #[arg(short, long)]
        yes: bool,

        /// Skip ids that cannot be found or deleted
        #[arg(short, long)]
        ignore: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Containers,
    Components,
}

impl ListKind {
    fn resource(self) -> ResourceKind {
        match self {
            Self::Containers => ResourceKind::Container,
            Self::Components => ResourceKind::Component,
        }
    }
}

const DEFAULT_PAGE_SIZE: u32 = 20;

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            if let Some(error) = e.downcast_ref::<PublishError>() {
                for action in error.suggested_actions() {
                    eprintln!("  → {}", action);
                }
            }
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let load_options = ConfigLoadOptions::from_process(cli.config.clone());

    match cli.command {
        Commands::Config { url, user } => config_command(&load_options, url, user).await,
        Commands::Login { user, password } => login_command(&load_options, user, password).await,
        Commands::Init { name, dir, json } => init_command(&name, &dir, json).await,
        Commands::Check { file } => check_command(&file).await,
        Commands::Publish {
            file,
            max_concurrency,
        } => publish_command(&load_options, &file, max_concurrency).await,
        Commands::List {
            kind,
            page,
            page_size,
            sort_by,
            desc,
            json_format,
        } => {
            let query = ListQuery {
                page,
                page_size,
                sort_by,
                desc,
            };
            list_command(&load_options, kind, query, json_format).await
        }
        Commands::Get {
            kind,
            ids,
            json_format,
        } => get_command(&load_options, kind, &ids, json_format).await,
        Commands::Delete {
            kind,
            ids,
            yes,
            ignore,
        } => delete_command(&load_options, kind, &ids, yes, ignore).await,
    }
}

/// `RUST_LOG` wins; otherwise the verbosity flags choose the level
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Session manager seeded with the persisted token, if any
async fn session_manager(config: &ClientConfig) -> Arc<SessionManager> {
    let sessions = Arc::new(SessionManager::new(config.session_ttl()));
    if let (Some(token), Some(expires_at)) = (&config.token, config.token_expires_at) {
        debug!(token = %mask_token(token), %expires_at, "restoring session");
        sessions
            .restore(SecretString::from(token.clone()), expires_at)
            .await;
    }
    sessions
}

async fn api_client(config: &ClientConfig) -> Result<ApiClient> {
    let sessions = session_manager(config).await;
    Ok(ApiClient::from_config(config, sessions)?)
}

async fn config_command(
    options: &ConfigLoadOptions,
    url: Option<String>,
    user: Option<String>,
) -> Result<i32> {
    let path = ConfigLoader::config_path(options)?;

    if url.is_none() && user.is_none() {
        let config = ConfigLoader::load(options).await?;
        println!("\n⚙️  Configuration ({})\n", path.display());
        println!("  url:            {}", config.url.as_deref().unwrap_or("-"));
        println!("  user:           {}", config.user.as_deref().unwrap_or("-"));
        println!(
            "  token:          {}",
            config.token.as_deref().map(mask_token).unwrap_or_else(|| "-".to_string())
        );
        if let Some(expires_at) = config.token_expires_at {
            println!("  token expires:  {}", expires_at);
        }
        println!("  timeout:        {}s", config.timeout().as_secs());
        println!("  concurrency:    {}", config.max_concurrency());
        println!();

        let validation = ConfigLoader::validate(&config);
        println!("{}", ConfigLoader::format_validation_result(&validation));
        return Ok(if validation.valid { 0 } else { 1 });
    }

    // Only the file layer is written back; env overrides stay out of it
    let mut config = ConfigLoader::load_config_file(&path).await?.unwrap_or_default();
    if let Some(url) = url {
        if config.url.as_deref() != Some(url.as_str()) {
            config.clear_session();
        }
        config.url = Some(url);
    }
    if let Some(user) = user {
        config.user = Some(user);
    }

    let validation = ConfigLoader::validate(&config);
    if !validation.valid {
        eprintln!("{}", ConfigLoader::format_validation_result(&validation));
        return Ok(1);
    }

    ConfigLoader::save(&config, &path).await?;
    println!("✅ Configuration saved to {}", path.display());
    Ok(0)
}

async fn login_command(
    options: &ConfigLoadOptions,
    user: Option<String>,
    password: Option<String>,
) -> Result<i32> {
    let config = ConfigLoader::load(options).await?;
    let Some(username) = user.or_else(|| config.user.clone()) else {
        bail!("no user given; pass --user or set one with `tao-publisher config --user`");
    };
    let Some(password) = password else {
        bail!("no password given; pass --password or set TAO_PASSWORD");
    };

    let client = api_client(&config).await?;
    let session = client
        .login(&Credentials::new(username.as_str(), password))
        .await?;

    let path = ConfigLoader::config_path(options)?;
    let mut stored = ConfigLoader::load_config_file(&path).await?.unwrap_or_default();
    stored.token = Some(session.token().expose_secret().to_string());
    stored.token_expires_at = Some(session.expires_at());
    if stored.url.is_none() {
        stored.url = config.url.clone();
    }
    ConfigLoader::save(&stored, &path)
        .await
        .context("logged in, but the session could not be saved")?;

    println!(
        "✅ Logged in as {} (session expires at {})",
        username,
        session.expires_at()
    );
    Ok(0)
}

async fn init_command(name: &str, dir: &Path, json: bool) -> Result<i32> {
    let format = if json {
        DocumentFormat::Json
    } else {
        DocumentFormat::Yaml
    };

    let path = init_project(name, dir, format).await?;
    println!("✅ Example publish file written to {}", path.display());
    println!("   Edit it, then run `tao-publisher check {}`", path.display());
    Ok(0)
}

async fn check_command(file: &Path) -> Result<i32> {
    println!("\n🔍 Publish File Check\n");

    match read_publish_file(file).await {
        Ok(spec) => {
            println!("  ✅ {} is valid\n", file.display());
            let document = spec
                .to_document()
                .context("failed to render the validated document")?;
            println!("{}", document);
            Ok(0)
        }
        Err(PublishError::Validation(errors)) => {
            println!("  ❌ {}", errors);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

async fn publish_command(
    options: &ConfigLoadOptions,
    file: &Path,
    max_concurrency: Option<usize>,
) -> Result<i32> {
    println!("\n📦 tao-publisher\n");

    let config = ConfigLoader::load(options).await?;
    let client = Arc::new(api_client(&config).await?);

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing in-flight requests");
            on_interrupt.cancel();
        }
    });

    let publish_options = PublishOptions::default()
        .with_concurrency(max_concurrency.unwrap_or_else(|| config.max_concurrency()))
        .with_cancel(cancel);

    match publish_file(file, client, publish_options).await {
        Ok(report) => {
            println!("{}", report.render());
            Ok(report.exit_code())
        }
        Err(PublishError::Validation(errors)) => {
            eprintln!("\n❌ Nothing was published: {}", errors);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

struct ListQuery {
    page: Option<u32>,
    page_size: Option<NonZeroU32>,
    sort_by: Option<String>,
    desc: bool,
}

async fn list_command(
    options: &ConfigLoadOptions,
    kind: ListKind,
    query: ListQuery,
    json_format: bool,
) -> Result<i32> {
    let config = ConfigLoader::load(options).await?;
    let client = api_client(&config).await?;
    let resource = kind.resource();

    let paginated = query.page.is_some() || query.page_size.is_some();
    if !paginated && query.sort_by.is_some() {
        warn!("--sort-by is ignored without --page or --page-size");
    }

    let mut cursor = None;
    if paginated {
        let size = query
            .page_size
            .or(NonZeroU32::new(DEFAULT_PAGE_SIZE))
            .context("page size must be positive")?;
        let mut first = PageCursor::first(size).at_page(query.page.unwrap_or(0));
        if let Some(field) = query.sort_by {
            let direction = if query.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            first = first.sorted_by(field, direction);
        }
        cursor = Some(first);
    }

    let single_page = query.page.is_some();
    let count = match resource {
        ResourceKind::Container => {
            let items: Vec<ContainerRecord> =
                fetch(&client, resource, cursor, single_page).await?;
            print_records(&items, json_format, container_line)?
        }
        ResourceKind::Component => {
            let items: Vec<ComponentRecord> =
                fetch(&client, resource, cursor, single_page).await?;
            print_records(&items, json_format, component_line)?
        }
    };

    eprintln!("{} {}(s)", count, resource);
    Ok(0)
}

async fn get_command(
    options: &ConfigLoadOptions,
    kind: ListKind,
    ids: &[String],
    json_format: bool,
) -> Result<i32> {
    let config = ConfigLoader::load(options).await?;
    let client = api_client(&config).await?;
    let resource = kind.resource();

    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let record: serde_json::Value = client
            .get(resource, id)
            .await
            .with_context(|| format!("failed to get {} '{}'", resource, id))?;
        records.push(record);
    }

    if json_format {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(0);
    }

    for record in records {
        let line = match resource {
            ResourceKind::Container => container_line(&serde_json::from_value(record)?),
            ResourceKind::Component => component_line(&serde_json::from_value(record)?),
        };
        println!("{}", line);
    }
    Ok(0)
}

async fn delete_command(
    options: &ConfigLoadOptions,
    kind: ListKind,
    ids: &[String],
    yes: bool,
    ignore: bool,
) -> Result<i32> {
    let config = ConfigLoader::load(options).await?;
    let client = api_client(&config).await?;
    let resource = kind.resource();

    for id in ids {
        let name = match display_name(&client, resource, id).await {
            Ok(name) => name,
            Err(e) if ignore => {
                debug!(%id, error = %e, "skipping");
                continue;
            }
            Err(e) => return Err(e.context(format!("cannot delete {} '{}'", resource, id))),
        };

        if !yes && !confirm(&format!("Delete {} '{}'?", resource, name)).await? {
            println!("⏭️  {} '{}' was not deleted", resource, name);
            continue;
        }

        match client.delete(resource, id).await {
            Ok(()) => println!("🗑️  Deleted {} '{}'", resource, name),
            Err(e) if ignore => debug!(%id, error = %e, "skipping"),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to delete {} '{}'", resource, id)));
            }
        }
    }
    Ok(0)
}

/// Name shown in prompts: container name or component label, else the id
async fn display_name(client: &ApiClient, resource: ResourceKind, id: &str) -> Result<String> {
    let name = match resource {
        ResourceKind::Container => {
            let record: ContainerRecord = client.get(resource, id).await?;
            record.name
        }
        ResourceKind::Component => {
            let record: ComponentRecord = client.get(resource, id).await?;
            record.label
        }
    };
    Ok(name.unwrap_or_else(|| id.to_string()))
}

/// Prompt user for confirmation
async fn confirm(message: &str) -> Result<bool> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{} [y/N] ", message).as_bytes()).await?;
    stdout.flush().await?;

    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn container_line(c: &ContainerRecord) -> String {
    format!(
        "{:<38} {:<30} {:<10} {}",
        c.id.as_deref().unwrap_or_default(),
        c.name.as_deref().unwrap_or_default(),
        c.version.as_deref().unwrap_or_default(),
        c.tag.as_deref().unwrap_or_default()
    )
}

fn component_line(c: &ComponentRecord) -> String {
    format!(
        "{:<38} {:<30} {:<10} {}",
        c.id.as_deref().unwrap_or_default(),
        c.label.as_deref().unwrap_or_default(),
        c.version.as_deref().unwrap_or_default(),
        c.container_id.as_deref().unwrap_or_default()
    )
}

/// Print one line per record, or the records as a JSON array; returns the count
fn print_records<T: serde::Serialize>(
    items: &[T],
    json_format: bool,
    line: fn(&T) -> String,
) -> Result<usize> {
    if json_format {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{}", line(item));
        }
    }
    Ok(items.len())
}

/// One page, every page from a cursor, or the unpaginated collection
async fn fetch<T>(
    client: &ApiClient,
    kind: ResourceKind,
    cursor: Option<PageCursor>,
    single_page: bool,
) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned + Send,
{
    let items = match cursor {
        None => client.list_all(kind).await?,
        Some(cursor) if single_page => client.list(kind, &cursor).await?.items,
        Some(cursor) => {
            let listing = client.listing::<T>(kind);
            Paginator::new(&listing, cursor).collect_all().await?
        }
    };
    Ok(items)
}
