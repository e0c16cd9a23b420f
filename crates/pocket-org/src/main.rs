use std::cell::Cell;
use std::env;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use pocket_core::api::{ItemState, PocketClient, RetrieveOptions};
use pocket_core::auth::{
    AuthError, Authorization, Authorizer, FileCredentialStore, PocketAuthClient,
};
use pocket_core::config::{
    ConfigLocator, PocketEndpoints, DEFAULT_API_BASE, DEFAULT_AUTHORIZE_URL,
};
use pocket_core::consumer_key::ConsumerKeyStore;
use pocket_core::export::print_and_archive;
use tokio::task;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

const CONSUMER_KEY_PROMPT: &str =
    "Enter your consumer key (from https://getpocket.com/developer/apps/): ";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Print saved Pocket items as Org-mode TODO entries and archive them"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    export: ExportArgs,
    /// Configuration directory (defaults to ~/.config/pocket)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Give up waiting for the browser authorization after this many seconds
    #[arg(long = "callback-timeout", global = true)]
    callback_timeout: Option<u64>,
    /// Open the authorization URL in the system browser
    #[arg(long, global = true)]
    open: bool,
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authorization related commands
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Authorize with Pocket, replacing any stored credentials
    Login,
    /// Forget stored credentials
    Logout,
    /// Show whether credentials are stored
    Status,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Which items to export (unread, archive, all)
    #[arg(long)]
    state: Option<ItemState>,
    /// Only items carrying this tag
    #[arg(long)]
    tag: Option<String>,
    /// Only items whose title or URL contains this term
    #[arg(long)]
    search: Option<String>,
    /// Only items from this domain
    #[arg(long)]
    domain: Option<String>,
    /// Maximum number of items to export
    #[arg(long)]
    count: Option<u32>,
    /// Print items without archiving them
    #[arg(long)]
    keep: bool,
}

impl ExportArgs {
    fn retrieve_options(&self) -> RetrieveOptions {
        RetrieveOptions {
            state: self.state,
            tag: self.tag.clone(),
            search: self.search.clone(),
            domain: self.domain.clone(),
            count: self.count,
        }
    }
}

/// Everything the commands need, resolved once at startup.
struct Settings {
    locator: ConfigLocator,
    endpoints: PocketEndpoints,
    callback_timeout: Option<Duration>,
    open_browser: bool,
}

impl Settings {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let config_dir = cli
            .config_dir
            .clone()
            .or_else(|| non_empty_var("POCKET_CONFIG_DIR").map(PathBuf::from));
        let locator = match config_dir {
            Some(dir) => ConfigLocator::at(dir),
            None => ConfigLocator::new(),
        }
        .context("unable to prepare configuration directory")?;

        let api_base = non_empty_var("POCKET_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into());
        let authorize_url =
            non_empty_var("POCKET_AUTHORIZE_URL").unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.into());
        let endpoints = PocketEndpoints::new(&api_base, &authorize_url)
            .context("invalid POCKET_API_BASE or POCKET_AUTHORIZE_URL")?;

        Ok(Self {
            locator,
            endpoints,
            callback_timeout: cli.callback_timeout.map(Duration::from_secs),
            open_browser: cli.open,
        })
    }

    fn authorizer(&self) -> Result<Authorizer<FileCredentialStore, PocketAuthClient>> {
        let service = PocketAuthClient::new(self.endpoints.clone())
            .context("failed to build authorization client")?;
        Ok(
            Authorizer::new(FileCredentialStore::new(&self.locator), service)
                .with_callback_timeout(self.callback_timeout),
        )
    }

    fn notify(&self) -> impl Fn(&Url) -> Result<(), AuthError> + '_ {
        move |url| {
            eprintln!("\nAuthorize the application by visiting:\n  {url}\n");
            if self.open_browser {
                if let Err(err) = open::that(url.as_str()) {
                    warn!(error = %err, "failed to launch browser; open the URL manually");
                }
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = runtime.block_on(run(cli)) {
        error!("{err:#}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_cli(&cli)?;
    info!(config_dir = %settings.locator.root().display(), "using configuration directory");
    match cli.command {
        None => export(&settings, &cli.export).await,
        Some(Commands::Auth(cmd)) => match cmd {
            AuthCommand::Login => auth_login(&settings).await,
            AuthCommand::Logout => auth_logout(&settings),
            AuthCommand::Status => auth_status(&settings),
        },
    }
}

async fn export(settings: &Settings, args: &ExportArgs) -> Result<()> {
    let consumer_key = resolve_consumer_key(settings).await?;
    let handshake_started = Cell::new(false);
    let authorization = settings
        .authorizer()?
        .ensure_authorization(
            &consumer_key,
            tracking(settings.notify(), &handshake_started),
        )
        .await
        .context("authorization failed")?;
    if handshake_started.get() {
        eprintln!("{}", completion_message(&authorization));
    }

    let client = PocketClient::new(consumer_key, &authorization, settings.endpoints.clone())
        .context("failed to build API client")?;
    let mut out = BufWriter::new(io::stdout());
    print_and_archive(&client, &args.retrieve_options(), &mut out, !args.keep)
        .await
        .context("failed to export items")?;
    out.flush().context("failed to write output")?;
    Ok(())
}

async fn auth_login(settings: &Settings) -> Result<()> {
    let consumer_key = resolve_consumer_key(settings).await?;
    let authorization = settings
        .authorizer()?
        .authorize(&consumer_key, settings.notify())
        .await
        .context("authorization failed")?;
    eprintln!("{}", completion_message(&authorization));
    Ok(())
}

/// Wrap `notify` so `started` records whether a handshake reached the user.
fn tracking<'a, F>(
    notify: F,
    started: &'a Cell<bool>,
) -> impl Fn(&Url) -> Result<(), AuthError> + 'a
where
    F: Fn(&Url) -> Result<(), AuthError> + 'a,
{
    move |url| {
        started.set(true);
        notify(url)
    }
}

fn completion_message(authorization: &Authorization) -> String {
    if authorization.username.is_empty() {
        "Authorization complete.".to_owned()
    } else {
        format!("Authorization complete. Logged in as {}.", authorization.username)
    }
}

fn auth_logout(settings: &Settings) -> Result<()> {
    settings
        .authorizer()?
        .logout()
        .context("failed to remove stored credentials")?;
    eprintln!("Deleted stored credentials.");
    Ok(())
}

fn auth_status(settings: &Settings) -> Result<()> {
    let record = settings
        .authorizer()?
        .current()
        .context("failed to read stored credentials")?;
    match record {
        Some(record) => {
            let user = if record.username.is_empty() {
                "unknown user"
            } else {
                record.username.as_str()
            };
            println!("Authorized as {user}.");
            if let Some(obtained_at) = record.obtained_at {
                println!("Obtained at {} (UTC).", obtained_at.to_rfc3339());
            }
        }
        None => println!("Not authorized; run `pocket-org auth login`."),
    }
    Ok(())
}

/// Environment, then the cached file, then an interactive prompt whose answer is cached.
async fn resolve_consumer_key(settings: &Settings) -> Result<String> {
    if let Some(key) = non_empty_var("POCKET_CONSUMER_KEY") {
        return Ok(key);
    }

    let store = ConsumerKeyStore::new(&settings.locator);
    if let Some(key) = store.load().context("failed to read consumer key")? {
        return Ok(key);
    }

    warn!(path = %settings.locator.consumer_key_file().display(), "no consumer key stored");
    let key = prompt_for_consumer_key().await?;
    store.save(&key).context("failed to store consumer key")?;
    Ok(key)
}

async fn prompt_for_consumer_key() -> Result<String> {
    let key = task::spawn_blocking(|| -> io::Result<String> {
        eprint!("{CONSUMER_KEY_PROMPT}");
        io::stderr().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_owned())
    })
    .await
    .context("consumer key prompt was interrupted")?
    .context("failed to read consumer key")?;

    if key.is_empty() {
        return Err(anyhow!("no consumer key entered"));
    }
    Ok(key)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
