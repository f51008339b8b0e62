use std::env;
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};

use listgate::{api, auth, db, user};

const APP_NAME: &str = "listgate";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    match cli.command {
        Command::Serve(cmd) => async_main(ctx, cmd),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::GenSecret => handle_gen_secret(&ctx),
        Command::Token { command } => handle_token(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "listgate - credential issuing and request authorization server.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Print command output and logs as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Do not change anything on disk
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Create config directories and default files
    Init(InitCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print a random secret suitable for `auth.jwt_secret`
    GenSecret,
    /// Issue or inspect credentials with the configured secret
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides `server.host`)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides `server.port`)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Subcommand)]
enum TokenCommand {
    /// Sign a credential for an identity
    Issue(TokenIssueCommand),
    /// Verify a credential and print its claims
    Verify(TokenVerifyCommand),
}

#[derive(Debug, Clone, Args)]
struct TokenIssueCommand {
    /// Identity ID (`sub` claim)
    #[arg(long)]
    id: String,
    /// Email address
    #[arg(long)]
    email: String,
    /// Display name
    #[arg(long)]
    name: String,
}

#[derive(Debug, Clone, Args)]
struct TokenVerifyCommand {
    /// The credential to verify
    token: String,
    /// Verify as of this Unix timestamp instead of now
    #[arg(long, value_name = "UNIX_SECS")]
    at: Option<i64>,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let mut paths = AppPaths::discover(common.config.clone())?;
        let config = load_or_init_config(&mut paths, &common)?;
        let paths = paths.apply_overrides(&config)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        let level = self.effective_log_level();
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{APP_NAME}={level},tower_http={level}"))
        });

        // stdout carries command output; logs always go to stderr.
        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = if self.common.json {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .try_init()
        } else {
            let ansi = io::stderr().is_terminal() && env::var_os("NO_COLOR").is_none();
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(ansi)
                        .with_target(false),
                )
                .try_init()
        };

        installed.context("installing tracing subscriber")
    }

    fn effective_log_level(&self) -> &str {
        if self.common.quiet {
            "error"
        } else if self.common.trace {
            "trace"
        } else if self.common.debug {
            "debug"
        } else {
            match self.common.verbose {
                0 => self.config.logging.level.as_str(),
                1 => "debug",
                _ => "trace",
            }
        }
    }

    fn ensure_data_dir(&self) -> Result<()> {
        if self.common.dry_run {
            info!(
                "dry-run: would ensure data dir {}",
                self.paths.data_dir.display()
            );
            return Ok(());
        }

        fs::create_dir_all(&self.paths.data_dir).with_context(|| {
            format!("creating data directory {}", self.paths.data_dir.display())
        })
    }
}

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let expanded = expand_path(path)?;
                if expanded.is_dir() {
                    expanded.join("config.toml")
                } else {
                    expanded
                }
            }
            None => default_config_dir()?.join("config.toml"),
        };

        if config_file.parent().is_none() {
            return Err(anyhow!("invalid config file path: {config_file:?}"));
        }

        Ok(Self {
            config_file,
            data_dir: default_data_dir()?,
        })
    }

    fn apply_overrides(mut self, cfg: &AppConfig) -> Result<Self> {
        if let Some(ref data_override) = cfg.paths.data_dir {
            self.data_dir = expand_str_path(data_override)?;
        }
        Ok(self)
    }

    fn database_file(&self) -> PathBuf {
        self.data_dir.join("listgate.db")
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {}, data: {}",
            self.config_file.display(),
            self.data_dir.display()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    profile: String,
    logging: LoggingConfig,
    server: ServerConfig,
    paths: PathsConfig,
    auth: auth::AuthConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            paths: PathsConfig::default(),
            auth: auth::AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Copy safe to print: the literal secret is masked, `env:` references
    /// are kept.
    fn redacted(&self) -> Self {
        let mut config = self.clone();
        let literal = config
            .auth
            .jwt_secret
            .as_deref()
            .is_some_and(|secret| !secret.starts_with("env:"));
        if literal {
            config.auth.jwt_secret = Some("<redacted>".to_string());
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ServerConfig {
    host: String,
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct PathsConfig {
    data_dir: Option<String>,
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !cmd.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }

    if ctx.common.dry_run {
        info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }

    write_default_config(&ctx.paths.config_file)?;
    ctx.ensure_data_dir()?;
    println!("Wrote {}", ctx.paths.config_file.display());
    println!(
        "Set auth.jwt_secret (try `{APP_NAME} gen-secret`) or {}__AUTH__JWT_SECRET before serving.",
        env_prefix()
    );
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = ctx.config.redacted();
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config).context("serializing config to JSON")?
                );
            } else {
                println!(
                    "{}",
                    toml::to_string_pretty(&config).context("serializing config to TOML")?
                );
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_gen_secret(ctx: &RuntimeContext) -> Result<()> {
    let secret = auth::AuthConfig::generate_jwt_secret();
    if ctx.common.json {
        println!("{}", serde_json::json!({ "jwt_secret": secret }));
    } else {
        println!("{secret}");
    }
    Ok(())
}

fn handle_token(ctx: &RuntimeContext, command: TokenCommand) -> Result<()> {
    let codec =
        auth::TokenCodec::from_config(&ctx.config.auth).context("Invalid auth configuration")?;

    match command {
        TokenCommand::Issue(cmd) => {
            let identity = auth::Identity::new(cmd.id, cmd.email, cmd.name);
            let token = codec.issue(&identity).context("issuing credential")?;
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "token": token.as_str(),
                        "expires_in": codec.ttl_secs(),
                    })
                );
            } else {
                println!("{token}");
            }
            Ok(())
        }
        TokenCommand::Verify(cmd) => {
            let now = cmd.at.unwrap_or_else(auth::now_unix);
            let claims = match codec.verify_at(&cmd.token, now) {
                Ok(claims) => claims,
                Err(err) => bail!("credential rejected: {err}"),
            };
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&claims).context("serializing claims")?
                );
            } else {
                println!("sub:     {}", claims.identity_id());
                println!("email:   {}", claims.email());
                println!("name:    {}", claims.display_name());
                println!("issued:  {}", format_unix(claims.issued_at()));
                println!("expires: {}", format_unix(claims.expires_at()));
                println!("remaining: {}s", claims.remaining_secs(now));
            }
            Ok(())
        }
    }
}

fn format_unix(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting listgate server...");

    // Refuse to start without a usable signing secret.
    let auth_state =
        auth::AuthState::new(ctx.config.auth.clone()).context("Invalid auth configuration")?;
    info!(
        "Credential lifetime: {}s",
        auth_state.codec().ttl_secs()
    );

    ctx.ensure_data_dir()?;
    let db_path = ctx.paths.database_file();
    info!("Database path: {}", db_path.display());
    let database = db::Database::new(&db_path).await?;

    let user_repo = user::UserRepository::new(database.pool().clone());
    let user_service = user::UserService::new(user_repo);

    let state = api::AppState::new(user_service, auth_state);
    let app = api::create_router(state);

    let host = cmd.host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = cmd.port.unwrap_or(ctx.config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("invalid address")?;

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

fn load_or_init_config(paths: &mut AppPaths, common: &CommonOpts) -> Result<AppConfig> {
    if !paths.config_file.exists() {
        if common.dry_run {
            info!(
                "dry-run: would create default config at {}",
                paths.config_file.display()
            );
        } else {
            write_default_config(&paths.config_file)?;
        }
    }

    let env_prefix = env_prefix();
    let built = Config::builder()
        .set_default("profile", "default")?
        .set_default("logging.level", "info")?
        .set_default("auth.token_ttl_secs", auth::DEFAULT_TOKEN_TTL_SECS)?
        .add_source(
            File::from(paths.config_file.as_path())
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(
            Environment::with_prefix(env_prefix.as_str())
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("auth.allowed_origins")
                .try_parsing(true),
        )
        .build()?;

    let config: AppConfig = built.try_deserialize()?;
    Ok(config)
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn default_config_header(path: &Path) -> String {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push_str("#\n");
    buffer.push_str("# [auth] jwt_secret is required to serve. Use a literal value of at\n");
    buffer.push_str("# least 32 bytes or \"env:VAR_NAME\" to read it from the environment.\n");
    buffer.push('\n');
    buffer
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

fn default_config_dir() -> Result<PathBuf> {
    app_dir("XDG_CONFIG_HOME", dirs::config_dir, &[".config"])
}

fn default_data_dir() -> Result<PathBuf> {
    app_dir("XDG_DATA_HOME", dirs::data_dir, &[".local", "share"])
}

/// `$XDG_*/listgate`, then the platform directory, then `~/<fallback>/listgate`.
fn app_dir(
    xdg_var: &str,
    platform_dir: fn() -> Option<PathBuf>,
    home_fallback: &[&str],
) -> Result<PathBuf> {
    let base = env::var_os(xdg_var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(platform_dir)
        .or_else(|| {
            dirs::home_dir().map(|home| home_fallback.iter().fold(home, |p, seg| p.join(seg)))
        })
        .ok_or_else(|| anyhow!("unable to determine {xdg_var} directory"))?;
    Ok(base.join(APP_NAME))
}

fn env_prefix() -> String {
    APP_NAME.to_ascii_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_init_force_parses() {
        let cli = Cli::try_parse_from(["listgate", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Command::Init(InitCommand { force: true })));
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(), "LISTGATE");
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write_default_config(&path).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Configuration for listgate"));

        let parsed: AppConfig = toml::from_str(&body).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.auth.token_ttl_secs, auth::DEFAULT_TOKEN_TTL_SECS);
        assert!(parsed.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_redacted_hides_literal_secret_only() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some("a".repeat(40));
        assert_eq!(
            config.redacted().auth.jwt_secret.as_deref(),
            Some("<redacted>")
        );

        config.auth.jwt_secret = Some("env:LISTGATE_SECRET".to_string());
        assert_eq!(
            config.redacted().auth.jwt_secret.as_deref(),
            Some("env:LISTGATE_SECRET")
        );
    }
}
