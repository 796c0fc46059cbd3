use anyhow::Result;
use clap::{Parser, Subcommand};
use taskd::{config::ServerConfig, identity, rest, AppContext};
use tracing::info;

#[derive(Parser)]
#[command(name = "taskd", about = "taskd — per-user task-tracking daemon", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST API port
    #[arg(long, env = "TASKD_PORT")]
    port: Option<u16>,

    /// Data directory for the SQLite database and token secret
    #[arg(long, env = "TASKD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKD_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TASKD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TASKD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon server (default when no subcommand given).
    ///
    /// Runs taskd in the foreground.
    ///
    /// Examples:
    ///   taskd serve
    ///   taskd
    Serve,
    /// Manage bearer tokens.
    ///
    /// Token issuance is out of band: mint a token here and hand it to the
    /// client. The REST API only ever verifies.
    ///
    /// Examples:
    ///   taskd token issue --user alice
    ///   taskd token issue --user alice --ttl-secs 3600
    ///   taskd token secret
    Token {
        #[command(subcommand)]
        cmd: TokenCmd,
    },
}

#[derive(Subcommand)]
enum TokenCmd {
    /// Mint a bearer token for a principal.
    Issue {
        /// Principal id the token authenticates as
        #[arg(long)]
        user: String,
        /// Token lifetime in seconds (default: config token_ttl_secs)
        #[arg(long)]
        ttl_secs: Option<i64>,
    },
    /// Print the path of the signing secret (created on demand).
    Secret,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init once — must happen before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format =
        std::env::var("TASKD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    match args.command {
        Some(Command::Token { cmd }) => {
            let config =
                ServerConfig::new(None, args.data_dir, Some("error".to_string()), None);
            match cmd {
                TokenCmd::Issue { user, ttl_secs } => {
                    let verifier = identity::TokenVerifier::from_data_dir(&config.data_dir)?;
                    let ttl = ttl_secs.unwrap_or(config.token_ttl_secs);
                    println!("{}", verifier.issue(&user, ttl)?);
                }
                TokenCmd::Secret => {
                    identity::get_or_create_secret(&config.data_dir)?;
                    println!("{}", config.data_dir.join("token_secret").display());
                }
            }
        }
        None | Some(Command::Serve) => {
            run_server(args.port, args.data_dir, args.log, args.bind_address).await?;
        }
    }

    Ok(())
}

async fn run_server(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
) -> Result<()> {
    let config = ServerConfig::new(port, data_dir, log, bind_address);
    info!(
        "taskd v{} starting (data dir: {})",
        env!("CARGO_PKG_VERSION"),
        config.data_dir.display()
    );

    let ctx = AppContext::bootstrap(config).await?;
    rest::start_rest_server(ctx.clone()).await?;

    // Graceful shutdown: the serve loop returned, flush the pool.
    ctx.storage.close().await;
    info!("taskd stopped");
    Ok(())
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("taskd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(log_level)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(log_level)
                    .compact()
                    .init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking).with_ansi(false))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
        }
        return Some(guard);
    }

    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
    None
}
