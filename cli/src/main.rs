use std::path::PathBuf;
use std::sync::Arc;

use admin_console::config::{AppConfig, ConfigError, Microservice};
use admin_console::context::AppContext;
use admin_console::http::{ApiError, ApiRequest};
use admin_console::login::{LoginError, LoginFlow};
use admin_console::messages::MessageKind;
use admin_console::navbar::NavbarItem;
use admin_console::session::FileStorage;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Login(#[from] LoginError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not signed in; run `admin-cli login <email>` first")]
    NotAuthenticated,
    #[error("login aborted")]
    Aborted,
}

#[derive(Parser, Debug)]
#[command(name = "admin-cli", about = "Admin console session and API CLI")]
struct Cli {
    /// Where the session (jwt, refresh token, role) is kept between runs.
    #[arg(long, env = "ADMIN_SESSION_FILE", default_value = ".admin-session.json")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request and verify a code interactively.
    Login { email: String },
    Otp(OtpCommand),
    Status,
    Logout,
    Navbar,
    /// Authenticated GET against a microservice, e.g. `get core /users`.
    Get { service: Microservice, path: String },
}

#[derive(Args, Debug)]
struct OtpCommand {
    #[command(subcommand)]
    command: OtpSubcommand,
}

#[derive(Subcommand, Debug)]
enum OtpSubcommand {
    Request { email: String },
    Verify { email: String, code: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let storage = Arc::new(FileStorage::new(cli.session_file));
    let ctx = AppContext::connect(config, storage)?;
    ctx.start();

    let result = match cli.command {
        Command::Login { email } => run_login(&ctx, &email).await,
        Command::Otp(otp) => run_otp(&ctx, otp).await,
        Command::Status => {
            run_status(&ctx);
            Ok(())
        }
        Command::Logout => {
            ctx.logout();
            println!("signed out");
            Ok(())
        }
        Command::Navbar => run_navbar(&ctx).await,
        Command::Get { service, path } => run_get(&ctx, service, &path).await,
    };

    if let Err(e) = &result {
        surface_unhandled(&ctx, e);
    }
    report(&ctx);
    ctx.teardown();
    result
}

/// Route failures the session layer never saw through the unhandled-error path.
fn surface_unhandled(ctx: &AppContext, err: &CliError) {
    if matches!(err, CliError::Io(_) | CliError::InvalidJson(_) | CliError::Http(_)) {
        ctx.signals.report_unhandled(err);
    }
}

async fn run_login(ctx: &AppContext, email: &str) -> Result<(), CliError> {
    let mut flow = ctx.login_flow();
    flow.request_otp(email).await?;
    report(ctx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("verification code (or `resend`): ");
        let Some(line) = lines.next_line().await? else {
            flow.teardown();
            return Err(CliError::Aborted);
        };
        let line = line.trim();

        if line.eq_ignore_ascii_case("resend") {
            match flow.resend_otp().await {
                Err(LoginError::CooldownActive { remaining }) => eprintln!("resend available in {remaining}s"),
                Err(LoginError::Api(_) | LoginError::Rejected(_)) | Ok(()) => report(ctx),
                Err(e) => return Err(e.into()),
            }
            continue;
        }

        if !try_verify(&mut flow, line).await? {
            report(ctx);
            continue;
        }
        println!("signed in as {}", ctx.session.role().as_deref().unwrap_or("-"));
        return Ok(());
    }
}

/// Returns `Ok(false)` for failures the user can retry.
async fn try_verify(flow: &mut LoginFlow, line: &str) -> Result<bool, CliError> {
    flow.input_mut().clear();
    flow.input_mut().paste(line);
    match flow.verify_entered().await {
        Ok(()) => Ok(true),
        Err(LoginError::InvalidCode | LoginError::Rejected(_) | LoginError::Api(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn run_otp(ctx: &AppContext, otp: OtpCommand) -> Result<(), CliError> {
    let mut flow = ctx.login_flow();
    match otp.command {
        OtpSubcommand::Request { email } => {
            flow.request_otp(&email).await?;
            flow.teardown();
        }
        OtpSubcommand::Verify { email, code } => {
            flow.verify_otp(&email, &code).await?;
            println!("signed in as {}", ctx.session.role().as_deref().unwrap_or("-"));
        }
    }
    Ok(())
}

fn run_status(ctx: &AppContext) {
    if ctx.session.is_authenticated() {
        println!("authenticated");
        println!("role: {}", ctx.session.role().as_deref().unwrap_or("-"));
        let refresh = if ctx.session.refresh_token().is_some() { "present" } else { "absent" };
        println!("refresh token: {refresh}");
    } else {
        println!("not authenticated");
    }
    println!("page: {}", ctx.navigator.current());
}

async fn run_navbar(ctx: &AppContext) -> Result<(), CliError> {
    if !ctx.session.is_authenticated() {
        return Err(CliError::NotAuthenticated);
    }
    let items = ctx.navbar.items().await;
    print_tree(&items, 0);
    Ok(())
}

fn print_tree(items: &[NavbarItem], depth: usize) {
    for item in items {
        let indent = "  ".repeat(depth);
        let marker = if item.is_expandable() { "+" } else { "-" };
        match &item.link {
            Some(link) => println!("{indent}{marker} {} ({link})", item.label),
            None => println!("{indent}{marker} {}", item.label),
        }
        print_tree(&item.children, depth + 1);
    }
}

async fn run_get(ctx: &AppContext, service: Microservice, path: &str) -> Result<(), CliError> {
    let url = ctx.config.url(service, path);
    let response = ctx.client.send(ApiRequest::get(url)).await?;
    print_json(&response.body)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

/// Render the latest toast and any visible error overlay on stderr.
fn report(ctx: &AppContext) {
    if let Some(message) = ctx.messages.current() {
        let label = match message.kind {
            MessageKind::Success => "ok",
            MessageKind::Error => "error",
            MessageKind::Warning => "warning",
            MessageKind::Info => "info",
        };
        eprintln!("[{label}] {}", message.text);
        ctx.messages.clear();
    }
    let error = ctx.signals.error();
    if error.visible {
        let title = error.title.as_deref().unwrap_or("Error");
        match &error.code {
            Some(code) => eprintln!("[{title} {code}] {}", error.message),
            None => eprintln!("[{title}] {}", error.message),
        }
        if error.retry.is_some() {
            eprintln!("(the request can be retried)");
        }
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
