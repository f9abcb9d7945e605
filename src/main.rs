use std::sync::Arc;

use clap::{Parser, Subcommand};
use coverage_client::credentials::{CredentialStore, MemoryCredentialStore, REFRESH_TOKEN_KEY, TOKEN_KEY};
use coverage_client::navigation::LogNavigator;
use coverage_client::net::client::Method;
use coverage_client::routes::{self, GuardOutcome, Route};
use coverage_client::{ApiError, ClientConfig, HttpClient, Session, SessionStore};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("API request failed: {0}")]
    Api(#[from] ApiError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("not signed in")]
    NotSignedIn,
}

#[derive(Parser, Debug)]
#[command(name = "coverage-client", about = "e2e-coverage API client")]
struct Cli {
    /// Overrides COVERAGE_API_URL / COVERAGE_ORIGIN.
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long, env = "COVERAGE_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "COVERAGE_REFRESH_TOKEN")]
    refresh_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the signed-in user and roles.
    Whoami,
    /// Sign in, then show the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "COVERAGE_PASSWORD")]
        password: String,
    },
    /// Raw authenticated request; prints the JSON response.
    Request {
        #[arg(value_parser = parse_method)]
        method: Method,
        path: String,
        #[arg(long)]
        data: Option<String>,
    },
    /// Check whether the current user may open a dashboard page.
    Route { path: String },
    Products,
    /// Area coverage for a product.
    Coverage { product_id: i64 },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coverage_client=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = cli.api_url.as_deref() {
        config.api_url = ClientConfig::new(api_url).api_url;
    }
    let creds = MemoryCredentialStore::new();
    if let Some(token) = cli.token.as_deref() {
        creds.set(TOKEN_KEY, token);
    }
    if let Some(refresh) = cli.refresh_token.as_deref() {
        creds.set(REFRESH_TOKEN_KEY, refresh);
    }
    let client = HttpClient::new(config, Arc::new(creds), Arc::new(LogNavigator))?;
    tracing::debug!(api_url = %client.config().api_url, "client ready");

    let session = SessionStore::new();
    match cli.command {
        Command::Whoami => {
            load_session(&client, &session).await;
            print_session(&session.snapshot())
        }
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
            session.fetch_current_user(&client).await;
            print_session(&session.snapshot())
        }
        Command::Request { method, path, data } => {
            let body = data.as_deref().map(serde_json::from_str::<Value>).transpose()?;
            let value: Value = client.request(method, &path, body.as_ref()).await?;
            print_json(&value)
        }
        Command::Route { path } => {
            load_session(&client, &session).await;
            let route = routes::resolve(&path);
            let outcome = routes::guard(route, &session.snapshot());
            let verdict = match outcome {
                GuardOutcome::Allow => json!({ "allow": true }),
                GuardOutcome::Login => json!({ "allow": false, "redirect": Route::Login.path() }),
                GuardOutcome::Forbidden(role) => json!({ "allow": false, "requires": role.as_str() }),
            };
            print_json(&json!({ "route": route.name(), "path": route.path(), "guard": verdict }))
        }
        Command::Products => {
            require_session(&client, &session).await?;
            let products = client.products().await?;
            print_json(&serde_json::to_value(products)?)
        }
        Command::Coverage { product_id } => {
            require_session(&client, &session).await?;
            let areas = client.area_coverage(product_id).await?;
            print_json(&serde_json::to_value(areas)?)
        }
    }
}

/// Current user from the API, or the stored role list when it is unreachable.
async fn load_session(client: &HttpClient, session: &SessionStore) {
    let backup = client.role_backup().map(Arc::as_ref);
    session.fetch_or_restore(client, client.credentials().as_ref(), backup).await;
}

async fn require_session(client: &HttpClient, session: &SessionStore) -> Result<(), CliError> {
    session.fetch_current_user(client).await;
    if session.is_logged_in() { Ok(()) } else { Err(CliError::NotSignedIn) }
}

fn parse_method(raw: &str) -> Result<Method, String> {
    raw.to_ascii_uppercase()
        .parse::<Method>()
        .map_err(|e| format!("invalid HTTP method {raw:?}: {e}"))
}

fn print_session(session: &Session) -> Result<(), CliError> {
    print_json(&json!({
        "loggedIn": session.is_logged_in(),
        "userId": session.user_id,
        "email": session.email,
        "roles": session.roles,
        "admin": session.is_admin(),
        "maintainer": session.is_maintainer(),
        "tester": session.is_tester(),
    }))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
