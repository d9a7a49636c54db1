use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "conduct",
    version,
    about = "Conduct CLI — behavior tracking for one-on-one tutoring sessions"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "CONDUCT_API_URL", default_value = "http://localhost:4000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Session operations
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Incident operations
    Incident {
        #[command(subcommand)]
        command: IncidentCommands,
    },
    /// Methodology config operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Start a session (force-ends any live one)
    Start {
        /// Student name
        #[arg(long)]
        student: String,
        /// Grade 1-13
        #[arg(long)]
        grade: u8,
        /// Session mode
        #[arg(long, default_value = "one_on_one")]
        mode: String,
        /// Session goal (repeatable)
        #[arg(long = "goal")]
        goals: Vec<String>,
    },
    /// Show the live session with elapsed time and status
    Status,
    /// Pause the live session
    Pause,
    /// Resume a paused session
    Resume,
    /// Reconcile the timer against the local clock
    Tick,
    /// End the live session
    End,
}

#[derive(Subcommand)]
enum IncidentCommands {
    /// Log an incident against the live session
    Log {
        /// Category id (e.g. "DISRUPTION", "SAFETY_BOUNDARY")
        #[arg(long)]
        category: String,
        /// Operator severity estimate 1-4 (the engine may escalate)
        #[arg(long)]
        severity: Option<u8>,
        /// What happened
        #[arg(long)]
        description: String,
        /// Surrounding context
        #[arg(long)]
        context: Option<String>,
    },
    /// List incidents, newest first
    List {
        /// Filter by session id
        #[arg(long)]
        session_id: Option<String>,
        /// Filter by category id
        #[arg(long)]
        category: Option<String>,
        /// Only incidents logged at or after this timestamp (RFC3339)
        #[arg(long)]
        since: Option<String>,
    },
    /// Record the outcome of an incident
    Resolve {
        /// Incident id
        id: String,
        /// How the incident was closed
        #[arg(long)]
        outcome: String,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective methodology
    Show,
    /// Apply a custom methodology config from a JSON file
    Apply {
        /// Path to the config JSON
        file: String,
    },
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn exit_error(message: &str) -> ! {
    let err = json!({
        "error": "cli_error",
        "message": message
    });
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| message.to_string())
    );
    std::process::exit(1);
}

/// Print the response body; non-2xx goes to stderr and exits 1.
async fn print_response(resp: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = resp.status();
    let body: serde_json::Value = resp.json().await?;
    if !status.is_success() {
        eprintln!("{}", serde_json::to_string_pretty(&body)?);
        std::process::exit(1);
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let api_url = cli.api_url;

    let result = match cli.command {
        Commands::Health => get(&api_url, "/health").await,
        Commands::Session { command } => match command {
            SessionCommands::Start {
                student,
                grade,
                mode,
                goals,
            } => {
                let body = json!({
                    "student_name": student,
                    "grade": grade,
                    "mode": mode,
                    "goals": goals
                });
                post(&api_url, "/v1/sessions", Some(body)).await
            }
            SessionCommands::Status => get(&api_url, "/v1/sessions/current").await,
            SessionCommands::Pause => post(&api_url, "/v1/sessions/current/pause", None).await,
            SessionCommands::Resume => post(&api_url, "/v1/sessions/current/resume", None).await,
            SessionCommands::Tick => {
                let body = json!({ "now_ms": chrono::Utc::now().timestamp_millis() });
                post(&api_url, "/v1/sessions/current/tick", Some(body)).await
            }
            SessionCommands::End => post(&api_url, "/v1/sessions/current/end", None).await,
        },
        Commands::Incident { command } => match command {
            IncidentCommands::Log {
                category,
                severity,
                description,
                context,
            } => {
                let mut body = json!({
                    "category": category,
                    "description": description
                });
                if let Some(s) = severity {
                    body["severity"] = json!(s);
                }
                if let Some(c) = context {
                    body["context"] = json!(c);
                }
                post(&api_url, "/v1/incidents", Some(body)).await
            }
            IncidentCommands::List {
                session_id,
                category,
                since,
            } => {
                let mut params = Vec::new();
                if let Some(s) = session_id {
                    params.push(format!("session_id={s}"));
                }
                if let Some(c) = category {
                    params.push(format!("category={c}"));
                }
                if let Some(t) = since {
                    params.push(format!("since={t}"));
                }
                let path = if params.is_empty() {
                    "/v1/incidents".to_string()
                } else {
                    format!("/v1/incidents?{}", params.join("&"))
                };
                get(&api_url, &path).await
            }
            IncidentCommands::Resolve { id, outcome, notes } => {
                let mut body = json!({ "outcome": outcome });
                if let Some(n) = notes {
                    body["notes"] = json!(n);
                }
                post(&api_url, &format!("/v1/incidents/{id}/resolve"), Some(body)).await
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => get(&api_url, "/v1/config").await,
            ConfigCommands::Apply { file } => config_apply(&api_url, &file).await,
        },
    };

    if let Err(e) = result {
        exit_error(&e.to_string());
    }
}

async fn get(api_url: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let resp = client().get(format!("{api_url}{path}")).send().await?;
    print_response(resp).await
}

async fn post(
    api_url: &str,
    path: &str,
    body: Option<serde_json::Value>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut req = client().post(format!("{api_url}{path}"));
    if let Some(body) = body {
        req = req.json(&body);
    } else {
        // keep an empty JSON body so the content type is consistent
        req = req.json(&json!({}));
    }
    print_response(req.send().await?).await
}

async fn config_apply(api_url: &str, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file).map_err(|e| format!("cannot read {file}: {e}"))?;
    let config: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| format!("invalid JSON in {file}: {e}"))?;
    let resp = client()
        .put(format!("{api_url}/v1/config"))
        .json(&config)
        .send()
        .await?;
    print_response(resp).await
}
