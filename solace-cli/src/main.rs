//! solace-cli - terminal client for the Solace support-chat server
//!
//! # Subcommands
//! - `chat [--user <uuid>]`   - open a session and talk interactively
//! - `history --user <uuid>`  - list a user's completed sessions with summaries
//! - `show <session>`         - print one session and its transcript
//! - `status`                 - show server health

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use solace_core::{ChatReply, ChatRequest, Message, Session, Turn, CRISIS_RESOURCES};
use uuid::Uuid;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const EXIT_WORDS: [&str; 3] = ["/end", "/quit", "/exit"];
const EMPTY_SUMMARY: &str = "No conversation was recorded in this session.";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "solace-cli", version, about = "Solace support-chat terminal client")]
struct Cli {
    /// Solace HTTP server URL (overrides SOLACE_HTTP_URL env var)
    #[arg(long, env = "SOLACE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start an interactive session (type /end to finish)
    Chat {
        /// Owner of the session; anonymous when omitted
        #[arg(long)]
        user: Option<Uuid>,
    },

    /// List completed sessions for a user
    History {
        #[arg(long)]
        user: Uuid,
    },

    /// Print a session and its messages
    Show { session: Uuid },

    /// Show Solace server status
    Status,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct SolaceClient {
    server: String,
    http: reqwest::blocking::Client,
}

impl SolaceClient {
    fn new(server: &str) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(90))
            .build()?;
        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self.http.get(self.url(path)).send()?;
        read_json(resp)
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> anyhow::Result<T> {
        let resp = self.http.post(self.url(path)).json(body).send()?;
        read_json(resp)
    }

    fn create_session(&self, user: Option<Uuid>) -> anyhow::Result<Session> {
        self.post("/sessions", &serde_json::json!({ "userId": user }))
    }

    fn append(&self, session_id: Uuid, content: &str) -> anyhow::Result<Message> {
        self.post(
            &format!("/sessions/{}/messages", session_id),
            &serde_json::json!({ "content": content }),
        )
    }

    fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatReply> {
        self.post("/chat", &serde_json::to_value(request)?)
    }

    fn end(&self, session_id: Uuid, summary: &str) -> anyhow::Result<Session> {
        self.post(
            &format!("/sessions/{}/end", session_id),
            &serde_json::json!({ "summary": summary }),
        )
    }
}

/// Decode a success body, or surface the server's `{error}` message.
fn read_json<T: DeserializeOwned>(resp: reqwest::blocking::Response) -> anyhow::Result<T> {
    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        anyhow::bail!("server returned {}: {}", status, error_message(&body));
    }
    Ok(serde_json::from_str(&body)?)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// Formatting helpers
// ============================================================================

fn is_exit_command(line: &str) -> bool {
    EXIT_WORDS.contains(&line.trim().to_lowercase().as_str())
}

fn transcript(messages: &[Message]) -> Vec<Turn> {
    messages
        .iter()
        .map(|m| Turn {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

fn crisis_banner() -> String {
    let mut out = String::from("If you are in immediate danger, please reach out now:\n");
    for r in CRISIS_RESOURCES {
        out.push_str(&format!("  - {}: {} ({})\n", r.name, r.contact, r.availability));
    }
    out
}

fn session_line(session: &Session) -> String {
    let ended = session
        .ended_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let summary: String = session
        .summary
        .as_deref()
        .unwrap_or("")
        .chars()
        .take(120)
        .collect();
    format!(
        "{}  {}  ended {}\n    {}",
        session.id, session.status, ended, summary
    )
}

// ============================================================================
// Commands
// ============================================================================

fn do_chat(client: &SolaceClient, user: Option<Uuid>) -> anyhow::Result<()> {
    let session = client.create_session(user)?;
    println!("Session {} started. Type /end to finish.\n", session.id);

    let stdin = io::stdin();
    let mut turns: Vec<Turn> = Vec::new();

    loop {
        print!("you> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || is_exit_command(&line) {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        client.append(session.id, text)?;
        turns.push(Turn::user(text));

        let reply = client.send(&ChatRequest::Chat {
            messages: turns.clone(),
            session_id: Some(session.id),
        });
        match reply {
            Ok(reply) => {
                println!("\nsolace> {}\n", reply.message);
                if reply.is_crisis == Some(true) {
                    println!("{}", crisis_banner());
                }
                turns.push(Turn::assistant(reply.message));
            }
            Err(e) => eprintln!("solace-cli: {}", e),
        }
    }

    let summary = if turns.is_empty() {
        EMPTY_SUMMARY.to_string()
    } else {
        client
            .send(&ChatRequest::Summary {
                messages: turns,
                session_id: Some(session.id),
            })?
            .message
    };

    let ended = client.end(session.id, &summary)?;
    println!("\nSession {} {}.\n\n{}", ended.id, ended.status, summary);
    Ok(())
}

fn do_history(client: &SolaceClient, user: Uuid) -> anyhow::Result<()> {
    let sessions: Vec<Session> = client.get(&format!("/sessions?userId={}", user))?;
    if sessions.is_empty() {
        eprintln!("No completed sessions for {}", user);
        return Ok(());
    }
    for s in &sessions {
        println!("{}\n", session_line(s));
    }
    Ok(())
}

fn do_show(client: &SolaceClient, session_id: Uuid) -> anyhow::Result<()> {
    let session: Session = client.get(&format!("/sessions/{}", session_id))?;
    let messages: Vec<Message> = client.get(&format!("/sessions/{}/messages", session_id))?;

    println!("{}\n", session_line(&session));
    for turn in transcript(&messages) {
        println!("[{}] {}", turn.role, turn.content);
    }
    Ok(())
}

fn do_status(client: &SolaceClient) -> anyhow::Result<()> {
    let body: serde_json::Value = client.get("/health")?;
    println!("Solace server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
    println!("Store:         {}", body["store"].as_str().unwrap_or("?"));
    if let Some(pg) = body["postgresql"].as_str() {
        println!("PostgreSQL:    {}", pg);
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = SolaceClient::new(&cli.server).and_then(|client| match cli.command {
        Commands::Chat { user } => do_chat(&client, user),
        Commands::History { user } => do_history(&client, user),
        Commands::Show { session } => do_show(&client, session),
        Commands::Status => do_status(&client),
    });

    if let Err(e) = result {
        eprintln!("solace-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
