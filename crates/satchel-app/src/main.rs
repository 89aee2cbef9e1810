//! Satchel application binary - composition root.
//!
//! Ties the Satchel crates together into a line-oriented client:
//! 1. Load configuration from TOML
//! 2. Open the JSON stores (history, settings, libraries)
//! 3. Build the API client and query orchestrator
//! 4. Run a small REPL over stdin
//!
//! Streaming answers are printed incrementally as snapshots arrive from
//! the observer callback.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use satchel_chat::{NotificationSink, QueryOrchestrator, Severity};
use satchel_client::ApiClient;
use satchel_core::config::SatchelConfig;
use satchel_core::types::{Message, QueryMode, Rating};
use satchel_store::{
    ConversationHistoryStore, HistoryFilter, JsonStore, PromptLibrary, SettingsStore,
    TemplateLibrary, Theme,
};

mod cli;
use cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

struct App {
    orchestrator: QueryOrchestrator,
    history: Arc<ConversationHistoryStore>,
    settings: Arc<SettingsStore>,
    notifications: Arc<NotificationSink>,
    prompts: PromptLibrary,
    _templates: TemplateLibrary,
}

impl App {
    async fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let (command, rest) = match line.strip_prefix('/') {
            Some(stripped) => match stripped.split_once(' ') {
                Some((cmd, rest)) => (cmd, rest.trim()),
                None => (stripped, ""),
            },
            None => ("ask", line),
        };

        match command {
            "ask" => self.ask(rest).await,
            "search" => {
                let _ = self
                    .orchestrator
                    .submit(rest, QueryMode::Search, &|_| {})
                    .await;
                if let Some(Message::Search { results, content, .. }) =
                    self.orchestrator.transcript().last().cloned()
                {
                    println!("{}", content);
                    for (i, result) in results.iter().enumerate() {
                        println!(
                            "  #{} {} ({:.1}%)",
                            i + 1,
                            result.document_name.as_deref().unwrap_or("Unknown Document"),
                            result.relevance() * 100.0
                        );
                        if let Some(body) = result.body() {
                            println!("     {}", truncate(body, 120));
                        }
                    }
                }
            }
            "upload" => match tokio::fs::read(rest).await {
                Ok(bytes) => {
                    let name = PathBuf::from(rest)
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| rest.to_string());
                    let _ = self.orchestrator.ingest_document(&name, &bytes).await;
                }
                Err(e) => println!("cannot read {}: {}", rest, e),
            },
            "generate" => match rest.split_once('|') {
                Some((prefix, topic)) => {
                    if let Ok(content) =
                        self.orchestrator.generate(prefix.trim(), topic.trim()).await
                    {
                        println!("{}", content);
                    }
                }
                None => println!("usage: /generate <template prefix> | <topic>"),
            },
            "history" => self.show_history(rest),
            "bookmark" => match rest.parse::<u64>() {
                Ok(id) => match self.history.toggle_bookmark(id) {
                    Some(true) => self.notifications.notify("Added to bookmarks", Severity::Success),
                    Some(false) => {
                        self.notifications.notify("Removed from bookmarks", Severity::Info)
                    }
                    None => println!("no conversation with id {}", id),
                },
                Err(_) => println!("usage: /bookmark <id>"),
            },
            "rate" => self.rate(rest),
            "delete" => match rest.parse::<u64>() {
                Ok(id) => {
                    self.history.delete(id);
                    self.notifications.notify("Conversation deleted", Severity::Info);
                }
                Err(_) => println!("usage: /delete <id>"),
            },
            "clear" => {
                self.history.clear();
                self.notifications.notify("History cleared", Severity::Info);
            }
            "stream" => match rest {
                "on" => self.settings.set_streaming_enabled(true),
                "off" => self.settings.set_streaming_enabled(false),
                _ => println!("usage: /stream on|off"),
            },
            "retries" => match rest.parse::<u32>() {
                Ok(n) => self.settings.set_stream_retries(n),
                Err(_) => println!("usage: /retries <n>"),
            },
            "autobookmark" => match rest {
                "on" => self.settings.set_auto_bookmark(true),
                "off" => self.settings.set_auto_bookmark(false),
                _ => println!("usage: /autobookmark on|off"),
            },
            "theme" => match rest {
                "dark" => self.settings.set_theme(Theme::Dark),
                "light" => self.settings.set_theme(Theme::Light),
                _ => println!("usage: /theme dark|light"),
            },
            "settings" => {
                let s = self.settings.current();
                println!(
                    "streaming: {}  retries: {}  auto-bookmark: {}  theme: {:?}",
                    s.streaming_enabled, s.stream_retries, s.auto_bookmark, s.theme
                );
            }
            "prompts" => {
                for prompt in self.prompts.list() {
                    println!("  {}  {} — {}", prompt.id, prompt.name, truncate(&prompt.prompt, 60));
                }
            }
            "saveprompt" => match rest.split_once('|') {
                Some((name, text)) => {
                    self.prompts.add(name.trim(), text.trim());
                    self.notifications.notify("Prompt saved!", Severity::Success);
                }
                None => println!("usage: /saveprompt <name> | <prompt text>"),
            },
            "help" => print_help(),
            "quit" | "exit" => std::process::exit(0),
            other => println!("unknown command: /{} (try /help)", other),
        }

        if let Some(notification) = self.notifications.current() {
            let tag = match notification.severity {
                Severity::Success => "ok",
                Severity::Error => "error",
                Severity::Info => "info",
            };
            println!("[{}] {}", tag, notification.message);
        }
    }

    async fn ask(&self, query: &str) {
        // Print each streamed snapshot's new suffix as it arrives.
        let printed = Mutex::new(0usize);
        let observer = |message: &Message| {
            if let Ok(mut printed) = printed.lock() {
                let content = message.content();
                if content.len() > *printed {
                    print!("{}", &content[*printed..]);
                    let _ = std::io::stdout().flush();
                    *printed = content.len();
                }
            }
        };

        match self.orchestrator.submit(query, QueryMode::Answer, &observer).await {
            Ok(message) => {
                let streamed = match printed.lock() {
                    Ok(n) => *n,
                    Err(_) => 0,
                };
                if streamed < message.content().len() {
                    print!("{}", &message.content()[streamed..]);
                }
                println!();
                if let Message::Assistant { sources, .. } = &message {
                    for (i, source) in sources.iter().enumerate() {
                        println!(
                            "  [{}] {} ({:.1}%)",
                            i + 1,
                            source.document_name.as_deref().unwrap_or("Unknown Document"),
                            source.relevance() * 100.0
                        );
                    }
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    fn show_history(&self, filter: &str) {
        let filter = match filter {
            "bookmarked" => HistoryFilter::Bookmarked,
            "rated" => HistoryFilter::Rated,
            _ => HistoryFilter::All,
        };
        let conversations = self.history.filtered(filter);
        if conversations.is_empty() {
            println!("no conversations");
            return;
        }
        for conv in conversations {
            let star = if conv.bookmarked { "*" } else { " " };
            let rating = match conv.rating {
                Some(Rating::Up) => "+",
                Some(Rating::Down) => "-",
                None => " ",
            };
            println!(
                "{} {}{} {}  ->  {}",
                conv.id,
                star,
                rating,
                truncate(conv.user.content(), 40),
                truncate(conv.assistant.content(), 60)
            );
        }
    }

    fn rate(&self, rest: &str) {
        let mut parts = rest.split_whitespace();
        let id = parts.next().and_then(|p| p.parse::<u64>().ok());
        let rating = parts.next();
        match (id, rating) {
            (Some(id), Some("up")) => self.history.rate(id, Some(Rating::Up)),
            (Some(id), Some("down")) => self.history.rate(id, Some(Rating::Down)),
            (Some(id), Some("clear")) => self.history.rate(id, None),
            _ => println!("usage: /rate <id> up|down|clear"),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn print_help() {
    println!("commands:");
    println!("  <text>                ask a question (answer mode)");
    println!("  /search <text>        retrieval-only search");
    println!("  /upload <path>        ingest a PDF into the remote index");
    println!("  /generate <p> | <t>   generate content from a template prefix and topic");
    println!("  /history [bookmarked|rated]");
    println!("  /bookmark <id>   /rate <id> up|down|clear   /delete <id>   /clear");
    println!("  /stream on|off   /retries <n>   /autobookmark on|off   /theme dark|light");
    println!("  /settings   /prompts   /saveprompt <name> | <text>   /quit");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = SatchelConfig::load_or_default(&config_file);

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Satchel v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Stores.
    let data_dir = resolve_data_dir(
        &args
            .resolve_data_dir()
            .unwrap_or_else(|| config.general.data_dir.clone()),
    );
    let store = Arc::new(JsonStore::new(&data_dir)?);
    tracing::info!(path = %data_dir.display(), "JSON store opened");

    let history = Arc::new(ConversationHistoryStore::new(Arc::clone(&store)));
    let settings = Arc::new(SettingsStore::new(Arc::clone(&store)));
    let prompts = PromptLibrary::new(Arc::clone(&store));
    let templates = TemplateLibrary::new(Arc::clone(&store));
    tracing::info!(conversations = history.len(), "History loaded");

    // Client + orchestrator.
    let base_url = args.resolve_base_url(&config.api.base_url);
    let api = Arc::new(ApiClient::new(
        &base_url,
        config.api.top_k,
        Duration::from_secs(config.api.request_timeout_secs),
    )?);
    let notifications = Arc::new(NotificationSink::new(Duration::from_secs(
        config.api.notification_ttl_secs,
    )));
    let orchestrator = QueryOrchestrator::new(
        api,
        Arc::clone(&history),
        Arc::clone(&settings),
        Arc::clone(&notifications),
    );
    tracing::info!(base_url = %base_url, "Answering service client ready");

    let app = App {
        orchestrator,
        history,
        settings,
        notifications,
        prompts,
        _templates: templates,
    };

    println!("satchel ready — /help for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        match lines.next_line().await? {
            Some(line) => app.handle_line(&line).await,
            None => break,
        }
    }

    Ok(())
}
