//! lectio CLI: paragraph narration for the reading backend.
//!
//! ```text
//! lectio serve [--port 2003] [--host 127.0.0.1] [--api-url http://localhost:8000]
//! lectio read <article> [--page 1] [--follow]
//! lectio say <article> <paragraph> [--page 1]
//! lectio open <article> <page> / next / previous [--server ...]
//! lectio start / stop-narration / stop / play <id> / status [--server ...]
//! ```

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use lectio_lib::api::ApiClient;
use lectio_lib::audio::RodioBackend;
use lectio_lib::lectio_core::types::{
    ArticlePage, NarrationConfig, NarrationEvent, ParagraphId, PlaybackMode,
};
use lectio_lib::pages::HttpPageSource;
use lectio_lib::provider::HttpAudioProvider;
use lectio_lib::service::NarrationService;
use lectio_lib::session::ReadingSession;

/// lectio: narrate articles paragraph by paragraph
#[derive(Parser)]
#[command(name = "lectio", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ApiArgs {
    /// Reading backend base URL
    #[arg(long, env = "LECTIO_API_URL", default_value = "http://localhost:8000")]
    api_url: String,
    /// Bearer token for the reading backend
    #[arg(long, env = "LECTIO_TOKEN")]
    token: Option<String>,
    /// Seconds before a paragraph that never loads stops showing as loading
    #[arg(long, default_value = "10")]
    load_timeout_secs: u64,
}

impl ApiArgs {
    fn config(&self) -> NarrationConfig {
        NarrationConfig {
            api_url: self.api_url.clone(),
            api_token: self.token.clone(),
            load_timeout: Duration::from_secs(self.load_timeout_secs),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the narration server
    Serve {
        /// Listen port
        #[arg(long, default_value = "2003")]
        port: u16,
        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Narrate an article page in this process
    Read {
        /// Article id or slug
        article: String,
        /// Page to start from
        #[arg(long, default_value = "1")]
        page: u32,
        /// Continue onto the next page at each page boundary
        #[arg(long)]
        follow: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Read a single paragraph in this process
    Say {
        /// Article id or slug
        article: String,
        /// Paragraph id
        paragraph: u64,
        /// Page containing the paragraph
        #[arg(long, default_value = "1")]
        page: u32,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Open an article page on the running server
    Open {
        article: String,
        page: u32,
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
    /// Go to the next page on the running server
    Next {
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
    /// Go back one page on the running server
    Previous {
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
    /// Start whole-page narration on the running server
    Start {
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
    /// Stop whole-page narration on the running server, leaving a single read alone
    StopNarration {
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
    /// Stop narration on the running server
    Stop {
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
    /// Read one paragraph on the running server
    Play {
        paragraph: u64,
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
    /// Get server status
    Status {
        #[arg(long, default_value = "http://localhost:2003")]
        server: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lectio_lib=info,lectio_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("lectio: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> lectio_lib::Result<()> {
    match command {
        Command::Serve { port, host, api } => {
            let session = build_session(&api)?;
            let app = lectio_lib::server::router(session);

            let addr = format!("{host}:{port}");
            tracing::info!("lectio listening on {addr} (backend {})", api.api_url);

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
        }

        Command::Read {
            article,
            page,
            follow,
            api,
        } => read(&build_session(&api)?, &article, page, follow).await?,

        Command::Say {
            article,
            paragraph,
            page,
            api,
        } => say(&build_session(&api)?, &article, page, ParagraphId(paragraph)).await?,

        Command::Open { .. }
        | Command::Next { .. }
        | Command::Previous { .. }
        | Command::Start { .. }
        | Command::StopNarration { .. }
        | Command::Stop { .. }
        | Command::Play { .. } => {
            if let Some((server, endpoint)) = remote_post(&command) {
                post_simple(server, &endpoint).await?;
            }
        }

        Command::Status { server } => {
            let resp = reqwest::Client::new()
                .get(format!("{server}/status"))
                .send()
                .await?;
            let body = resp.text().await.unwrap_or_default();
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(status) => println!(
                    "{}",
                    serde_json::to_string_pretty(&status).unwrap_or(body)
                ),
                Err(_) => println!("{body}"),
            }
        }
    }
    Ok(())
}

fn build_session(api: &ApiArgs) -> lectio_lib::Result<ReadingSession<HttpPageSource>> {
    let config = api.config();
    let client = ApiClient::new(&config);
    let provider = HttpAudioProvider::new(client.clone());
    let service = NarrationService::try_spawn(|signals| {
        RodioBackend::new(provider, signals, config.load_timeout)
    })?;
    Ok(ReadingSession::new(service, HttpPageSource::new(client)))
}

async fn read(
    session: &ReadingSession<HttpPageSource>,
    article: &str,
    page: u32,
    follow: bool,
) -> lectio_lib::Result<()> {
    let service = session.service();
    let mut events = service.subscribe_events();
    let mut current = session.open(article, page).await?;
    if current.paragraphs.is_empty() {
        println!("Page {page} is empty.");
        return Ok(());
    }
    service.start_whole_document();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                service.stop();
                break;
            }
            ev = events.recv() => match ev {
                Ok(NarrationEvent::BringIntoView { paragraph_id }) => {
                    print_paragraph(&current, paragraph_id);
                }
                Ok(NarrationEvent::ParagraphSkipped { paragraph_id, reason }) => {
                    eprintln!("  (skipped paragraph {paragraph_id}: {reason})");
                }
                Ok(NarrationEvent::PageBoundaryReached { page }) => {
                    if !follow {
                        println!("End of page {page}. Continue with --page {}.", page + 1);
                        break;
                    }
                    current = session.next_page().await?;
                    if current.paragraphs.is_empty() {
                        println!("Finished.");
                        break;
                    }
                    println!("── page {} ──", current.page);
                    service.start_whole_document();
                }
                Ok(NarrationEvent::ArticleFinished) => {
                    println!("Finished.");
                    break;
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(lectio_lib::Error::ServiceClosed),
            }
        }
    }
    Ok(())
}

fn print_paragraph(page: &ArticlePage, id: ParagraphId) {
    if let Some(paragraph) = page.find(id) {
        println!("[{id}] {}", paragraph.content.trim());
    }
}

async fn say(
    session: &ReadingSession<HttpPageSource>,
    article: &str,
    page: u32,
    id: ParagraphId,
) -> lectio_lib::Result<()> {
    let service = session.service();
    let mut status = service.subscribe_status();
    let opened = session.open(article, page).await?;
    service.play_paragraph(id);

    let started = matches!(
        tokio::time::timeout(
            Duration::from_secs(2),
            status.wait_for(|s| s.mode == PlaybackMode::SingleShotPlaying),
        )
        .await,
        Ok(Ok(_))
    );
    if !started {
        println!("Paragraph {id} has nothing to read.");
        return Ok(());
    }
    print_paragraph(&opened, id);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => service.stop(),
        done = status.wait_for(|s| s.mode == PlaybackMode::Idle) => {
            if done.is_err() {
                return Err(lectio_lib::Error::ServiceClosed);
            }
        }
    }
    Ok(())
}

/// Server and endpoint for the commands that POST to a running server.
fn remote_post(command: &Command) -> Option<(&str, String)> {
    let (server, endpoint) = match command {
        Command::Open {
            article,
            page,
            server,
        } => (server, format!("articles/{article}/pages/{page}")),
        Command::Next { server } => (server, "pages/next".into()),
        Command::Previous { server } => (server, "pages/previous".into()),
        Command::Start { server } => (server, "narration/start".into()),
        Command::StopNarration { server } => (server, "narration/stop".into()),
        Command::Stop { server } => (server, "stop".into()),
        Command::Play { paragraph, server } => (server, format!("paragraphs/{paragraph}/play")),
        _ => return None,
    };
    Some((server.as_str(), endpoint))
}

async fn post_simple(server: &str, endpoint: &str) -> lectio_lib::Result<()> {
    let resp = reqwest::Client::new()
        .post(format!("{server}/{endpoint}"))
        .send()
        .await?;
    println!("{}", resp.text().await.unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(args: &[&str]) -> Option<(String, String)> {
        let cli = Cli::try_parse_from(std::iter::once("lectio").chain(args.iter().copied()))
            .unwrap();
        remote_post(&cli.command).map(|(server, endpoint)| (server.to_string(), endpoint))
    }

    #[test]
    fn remote_commands_cover_the_router() {
        let cases = [
            (&["open", "donkeys", "2"][..], "articles/donkeys/pages/2"),
            (&["next"][..], "pages/next"),
            (&["previous"][..], "pages/previous"),
            (&["start"][..], "narration/start"),
            (&["stop-narration"][..], "narration/stop"),
            (&["stop"][..], "stop"),
            (&["play", "7"][..], "paragraphs/7/play"),
        ];
        for (args, expected) in cases {
            let (server, path) = endpoint(args).unwrap();
            assert_eq!(server, "http://localhost:2003");
            assert_eq!(path, expected, "{args:?}");
        }
    }

    #[test]
    fn server_flag_is_honoured() {
        let (server, path) = endpoint(&["previous", "--server", "http://pi:2003"]).unwrap();
        assert_eq!((server.as_str(), path.as_str()), ("http://pi:2003", "pages/previous"));
    }

    #[test]
    fn local_commands_do_not_post() {
        assert_eq!(endpoint(&["status"]), None);
        assert_eq!(endpoint(&["read", "donkeys", "--follow"]), None);
    }
}
