//! Application entry point: DocuMind console reader.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the [`HttpBackend`] from config and wrap it in a [`Session`].
//! 5. Spawn the session event loop and the headless player clock.
//! 6. Load the server's document inventory.
//! 7. Read commands from stdin until `quit` or EOF.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use documind::{
    backend::{Backend, HttpBackend},
    config::{AppConfig, AppPaths},
    insight::{preview, InsightState},
    podcast::{format_time, PodcastOrchestrator},
    selection::Viewer,
    session::Session,
    upload::{DuplicateChoice, DuplicatePrompt, PendingFile},
};

type StdinLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

const HELP: &str = "\
commands:
  upload <path>...   upload PDF files
  delete <name>      delete a document
  list               documents, outlines and index state
  open <name>        read a document
  select <text>      select text in the open document
  clear              dismiss the selection
  insight            show the insight for the selection
  relevant           show relevant sections
  goto <n>           jump to relevant section n
  play | skip | seek <s> | rate | volume <v>
  save               write the podcast clip to the media directory
  quit";

// ---------------------------------------------------------------------------
// Console collaborators
// ---------------------------------------------------------------------------

/// Answers duplicate-name prompts from stdin.
struct StdinPrompt {
    lines: StdinLines,
}

#[async_trait]
impl DuplicatePrompt for StdinPrompt {
    async fn choose(&self, name: &str) -> DuplicateChoice {
        println!("{name} already exists: [o]verwrite, [k]eep both, [c]ancel?");
        let answer = match self.lines.lock().await.next_line().await {
            Ok(Some(line)) => line,
            _ => return DuplicateChoice::Cancel,
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "o" | "overwrite" => DuplicateChoice::Overwrite,
            "k" | "keep" | "keep both" => DuplicateChoice::KeepBoth,
            _ => DuplicateChoice::Cancel,
        }
    }
}

/// Stands in for the PDF viewer by printing what it would show.
struct ConsoleViewer;

impl Viewer for ConsoleViewer {
    fn open_document(&self, name: &str) {
        println!("viewer: showing {name}");
    }

    fn goto_page(&self, page: u32) {
        println!("viewer: page {page}");
    }
}

// ---------------------------------------------------------------------------
// Headless player clock
// ---------------------------------------------------------------------------

/// Drive the podcast transport without an audio device: report an estimated
/// clip length and advance the playhead in real time.
async fn run_player_clock(session: Arc<Session>, bitrate_kbps: u32) {
    const TICK: Duration = Duration::from_millis(250);
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        let podcast: &PodcastOrchestrator = session.podcast();
        let state = podcast.state();
        if let Some(artifact) = &state.artifact {
            if state.transport.duration().is_none() {
                if let Some(secs) = artifact.estimated_duration(bitrate_kbps) {
                    podcast.on_metadata(secs);
                }
            }
        }
        if podcast.tick(TICK.as_secs_f64()) {
            println!("podcast: finished");
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn read_pending(path: &str) -> anyhow::Result<PendingFile> {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{path} has no file name"))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {path}"))?;
    Ok(PendingFile::new(name, bytes))
}

async fn upload(session: &Session, prompt: &StdinPrompt, paths: &[&str]) {
    let mut files = Vec::new();
    for path in paths {
        match read_pending(path).await {
            Ok(file) => files.push(file),
            Err(e) => println!("skipped: {e:#}"),
        }
    }
    for (name, outcome) in session.upload(files, prompt).await {
        match outcome {
            Ok(doc) => println!("uploaded {name} as {}", doc.name),
            Err(e) => println!("{name}: {e}"),
        }
    }
}

fn list(session: &Session) {
    println!("index: {}", session.training_state().label());
    let active = session.active_document();
    for doc in session.documents() {
        let marker = if active.as_deref() == Some(doc.name.as_str()) { '*' } else { ' ' };
        println!("{marker} {}", doc.name);
        for entry in session.outline(&doc.name) {
            let indent = "  ".repeat(entry.level.depth() + 2);
            println!("{indent}{} (p. {})", entry.text, entry.page);
        }
    }
}

fn show_insight(session: &Session) {
    let view = session.insight_view();
    match &view.insight {
        InsightState::Empty if session.selection().active_text().is_none() => {
            println!("nothing selected")
        }
        InsightState::Empty if session.training_state().is_busy() => {
            println!("waiting for the index ({})", session.training_state().label())
        }
        InsightState::Empty => println!("no insight for this selection"),
        InsightState::Pending => println!("generating insight..."),
        InsightState::Unavailable => println!("insight unavailable for this selection"),
        InsightState::Ready(data) if !data.is_displayable() => println!("no insight found"),
        InsightState::Ready(data) => {
            println!("Key insights:\n  {}", data.key_insights);
            println!("Did you know:\n  {}", data.did_you_know);
            println!("Counterpoints:\n  {}", data.counterpoints);
            println!("Connecting the dots:");
            for line in &data.connecting_the_dots {
                println!("  - {line}");
            }
        }
    }
}

fn show_relevant(session: &Session) {
    let results = session.visible_relevant();
    if results.is_empty() {
        println!("no relevant sections");
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "{:>2}. {} p.{} ({:.2})  {}",
            i + 1,
            r.doc_id,
            r.page,
            r.score,
            preview(&r.paragraph)
        );
    }
}

fn show_player(session: &Session) {
    if !session.player_visible() {
        return;
    }
    let state = session.podcast().state();
    let t = &state.transport;
    let status = match (&state.artifact, state.loading) {
        (_, true) => "loading",
        (None, false) => "no clip",
        (Some(_), false) if t.is_playing() => "playing",
        (Some(_), false) => "paused",
    };
    println!(
        "podcast: {status} {} / {} x{} vol {:.0}%",
        format_time(t.position()),
        format_time(t.duration().unwrap_or(f64::NAN)),
        t.rate(),
        t.volume() * 100.0
    );
}

async fn save_clip(session: &Session, paths: &AppPaths) -> anyhow::Result<()> {
    let artifact = session
        .podcast()
        .artifact()
        .context("no podcast clip loaded")?;
    tokio::fs::create_dir_all(&paths.media_dir)
        .await
        .with_context(|| format!("cannot create {}", paths.media_dir.display()))?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = paths
        .media_dir
        .join(format!("insight-{stamp}.{}", artifact.extension()));
    tokio::fs::write(&path, &artifact.bytes)
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("saved {}", path.display());
    Ok(())
}

async fn run_console(session: Arc<Session>) -> anyhow::Result<()> {
    let lines: StdinLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let prompt = StdinPrompt {
        lines: Arc::clone(&lines),
    };
    let viewer = ConsoleViewer;
    let paths = AppPaths::new();

    match session.load_inventory().await {
        Ok(count) => println!("{count} document(s) on server"),
        Err(e) => log::warn!("could not load inventory: {e}"),
    }
    println!("{HELP}");

    loop {
        let next = lines.lock().await.next_line().await?;
        let Some(line) = next else { break };
        let line = line.trim();
        let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        match cmd {
            "" => continue,
            "upload" => {
                let paths: Vec<&str> = arg.split_whitespace().collect();
                upload(&session, &prompt, &paths).await;
            }
            "delete" => match session.delete(arg).await {
                Ok(()) => println!("deleted {arg}"),
                Err(e) => println!("{e}"),
            },
            "list" => list(&session),
            "open" => {
                if session.open_document(arg) {
                    viewer.open_document(arg);
                } else {
                    println!("unknown document {arg}");
                }
            }
            "select" => {
                session.select(arg, true);
                show_player(&session);
            }
            "clear" => session.dismiss(),
            "insight" => show_insight(&session),
            "relevant" => show_relevant(&session),
            "goto" => {
                let results = session.visible_relevant();
                match arg.parse::<usize>().ok().and_then(|n| results.get(n.wrapping_sub(1))) {
                    Some(result) => session.open_result(result, &viewer),
                    None => println!("no relevant section {arg}"),
                }
            }
            "play" => {
                session.podcast().toggle_play();
                show_player(&session);
            }
            "skip" => {
                session.podcast().skip_forward();
                show_player(&session);
            }
            "seek" => match arg.parse::<f64>() {
                Ok(secs) => {
                    session.podcast().seek(secs);
                    show_player(&session);
                }
                Err(_) => println!("seek expects seconds"),
            },
            "rate" => {
                session.podcast().cycle_rate();
                show_player(&session);
            }
            "volume" => match arg.parse::<f32>() {
                Ok(volume) => {
                    session.podcast().set_volume(volume);
                    show_player(&session);
                }
                Err(_) => println!("volume expects a number between 0 and 1"),
            },
            "save" => {
                if let Err(e) = save_clip(&session, &paths).await {
                    println!("{e:#}");
                }
            }
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            other => println!("unknown command {other:?} (try help)"),
        }
    }

    session.shutdown();
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("DocuMind starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        // 4. Backend + session
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_config(&config.backend));
        log::info!("backend: {}", config.backend.base_url);
        let session = Arc::new(Session::new(config.clone(), backend));

        // 5. Background tasks
        let runner = Arc::clone(&session);
        tokio::spawn(async move { runner.run().await });
        tokio::spawn(run_player_clock(
            Arc::clone(&session),
            config.podcast.assumed_bitrate_kbps,
        ));

        // 6–7. Inventory + command loop
        run_console(session).await
    })
}
