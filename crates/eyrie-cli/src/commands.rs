use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use eyrie_build::{BuildConfig, Builder, HugoGenerator};
use eyrie_entry::{EntryId, SiteLayout};
use eyrie_index::{BackendRegistry, Indexer, QueryOptions};
use eyrie_queue::RetryQueue;
use eyrie_store::{ContentStore, NoopPersister, Persister};
use eyrie_sync::{GitIdentity, GitSync, SYNC_SUBJECT};
use eyrie_webmention::{HttpWebmentionClient, WebmentionConfig, WebmentionEngine};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::cli::*;
use crate::config::Config;

/// Queue whose payloads are entry IDs awaiting outbound webmentions.
pub const WEBMENTION_QUEUE: &str = "webmentions";

const BASE_RETRY_DELAY: Duration = Duration::from_secs(30);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(6 * 60 * 60);

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let app = App::new(config)?;
    match cli.command {
        Command::Build(args) => cmd_build(&app, args),
        Command::Sync => cmd_sync(&app),
        Command::Entries(args) => cmd_entries(&app, args),
        Command::Search(args) => cmd_search(&app, args),
        Command::Webmentions(args) => match args.action {
            WebmentionAction::Send { id, queue: false } => cmd_send(&app, &id),
            WebmentionAction::Send { id, queue: true } => {
                app.queue()?.enqueue(WEBMENTION_QUEUE, id.as_bytes())?;
                println!("{} Queued {}", "✓".green(), id.yellow());
                Ok(())
            }
            WebmentionAction::Show { id } => cmd_show(&app, &id),
        },
        Command::Queue(args) => match args.action {
            QueueAction::Enqueue { name, payload, delay_ms } => {
                cmd_enqueue(&app, &name, &payload, delay_ms)
            }
            QueueAction::Work { name } => cmd_work(&app, name),
        },
    }
}

/// Components wired from one configuration.
struct App {
    config: Config,
    git: Option<Arc<GitSync>>,
    store: Arc<ContentStore>,
    builder: Arc<Builder>,
}

impl App {
    fn new(config: Config) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.site.base_url)
            .with_context(|| format!("invalid base_url {:?}", config.site.base_url))?;
        let layout = SiteLayout::new(config.site.taxonomies.clone(), config.site.sections.clone());

        let git = config.git.enabled.then(|| {
            let sync = GitSync::new(
                &config.site.source_dir,
                GitIdentity::new(&config.git.name, &config.git.email),
            );
            let sync = match &config.git.remote {
                Some(remote) => sync.with_remote(remote, &config.git.branch),
                None => sync,
            };
            Arc::new(sync)
        });
        let persister: Arc<dyn Persister> = match &git {
            Some(sync) => sync.clone() as Arc<dyn Persister>,
            None => Arc::new(NoopPersister),
        };
        let store = Arc::new(ContentStore::open(&config.site.source_dir, layout, persister)?);

        let generator = Arc::new(HugoGenerator::new(
            &config.build.generator,
            config.build.extra_args.clone(),
        ));
        let builder = Builder::new(
            BuildConfig {
                source_dir: config.site.source_dir.clone(),
                output_dir: config.build.output_dir.clone(),
                base_url,
                prune_previous: config.build.prune_previous,
            },
            generator,
        )
        .with_change_hook(|dir| info!(dir = %dir.display(), "live snapshot changed"));

        Ok(Self {
            config,
            git,
            store,
            builder: Arc::new(builder),
        })
    }

    fn engine(&self) -> anyhow::Result<WebmentionEngine> {
        let mut settings = WebmentionConfig {
            secret: self.config.webmentions.secret.clone(),
            timeout: Duration::from_secs(self.config.webmentions.timeout_secs),
            ..Default::default()
        };
        if let Some(agent) = &self.config.webmentions.user_agent {
            settings.user_agent = agent.clone();
        }
        let client = HttpWebmentionClient::new(settings.timeout, &settings.user_agent)?;
        Ok(WebmentionEngine::new(
            self.store.clone(),
            self.builder.clone(),
            Arc::new(client),
            settings,
        ))
    }

    fn indexer(&self) -> anyhow::Result<Indexer> {
        let backend = BackendRegistry::with_defaults().build(&self.config.index)?;
        Ok(Indexer::new(self.store.clone(), backend))
    }

    fn queue(&self) -> anyhow::Result<RetryQueue> {
        let path = &self.config.queue.path;
        let queue = RetryQueue::open(path)
            .with_context(|| format!("opening queue {}", path.display()))?;
        Ok(queue.with_lease(Duration::from_secs(self.config.queue.lease_secs)))
    }

    /// Make sure a snapshot exists before anything reads rendered HTML.
    fn ensure_built(&self) -> anyhow::Result<()> {
        if self.builder.should_build()? {
            self.builder.build(false)?;
        }
        Ok(())
    }
}

fn cmd_build(app: &App, args: BuildArgs) -> anyhow::Result<()> {
    let dir = app.builder.build(args.clean)?;
    println!("{} Built snapshot {}", "✓".green().bold(), dir.display().to_string().bold());
    Ok(())
}

fn cmd_sync(app: &App) -> anyhow::Result<()> {
    let Some(git) = &app.git else {
        bail!("git sync is disabled; set [git] enabled = true");
    };
    // Commit anything an earlier run left staged.
    git.stage(SYNC_SUBJECT, &[])?;
    let changed = git.sync()?;
    if changed.is_empty() {
        println!("{} Up to date.", "✓".green());
    } else {
        println!("{} Pulled {} changed files:", "✓".green(), changed.len());
        for path in changed {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

fn cmd_entries(app: &App, args: EntriesArgs) -> anyhow::Result<()> {
    let entries = app.store.get_all(args.lists)?;
    for entry in &entries {
        let mut line = format!("{}  {}", entry.id.as_str().yellow(), entry.front_matter.title);
        if entry.front_matter.draft {
            line.push_str(&format!("  {}", "draft".dimmed()));
        }
        println!("{line}");
    }
    println!("{} entries", entries.len().to_string().bold());
    Ok(())
}

fn cmd_search(app: &App, args: SearchArgs) -> anyhow::Result<()> {
    let indexer = app.indexer()?;
    indexer.reindex()?;
    let hits = indexer.search(&QueryOptions::default().query(args.query).page(0, args.limit))?;
    if hits.is_empty() {
        println!("No matches.");
    }
    for entry in hits {
        println!("{}  {}", entry.id.as_str().yellow(), entry.front_matter.title);
    }
    Ok(())
}

fn cmd_send(app: &App, id: &str) -> anyhow::Result<()> {
    app.ensure_built()?;
    let entry = app.store.get(&EntryId::new(id))?;
    let sent = app.engine()?.send_webmentions(&entry)?;
    println!("{} Sent {} webmentions for {}", "✓".green(), sent, entry.id.as_str().yellow());
    Ok(())
}

fn cmd_show(app: &App, id: &str) -> anyhow::Result<()> {
    let sidecar = app.engine()?.sidecars().load(&EntryId::new(id))?;
    if sidecar.is_empty() {
        println!("No interactions.");
        return Ok(());
    }
    for mention in sidecar.replies.iter().chain(&sidecar.interactions) {
        let who = if mention.author.name.is_empty() {
            &mention.url
        } else {
            &mention.author.name
        };
        let kind = format!("{:?}", mention.kind);
        println!("{:>10}  {}  {}", kind.cyan(), who, mention.source.dimmed());
    }
    Ok(())
}

fn cmd_enqueue(app: &App, name: &str, payload: &str, delay_ms: u64) -> anyhow::Result<()> {
    let at = chrono::Utc::now() + chrono::Duration::milliseconds(delay_ms as i64);
    app.queue()?.enqueue_at(name, payload.as_bytes(), at)?;
    println!("{} Queued on {}", "✓".green(), name.bold());
    Ok(())
}

fn cmd_work(app: &App, name: String) -> anyhow::Result<()> {
    let queue = app.queue()?;
    let interval = Duration::from_millis(app.config.queue.poll_interval_ms.max(1));
    let cancel = CancellationToken::new();

    let runtime = tokio::runtime::Runtime::new()?;
    if name == WEBMENTION_QUEUE {
        app.ensure_built()?;
        let handler = delivery_handler(
            app.store.clone(),
            Arc::new(app.engine()?),
            app.config.queue.max_attempts,
        );
        runtime.block_on(work_until_interrupted(&queue, &name, interval, cancel, handler));
    } else {
        let handler = |payload: &[u8], attempt: u32| {
            println!("{} {}", format!("#{attempt}").dimmed(), String::from_utf8_lossy(payload));
            Duration::ZERO
        };
        runtime.block_on(work_until_interrupted(&queue, &name, interval, cancel, handler));
    }
    Ok(())
}

/// Sends webmentions for the entry ID in each payload, backing off on failure.
fn delivery_handler(
    store: Arc<ContentStore>,
    engine: Arc<WebmentionEngine>,
    max_attempts: u32,
) -> impl Fn(&[u8], u32) -> Duration + Send + Sync + 'static {
    move |payload, attempt| match deliver(&store, &engine, payload) {
        Ok(sent) => {
            info!(sent, attempt, "webmentions delivered");
            Duration::ZERO
        }
        Err(e) => {
            let delay = retry_delay(attempt, max_attempts);
            warn!(error = %e, attempt, retry_in = ?delay, "webmention delivery failed");
            delay
        }
    }
}

async fn work_until_interrupted<F>(
    queue: &RetryQueue,
    name: &str,
    interval: Duration,
    cancel: CancellationToken,
    handler: F,
) where
    F: Fn(&[u8], u32) -> Duration + Send + Sync + 'static,
{
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    queue.listen(name, interval, cancel, handler).await;
}

fn deliver(
    store: &ContentStore,
    engine: &WebmentionEngine,
    payload: &[u8],
) -> anyhow::Result<usize> {
    let id = std::str::from_utf8(payload).context("payload is not an entry id")?;
    let entry = store.get(&EntryId::new(id))?;
    Ok(engine.send_webmentions(&entry)?)
}

/// Exponential backoff from `BASE_RETRY_DELAY`, capped; zero once
/// `max_attempts` is reached so the item is dropped.
pub(crate) fn retry_delay(attempt: u32, max_attempts: u32) -> Duration {
    if attempt >= max_attempts {
        return Duration::ZERO;
    }
    BASE_RETRY_DELAY
        .saturating_mul(1u32 << attempt.min(16))
        .min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_backs_off_and_gives_up() {
        assert_eq!(retry_delay(1, 8), Duration::from_secs(60));
        assert_eq!(retry_delay(2, 8), Duration::from_secs(120));
        assert_eq!(retry_delay(7, 10), Duration::from_secs(30 * 128));
        assert_eq!(retry_delay(10, 20), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(8, 8), Duration::ZERO);
    }

    #[test]
    fn app_wires_from_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.site.source_dir = dir.path().to_path_buf();
        config.build.output_dir = dir.path().join("public");
        config.queue.path = dir.path().join("queue.db");

        let app = App::new(config).unwrap();
        assert!(app.git.is_none());
        assert!(app.store.get_all(true).unwrap().is_empty());
        assert!(app.indexer().unwrap().get_all(&QueryOptions::default()).unwrap().is_empty());

        let queue = app.queue().unwrap();
        queue.enqueue(WEBMENTION_QUEUE, b"/a/").unwrap();
        assert_eq!(queue.len(WEBMENTION_QUEUE).unwrap(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn repeated_builds_reuse_one_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("public");
        let config = || {
            let mut config = Config::default();
            config.site.source_dir = dir.path().to_path_buf();
            config.build.output_dir = output.clone();
            config.build.generator = "true".into();
            config
        };

        for _ in 0..3 {
            let app = App::new(config()).unwrap();
            cmd_build(&app, BuildArgs { clean: false }).unwrap();
        }
        let snapshots = std::fs::read_dir(&output)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().is_dir())
            .count();
        assert_eq!(snapshots, 1);
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let mut config = Config::default();
        config.site.base_url = "not a url".into();
        assert!(App::new(config).is_err());
    }

    #[test]
    fn deliver_rejects_unknown_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.site.source_dir = dir.path().to_path_buf();
        config.build.output_dir = dir.path().join("public");
        let app = App::new(config).unwrap();
        let engine = app.engine().unwrap();
        assert!(deliver(&app.store, &engine, b"/missing/").is_err());
        assert!(deliver(&app.store, &engine, &[0xff, 0xfe]).is_err());
    }
}
