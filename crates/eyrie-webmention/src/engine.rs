use std::sync::Arc;
use std::time::Duration;

use eyrie_build::Builder;
use eyrie_entry::{Entry, EntryId};
use eyrie_store::ContentStore;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::WebmentionClient;
use crate::error::{WebmentionError, WebmentionResult};
use crate::html;
use crate::mention::Mention;
use crate::sidecar::SidecarStore;
use crate::ssrf::{self, Resolver, SystemResolver};

/// Settings for sending and receiving webmentions.
#[derive(Debug, Clone)]
pub struct WebmentionConfig {
    /// Shared secret inbound notifications must carry.
    pub secret: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for WebmentionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("eyrie/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Told about new inbound mentions worth a human's attention.
pub trait Notifier: Send + Sync {
    fn notify(&self, entry: &EntryId, mention: &Mention);
}

/// Notifier that writes an `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, entry: &EntryId, mention: &Mention) {
        info!(entry = %entry, kind = ?mention.kind, url = %mention.url, "new webmention");
    }
}

/// Outbound delivery and inbound ingestion of webmentions.
pub struct WebmentionEngine {
    pub(crate) sidecars: SidecarStore,
    pub(crate) builder: Arc<Builder>,
    pub(crate) client: Arc<dyn WebmentionClient>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: WebmentionConfig,
}

impl WebmentionEngine {
    pub fn new(
        store: Arc<ContentStore>,
        builder: Arc<Builder>,
        client: Arc<dyn WebmentionClient>,
        config: WebmentionConfig,
    ) -> Self {
        Self {
            sidecars: SidecarStore::new(store),
            builder,
            client,
            resolver: Arc::new(SystemResolver),
            notifier: Arc::new(LogNotifier),
            config,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn sidecars(&self) -> &SidecarStore {
        &self.sidecars
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.builder.config().base_url
    }

    /// Send a webmention for every external link in the entry's rendered
    /// content. Returns how many were delivered.
    ///
    /// Targets without an endpoint are skipped. Any other per-target failure
    /// is collected, and if there is at least one the call returns
    /// [`WebmentionError::Multiple`] after trying every target.
    pub fn send_webmentions(&self, entry: &Entry) -> WebmentionResult<usize> {
        let html = self.builder.entry_html(entry)?;
        let source = entry.permalink(self.base_url())?;
        let targets = html::content_links(&html);
        debug!(entry = %entry.id, targets = targets.len(), "sending webmentions");

        let mut sent = 0;
        let mut failures = Vec::new();
        for target in targets {
            match self.send_one(&source, &target) {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(target = %target, error = %e, "webmention failed");
                    failures.push((target.to_string(), e));
                }
            }
        }

        if failures.is_empty() {
            info!(entry = %entry.id, sent, "webmentions sent");
            Ok(sent)
        } else {
            Err(WebmentionError::Multiple(failures))
        }
    }

    fn send_one(&self, source: &Url, target: &Url) -> WebmentionResult<bool> {
        ssrf::check_url(target, self.resolver.as_ref())?;
        let Some(endpoint) = self.client.discover(target)? else {
            return Ok(false);
        };
        ssrf::check_url(&endpoint, self.resolver.as_ref())?;
        self.client.send(&endpoint, source, target)?;
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use eyrie_build::{BuildConfig, BuildResult, SiteGenerator};
    use eyrie_entry::SiteLayout;
    use eyrie_store::NoopPersister;
    use std::net::IpAddr;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Renders one page, `/posts/hello/`, with the given content HTML.
    pub(crate) struct OnePageGenerator(pub String);

    impl SiteGenerator for OnePageGenerator {
        fn render(&self, _source: &Path, dest: &Path, _base_url: &Url) -> BuildResult<()> {
            let dir = dest.join("posts/hello");
            std::fs::create_dir_all(&dir)?;
            std::fs::write(
                dir.join("index.html"),
                format!(r#"<article><div class="e-content">{}</div></article>"#, self.0),
            )?;
            Ok(())
        }
    }

    /// Every name resolves to one public address, except `*.internal`.
    pub(crate) struct FakeResolver;

    impl Resolver for FakeResolver {
        fn resolve(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
            if host.ends_with(".internal") {
                Ok(vec!["10.0.0.7".parse().unwrap()])
            } else {
                Ok(vec!["93.184.216.34".parse().unwrap()])
            }
        }
    }

    /// Endpoint table plus a log of every call.
    #[derive(Default)]
    pub(crate) struct FakeClient {
        pub endpoints: Vec<(String, Option<String>)>,
        pub discovered: Mutex<Vec<String>>,
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    impl WebmentionClient for FakeClient {
        fn discover(&self, target: &Url) -> WebmentionResult<Option<Url>> {
            self.discovered.lock().unwrap().push(target.to_string());
            match self.endpoints.iter().find(|(t, _)| t == target.as_str()) {
                Some((_, Some(e))) => Ok(Some(Url::parse(e).unwrap())),
                Some((_, None)) => Ok(None),
                None => Err(WebmentionError::Network(format!("{target} unreachable"))),
            }
        }

        fn send(&self, endpoint: &Url, source: &Url, target: &Url) -> WebmentionResult<()> {
            self.sent.lock().unwrap().push((
                endpoint.to_string(),
                source.to_string(),
                target.to_string(),
            ));
            Ok(())
        }
    }

    pub(crate) fn engine(
        dir: &TempDir,
        content_html: &str,
        client: Arc<FakeClient>,
    ) -> WebmentionEngine {
        engine_at(dir, "https://me.example/", content_html, client)
    }

    pub(crate) fn engine_at(
        dir: &TempDir,
        base_url: &str,
        content_html: &str,
        client: Arc<FakeClient>,
    ) -> WebmentionEngine {
        let store = ContentStore::open(
            dir.path().join("site"),
            SiteLayout::default(),
            Arc::new(NoopPersister),
        )
        .unwrap();
        let builder = Builder::new(
            BuildConfig {
                source_dir: dir.path().join("site"),
                output_dir: dir.path().join("public"),
                base_url: Url::parse(base_url).unwrap(),
                prune_previous: false,
            },
            Arc::new(OnePageGenerator(content_html.to_string())),
        );
        builder.build(true).unwrap();

        WebmentionEngine::new(
            Arc::new(store),
            Arc::new(builder),
            client,
            WebmentionConfig {
                secret: "s3cret".into(),
                ..Default::default()
            },
        )
        .with_resolver(Arc::new(FakeResolver))
    }

    fn hello() -> Entry {
        Entry::new("/posts/hello/", "")
    }

    #[test]
    fn sends_to_discovered_endpoints() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeClient {
            endpoints: vec![
                ("https://a.example/1".into(), Some("https://a.example/wm".into())),
                ("https://b.example/2".into(), None),
            ],
            ..Default::default()
        });
        let e = engine(
            &dir,
            r#"<a href="https://a.example/1">a</a> <a href="https://b.example/2">b</a> <a href="https://a.example/1">again</a>"#,
            client.clone(),
        );

        assert_eq!(e.send_webmentions(&hello()).unwrap(), 1);
        assert_eq!(
            *client.sent.lock().unwrap(),
            vec![(
                "https://a.example/wm".to_string(),
                "https://me.example/posts/hello/".to_string(),
                "https://a.example/1".to_string()
            )]
        );
    }

    #[test]
    fn localhost_target_is_rejected_without_contact() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeClient::default());
        let e = engine(&dir, r#"<a href="http://localhost/x">local</a>"#, client.clone());

        match e.send_webmentions(&hello()).unwrap_err() {
            WebmentionError::Multiple(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "http://localhost/x");
                assert!(matches!(failures[0].1, WebmentionError::SecurityRejection { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(client.discovered.lock().unwrap().is_empty());
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn private_endpoint_is_rejected_after_discovery() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeClient {
            endpoints: vec![(
                "https://a.example/1".into(),
                Some("http://hook.internal/wm".into()),
            )],
            ..Default::default()
        });
        let e = engine(&dir, r#"<a href="https://a.example/1">a</a>"#, client.clone());

        let err = e.send_webmentions(&hello()).unwrap_err();
        assert!(matches!(
            &err,
            WebmentionError::Multiple(f) if matches!(f[0].1, WebmentionError::SecurityRejection { .. })
        ));
        assert_eq!(client.discovered.lock().unwrap().len(), 1);
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn failures_are_aggregated_after_trying_all() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(FakeClient {
            endpoints: vec![("https://ok.example/".into(), Some("https://ok.example/wm".into()))],
            ..Default::default()
        });
        let e = engine(
            &dir,
            r#"<a href="https://down.example/">x</a><a href="https://ok.example/">y</a><a href="https://gone.example/">z</a>"#,
            client.clone(),
        );

        match e.send_webmentions(&hello()).unwrap_err() {
            WebmentionError::Multiple(failures) => {
                let targets: Vec<&str> = failures.iter().map(|(t, _)| t.as_str()).collect();
                assert_eq!(targets, ["https://down.example/", "https://gone.example/"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.sent.lock().unwrap().len(), 1);
    }
}
