use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::LINK;
use reqwest::redirect::Policy;
use tracing::debug;
use url::Url;

use crate::error::{WebmentionError, WebmentionResult};
use crate::html;
use crate::ssrf::{self, Resolver, SystemResolver};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Endpoint discovery and delivery.
pub trait WebmentionClient: Send + Sync {
    /// The target's webmention endpoint, or `None` if it declares none.
    fn discover(&self, target: &Url) -> WebmentionResult<Option<Url>>;

    /// POST `source` and `target` to `endpoint`.
    fn send(&self, endpoint: &Url, source: &Url, target: &Url) -> WebmentionResult<()>;
}

/// Blocking HTTP client following the W3C discovery rules.
///
/// Every redirect hop passes through the same address guard as the first
/// request, for discovery and delivery alike.
#[derive(Debug, Clone)]
pub struct HttpWebmentionClient {
    http: Client,
}

impl HttpWebmentionClient {
    pub fn new(timeout: Duration, user_agent: &str) -> WebmentionResult<Self> {
        Self::with_resolver(timeout, user_agent, Arc::new(SystemResolver))
    }

    /// Client whose redirect guard resolves hosts through `resolver`.
    pub fn with_resolver(
        timeout: Duration,
        user_agent: &str,
        resolver: Arc<dyn Resolver>,
    ) -> WebmentionResult<Self> {
        let policy = Policy::custom(move |attempt| {
            match check_redirect(attempt.url(), attempt.previous().len(), resolver.as_ref()) {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        });
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(policy)
            .build()?;
        Ok(Self { http })
    }
}

/// Decide whether a redirect to `next` may be followed after `hops` hops.
pub fn check_redirect(next: &Url, hops: usize, resolver: &dyn Resolver) -> WebmentionResult<()> {
    if hops >= MAX_REDIRECTS {
        return Err(WebmentionError::Network(format!(
            "too many redirects, stopped at {next}"
        )));
    }
    if !matches!(next.scheme(), "http" | "https") {
        return Err(WebmentionError::SecurityRejection {
            url: next.to_string(),
            reason: format!("redirect to {} scheme", next.scheme()),
        });
    }
    ssrf::check_url(next, resolver)
}

impl WebmentionClient for HttpWebmentionClient {
    fn discover(&self, target: &Url) -> WebmentionResult<Option<Url>> {
        let response = self.http.get(target.clone()).send()?;
        // Relative endpoints resolve against the URL after redirects.
        let base = response.url().clone();

        let from_header = response
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(endpoint_from_link_header);

        let href = match from_header {
            Some(href) => Some(href),
            None => {
                let is_html = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map_or(true, |ct| ct.contains("html"));
                if is_html {
                    html::find_endpoint(&response.text()?)
                } else {
                    None
                }
            }
        };

        let Some(href) = href else {
            debug!(target = %target, "no webmention endpoint");
            return Ok(None);
        };
        let endpoint = base
            .join(&href)
            .map_err(|e| WebmentionError::InvalidUrl(format!("{href}: {e}")))?;
        debug!(target = %target, endpoint = %endpoint, "discovered endpoint");
        Ok(Some(endpoint))
    }

    fn send(&self, endpoint: &Url, source: &Url, target: &Url) -> WebmentionResult<()> {
        let response = self
            .http
            .post(endpoint.clone())
            .form(&[("source", source.as_str()), ("target", target.as_str())])
            .send()?;
        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %endpoint, target = %target, %status, "webmention accepted");
            Ok(())
        } else {
            Err(WebmentionError::Network(format!(
                "{endpoint} answered {status} for {target}"
            )))
        }
    }
}

/// First `rel="webmention"` URL in one `Link` header value.
pub fn endpoint_from_link_header(value: &str) -> Option<String> {
    value.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let uri = parts.next()?.trim();
        let uri = uri.strip_prefix('<')?.strip_suffix('>')?;
        let is_webmention = parts.any(|param| {
            let Some((key, val)) = param.split_once('=') else {
                return false;
            };
            key.trim().eq_ignore_ascii_case("rel")
                && val
                    .trim()
                    .trim_matches('"')
                    .split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("webmention"))
        });
        is_webmention.then(|| uri.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::FakeResolver;

    #[test]
    fn parses_link_header() {
        assert_eq!(
            endpoint_from_link_header(r#"<https://wm.example/e>; rel="webmention""#).as_deref(),
            Some("https://wm.example/e")
        );
        assert_eq!(
            endpoint_from_link_header(r#"</style.css>; rel=stylesheet, </wm>; rel="other webmention""#)
                .as_deref(),
            Some("/wm")
        );
        assert_eq!(endpoint_from_link_header("<>; rel=webmention").as_deref(), Some(""));
        assert_eq!(endpoint_from_link_header(r#"</x>; rel="webmentions""#), None);
        assert_eq!(endpoint_from_link_header("garbage"), None);
    }

    #[test]
    fn redirects_into_internal_space_are_stopped() {
        let resolver = FakeResolver;
        let hop = |u: &str, hops| check_redirect(&Url::parse(u).unwrap(), hops, &resolver);

        assert!(hop("https://wm.example/next", 0).is_ok());
        for bad in [
            "http://169.254.169.254/latest/meta-data/",
            "http://127.0.0.1:8080/",
            "http://metadata.internal/",
            "http://localhost/admin",
            "file:///etc/passwd",
        ] {
            assert!(
                matches!(hop(bad, 1), Err(WebmentionError::SecurityRejection { .. })),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            hop("https://wm.example/loop", MAX_REDIRECTS),
            Err(WebmentionError::Network(_))
        ));
    }

    #[test]
    fn empty_endpoint_resolves_to_page() {
        let page = Url::parse("https://site.example/post/1?x=y").unwrap();
        assert_eq!(page.join("").unwrap(), page);
    }
}
