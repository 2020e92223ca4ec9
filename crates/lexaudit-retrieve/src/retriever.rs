//! The retriever: search, trust-ordered candidate fetching, retries.

use crate::{markers, RetrievalCache, RetrievalError, SearchError, SearchService, SourceCandidate};
use chrono::Utc;
use lexaudit_core::{InstrumentKey, RetrievalConfig, RetrievalRecord, TrustLevel};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

pub struct SourceRetriever {
    search: Arc<dyn SearchService>,
    cache: Arc<RetrievalCache>,
    config: RetrievalConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl SourceRetriever {
    pub fn new(
        search: Arc<dyn SearchService>,
        cache: Arc<RetrievalCache>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            search,
            cache,
            config,
            cancel: None,
        }
    }

    /// Attach the run-level cancellation signal. Checked between retry
    /// attempts, never inside a single external call.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Fetch the official text for an instrument, through the shared
    /// single-flight cache.
    pub async fn fetch(&self, key: &InstrumentKey) -> Result<Arc<RetrievalRecord>, RetrievalError> {
        self.cache
            .get_or_fetch(key, || self.fetch_uncached(key))
            .await
    }

    async fn fetch_uncached(&self, key: &InstrumentKey) -> Result<RetrievalRecord, RetrievalError> {
        let candidates = self.search_candidates(key).await?;
        if candidates.is_empty() {
            return Err(RetrievalError::NotFound(key.urn()));
        }

        let mut usable_failure = false;
        for (candidate, trust_level) in self.order_by_trust(&candidates) {
            match self.fetch_url(&candidate.url).await {
                Ok(text) => {
                    info!(key = %key, url = %candidate.url, ?trust_level, "retrieved official text");
                    return Ok(self.build_record(key, &candidate.url, text, trust_level));
                }
                Err(SearchError::NotFound) => {
                    debug!(url = %candidate.url, "candidate yielded nothing, trying next");
                }
                Err(SearchError::Transient(reason)) => {
                    warn!(url = %candidate.url, %reason, "candidate failed, trying next");
                    usable_failure = true;
                }
            }
        }

        // The search collaborator did report sources, so this is not an
        // instrument-level absence.
        if usable_failure {
            Err(RetrievalError::Transient(format!(
                "all candidate sources failed for {}",
                key.urn()
            )))
        } else {
            Err(RetrievalError::Transient(format!(
                "no candidate source yielded usable content for {}",
                key.urn()
            )))
        }
    }

    async fn search_candidates(
        &self,
        key: &InstrumentKey,
    ) -> Result<Vec<SourceCandidate>, RetrievalError> {
        let mut delay = self.config.backoff_base;
        for attempt in 1..=self.config.max_attempts {
            self.check_cancelled()?;
            match self.search.find_official_source(key).await {
                Ok(candidates) => return Ok(candidates),
                Err(SearchError::NotFound) => return Err(RetrievalError::NotFound(key.urn())),
                Err(SearchError::Transient(reason)) => {
                    warn!(key = %key, attempt, %reason, "search failed");
                    if attempt == self.config.max_attempts {
                        return Err(RetrievalError::Transient(reason));
                    }
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay, self.config.backoff_cap);
                }
            }
        }
        unreachable!("retry loop returns on final attempt")
    }

    /// Fetch one URL with the retry budget. Content shorter than the
    /// configured minimum is extraction noise, not a source text.
    async fn fetch_url(&self, url: &str) -> Result<String, SearchError> {
        let mut delay = self.config.backoff_base;
        for attempt in 1..=self.config.max_attempts {
            if self.is_cancelled() {
                return Err(SearchError::Transient("run cancelled".to_string()));
            }
            match self.search.fetch(url).await {
                Ok(text) if text.len() >= self.config.min_content_chars => return Ok(text),
                Ok(text) => {
                    debug!(url, chars = text.len(), "content too short, rejecting candidate");
                    return Err(SearchError::Transient("content too short".to_string()));
                }
                Err(SearchError::NotFound) => return Err(SearchError::NotFound),
                Err(SearchError::Transient(reason)) => {
                    warn!(url, attempt, %reason, "fetch failed");
                    if attempt == self.config.max_attempts {
                        return Err(SearchError::Transient(reason));
                    }
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay, self.config.backoff_cap);
                }
            }
        }
        unreachable!("retry loop returns on final attempt")
    }

    /// Candidates in allowlist priority order first (official trust), then
    /// everything else in search order (low trust).
    fn order_by_trust<'a>(
        &self,
        candidates: &'a [SourceCandidate],
    ) -> Vec<(&'a SourceCandidate, TrustLevel)> {
        let mut ordered = Vec::with_capacity(candidates.len());
        for domain in &self.config.official_domains {
            for candidate in candidates {
                if host_matches(&candidate.url, domain)
                    && !ordered.iter().any(|(c, _)| *c == candidate)
                {
                    ordered.push((candidate, TrustLevel::Official));
                }
            }
        }
        for candidate in candidates {
            if !ordered.iter().any(|(c, _)| *c == candidate) {
                ordered.push((candidate, TrustLevel::Low));
            }
        }
        ordered
    }

    fn build_record(
        &self,
        key: &InstrumentKey,
        url: &str,
        text: String,
        trust_level: TrustLevel,
    ) -> RetrievalRecord {
        let normalized = markers::merge_adjacent_revoked(&text);
        let checksum = hex_digest(&normalized);
        RetrievalRecord {
            instrument_key: key.clone(),
            source_url: url.to_string(),
            fetched_text: normalized,
            fetched_at: Utc::now(),
            checksum,
            trust_level,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    fn check_cancelled(&self) -> Result<(), RetrievalError> {
        if self.is_cancelled() {
            Err(RetrievalError::Transient("run cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

fn next_backoff(current: Duration, cap: Duration) -> Duration {
    (current * 2).min(cap)
}

fn host_matches(url: &str, domain: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .map(|host| host == domain || host.ends_with(&format!(".{domain}")))
        .unwrap_or(false)
}

fn hex_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexaudit_core::InstrumentType;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LONG_TEXT: &str = "Art. 1º Esta Lei institui o Regime Jurídico dos Servidores \
        Públicos Civis da União, das autarquias e das fundações públicas federais. \
        Art. 2º Para os efeitos desta Lei, servidor é a pessoa legalmente investida \
        em cargo público. Art. 3º Cargo público é o conjunto de atribuições e \
        responsabilidades previstas na estrutura organizacional que devem ser \
        cometidas a um servidor. Art. 4º É proibida a prestação de serviços \
        gratuitos, salvo os casos previstos em lei. Art. 5º São requisitos básicos \
        para investidura em cargo público: I - a nacionalidade brasileira.";

    /// Scripted search collaborator with per-URL behavior and call counts.
    struct ScriptedSearch {
        candidates: Result<Vec<SourceCandidate>, SearchError>,
        pages: HashMap<String, Vec<Result<String, SearchError>>>,
        find_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        page_cursor: dashmap::DashMap<String, usize>,
    }

    impl ScriptedSearch {
        fn new(candidates: Result<Vec<SourceCandidate>, SearchError>) -> Self {
            Self {
                candidates,
                pages: HashMap::new(),
                find_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
                page_cursor: dashmap::DashMap::new(),
            }
        }

        fn page(mut self, url: &str, responses: Vec<Result<String, SearchError>>) -> Self {
            self.pages.insert(url.to_string(), responses);
            self
        }
    }

    #[async_trait]
    impl SearchService for ScriptedSearch {
        async fn find_official_source(
            &self,
            _key: &InstrumentKey,
        ) -> Result<Vec<SourceCandidate>, SearchError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            self.candidates.clone()
        }

        async fn fetch(&self, url: &str) -> Result<String, SearchError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let responses = self
                .pages
                .get(url)
                .unwrap_or_else(|| panic!("unexpected fetch of {url}"));
            let mut cursor = self.page_cursor.entry(url.to_string()).or_insert(0);
            let idx = (*cursor).min(responses.len() - 1);
            *cursor += 1;
            responses[idx].clone()
        }
    }

    fn key() -> InstrumentKey {
        InstrumentKey::new(InstrumentType::Law, "8112", Some(1990))
    }

    fn retriever(search: ScriptedSearch) -> (SourceRetriever, Arc<ScriptedSearch>) {
        let search = Arc::new(search);
        let cache = Arc::new(RetrievalCache::new(Duration::from_secs(3600)));
        let config = RetrievalConfig {
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(4),
            ..Default::default()
        };
        (
            SourceRetriever::new(search.clone(), cache, config),
            search,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_official_domain_preferred_and_trusted() {
        let (retriever, _) = retriever(
            ScriptedSearch::new(Ok(vec![
                SourceCandidate::new("https://blog.example.com/lei-8112"),
                SourceCandidate::new("https://www.planalto.gov.br/ccivil_03/leis/l8112.htm"),
            ]))
            .page(
                "https://www.planalto.gov.br/ccivil_03/leis/l8112.htm",
                vec![Ok(LONG_TEXT.to_string())],
            ),
        );

        let record = retriever.fetch(&key()).await.unwrap();
        assert_eq!(record.trust_level, TrustLevel::Official);
        assert!(record.source_url.contains("planalto.gov.br"));
        assert_eq!(record.checksum.len(), 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_allowlisted_source_is_low_trust() {
        let (retriever, _) = retriever(
            ScriptedSearch::new(Ok(vec![SourceCandidate::new(
                "https://blog.example.com/lei-8112",
            )]))
            .page(
                "https://blog.example.com/lei-8112",
                vec![Ok(LONG_TEXT.to_string())],
            ),
        );

        let record = retriever.fetch(&key()).await.unwrap();
        assert_eq!(record.trust_level, TrustLevel::Low);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fetch_is_retried() {
        let url = "https://www.planalto.gov.br/ccivil_03/leis/l8112.htm";
        let (retriever, search) = retriever(
            ScriptedSearch::new(Ok(vec![SourceCandidate::new(url)])).page(
                url,
                vec![
                    Err(SearchError::Transient("503".to_string())),
                    Ok(LONG_TEXT.to_string()),
                ],
            ),
        );

        let record = retriever.fetch(&key()).await.unwrap();
        assert_eq!(record.trust_level, TrustLevel::Official);
        assert_eq!(search.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_not_found_surfaces_not_found() {
        let (retriever, _) = retriever(ScriptedSearch::new(Err(SearchError::NotFound)));
        let err = retriever.fetch(&key()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_candidates_surface_hard_transient() {
        let url = "https://www.planalto.gov.br/ccivil_03/leis/l8112.htm";
        let (retriever, _) = retriever(
            ScriptedSearch::new(Ok(vec![SourceCandidate::new(url)]))
                .page(url, vec![Err(SearchError::Transient("503".to_string()))]),
        );
        let err = retriever.fetch(&key()).await.unwrap_err();
        // Search had candidates, so exhaustion is transient, not NotFound.
        assert!(matches!(err, RetrievalError::Transient(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_content_falls_through_to_next_candidate() {
        let short_url = "https://www.planalto.gov.br/short";
        let good_url = "https://www.normas.leg.br/l8112";
        let (retriever, _) = retriever(
            ScriptedSearch::new(Ok(vec![
                SourceCandidate::new(short_url),
                SourceCandidate::new(good_url),
            ]))
            .page(short_url, vec![Ok("página não encontrada".to_string())])
            .page(good_url, vec![Ok(LONG_TEXT.to_string())]),
        );

        let record = retriever.fetch(&key()).await.unwrap();
        assert_eq!(record.source_url, good_url);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_cache_fetches_once_per_key() {
        let url = "https://www.planalto.gov.br/ccivil_03/leis/l8112.htm";
        let (retriever, search) = retriever(
            ScriptedSearch::new(Ok(vec![SourceCandidate::new(url)]))
                .page(url, vec![Ok(LONG_TEXT.to_string())]),
        );

        let a = retriever.fetch(&key()).await.unwrap();
        let b = retriever.fetch(&key()).await.unwrap();
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(search.find_calls.load(Ordering::SeqCst), 1);
        assert_eq!(search.fetch_calls.load(Ordering::SeqCst), 1);
    }
}
