//! `reqwest`-backed [`SearchService`].
//!
//! Two external calls: a JSON search API that returns candidate links for a
//! query, and plain GETs for the pages themselves. Fetched HTML is reduced
//! to text here; struck-through passages (`<del>`, `<s>`, `<strike>`) are
//! rewritten into revocation markers so downstream stages see them without
//! caring about markup.

use crate::markers::{REVOKED_CLOSE, REVOKED_OPEN};
use crate::{SearchError, SearchService, SourceCandidate};
use async_trait::async_trait;
use lexaudit_core::InstrumentKey;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

pub struct HttpSearchService {
    client: reqwest::Client,
    search_endpoint: String,
    api_key: Option<String>,
}

impl HttpSearchService {
    pub fn new(search_endpoint: impl Into<String>) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("lexaudit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SearchError::Transient(e.to_string()))?;
        Ok(Self {
            client,
            search_endpoint: search_endpoint.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn query_for(key: &InstrumentKey) -> String {
        let kind = match key.instrument_type.urn_kind() {
            "constituicao" => "constituição federal",
            "lei.complementar" => "lei complementar",
            "medida.provisoria" => "medida provisória",
            other => other,
        };
        match key.year {
            Some(year) => format!("{kind} {} de {year} texto compilado", key.number),
            None => format!("{kind} {} texto compilado", key.number),
        }
    }
}

#[async_trait]
impl SearchService for HttpSearchService {
    async fn find_official_source(
        &self,
        key: &InstrumentKey,
    ) -> Result<Vec<SourceCandidate>, SearchError> {
        let query = Self::query_for(key);
        debug!(key = %key, %query, "querying search API");

        let mut request = self
            .client
            .post(&self.search_endpoint)
            .json(&serde_json::json!({ "q": query, "gl": "br", "hl": "pt-br" }));
        if let Some(api_key) = &self.api_key {
            request = request.header("X-API-KEY", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Transient(e.to_string()))?;
        let response = map_status(response)?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::Transient(e.to_string()))?;

        let links: Vec<SourceCandidate> = body["organic"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|hit| hit["link"].as_str())
            .map(SourceCandidate::new)
            .collect();
        if links.is_empty() {
            return Err(SearchError::NotFound);
        }
        Ok(links)
    }

    async fn fetch(&self, url: &str) -> Result<String, SearchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SearchError::Transient(e.to_string()))?;
        let response = map_status(response)?;
        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Transient(e.to_string()))?;
        Ok(html_to_text(&html))
    }
}

fn map_status(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        Err(SearchError::NotFound)
    } else if !status.is_success() {
        Err(SearchError::Transient(format!("http status {status}")))
    } else {
        Ok(response)
    }
}

fn strike_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<\s*(?:del|s|strike)\b[^>]*>").expect("strike-open pattern"))
}

fn strike_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</\s*(?:del|s|strike)\s*>").expect("strike-close pattern"))
}

fn dropped_elements() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<\s*(script|style)\b[^>]*>.*?</\s*(?:script|style)\s*>")
            .expect("dropped-elements pattern")
    })
}

fn any_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("tag pattern"))
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("blank-run pattern"))
}

/// Reduce HTML to line-oriented text, preserving strikethrough as markers.
fn html_to_text(html: &str) -> String {
    let text = dropped_elements().replace_all(html, "");
    let text = strike_open().replace_all(&text, REVOKED_OPEN);
    let text = strike_close().replace_all(&text, REVOKED_CLOSE);
    let text = text
        .replace("</p>", "\n")
        .replace("</P>", "\n")
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    let text = any_tag().replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    blank_runs()
        .replace_all(lines.join("\n").trim(), "\n\n")
        .into_owned()
}
