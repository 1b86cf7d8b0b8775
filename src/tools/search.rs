//! External web search
//!
//! A thin pass-through to a search backend. Backend failures never escape:
//! [`ExternalSearch::search`] always returns text the model can read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::core::config::SearchConfig;
use crate::core::{CarelinkError, Result};

/// Citation tag for answers grounded in web search results
pub const SEARCH_CITATION: &str = "[Source: General Internet Search]";

const RESULTS_HEADER: &str = "WEB SEARCH RESULTS (Source: General Internet Search):";

const UNAVAILABLE_TEXT: &str = "WEB SEARCH ERROR: I was unable to perform the external search. Please try rephrasing your query.";

/// One search result snippet
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: Option<String>,
}

/// A web search capability
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    fn name(&self) -> &str;
}

/// DuckDuckGo instant-answer API backend
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
    max_results: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn flatten_topics(topics: Vec<RelatedTopic>, out: &mut Vec<SearchHit>) {
    for topic in topics {
        match topic {
            RelatedTopic::Topic { text, first_url } => {
                if text.is_empty() {
                    continue;
                }
                let title = text.split(" - ").next().unwrap_or(&text).to_string();
                out.push(SearchHit {
                    title,
                    snippet: text,
                    url: Some(first_url).filter(|u| !u.is_empty()),
                });
            }
            RelatedTopic::Group { topics } => flatten_topics(topics, out),
        }
    }
}

impl InstantAnswer {
    fn into_hits(self, max_results: usize) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        if !self.answer.is_empty() {
            hits.push(SearchHit {
                title: self.heading.clone(),
                snippet: self.answer,
                url: None,
            });
        }
        if !self.abstract_text.is_empty() {
            hits.push(SearchHit {
                title: self.heading,
                snippet: self.abstract_text,
                url: Some(self.abstract_url).filter(|u| !u.is_empty()),
            });
        }
        flatten_topics(self.related_topics, &mut hits);
        hits.truncate(max_results);
        hits
    }
}

impl DuckDuckGoSearch {
    pub fn from_config(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: config.endpoint.clone(),
            max_results: config.max_results,
        }
    }

    fn request_url(&self, query: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| CarelinkError::search(format!("Invalid search endpoint: {}", e)))
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self.client.get(self.request_url(query)?).send().await?;
        if !response.status().is_success() {
            return Err(CarelinkError::search(format!(
                "search returned status {}",
                response.status()
            )));
        }
        let answer: InstantAnswer = response.json().await?;
        Ok(answer.into_hits(self.max_results))
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// External search service used by the clinical agent
#[derive(Clone)]
pub struct ExternalSearch {
    backend: Option<Arc<dyn SearchBackend>>,
}

impl ExternalSearch {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A search service that always reports itself unavailable
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        if config.enabled {
            Self::new(Arc::new(DuckDuckGoSearch::from_config(config)))
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Search and render results as text. Never fails.
    pub async fn search(&self, query: &str) -> String {
        let Some(backend) = &self.backend else {
            tracing::warn!(query, "web search requested but disabled");
            return UNAVAILABLE_TEXT.to_string();
        };

        tracing::info!(query, backend = backend.name(), "web search");
        match backend.search(query).await {
            Ok(hits) if hits.is_empty() => {
                tracing::info!(query, "web search returned no results");
                format!("{}\nNo results found for '{}'.", RESULTS_HEADER, query)
            }
            Ok(hits) => {
                tracing::info!(query, results = hits.len(), "web search succeeded");
                let body = hits
                    .iter()
                    .map(|hit| match &hit.url {
                        Some(url) => format!("- {}: {} ({})", hit.title, hit.snippet, url),
                        None => format!("- {}: {}", hit.title, hit.snippet),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{}\n{}", RESULTS_HEADER, body)
            }
            Err(e) => {
                tracing::error!(query, error = %e, "web search failed");
                UNAVAILABLE_TEXT.to_string()
            }
        }
    }
}

#[cfg(test)]
pub(crate) struct StaticSearch(pub Result<Vec<SearchHit>>);

#[cfg(test)]
#[async_trait]
impl SearchBackend for StaticSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
        match &self.0 {
            Ok(hits) => Ok(hits.clone()),
            Err(e) => Err(CarelinkError::search(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}
