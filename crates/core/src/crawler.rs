//! Shallow, deduplicating crawl of one project website.
//!
//! The seed page is read first. Its links form level one; only level-one
//! pages that look like documentation or a blog are expanded into level two.
//! Every URL is fetched at most once and a failed fetch never stops the crawl.

use crate::error::CrawlError;
use crate::extractor::{extract_links, extract_page_text, extract_pdf_text, normalize_url, PageLinks};
use crate::models::{CrawlReport, Document, FetchFailure, SocialLinks};
use crate::traits::PageFetcher;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Link targets never followed nor collected: social networks, explorers,
/// analytics dashboards, wallets, code hosting.
pub const TABU_PATTERNS: [&str; 12] = [
    "twitter",
    "facebook",
    "youtube",
    "discord",
    "instagram",
    "linkedin",
    "t.me/",
    "dextools",
    "dune",
    "scan.",
    "github",
    "metamask",
];

/// Hosts too short to match as substrings; the host itself or a subdomain.
pub const TABU_HOSTS: [&str; 1] = ["x.com"];

/// Level-one pages are expanded only when host or path carries one of these.
pub const SECTION_MARKERS: [&str; 2] = ["docs", "blog"];

#[derive(Debug, Clone, Copy)]
pub struct CrawlConfig {
    pub request_delay: Duration,
    /// Upper bound on fetches (pages and documents) for one crawl.
    pub max_pages: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(1),
            max_pages: 60,
        }
    }
}

pub fn passes_tabu(url: &str) -> bool {
    let lowered = url.to_lowercase();
    if TABU_PATTERNS.iter().any(|pattern| lowered.contains(pattern)) {
        return false;
    }
    let Ok(parsed) = Url::parse(&lowered) else {
        return true;
    };
    let host = parsed.host_str().unwrap_or_default();
    !TABU_HOSTS.iter().any(|tabu| {
        host == *tabu || host.strip_suffix(tabu).is_some_and(|rest| rest.ends_with('.'))
    })
}

pub fn is_section_link(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    let path = parsed.path().to_lowercase();
    SECTION_MARKERS
        .iter()
        .any(|marker| host.contains(marker) || path.contains(marker))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    Fetched,
    Failed,
}

#[derive(Default)]
struct Frontier {
    states: HashMap<String, VisitState>,
    order: Vec<String>,
    html: HashMap<String, String>,
    fetches: usize,
}

impl Frontier {
    /// Registers `url`; false when it was already known.
    fn enqueue(&mut self, url: &str) -> bool {
        if self.states.contains_key(url) {
            return false;
        }
        self.states.insert(url.to_string(), VisitState::Unvisited);
        self.order.push(url.to_string());
        true
    }

    fn state(&self, url: &str) -> VisitState {
        self.states.get(url).copied().unwrap_or(VisitState::Unvisited)
    }

    fn visited(&self) -> usize {
        self.states
            .values()
            .filter(|state| **state == VisitState::Fetched)
            .count()
    }
}

pub struct Crawler<F>
where
    F: PageFetcher,
{
    fetcher: F,
    config: CrawlConfig,
}

impl<F> Crawler<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F, config: CrawlConfig) -> Self {
        Self { fetcher, config }
    }

    #[instrument(skip(self))]
    pub async fn crawl(&self, seed: &str) -> Result<CrawlReport, CrawlError> {
        let seed_url = Url::parse(seed.trim())
            .map_err(|error| CrawlError::InvalidUrl(format!("{seed}: {error}")))?;
        let seed_key = normalize_url(seed_url.as_str());

        let mut frontier = Frontier::default();
        let mut failures = Vec::new();
        let mut document_links: Vec<String> = Vec::new();

        frontier.enqueue(&seed_key);
        let seed_links = match self.visit(&mut frontier, &mut failures, &seed_key).await {
            Some(html) => extract_links(&html, &seed_url),
            None => PageLinks::default(),
        };

        let social_links = SocialLinks::from_links(seed_links.all.iter().map(String::as_str));
        document_links.extend(seed_links.documents);

        let level_1: Vec<String> = seed_links
            .pages
            .into_iter()
            .filter(|link| passes_tabu(link))
            .filter(|link| frontier.enqueue(link))
            .collect();

        let mut level_2 = Vec::new();
        for url in &level_1 {
            if !is_section_link(url) {
                continue;
            }
            let Some(html) = self.visit(&mut frontier, &mut failures, url).await else {
                continue;
            };
            let Ok(base) = Url::parse(url) else {
                continue;
            };

            let links = extract_links(&html, &base);
            document_links.extend(links.documents);
            for link in links.pages {
                if passes_tabu(&link) && is_section_link(&link) && frontier.enqueue(&link) {
                    level_2.push(link);
                }
            }
        }

        info!(
            level_1 = level_1.len(),
            level_2 = level_2.len(),
            documents = document_links.len(),
            "links collected"
        );

        let mut texts: Vec<(String, String)> = Vec::new();
        for url in frontier.order.clone() {
            if !passes_tabu(&url) {
                continue;
            }
            if let Some(html) = self.visit(&mut frontier, &mut failures, &url).await {
                if let Some(text) = extract_page_text(&html) {
                    texts.push((url, text));
                }
            }
        }

        let mut seen_documents = HashSet::new();
        for url in document_links {
            if !passes_tabu(&url) || !seen_documents.insert(url.clone()) {
                continue;
            }
            if let Some(text) = self.read_document(&mut frontier, &mut failures, &url).await {
                texts.push((url, text));
            }
        }

        let documents = dedup_by_content(texts);
        let report = CrawlReport {
            documents,
            social_links,
            pages_visited: frontier.visited(),
            failures,
        };

        info!(
            documents = report.documents.len(),
            pages_visited = report.pages_visited,
            failures = report.failures.len(),
            "crawl finished"
        );
        Ok(report)
    }

    /// HTML of `url`, fetching it only on first request.
    async fn visit(
        &self,
        frontier: &mut Frontier,
        failures: &mut Vec<FetchFailure>,
        url: &str,
    ) -> Option<String> {
        match frontier.state(url) {
            VisitState::Fetched => return frontier.html.get(url).cloned(),
            VisitState::Failed => return None,
            VisitState::Unvisited => {}
        }

        if !self.reserve_fetch(frontier, url).await {
            return None;
        }

        match self.fetcher.fetch_page(url).await {
            Ok(html) => {
                frontier.states.insert(url.to_string(), VisitState::Fetched);
                frontier.html.insert(url.to_string(), html.clone());
                Some(html)
            }
            Err(error) => {
                warn!(%url, %error, "page fetch failed");
                frontier.states.insert(url.to_string(), VisitState::Failed);
                failures.push(FetchFailure {
                    url: url.to_string(),
                    reason: error.to_string(),
                });
                None
            }
        }
    }

    async fn read_document(
        &self,
        frontier: &mut Frontier,
        failures: &mut Vec<FetchFailure>,
        url: &str,
    ) -> Option<String> {
        if !self.reserve_fetch(frontier, url).await {
            return None;
        }

        let result = match self.fetcher.fetch_bytes(url).await {
            Ok(bytes) => extract_pdf_text(&bytes),
            Err(error) => Err(error),
        };

        match result {
            Ok(text) => Some(text),
            Err(error) => {
                warn!(%url, %error, "document skipped");
                failures.push(FetchFailure {
                    url: url.to_string(),
                    reason: error.to_string(),
                });
                None
            }
        }
    }

    /// Applies the page budget and the fixed pause between fetches.
    async fn reserve_fetch(&self, frontier: &mut Frontier, url: &str) -> bool {
        if frontier.fetches >= self.config.max_pages {
            debug!(%url, max_pages = self.config.max_pages, "crawl budget exhausted");
            return false;
        }
        if frontier.fetches > 0 && !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }
        frontier.fetches += 1;
        true
    }
}

fn dedup_by_content(texts: Vec<(String, String)>) -> Vec<Document> {
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .filter(|(_, text)| seen.insert(Sha256::digest(text.as_bytes())))
        .map(|(url, text)| Document::new(url, text))
        .collect()
}
