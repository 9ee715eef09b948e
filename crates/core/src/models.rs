use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Text recovered from one crawled page or one linked document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_url: String,
    pub text: String,
}

impl Document {
    pub fn new(source_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            text: text.into(),
        }
    }

    /// Text handed to the chunker, prefixed with its origin so every chunk
    /// still names the page it came from.
    pub fn labelled_text(&self) -> String {
        format!("The following text is from {}:\n{}", self.source_url, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub source_url: String,
    pub index: usize,
}

/// Chunks paired 1:1 with their embeddings. Chunks whose embedding batch
/// failed are not present; they are only counted in `unindexed`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedCorpus {
    pub chunks: Vec<TextChunk>,
    pub embeddings: Vec<Vec<f32>>,
    pub unindexed: usize,
}

impl EmbeddedCorpus {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn push(&mut self, chunk: TextChunk, embedding: Vec<f32>) {
        self.chunks.push(chunk);
        self.embeddings.push(embedding);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Telegram,
    Discord,
    Linkedin,
    Facebook,
    Instagram,
    Youtube,
    Github,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::Twitter,
        Platform::Telegram,
        Platform::Discord,
        Platform::Linkedin,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Youtube,
        Platform::Github,
    ];

    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Platform::Twitter => &["twitter.com/", "//x.com/", "www.x.com/"],
            Platform::Telegram => &["t.me/"],
            Platform::Discord => &["discord.com/", "discord.gg/"],
            Platform::Linkedin => &["linkedin.com/company"],
            Platform::Facebook => &["facebook.com/"],
            Platform::Instagram => &["instagram.com/"],
            Platform::Youtube => &["youtube.com/"],
            Platform::Github => &["github.com/"],
        }
    }

    /// Field name used for this platform in the task record.
    pub fn record_key(self) -> &'static str {
        match self {
            Platform::Twitter => "twitterLink",
            Platform::Telegram => "telegramLink",
            Platform::Discord => "discordLink",
            Platform::Linkedin => "linkedinLink",
            Platform::Facebook => "facebookLink",
            Platform::Instagram => "instagramLink",
            Platform::Youtube => "youtubeLink",
            Platform::Github => "githubLink",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks(BTreeMap<Platform, String>);

impl SocialLinks {
    /// First link per platform, in page order.
    pub fn from_links<'a>(links: impl IntoIterator<Item = &'a str>) -> Self {
        let mut found = BTreeMap::new();
        for link in links {
            for platform in Platform::ALL {
                if found.contains_key(&platform) {
                    continue;
                }
                if platform.patterns().iter().any(|pattern| link.contains(pattern)) {
                    found.insert(platform, link.to_string());
                }
            }
        }
        Self(found)
    }

    pub fn get(&self, platform: Platform) -> Option<&str> {
        self.0.get(&platform).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub documents: Vec<Document>,
    pub social_links: SocialLinks,
    pub failures: Vec<FetchFailure>,
    pub pages_visited: usize,
}
