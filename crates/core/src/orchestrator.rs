//! Drives every extraction and scoring question against the completion
//! providers and folds the answers into task-record fields.

use crate::embeddings::Embedder;
use crate::error::ProviderError;
use crate::extraction::{
    narrative_field, parse_structured, Extraction, IndustrySwot, ProjectCategory, ScoreResult,
    TeamProfile, TokenIdentity, Tokenomics, NARRATIVE_FAILED, SUMMARY_FAILED,
};
use crate::models::EmbeddedCorpus;
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::selector::ContextSelector;
use crate::token::{resolve_token, TokenInfo};
use crate::traits::{CompletionProvider, FieldMap, TokenLookup};
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAi,
    Mistral,
    Gemini,
}

impl ProviderId {
    /// Prefix of the provider's record keys.
    pub fn record_prefix(self) -> &'static str {
        match self {
            ProviderId::OpenAi => "gpt",
            ProviderId::Mistral => "mistral",
            ProviderId::Gemini => "gemini",
        }
    }
}

/// Answers extraction questions and the final summary.
pub const PRIMARY_PROVIDER: ProviderId = ProviderId::OpenAi;

#[derive(Default, Clone)]
pub struct ProviderSet {
    providers: HashMap<ProviderId, Arc<dyn CompletionProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: ProviderId, provider: Arc<dyn CompletionProvider>) -> Self {
        self.providers.insert(id, provider);
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn CompletionProvider>> {
        self.providers.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStrategy {
    /// Fundamentals-first scoring by every provider.
    Strict,
    /// Meme-season scoring; skips the third provider.
    CommunityHype,
}

impl ScoringStrategy {
    pub fn providers(self) -> &'static [ProviderId] {
        match self {
            ScoringStrategy::Strict => &[ProviderId::OpenAi, ProviderId::Mistral, ProviderId::Gemini],
            ScoringStrategy::CommunityHype => &[ProviderId::OpenAi, ProviderId::Mistral],
        }
    }

    pub fn template(self) -> String {
        match self {
            ScoringStrategy::Strict => prompts::strict_score(),
            ScoringStrategy::CommunityHype => prompts::hype_score(),
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            ScoringStrategy::Strict => "",
            ScoringStrategy::CommunityHype => "meme_",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoringStrategy::Strict => "strict",
            ScoringStrategy::CommunityHype => "meme",
        }
    }

    /// Strategies a job runs, in the order their results are merged.
    pub fn for_job(is_memecoin: bool, meme_season: bool, ai_analysis: bool) -> Vec<ScoringStrategy> {
        let mut strategies = Vec::new();
        if is_memecoin && meme_season {
            strategies.push(ScoringStrategy::CommunityHype);
        }
        if ai_analysis {
            strategies.push(ScoringStrategy::Strict);
        }
        strategies
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub extraction_top_k: usize,
    pub scoring_top_k: usize,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            extraction_top_k: 10,
            scoring_top_k: 40,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub category: ProjectCategory,
    pub token: TokenInfo,
    /// `None` when every attempt failed.
    pub launchpad: Option<String>,
    pub swot: IndustrySwot,
    pub team: TeamProfile,
    pub tokenomics: Tokenomics,
}

impl ExtractionReport {
    pub fn is_memecoin(&self) -> bool {
        self.category.is_memecoin()
    }

    pub fn record_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("category".into(), to_value(&self.category.category));
        fields.insert("isMemecoin".into(), to_value(&self.category.is_memecoin));
        fields.insert("tokenName".into(), to_value(&self.token.name));
        fields.insert("tokenSymbol".into(), to_value(&self.token.symbol));
        fields.insert("chains".into(), to_value(&self.token.chains));
        fields.insert("tokenSupply".into(), to_value(&self.token.total_supply));
        fields.insert("tokenSource".into(), json!(self.token.source.as_str()));
        fields.insert(
            "submittedDescription".into(),
            match &self.launchpad {
                Some(text) => to_value(&narrative_field(text)),
                None => json!(NARRATIVE_FAILED),
            },
        );
        fields.insert("industry".into(), to_value(&self.swot.industry));
        fields.insert(
            "swot".into(),
            json!({
                "strengths": to_value(&self.swot.strengths),
                "weaknesses": to_value(&self.swot.weaknesses),
                "opportunities": to_value(&self.swot.opportunities),
                "threats": to_value(&self.swot.threats),
            }),
        );
        fields.insert("team".into(), to_value(&self.team));
        fields.insert("tokenomics".into(), to_value(&self.tokenomics));
        fields
    }
}

#[derive(Debug, Clone)]
pub struct ScoringReport {
    pub strategy: ScoringStrategy,
    /// One opinion per provider of the strategy, in provider order.
    pub opinions: Vec<(ProviderId, ScoreResult)>,
    pub summary: Option<String>,
}

impl ScoringReport {
    pub fn record_fields(&self) -> FieldMap {
        let prefix = self.strategy.prefix();
        let mut fields = FieldMap::new();
        for (provider, opinion) in &self.opinions {
            let provider = provider.record_prefix();
            fields.insert(format!("{provider}_{prefix}score"), json!(opinion.score));
            fields.insert(format!("{provider}_{prefix}raw"), json!(opinion.description));
        }
        let summary = self.summary.as_deref().unwrap_or(SUMMARY_FAILED);
        fields.insert(format!("{prefix}llm_summary"), json!(summary));
        fields
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

pub struct Orchestrator {
    providers: ProviderSet,
    embedder: Arc<dyn Embedder>,
    token_lookup: Option<Arc<dyn TokenLookup>>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(providers: ProviderSet, embedder: Arc<dyn Embedder>, options: OrchestratorOptions) -> Self {
        Self {
            providers,
            embedder,
            token_lookup: None,
            options,
        }
    }

    pub fn with_token_lookup(mut self, lookup: Arc<dyn TokenLookup>) -> Self {
        self.token_lookup = Some(lookup);
        self
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    async fn context(&self, corpus: &EmbeddedCorpus, template: &str, top_k: usize) -> String {
        ContextSelector::new(self.embedder.as_ref(), self.options.retry)
            .select(corpus, template, top_k)
            .await
    }

    /// Asks `provider` until a reply parses into `T`. Transport failures
    /// and unparseable replies share the retry budget; exhaustion yields
    /// `T::degraded()`.
    pub async fn ask_structured<T: Extraction>(&self, provider: ProviderId, template: &str, context: &str) -> T {
        let Some(client) = self.providers.get(provider) else {
            warn!(provider = provider.record_prefix(), "provider not configured");
            return T::degraded();
        };

        let prompt = format!("{template}{context}");
        let (client, prompt) = (client.as_ref(), prompt.as_str());
        self.options
            .retry
            .run_or_else(
                provider.record_prefix(),
                move |_| async move {
                    let reply = client.complete(prompt).await?;
                    parse_structured::<T>(&reply).map_err(|details| ProviderError::Malformed {
                        provider: client.name().to_string(),
                        details,
                    })
                },
                T::degraded,
            )
            .await
    }

    /// Free-text question; the reply is passed through untouched.
    pub async fn ask_narrative(&self, provider: ProviderId, prompt: &str) -> Option<String> {
        let Some(client) = self.providers.get(provider) else {
            warn!(provider = provider.record_prefix(), "provider not configured");
            return None;
        };

        let client = client.as_ref();
        self.options
            .retry
            .run(provider.record_prefix(), move |_| async move { client.complete(prompt).await })
            .await
            .ok()
    }

    pub async fn extract(&self, corpus: &EmbeddedCorpus) -> ExtractionReport {
        let top_k = self.options.extraction_top_k;

        let category = self.structured_question::<ProjectCategory>(corpus, &prompts::category(), top_k).await;
        info!(category = ?category.category, is_memecoin = category.is_memecoin(), "category extracted");

        let identity = self.structured_question::<TokenIdentity>(corpus, &prompts::token_identity(), top_k).await;
        let token = resolve_token(identity, self.token_lookup.as_deref()).await;
        info!(name = ?token.name, symbol = ?token.symbol, source = token.source.as_str(), "token resolved");

        let launchpad_template = prompts::launchpad();
        let launchpad_context = self.context(corpus, &launchpad_template, top_k).await;
        let launchpad = self
            .ask_narrative(PRIMARY_PROVIDER, &format!("{launchpad_template}{launchpad_context}"))
            .await;
        info!(found = launchpad.is_some(), "launchpad participation extracted");

        let swot = self.structured_question::<IndustrySwot>(corpus, &prompts::industry_swot(), top_k).await;
        let team = self.structured_question::<TeamProfile>(corpus, &prompts::team(), top_k).await;
        let tokenomics = self.structured_question::<Tokenomics>(corpus, &prompts::tokenomics(), top_k).await;
        info!("profile questions answered");

        ExtractionReport {
            category,
            token,
            launchpad,
            swot,
            team,
            tokenomics,
        }
    }

    async fn structured_question<T: Extraction>(&self, corpus: &EmbeddedCorpus, template: &str, top_k: usize) -> T {
        let context = self.context(corpus, template, top_k).await;
        self.ask_structured(PRIMARY_PROVIDER, template, &context).await
    }

    /// Scores the project with every provider of `strategy` concurrently,
    /// then summarizes their opinions.
    pub async fn score(&self, corpus: &EmbeddedCorpus, strategy: ScoringStrategy) -> ScoringReport {
        let template = strategy.template();
        let context = self.context(corpus, &template, self.options.scoring_top_k).await;
        info!(strategy = strategy.label(), context_chars = context.len(), "scoring context selected");

        let (template, context) = (template.as_str(), context.as_str());
        let opinions = join_all(strategy.providers().iter().map(|&provider| async move {
            let opinion = self.ask_structured::<ScoreResult>(provider, template, context).await;
            info!(
                strategy = strategy.label(),
                provider = provider.record_prefix(),
                score = opinion.score,
                "provider scored project"
            );
            (provider, opinion)
        }))
        .await;

        let rendered: Vec<String> = opinions.iter().map(|(_, opinion)| to_value(opinion).to_string()).collect();
        let summary = self.ask_narrative(PRIMARY_PROVIDER, &prompts::summary(&rendered)).await;
        info!(strategy = strategy.label(), summarized = summary.is_some(), "scoring finished");

        ScoringReport {
            strategy,
            opinions,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extraction::{Field, EXTRACTION_ERROR, SCORING_FAILED, SUMMARY_FAILED};
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Script = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

    /// Answers through a script and records every prompt it receives.
    struct FakeProvider {
        name: &'static str,
        script: Script,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new(
            name: &'static str,
            script: impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                script: Box::new(script),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().expect("lock").len()
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().expect("lock").push(prompt.to_string());
            (self.script)(prompt)
        }
    }

    fn down(provider: &'static str) -> impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static {
        move |_| {
            Err(ProviderError::EmptyResponse {
                provider: provider.to_string(),
            })
        }
    }

    fn orchestrator(providers: ProviderSet) -> Orchestrator {
        Orchestrator::new(
            providers,
            Arc::new(CharacterNgramEmbedder::default()),
            OrchestratorOptions {
                retry: RetryPolicy::immediate(3),
                ..OrchestratorOptions::default()
            },
        )
    }

    fn scorer(name: &'static str, score: u8) -> Arc<FakeProvider> {
        FakeProvider::new(name, move |prompt| {
            if prompt.starts_with("Summarize") {
                Ok("A lending market with a capable team.".to_string())
            } else {
                Ok(format!("{{\"score\": {score}, \"description\": \"{name} opinion\"}}"))
            }
        })
    }

    #[tokio::test]
    async fn failing_provider_is_called_max_attempts_then_degrades() {
        let openai = FakeProvider::new("openai", down("openai"));
        let orchestrator = orchestrator(ProviderSet::new().with(ProviderId::OpenAi, openai.clone()));

        let result: ScoreResult = orchestrator
            .ask_structured(ProviderId::OpenAi, "Score this:\n", "context")
            .await;

        assert_eq!(result, ScoreResult::degraded());
        assert_eq!(openai.calls(), 3);
    }

    #[tokio::test]
    async fn unparseable_reply_is_retried() {
        let attempts = Arc::new(Mutex::new(0));
        let counter = attempts.clone();
        let openai = FakeProvider::new("openai", move |_| {
            let mut seen = counter.lock().expect("lock");
            *seen += 1;
            if *seen == 1 {
                Ok("I would rate it highly".to_string())
            } else {
                Ok(r#"{"score": 8, "description": "strong"}"#.to_string())
            }
        });
        let orchestrator = orchestrator(ProviderSet::new().with(ProviderId::OpenAi, openai.clone()));

        let result: ScoreResult = orchestrator.ask_structured(ProviderId::OpenAi, "", "").await;

        assert_eq!(result.score, 8);
        assert_eq!(openai.calls(), 2);
    }

    #[tokio::test]
    async fn strict_scoring_fans_out_to_all_providers() {
        let openai = scorer("openai", 7);
        let mistral = scorer("mistral", 5);
        let gemini = FakeProvider::new("gemini", down("gemini"));
        let orchestrator = orchestrator(
            ProviderSet::new()
                .with(ProviderId::OpenAi, openai.clone())
                .with(ProviderId::Mistral, mistral.clone())
                .with(ProviderId::Gemini, gemini.clone()),
        );

        let report = orchestrator
            .score(&EmbeddedCorpus::default(), ScoringStrategy::Strict)
            .await;
        let fields = report.record_fields();

        assert_eq!(fields["gpt_score"], json!(7));
        assert_eq!(fields["gpt_raw"], json!("openai opinion"));
        assert_eq!(fields["mistral_score"], json!(5));
        assert_eq!(fields["gemini_score"], json!(0));
        assert_eq!(fields["gemini_raw"], json!(SCORING_FAILED));
        assert_eq!(fields["llm_summary"], json!("A lending market with a capable team."));
        assert_eq!(gemini.calls(), 3);

        // one scoring call plus the summary
        let prompts = openai.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Opinion 3:"));
        assert!(prompts[1].contains(SCORING_FAILED));
    }

    #[tokio::test]
    async fn hype_scoring_skips_third_provider_and_prefixes_keys() {
        let openai = scorer("openai", 9);
        let mistral = scorer("mistral", 6);
        let gemini = scorer("gemini", 1);
        let orchestrator = orchestrator(
            ProviderSet::new()
                .with(ProviderId::OpenAi, openai.clone())
                .with(ProviderId::Mistral, mistral.clone())
                .with(ProviderId::Gemini, gemini.clone()),
        );

        let fields = orchestrator
            .score(&EmbeddedCorpus::default(), ScoringStrategy::CommunityHype)
            .await
            .record_fields();

        assert_eq!(fields["gpt_meme_score"], json!(9));
        assert_eq!(fields["mistral_meme_raw"], json!("mistral opinion"));
        assert!(fields.contains_key("meme_llm_summary"));
        assert!(!fields.contains_key("gemini_meme_score"));
        assert_eq!(gemini.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_summary_is_recorded_as_failed() {
        let openai = FakeProvider::new("openai", |prompt| {
            if prompt.starts_with("Summarize") {
                Err(ProviderError::EmptyResponse {
                    provider: "openai".to_string(),
                })
            } else {
                Ok(r#"{"score": 4, "description": "thin docs"}"#.to_string())
            }
        });
        let mistral = scorer("mistral", 3);
        let orchestrator = orchestrator(
            ProviderSet::new()
                .with(ProviderId::OpenAi, openai.clone())
                .with(ProviderId::Mistral, mistral),
        );

        let report = orchestrator
            .score(&EmbeddedCorpus::default(), ScoringStrategy::CommunityHype)
            .await;

        assert_eq!(report.summary, None);
        assert_eq!(report.record_fields()["meme_llm_summary"], json!(SUMMARY_FAILED));
        // one scoring call plus three summary attempts
        assert_eq!(openai.calls(), 4);
    }

    #[test]
    fn strategies_follow_the_flags() {
        assert_eq!(
            ScoringStrategy::for_job(true, true, true),
            vec![ScoringStrategy::CommunityHype, ScoringStrategy::Strict]
        );
        assert_eq!(ScoringStrategy::for_job(true, false, true), vec![ScoringStrategy::Strict]);
        assert!(ScoringStrategy::for_job(false, true, false).is_empty());
    }

    #[tokio::test]
    async fn extraction_formats_token_and_keeps_launchpad_text() {
        let openai = FakeProvider::new("openai", |prompt| {
            let reply = if prompt.contains("isMemecoin") {
                r#"{"category": "Meme", "isMemecoin": true}"#
            } else if prompt.contains("tokenSymbol") {
                r#"```json
{"tokenName": "Example Token!!", "tokenSymbol": "$et ", "chains": ["Ethereum"], "contractAddresses": ["No information found"]}
```"#
            } else if prompt.contains("launchpad participation") {
                "Raised 200k on DAO Maker."
            } else if prompt.contains("strengths") {
                r#"{"industry": "Meme", "strengths": ["Viral mascot"], "weaknesses": ["No utility"], "opportunities": ["No information found"], "threats": ["Rug risk"]}"#
            } else if prompt.contains("isDoxxed") {
                r#"{"members": ["No information found"], "isDoxxed": false}"#
            } else {
                "not json at all"
            };
            Ok(reply.to_string())
        });
        let orchestrator = orchestrator(ProviderSet::new().with(ProviderId::OpenAi, openai.clone()));

        let report = orchestrator.extract(&EmbeddedCorpus::default()).await;
        let fields = report.record_fields();

        assert!(report.is_memecoin());
        assert_eq!(fields["tokenName"], json!("ExampleToken"));
        assert_eq!(fields["tokenSymbol"], json!("ET"));
        assert_eq!(fields["chains"], json!(["Ethereum"]));
        assert_eq!(fields["tokenSource"], json!("llm"));
        assert_eq!(fields["submittedDescription"], json!("Raised 200k on DAO Maker."));
        assert_eq!(fields["industry"], json!("Meme"));
        assert_eq!(fields["swot"]["opportunities"], Value::Null);
        assert_eq!(fields["team"]["members"], Value::Null);
        assert_eq!(report.tokenomics.total_supply, Field::Failed);
        assert_eq!(fields["tokenomics"]["vesting"], json!(EXTRACTION_ERROR));
    }

    #[tokio::test]
    async fn missing_provider_degrades_without_calls() {
        let orchestrator = orchestrator(ProviderSet::new());
        let category: ProjectCategory = orchestrator.ask_structured(ProviderId::OpenAi, "", "").await;
        assert_eq!(category, ProjectCategory::degraded());
        assert_eq!(orchestrator.ask_narrative(ProviderId::OpenAi, "hi").await, None);
    }
}
