//! Static map from probe target to prober.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProbeConfig;
use crate::probes::format::{Charset, FormatProber, KeyFormat, LengthProber, PaymentProber};
use crate::probes::live::{KeyPlacement, LiveCheck};
use crate::probes::types::{ProbeTarget, Prober};
use crate::registry::{LlmSubtype, ProviderType};
use crate::resilience::{RetryExecutor, SharedPolicies};

const FALLBACK_MIN_LEN: usize = 10;

/// Probers keyed by target, with a length-only fallback.
#[derive(Clone)]
pub struct ProberSet {
    probers: HashMap<ProbeTarget, Arc<dyn Prober>>,
    fallback: Arc<dyn Prober>,
}

impl Default for ProberSet {
    fn default() -> Self {
        Self {
            probers: HashMap::new(),
            fallback: Arc::new(LengthProber::new(FALLBACK_MIN_LEN)),
        }
    }
}

impl ProberSet {
    /// The built-in probers. Live checks are attached when enabled in `config`.
    pub fn builtin(
        config: &ProbeConfig,
        policies: Arc<SharedPolicies>,
        executor: RetryExecutor,
    ) -> Self {
        let client = reqwest::Client::new();
        let live = |url: String, placement: KeyPlacement| -> Option<LiveCheck> {
            config.live_checks.then(|| {
                LiveCheck::new(
                    client.clone(),
                    executor.clone(),
                    policies.clone(),
                    config.retry_class.clone(),
                    url,
                    placement,
                )
            })
        };

        let openai = FormatProber::new("OpenAI", KeyFormat::min_len(20).prefixes(&["sk-"]))
            .with_live(live(format!("{}/models", config.openai_base_url), KeyPlacement::Bearer));
        let anthropic = FormatProber::new("Anthropic", KeyFormat::min_len(20).prefixes(&["sk-ant-"]))
            .with_live(
                live(
                    format!("{}/models", config.anthropic_base_url),
                    KeyPlacement::Header("x-api-key"),
                )
                .map(|check| check.header("anthropic-version", config.anthropic_version.clone())),
            );
        let google = FormatProber::new("Google", KeyFormat::exact_len(39).prefixes(&["AIza"]))
            .with_live(live(
                format!("{}/models", config.google_base_url),
                KeyPlacement::Query("key"),
            ));
        let cohere = FormatProber::new("Cohere", KeyFormat::min_len(40).charset(Charset::Alphanumeric))
            .with_live(live(format!("{}/models", config.cohere_base_url), KeyPlacement::Bearer));
        let mistral = FormatProber::new("Mistral", KeyFormat::exact_len(32).charset(Charset::Alphanumeric))
            .with_live(live(format!("{}/models", config.mistral_base_url), KeyPlacement::Bearer));
        let azure = FormatProber::new("Azure OpenAI", KeyFormat::exact_len(32).charset(Charset::Hex));
        let other_llm = FormatProber::new("LLM", KeyFormat::min_len(16));

        let mut set = Self::default();
        set.insert(ProbeTarget::Llm(LlmSubtype::OpenAi), Arc::new(openai));
        set.insert(ProbeTarget::Llm(LlmSubtype::Anthropic), Arc::new(anthropic));
        set.insert(ProbeTarget::Llm(LlmSubtype::Google), Arc::new(google));
        set.insert(ProbeTarget::Llm(LlmSubtype::Cohere), Arc::new(cohere));
        set.insert(ProbeTarget::Llm(LlmSubtype::Mistral), Arc::new(mistral));
        set.insert(ProbeTarget::Llm(LlmSubtype::AzureOpenAi), Arc::new(azure));
        set.insert(ProbeTarget::Llm(LlmSubtype::Other), Arc::new(other_llm));

        set.insert(
            ProbeTarget::Service(ProviderType::SocialMedia),
            Arc::new(FormatProber::new("social media", KeyFormat::min_len(20))),
        );
        set.insert(
            ProbeTarget::Service(ProviderType::Email),
            Arc::new(FormatProber::new("email", KeyFormat::min_len(20))),
        );
        set.insert(
            ProbeTarget::Service(ProviderType::Sms),
            Arc::new(FormatProber::new("SMS", KeyFormat::min_len(16).charset(Charset::Alphanumeric))),
        );
        set.insert(ProbeTarget::Service(ProviderType::Payment), Arc::new(PaymentProber));
        set
    }

    pub fn insert(&mut self, target: ProbeTarget, prober: Arc<dyn Prober>) {
        self.probers.insert(target, prober);
    }

    /// The prober for `target`, or the length-only fallback.
    pub fn select(&self, target: ProbeTarget) -> Arc<dyn Prober> {
        self.probers
            .get(&target)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
