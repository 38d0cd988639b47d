//! Offline key-shape probers.

use async_trait::async_trait;
use serde_json::json;

use crate::probes::live::LiveCheck;
use crate::probes::types::{ProbeError, ProbeOutcome, Prober};

/// Characters a key may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Any,
    Alphanumeric,
    Hex,
}

impl Charset {
    fn accepts(&self, c: char) -> bool {
        match self {
            Charset::Any => !c.is_whitespace(),
            Charset::Alphanumeric => c.is_ascii_alphanumeric(),
            Charset::Hex => c.is_ascii_hexdigit(),
        }
    }
}

/// Expected shape of a key.
#[derive(Debug, Clone, Copy)]
pub struct KeyFormat {
    prefixes: &'static [&'static str],
    min_len: usize,
    exact_len: Option<usize>,
    charset: Charset,
}

impl KeyFormat {
    pub const fn min_len(min_len: usize) -> Self {
        Self {
            prefixes: &[],
            min_len,
            exact_len: None,
            charset: Charset::Any,
        }
    }

    pub const fn exact_len(len: usize) -> Self {
        Self {
            prefixes: &[],
            min_len: len,
            exact_len: Some(len),
            charset: Charset::Any,
        }
    }

    pub const fn prefixes(mut self, prefixes: &'static [&'static str]) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub const fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Describe the first violated rule, if any.
    pub fn check(&self, key: &str) -> Result<(), String> {
        let len = key.chars().count();
        if !self.prefixes.is_empty() && !self.prefixes.iter().any(|p| key.starts_with(p)) {
            return Err(format!("expected prefix {}", self.prefixes.join(" or ")));
        }
        if let Some(exact) = self.exact_len {
            if len != exact {
                return Err(format!("expected {exact} characters, got {len}"));
            }
        } else if len < self.min_len {
            return Err(format!("expected at least {} characters, got {len}", self.min_len));
        }
        if !key.chars().all(|c| self.charset.accepts(c)) {
            return Err("contains unexpected characters".to_string());
        }
        Ok(())
    }
}

/// Format check, optionally followed by a live round trip.
pub struct FormatProber {
    name: &'static str,
    format: KeyFormat,
    live: Option<LiveCheck>,
}

impl FormatProber {
    pub fn new(name: &'static str, format: KeyFormat) -> Self {
        Self {
            name,
            format,
            live: None,
        }
    }

    pub fn with_live(mut self, live: Option<LiveCheck>) -> Self {
        self.live = live;
        self
    }
}

#[async_trait]
impl Prober for FormatProber {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn probe(&self, key: &str) -> Result<ProbeOutcome, ProbeError> {
        if let Err(reason) = self.format.check(key) {
            return Ok(ProbeOutcome::failed(format!("Invalid {} key format: {reason}", self.name)));
        }
        match &self.live {
            Some(live) => Ok(live.verify(self.name, key).await?),
            None => Ok(ProbeOutcome::passed(format!("{} key format is valid", self.name))
                .with_capabilities(json!({"verification": "format"}))),
        }
    }
}

/// Payment keys: reports whether the key is live or test mode, and restricted or not.
pub struct PaymentProber;

#[async_trait]
impl Prober for PaymentProber {
    fn name(&self) -> &'static str {
        "payment"
    }

    async fn probe(&self, key: &str) -> Result<ProbeOutcome, ProbeError> {
        const FORMAT: KeyFormat = KeyFormat::min_len(20).prefixes(&["sk_", "rk_", "pk_"]);
        if let Err(reason) = FORMAT.check(key) {
            return Ok(ProbeOutcome::failed(format!("Invalid payment key format: {reason}")));
        }
        if key.starts_with("pk_") {
            return Ok(ProbeOutcome::failed(
                "Publishable key supplied; a secret or restricted key is required",
            ));
        }
        let mode = if key.contains("_live_") {
            "live"
        } else if key.contains("_test_") {
            "test"
        } else {
            "unknown"
        };
        Ok(ProbeOutcome::passed(format!("Payment key format is valid ({mode} mode)"))
            .with_capabilities(json!({
                "mode": mode,
                "restricted": key.starts_with("rk_"),
            })))
    }
}

/// Fallback for families without a dedicated prober.
pub struct LengthProber {
    min_len: usize,
}

impl LengthProber {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }
}

#[async_trait]
impl Prober for LengthProber {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn probe(&self, key: &str) -> Result<ProbeOutcome, ProbeError> {
        let len = key.chars().count();
        if len < self.min_len {
            return Ok(ProbeOutcome::failed(format!(
                "API key too short: expected at least {} characters",
                self.min_len
            )));
        }
        Ok(ProbeOutcome::passed("API key passed basic length check"))
    }
}
