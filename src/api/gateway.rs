//! Network gateway
//!
//! One timeout-bounded GET primitive with a fixed fallback chain: a direct
//! request on a short timeout, then each proxy relay in order on a longer one.
//! No retries beyond the chain and no backoff, so the worst-case latency is
//! the sum of the tier timeouts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

/// Default relay pool
pub const DEFAULT_PROXIES: &[(&str, bool)] = &[
    ("https://api.allorigins.win/raw?url=", true),
    ("https://corsproxy.io/?", false),
    ("https://daili.laidd.de5.net/?url=", true),
];

/// A proxy relay that wraps a target URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRelay {
    /// Prefix the target URL is appended to
    pub prefix: String,
    /// Percent-encode the target before appending
    #[serde(default = "default_encode")]
    pub encode: bool,
}

fn default_encode() -> bool {
    true
}

impl ProxyRelay {
    pub fn new(prefix: impl Into<String>, encode: bool) -> Self {
        Self {
            prefix: prefix.into(),
            encode,
        }
    }

    pub fn wrap(&self, url: &str) -> String {
        if self.encode {
            format!("{}{}", self.prefix, urlencoding::encode(url))
        } else {
            format!("{}{}", self.prefix, url)
        }
    }

    pub fn defaults() -> Vec<ProxyRelay> {
        DEFAULT_PROXIES
            .iter()
            .map(|(prefix, encode)| ProxyRelay::new(*prefix, *encode))
            .collect()
    }
}

/// Response body, JSON when it parses and raw text otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(body),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }

    /// Raw text, re-rendering JSON bodies if needed
    pub fn into_text(self) -> String {
        match self {
            Payload::Json(v) => v.to_string(),
            Payload::Text(t) => t,
        }
    }
}

/// One tier of the fallback chain
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub label: String,
    pub url: String,
    pub timeout: Duration,
}

/// Why a single tier failed
#[derive(Error, Debug)]
enum AttemptError {
    #[error("timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response rejected")]
    Rejected,
}

/// Timeout-bounded HTTP access with proxy fallback
#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    direct_timeout: Duration,
    relay_timeout: Duration,
    relays: Vec<ProxyRelay>,
}

impl Gateway {
    pub fn new(direct_timeout: Duration, relay_timeout: Duration, relays: Vec<ProxyRelay>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("cinestream/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            direct_timeout,
            relay_timeout,
            relays,
        }
    }

    /// Direct requests only, no relays (for tests and trusted endpoints)
    pub fn direct_only(timeout: Duration) -> Self {
        Self::new(timeout, timeout, Vec::new())
    }

    /// The ordered tiers that would be tried for `url`
    pub fn strategies(&self, url: &str) -> Vec<Strategy> {
        let mut tiers = vec![Strategy {
            label: "direct".to_string(),
            url: url.to_string(),
            timeout: self.direct_timeout,
        }];
        tiers.extend(self.relays.iter().enumerate().map(|(i, relay)| Strategy {
            label: format!("relay#{}", i),
            url: relay.wrap(url),
            timeout: self.relay_timeout,
        }));
        tiers
    }

    /// Longest a single fetch can take when every tier times out
    pub fn worst_case(&self) -> Duration {
        self.direct_timeout + self.relay_timeout * self.relays.len() as u32
    }

    /// Fetch `url`, accepting any 2xx response
    pub async fn fetch(&self, url: &str) -> Result<Payload> {
        self.fetch_accepting(url, |_| true).await
    }

    /// Fetch `url`; a 2xx response that `accept` rejects falls through to the next tier
    #[instrument(skip(self, accept), level = "debug")]
    pub async fn fetch_accepting<F>(&self, url: &str, accept: F) -> Result<Payload>
    where
        F: Fn(&Payload) -> bool,
    {
        let strategies = self.strategies(url);
        let attempts = strategies.len();
        let mut timeouts = 0;

        for strategy in &strategies {
            match self.attempt(strategy, &accept).await {
                Ok(payload) => {
                    debug!(tier = %strategy.label, "request succeeded");
                    return Ok(payload);
                }
                Err(e) => {
                    if matches!(e, AttemptError::Timeout) {
                        timeouts += 1;
                    }
                    debug!(tier = %strategy.label, error = %e, "tier failed");
                }
            }
        }

        warn!(url, attempts, "all network tiers failed");
        if timeouts == attempts {
            let after = strategies.iter().map(|s| s.timeout).sum();
            return Err(Error::NetworkTimeout {
                url: url.to_string(),
                after,
            });
        }
        Err(Error::NetworkExhausted {
            url: url.to_string(),
            attempts,
        })
    }

    async fn attempt<F>(&self, strategy: &Strategy, accept: &F) -> std::result::Result<Payload, AttemptError>
    where
        F: Fn(&Payload) -> bool,
    {
        let body = tokio::time::timeout(strategy.timeout, self.send(&strategy.url))
            .await
            .map_err(|_| AttemptError::Timeout)??;

        let payload = Payload::from_body(body);
        if accept(&payload) {
            Ok(payload)
        } else {
            Err(AttemptError::Rejected)
        }
    }

    async fn send(&self, url: &str) -> std::result::Result<String, AttemptError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}
