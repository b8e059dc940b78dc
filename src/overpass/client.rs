use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use geo::Rect;
use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::config::RetryConfig;
use crate::overpass::{FeatureSet, QueryKind, RawFeature};

/// Transport seam for the tile fetcher. One logical query over a bbox, with
/// internal retries capped at `max_attempts`.
pub trait QueryService {
    fn query(&self, kind: QueryKind, bbox: &Rect<f64>, max_attempts: u32)
    -> Result<Vec<RawFeature>>;
}

/// Blocking HTTP client for an Overpass-style interpreter endpoint.
pub struct OverpassClient {
    http: Client,
    endpoint: String,
    retry: RetryConfig,
}

struct CallFailure {
    rate_limited: bool,
    source: anyhow::Error,
}

impl OverpassClient {
    pub fn new(endpoint: &str, retry: RetryConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent("demandmap/0.1 (+https://github.com/dmaddalena/demandmap)")
            .timeout(Duration::from_secs(180))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, endpoint: endpoint.to_string(), retry })
    }

    fn send(&self, ql: &str) -> Result<FeatureSet, CallFailure> {
        let resp = self
            .http
            .post(&self.endpoint)
            .form(&[("data", ql)])
            .send()
            .map_err(|e| CallFailure {
                rate_limited: false,
                source: anyhow!(e).context(format!("POST {}", self.endpoint)),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CallFailure {
                rate_limited: status == StatusCode::TOO_MANY_REQUESTS,
                source: anyhow!("HTTP {status} from {}", self.endpoint),
            });
        }

        serde_json::from_reader(resp).map_err(|e| CallFailure {
            rate_limited: false,
            source: anyhow!(e).context("Malformed interpreter response"),
        })
    }
}

impl QueryService for OverpassClient {
    fn query(
        &self,
        kind: QueryKind,
        bbox: &Rect<f64>,
        max_attempts: u32,
    ) -> Result<Vec<RawFeature>> {
        let ql = kind.overpass_ql(bbox);
        let mut last: Option<CallFailure> = None;

        for attempt in 1..=max_attempts.max(1) {
            match self.send(&ql) {
                Ok(set) => return Ok(set.elements),
                Err(failure) => {
                    if attempt < max_attempts {
                        thread::sleep(backoff_delay(
                            self.retry.base_delay_ms,
                            attempt,
                            failure.rate_limited,
                        ));
                    }
                    last = Some(failure);
                }
            }
        }

        let failure = last.expect("at least one attempt");
        Err(failure.source.context(format!("{} query failed", kind.label())))
    }
}

/// Delay before the retry following `attempt`. Rate-limited responses back
/// off on a steeper curve than other failures.
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32, rate_limited: bool) -> Duration {
    let factor: u64 = if rate_limited { 4 } else { 2 };
    Duration::from_millis(base_ms.saturating_mul(factor.saturating_pow(attempt - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_backoff_doubles() {
        assert_eq!(backoff_delay(100, 1, false), Duration::from_millis(100));
        assert_eq!(backoff_delay(100, 2, false), Duration::from_millis(200));
        assert_eq!(backoff_delay(100, 3, false), Duration::from_millis(400));
        assert_eq!(backoff_delay(100, 4, false), Duration::from_millis(800));
    }

    #[test]
    fn rate_limited_backoff_quadruples() {
        assert_eq!(backoff_delay(100, 1, true), Duration::from_millis(100));
        assert_eq!(backoff_delay(100, 2, true), Duration::from_millis(400));
        assert_eq!(backoff_delay(100, 3, true), Duration::from_millis(1600));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let d = backoff_delay(u64::MAX, 10, true);
        assert_eq!(d, Duration::from_millis(u64::MAX));
    }
}
