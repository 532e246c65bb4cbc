//! Live pH probe client.
//!
//! The probe exposes a single JSON endpoint returning `{"ph": <number>}`.
//! Any failure is reported as "no live value" so the operator-entered pH can
//! be used instead.

use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::models::PhOrigin;

// ---

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct PhResponse {
    ph: Option<f64>,
}

/// Optional live pH source. Without a URL every lookup yields `None`.
#[derive(Debug, Clone)]
pub struct PhSource {
    client: Client,
    url: Option<String>,
}

impl PhSource {
    // ---
    pub fn new(url: Option<String>) -> Result<Self> {
        // ---
        let client = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build pH probe client: {}", e))?;

        Ok(PhSource { client, url })
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Current live pH, or `None` if the probe is absent or unusable.
    pub async fn live_ph(&self) -> Option<f64> {
        // ---
        let url = self.url.as_deref()?;

        match self.fetch(url).await {
            Ok(ph) => {
                tracing::debug!("Live pH from {}: {:.2}", url, ph);
                Some(ph)
            }
            Err(e) => {
                tracing::warn!("Live pH unavailable from {}: {}", url, e);
                None
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<f64> {
        // ---
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("probe returned HTTP {}", response.status()));
        }

        let body: PhResponse = response.json().await?;
        let ph = body.ph.ok_or_else(|| anyhow!("probe response has no 'ph' value"))?;
        check_ph(ph)
    }

    /// Pick the pH for a submission: the live probe wins, otherwise the manual entry.
    pub async fn resolve(&self, manual: Option<f64>) -> Option<(f64, PhOrigin)> {
        resolve_ph(self.live_ph().await, manual)
    }
}

fn check_ph(ph: f64) -> Result<f64> {
    // ---
    if ph.is_finite() && (0.0..=14.0).contains(&ph) {
        Ok(ph)
    } else {
        Err(anyhow!("probe reported out-of-range pH {}", ph))
    }
}

fn resolve_ph(live: Option<f64>, manual: Option<f64>) -> Option<(f64, PhOrigin)> {
    // ---
    live.map(|ph| (ph, PhOrigin::LiveSensor))
        .or_else(|| manual.map(|ph| (ph, PhOrigin::Manual)))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_live_value_wins() {
        assert_eq!(
            resolve_ph(Some(6.8), Some(7.5)),
            Some((6.8, PhOrigin::LiveSensor))
        );
    }

    #[test]
    fn test_manual_fallback() {
        // ---
        assert_eq!(resolve_ph(None, Some(7.5)), Some((7.5, PhOrigin::Manual)));
        assert_eq!(resolve_ph(None, None), None);
    }

    #[test]
    fn test_probe_range_check() {
        // ---
        assert_eq!(check_ph(0.0).unwrap(), 0.0);
        assert_eq!(check_ph(14.0).unwrap(), 14.0);
        assert!(check_ph(14.5).is_err());
        assert!(check_ph(-0.1).is_err());
        assert!(check_ph(f64::NAN).is_err());
    }

    #[test]
    fn test_unconfigured_source_falls_back() {
        // ---
        let source = PhSource::new(None).unwrap();
        assert!(!source.is_configured());
        assert_eq!(tokio_test::block_on(source.live_ph()), None);
        assert_eq!(
            tokio_test::block_on(source.resolve(Some(7.0))),
            Some((7.0, PhOrigin::Manual))
        );
    }
}
