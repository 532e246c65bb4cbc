//! Operator alert dispatch.
//!
//! Alerts are fire-and-forget: delivery runs on a detached task and failures
//! are only logged, so a broken SMS gateway never blocks an evaluation.

use anyhow::{anyhow, Result};
use reqwest::Client;

use crate::engine::{HIGH_LOAD_BOD, HIGH_LOAD_COD, MIN_TREATED_PH};
use crate::models::{Reading, TreatedValues};

// ---

pub const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio SMS credentials and endpoints, supplied through configuration.
#[derive(Debug, Clone)]
pub struct SmsSettings {
    /// Gateway root, normally [`TWILIO_API_BASE`]
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
struct SmsChannel {
    client: Client,
    settings: SmsSettings,
}

/// Sends out-of-range alerts over whichever channels are configured.
#[derive(Debug, Clone)]
pub struct Notifier {
    sms: Option<SmsChannel>,
}

impl Notifier {
    // ---
    pub fn new(sms: Option<SmsSettings>) -> Self {
        // ---
        Notifier {
            sms: sms.map(|settings| SmsChannel {
                client: Client::new(),
                settings,
            }),
        }
    }

    pub fn has_sms(&self) -> bool {
        self.sms.is_some()
    }

    /// Queue an alert for delivery and return immediately.
    ///
    /// Must be called from within the tokio runtime.
    pub fn dispatch(&self, message: String) {
        // ---
        tracing::warn!("ALERT: {}", message);

        let Some(sms) = self.sms.clone() else {
            tracing::debug!("No SMS channel configured, alert logged only");
            return;
        };

        tokio::spawn(async move {
            sms.deliver(&message).await;
        });
    }
}

impl SmsChannel {
    /// Send and log the outcome. Returns whether the gateway accepted it.
    async fn deliver(&self, body: &str) -> bool {
        // ---
        match self.send(body).await {
            Ok(()) => {
                tracing::info!("Alert SMS sent to {}", self.settings.to);
                true
            }
            Err(e) => {
                tracing::warn!("SMS failed: {:#}", e);
                false
            }
        }
    }

    async fn send(&self, body: &str) -> Result<()> {
        // ---
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", self.settings.to.as_str()),
                ("From", self.settings.from.as_str()),
                ("Body", body),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(anyhow!("SMS gateway returned HTTP {}: {}", status, detail))
        }
    }
}

/// Alert text naming the values that tripped it.
pub fn alert_message(reading: &Reading, treated: &TreatedValues) -> String {
    // ---
    let mut causes = Vec::new();
    if reading.bod > HIGH_LOAD_BOD {
        causes.push(format!("BOD {:.1} mg/L", reading.bod));
    }
    if reading.cod > HIGH_LOAD_COD {
        causes.push(format!("COD {:.1} mg/L", reading.cod));
    }
    if treated.ph_treated < MIN_TREATED_PH {
        causes.push(format!("treated pH {:.2}", treated.ph_treated));
    }

    if causes.is_empty() {
        "STP Alert: Water quality out of range!".to_string()
    } else {
        format!("STP Alert: Water quality out of range! ({})", causes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::http::StatusCode;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use std::time::Duration;

    fn reading(bod: f64, cod: f64) -> Reading {
        // ---
        Reading {
            bod,
            cod,
            tss: 0.0,
            oil_grease: 0.0,
            ph: 7.0,
            ammonical_n: 0.0,
            total_n: 0.0,
            flow_rate: 1.0,
        }
    }

    fn treated(ph_treated: f64) -> TreatedValues {
        TreatedValues::from_array([5.0, 20.0, 5.0, 1.0, ph_treated, 1.0, 4.0])
    }

    #[test]
    fn test_alert_message_lists_causes() {
        // ---
        let msg = alert_message(&reading(320.0, 610.0), &treated(6.1));
        assert_eq!(
            msg,
            "STP Alert: Water quality out of range! (BOD 320.0 mg/L, COD 610.0 mg/L, treated pH 6.10)"
        );

        let msg = alert_message(&reading(10.0, 10.0), &treated(6.4));
        assert_eq!(
            msg,
            "STP Alert: Water quality out of range! (treated pH 6.40)"
        );
    }

    #[test]
    fn test_alert_message_without_causes() {
        let msg = alert_message(&reading(10.0, 10.0), &treated(7.0));
        assert_eq!(msg, "STP Alert: Water quality out of range!");
    }

    #[test]
    fn test_notifier_without_sms_only_logs() {
        // ---
        let notifier = Notifier::new(None);
        assert!(!notifier.has_sms());
        // No runtime needed when nothing is spawned
        notifier.dispatch("test alert".to_string());
    }

    /// Local stand-in for the SMS gateway that counts requests and always
    /// answers 500.
    async fn spawn_failing_gateway() -> (String, Arc<AtomicUsize>) {
        // ---
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().fallback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::INTERNAL_SERVER_ERROR, "gateway down")
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), hits)
    }

    fn settings(api_base: String) -> SmsSettings {
        // ---
        SmsSettings {
            api_base,
            account_sid: "AC-test".to_string(),
            auth_token: "token".to_string(),
            from: "+10000000000".to_string(),
            to: "+10000000001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_gateway_error_is_reported_not_raised() {
        // ---
        let (base, hits) = spawn_failing_gateway().await;
        let channel = SmsChannel {
            client: Client::new(),
            settings: settings(base),
        };

        let err = channel.send("test alert").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"), "error was {}", err);
        assert!(err.to_string().contains("gateway down"));

        assert!(!channel.deliver("test alert").await);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispatch_returns_before_delivery_fails() {
        // ---
        let (base, hits) = spawn_failing_gateway().await;
        let notifier = Notifier::new(Some(settings(base)));
        assert!(notifier.has_sms());

        notifier.dispatch("test alert".to_string());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // The detached task still reaches the gateway, and its failure stays there
        for _ in 0..100 {
            if hits.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Still usable afterwards
        notifier.dispatch("second alert".to_string());
    }
}
