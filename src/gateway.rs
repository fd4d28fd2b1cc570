use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    config::GatewayConfig,
    error::{AppError, AppResult},
};

type HmacSha256 = Hmac<Sha256>;

/// Stripe Checkout client, driven over plain REST. Without a configured
/// secret key the gateway runs in offline mode and fabricates local session
/// ids, which keeps dev environments and the integration tests off the
/// network.
#[derive(Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookSessionObject,
}

#[derive(Debug, Deserialize)]
pub struct WebhookSessionObject {
    pub id: String,
    pub payment_intent: Option<String>,
}

impl PaymentGateway {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }

    /// Offline gateway for tests.
    pub fn offline() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: "https://api.stripe.com".to_string(),
            secret_key: None,
            webhook_secret: None,
            success_url: "http://127.0.0.1:3000/payments/success".to_string(),
            cancel_url: "http://127.0.0.1:3000/payments/cancel".to_string(),
        }
    }

    /// Create a checkout session for an order. Each movie becomes one line
    /// item with its price-at-order amount.
    pub async fn create_checkout_session(
        &self,
        order_id: Uuid,
        items: &[(String, i64)],
    ) -> AppResult<CheckoutSession> {
        let Some(secret_key) = &self.secret_key else {
            let id = format!("cs_local_{}", Uuid::new_v4().simple());
            let url = format!("{}?session_id={id}", self.success_url);
            return Ok(CheckoutSession { id, url });
        };

        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
            ("metadata[order_id]".into(), order_id.to_string()),
        ];
        for (idx, (title, amount)) in items.iter().enumerate() {
            form.push((
                format!("line_items[{idx}][price_data][currency]"),
                "usd".into(),
            ));
            form.push((
                format!("line_items[{idx}][price_data][unit_amount]"),
                amount.to_string(),
            ));
            form.push((
                format!("line_items[{idx}][price_data][product_data][name]"),
                title.clone(),
            ));
            form.push((format!("line_items[{idx}][quantity]"), "1".into()));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("gateway request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "checkout session creation rejected");
            return Err(AppError::Internal(anyhow::anyhow!(
                "gateway rejected checkout session: {status}"
            )));
        }

        let session = response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid gateway response: {e}")))?;
        Ok(session)
    }

    /// Refund the payment behind a completed checkout.
    pub async fn refund(&self, payment_intent: &str) -> AppResult<()> {
        let Some(secret_key) = &self.secret_key else {
            tracing::info!(%payment_intent, "offline gateway, refund recorded locally only");
            return Ok(());
        };

        let response = self
            .client
            .post(format!("{}/v1/refunds", self.api_base))
            .bearer_auth(secret_key)
            .form(&[("payment_intent", payment_intent)])
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("gateway request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Internal(anyhow::anyhow!(
                "gateway rejected refund: {status}"
            )));
        }
        Ok(())
    }

    /// Verify the `Stripe-Signature` header over the raw webhook payload.
    /// With no webhook secret configured the check is skipped.
    pub fn verify_webhook_signature(&self, payload: &[u8], header: Option<&str>) -> AppResult<()> {
        let Some(secret) = &self.webhook_secret else {
            return Ok(());
        };
        let header = header
            .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".into()))?;

        let mut timestamp = None;
        let mut signature = None;
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signature = Some(value),
                _ => {}
            }
        }
        let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
            return Err(AppError::BadRequest("Malformed Stripe-Signature header".into()));
        };

        let expected = signed_payload_hex(secret, timestamp, payload);
        if expected != signature {
            return Err(AppError::BadRequest("Invalid webhook signature".into()));
        }
        Ok(())
    }
}

fn signed_payload_hex(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_with_secret(secret: &str) -> PaymentGateway {
        let mut gateway = PaymentGateway::offline();
        gateway.webhook_secret = Some(secret.to_string());
        gateway
    }

    #[test]
    fn accepts_valid_signature() {
        let gateway = gateway_with_secret("whsec_test");
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let sig = signed_payload_hex("whsec_test", "1700000000", payload);
        let header = format!("t=1700000000,v1={sig}");
        assert!(gateway
            .verify_webhook_signature(payload, Some(&header))
            .is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let gateway = gateway_with_secret("whsec_test");
        let sig = signed_payload_hex("whsec_test", "1700000000", b"original");
        let header = format!("t=1700000000,v1={sig}");
        assert!(gateway
            .verify_webhook_signature(b"tampered", Some(&header))
            .is_err());
    }

    #[test]
    fn rejects_missing_header_when_secret_configured() {
        let gateway = gateway_with_secret("whsec_test");
        assert!(gateway.verify_webhook_signature(b"{}", None).is_err());
    }

    #[test]
    fn skips_verification_without_secret() {
        let gateway = PaymentGateway::offline();
        assert!(gateway.verify_webhook_signature(b"{}", None).is_ok());
    }

    #[test]
    fn offline_sessions_are_unique() {
        let gateway = PaymentGateway::offline();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let a = rt
            .block_on(gateway.create_checkout_session(Uuid::new_v4(), &[("Movie".into(), 100)]))
            .unwrap();
        let b = rt
            .block_on(gateway.create_checkout_session(Uuid::new_v4(), &[("Movie".into(), 100)]))
            .unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.url.contains(&a.id));
    }
}
