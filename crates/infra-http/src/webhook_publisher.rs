// Webhook event publisher
//
// Each lifecycle event is POSTed as JSON on a spawned task, so transitions
// never wait on the notification service. Delivery failures are only logged.

use async_trait::async_trait;
use fieldops_core::domain::AssignmentEvent;
use fieldops_core::error::{AppError, Result};
use fieldops_core::port::EventPublisher;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

pub struct WebhookEventPublisher {
    client: Client,
    url: String,
}

impl WebhookEventPublisher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("webhook client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EventPublisher for WebhookEventPublisher {
    async fn publish(&self, event: &AssignmentEvent) -> Result<()> {
        let payload = serde_json::to_value(event)?;
        let client = self.client.clone();
        let url = self.url.clone();
        let kind = event.kind;
        let assignment_id = event.assignment_id.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(event = %kind, assignment_id = %assignment_id, "Event delivered");
                }
                Ok(response) => {
                    warn!(
                        event = %kind,
                        assignment_id = %assignment_id,
                        status = %response.status(),
                        "Webhook rejected event"
                    );
                }
                Err(e) => {
                    warn!(
                        event = %kind,
                        assignment_id = %assignment_id,
                        error = %e,
                        "Webhook delivery failed"
                    );
                }
            }
        });

        Ok(())
    }
}
