// FieldOps Infrastructure - HTTP Adapters
// Implements: MappingClient (distance matrix API), EventPublisher (webhook)

mod mapping_client;
mod webhook_publisher;

pub use mapping_client::{HttpMappingClient, MappingClientConfig};
pub use webhook_publisher::WebhookEventPublisher;
