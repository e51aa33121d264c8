//! External interfaces the billing core consumes (spec §6): persistence, workflow
//! scheduling, payment-provider integration, webhook delivery, and export object storage.
//! Every port is an `async-trait`, held by services as `Arc<dyn Port>`.

pub mod object_store;
pub mod payment_provider;
pub mod repository;
pub mod webhook;
pub mod workflow;

pub use object_store::ObjectStorePort;
pub use payment_provider::PaymentProviderPort;
pub use repository::{ListFilter, Repository, TransactionPort};
pub use webhook::{WebhookEvent, WebhookEventName, WebhookPublisherPort};
pub use workflow::{ScheduleHandle, WorkflowPort};
