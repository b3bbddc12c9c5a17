//! Collaborator ports — the side effects automations delegate to.

use std::future::Future;

use funnelhub_domain::error::FunnelError;
use funnelhub_domain::id::OwnerId;
use funnelhub_domain::record::{Contact, Lead, Record};

/// Sends templated emails about a record.
pub trait Mailer: Send + Sync {
    fn send_template(
        &self,
        owner_id: OwnerId,
        record: &Record,
        template_id: &str,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send;
}

/// Result of turning a lead into a contact.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// The lead after conversion, pointing at the contact.
    pub lead: Lead,
    pub contact: Contact,
}

/// Converts a lead into a contact and persists both.
pub trait LeadConverter: Send + Sync {
    fn convert(&self, lead: Lead) -> impl Future<Output = Result<Conversion, FunnelError>> + Send;
}

/// Delivers a JSON body to an external HTTP endpoint.
pub trait WebhookClient: Send + Sync {
    /// Non-2xx responses are reported as [`FunnelError::Integration`].
    fn deliver(
        &self,
        url: &str,
        method: &str,
        body: serde_json::Value,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send;
}
