//! A mailer that only logs.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use funnelhub_app::ports::Mailer;
use funnelhub_domain::error::FunnelError;
use funnelhub_domain::id::{OwnerId, RecordId};
use funnelhub_domain::record::Record;

/// One email the [`LogMailer`] pretended to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub owner_id: OwnerId,
    pub record_id: RecordId,
    pub to: Option<String>,
    pub template_id: String,
}

/// [`Mailer`] that logs each email and keeps a copy in memory.
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl LogMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emails sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Mailer for LogMailer {
    fn send_template(
        &self,
        owner_id: OwnerId,
        record: &Record,
        template_id: &str,
    ) -> impl Future<Output = Result<(), FunnelError>> + Send {
        let email = SentEmail {
            owner_id,
            record_id: record.id(),
            to: record.profile().email.clone(),
            template_id: template_id.to_string(),
        };
        tracing::info!(
            owner_id = %email.owner_id,
            record_id = %email.record_id,
            to = email.to.as_deref().unwrap_or("<no email>"),
            template_id = %email.template_id,
            "email sent"
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email);
        async { Ok(()) }
    }
}
