use async_trait::async_trait;

use funnelhub_app::ports::RecordRepository;
use funnelhub_app::task_handler::{HandlerError, TaskHandler};
use funnelhub_domain::id::OwnerId;
use funnelhub_domain::record::Record;
use funnelhub_domain::task::{Payload, TaskResult};

/// Summarises an owner's funnel: lead, contact and conversion counts.
#[derive(Debug, Clone)]
pub struct AnalyticsHandler<RR> {
    records: RR,
}

impl<RR> AnalyticsHandler<RR> {
    pub const TASK_TYPE: &'static str = "analytics";

    pub fn new(records: RR) -> Self {
        Self { records }
    }
}

#[async_trait]
impl<RR: RecordRepository> TaskHandler for AnalyticsHandler<RR> {
    async fn handle(&self, owner_id: OwnerId, _payload: &Payload) -> Result<TaskResult, HandlerError> {
        let records = self.records.find_by_owner(owner_id, None).await?;
        let mut leads = 0_u64;
        let mut converted = 0_u64;
        let mut contacts = 0_u64;
        for record in &records {
            match record {
                Record::Lead(lead) => {
                    leads += 1;
                    if lead.converted_to.is_some() {
                        converted += 1;
                    }
                }
                Record::Contact(_) => contacts += 1,
            }
        }
        tracing::info!(%owner_id, leads, contacts, converted, "analytics collected");
        Ok(TaskResult::ok("analytics collected").with_data(serde_json::json!({
            "leads": leads,
            "contacts": contacts,
            "converted": converted,
        })))
    }
}
