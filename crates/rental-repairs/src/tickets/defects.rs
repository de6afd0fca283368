use chrono::{DateTime, Utc};

use super::documents::{describe_all, DocumentStore};
use super::domain::{Defect, DefectId, DefectReport, Ticket, UserId};
use super::error::TicketError;

pub const DEFECT_TAG: &str = "defect";

pub struct DefectWorkflow<'a> {
    documents: &'a dyn DocumentStore,
    base_url: &'a str,
}

impl<'a> DefectWorkflow<'a> {
    pub fn new(documents: &'a dyn DocumentStore, base_url: &'a str) -> Self {
        Self {
            documents,
            base_url,
        }
    }

    /// Builds the defect and appends its tagged images to the ticket.
    pub fn raise(
        &self,
        ticket: &mut Ticket,
        report: &DefectReport,
        raised_by: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Defect, TicketError> {
        let title = report.title.trim();
        if title.is_empty() {
            return Err(TicketError::validation("defect title is required"));
        }

        let images = describe_all(self.documents, &report.images, self.base_url, Some(DEFECT_TAG));
        ticket.images.extend(images.iter().cloned());

        Ok(Defect {
            id: DefectId::generate(),
            ticket_id: ticket.id.clone(),
            title: title.to_string(),
            description: report.description.trim().to_string(),
            images,
            raised_by: raised_by.clone(),
            created_at: now,
        })
    }
}
