use super::domain::{
    Appointment, AuditLogEntry, Defect, Offer, OfferId, OfferRequest, PushNotificationRecord,
    Ticket, TicketId, UserId,
};
use super::roles::Role;
use super::status::DamageStatus;

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored status is {actual}, expected {expected}")]
    StaleStatus {
        expected: DamageStatus,
        actual: DamageStatus,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for tickets and everything hanging off them.
pub trait DamageStore: Send + Sync {
    fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket, RepositoryError>;
    fn fetch_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, RepositoryError>;
    /// Replaces the stored ticket only if its status still equals `expected`.
    /// This check must be atomic with the write.
    ///
    /// A company assigner already stored survives when the incoming ticket
    /// has none. `read_by` is taken from the incoming ticket: a transition
    /// restarts the read set, so reads of the previous status are dropped.
    fn compare_and_swap(
        &self,
        expected: DamageStatus,
        ticket: Ticket,
    ) -> Result<Ticket, RepositoryError>;
    /// Sets the company assigner fields when they are still empty.
    fn backfill_company_assigner(
        &self,
        id: &TicketId,
        user: &UserId,
        role: Role,
    ) -> Result<(), RepositoryError>;
    fn mark_read(&self, id: &TicketId, user: &UserId) -> Result<(), RepositoryError>;

    fn append_log(&self, entry: AuditLogEntry) -> Result<(), RepositoryError>;
    fn log_entries(&self, ticket: &TicketId) -> Result<Vec<AuditLogEntry>, RepositoryError>;

    /// Inserts or replaces an offer by id.
    fn save_offer(&self, offer: Offer) -> Result<(), RepositoryError>;
    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    fn offers(&self, ticket: &TicketId) -> Result<Vec<Offer>, RepositoryError>;

    /// Inserts or replaces the request for the `(ticket, company)` pair.
    fn upsert_offer_request(&self, request: OfferRequest) -> Result<OfferRequest, RepositoryError>;
    fn offer_requests(&self, ticket: &TicketId) -> Result<Vec<OfferRequest>, RepositoryError>;

    /// Inserts or replaces an appointment by id.
    fn save_appointment(&self, appointment: Appointment) -> Result<(), RepositoryError>;
    fn appointments(&self, ticket: &TicketId) -> Result<Vec<Appointment>, RepositoryError>;

    fn insert_defect(&self, defect: Defect) -> Result<(), RepositoryError>;
    fn defects(&self, ticket: &TicketId) -> Result<Vec<Defect>, RepositoryError>;

    fn record_push(&self, record: PushNotificationRecord) -> Result<(), RepositoryError>;
}
