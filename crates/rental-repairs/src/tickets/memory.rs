use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Appointment, AuditLogEntry, Defect, Offer, OfferId, OfferRequest, PushNotificationRecord,
    Ticket, TicketId, UserId,
};
use super::repository::{DamageStore, RepositoryError};
use super::roles::Role;
use super::status::DamageStatus;

#[derive(Debug, Default)]
struct MemoryState {
    tickets: HashMap<TicketId, Ticket>,
    log: Vec<AuditLogEntry>,
    offers: Vec<Offer>,
    offer_requests: Vec<OfferRequest>,
    appointments: Vec<Appointment>,
    defects: Vec<Defect>,
    pushes: Vec<PushNotificationRecord>,
}

/// Process-local store. A single mutex makes compare-and-swap atomic.
#[derive(Debug, Default, Clone)]
pub struct MemoryDamageStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDamageStore {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn push_records(&self) -> Vec<PushNotificationRecord> {
        self.lock()
            .map(|state| state.pushes.clone())
            .unwrap_or_default()
    }

    pub fn ticket_count(&self) -> usize {
        self.lock()
            .map(|state| state.tickets.len())
            .unwrap_or_default()
    }
}

impl DamageStore for MemoryDamageStore {
    fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket, RepositoryError> {
        let mut state = self.lock()?;
        if state.tickets.contains_key(&ticket.id) {
            return Err(RepositoryError::Conflict);
        }
        state.tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    fn fetch_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, RepositoryError> {
        Ok(self.lock()?.tickets.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        expected: DamageStatus,
        mut ticket: Ticket,
    ) -> Result<Ticket, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .tickets
            .get_mut(&ticket.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::StaleStatus {
                expected,
                actual: stored.status,
            });
        }
        if ticket.company_assigned_by.is_none() && stored.company_assigned_by.is_some() {
            ticket.company_assigned_by = stored.company_assigned_by.clone();
            ticket.company_assigned_by_role = stored.company_assigned_by_role;
        }
        *stored = ticket.clone();
        Ok(ticket)
    }

    fn backfill_company_assigner(
        &self,
        id: &TicketId,
        user: &UserId,
        role: Role,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let ticket = state.tickets.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if ticket.company_assigned_by.is_none() {
            ticket.company_assigned_by = Some(user.clone());
            ticket.company_assigned_by_role = Some(role);
        }
        Ok(())
    }

    fn mark_read(&self, id: &TicketId, user: &UserId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let ticket = state.tickets.get_mut(id).ok_or(RepositoryError::NotFound)?;
        ticket.read_by.insert(user.clone());
        Ok(())
    }

    fn append_log(&self, entry: AuditLogEntry) -> Result<(), RepositoryError> {
        self.lock()?.log.push(entry);
        Ok(())
    }

    fn log_entries(&self, ticket: &TicketId) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        Ok(self
            .lock()?
            .log
            .iter()
            .filter(|entry| &entry.ticket_id == ticket)
            .cloned()
            .collect())
    }

    fn save_offer(&self, offer: Offer) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.offers.iter_mut().find(|stored| stored.id == offer.id) {
            Some(stored) => *stored = offer,
            None => state.offers.push(offer),
        }
        Ok(())
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        Ok(self
            .lock()?
            .offers
            .iter()
            .find(|offer| &offer.id == id)
            .cloned())
    }

    fn offers(&self, ticket: &TicketId) -> Result<Vec<Offer>, RepositoryError> {
        Ok(self
            .lock()?
            .offers
            .iter()
            .filter(|offer| &offer.ticket_id == ticket && !offer.deleted)
            .cloned()
            .collect())
    }

    fn upsert_offer_request(&self, request: OfferRequest) -> Result<OfferRequest, RepositoryError> {
        let mut state = self.lock()?;
        let existing = state.offer_requests.iter_mut().find(|stored| {
            stored.ticket_id == request.ticket_id && stored.company_id == request.company_id
        });
        match existing {
            Some(stored) => {
                let id = stored.id.clone();
                *stored = OfferRequest { id, ..request };
                Ok(stored.clone())
            }
            None => {
                state.offer_requests.push(request.clone());
                Ok(request)
            }
        }
    }

    fn offer_requests(&self, ticket: &TicketId) -> Result<Vec<OfferRequest>, RepositoryError> {
        Ok(self
            .lock()?
            .offer_requests
            .iter()
            .filter(|request| &request.ticket_id == ticket)
            .cloned()
            .collect())
    }

    fn save_appointment(&self, appointment: Appointment) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state
            .appointments
            .iter_mut()
            .find(|stored| stored.id == appointment.id)
        {
            Some(stored) => *stored = appointment,
            None => state.appointments.push(appointment),
        }
        Ok(())
    }

    fn appointments(&self, ticket: &TicketId) -> Result<Vec<Appointment>, RepositoryError> {
        Ok(self
            .lock()?
            .appointments
            .iter()
            .filter(|appointment| &appointment.ticket_id == ticket)
            .cloned()
            .collect())
    }

    fn insert_defect(&self, defect: Defect) -> Result<(), RepositoryError> {
        self.lock()?.defects.push(defect);
        Ok(())
    }

    fn defects(&self, ticket: &TicketId) -> Result<Vec<Defect>, RepositoryError> {
        Ok(self
            .lock()?
            .defects
            .iter()
            .filter(|defect| &defect.ticket_id == ticket)
            .cloned()
            .collect())
    }

    fn record_push(&self, record: PushNotificationRecord) -> Result<(), RepositoryError> {
        self.lock()?.pushes.push(record);
        Ok(())
    }
}
