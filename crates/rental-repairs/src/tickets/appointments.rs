use chrono::{DateTime, Utc};

use super::audit::AppointmentView;
use super::domain::{Appointment, AppointmentId, AppointmentStatus, CompanyId, Ticket, TicketId};
use super::error::{EntityKind, TicketError};
use super::repository::{DamageStore, RepositoryError};

/// Repair-visit scheduling. The newest appointment of a ticket is authoritative.
pub struct AppointmentWorkflow<'a> {
    store: &'a dyn DamageStore,
}

impl<'a> AppointmentWorkflow<'a> {
    pub fn new(store: &'a dyn DamageStore) -> Self {
        Self { store }
    }

    pub fn next_appointment(&self, ticket: &TicketId) -> Result<Option<Appointment>, RepositoryError> {
        Ok(latest(self.store.appointments(ticket)?))
    }

    /// A proposal while another appointment exists counts as a reschedule.
    pub fn schedule(
        &self,
        ticket: &Ticket,
        company: &CompanyId,
        scheduled_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(Appointment, AppointmentView), TicketError> {
        if scheduled_time <= now {
            return Err(TicketError::validation("appointment must be in the future"));
        }

        let count = self.store.appointments(&ticket.id)?.len() + 1;
        let appointment = Appointment {
            id: AppointmentId::generate(),
            ticket_id: ticket.id.clone(),
            company_id: company.clone(),
            scheduled_time,
            status: AppointmentStatus::Proposed,
            created_at: now,
        };
        let view = AppointmentView {
            scheduled_at: scheduled_time,
            rescheduled: count > 1,
        };
        Ok((appointment, view))
    }

    /// Confirms or rejects the authoritative appointment.
    pub fn respond(
        &self,
        ticket: &Ticket,
        status: AppointmentStatus,
    ) -> Result<(Appointment, AppointmentView), TicketError> {
        let appointments = self.store.appointments(&ticket.id)?;
        let appointment = latest(appointments)
            .ok_or_else(|| TicketError::not_found(EntityKind::Appointment, &ticket.id))?;
        let view = AppointmentView {
            scheduled_at: appointment.scheduled_time,
            rescheduled: false,
        };
        Ok((
            Appointment {
                status,
                ..appointment
            },
            view,
        ))
    }
}

fn latest(appointments: Vec<Appointment>) -> Option<Appointment> {
    appointments
        .into_iter()
        .max_by(|left, right| left.created_at.cmp(&right.created_at))
}
