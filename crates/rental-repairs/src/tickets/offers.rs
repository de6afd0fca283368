use chrono::{DateTime, Duration, Utc};

use super::documents::ImageDescriptor;
use super::domain::{
    CompanyId, Offer, OfferId, OfferRequest, OfferRequestStatus, OfferSubmission, Ticket, TicketId,
};
use super::error::{EntityKind, TicketError};
use super::repository::{DamageStore, RepositoryError};

/// Writes an offer transition produces; persisted after the ticket commits.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferChanges {
    /// The offer the event is about, in its new state.
    pub offer: Offer,
    /// Every offer to save, `offer` included.
    pub offers: Vec<Offer>,
    pub requests: Vec<OfferRequest>,
}

/// Offer submission and decisions, read against the current store state.
pub struct OfferWorkflow<'a> {
    store: &'a dyn DamageStore,
}

impl<'a> OfferWorkflow<'a> {
    pub fn new(store: &'a dyn DamageStore) -> Self {
        Self { store }
    }

    /// New active offer; an earlier active offer of the same company is retired.
    pub fn submit(
        &self,
        ticket: &Ticket,
        company: &CompanyId,
        submission: &OfferSubmission,
        attachment: Option<ImageDescriptor>,
        now: DateTime<Utc>,
    ) -> Result<OfferChanges, TicketError> {
        if submission.amount_cents == 0 {
            return Err(TicketError::validation("offer amount must be positive"));
        }

        let offer = Offer {
            id: OfferId::generate(),
            ticket_id: ticket.id.clone(),
            company_id: company.clone(),
            amount_cents: submission.amount_cents,
            attachment,
            accepted_date: None,
            active: true,
            deleted: false,
            created_at: now,
        };

        let mut offers: Vec<Offer> = self
            .store
            .offers(&ticket.id)?
            .into_iter()
            .filter(|existing| &existing.company_id == company && existing.active)
            .map(|existing| Offer {
                active: false,
                ..existing
            })
            .collect();
        offers.push(offer.clone());

        let requests = self
            .store
            .offer_requests(&ticket.id)?
            .into_iter()
            .filter(|request| &request.company_id == company && request.status.is_open())
            .map(|request| OfferRequest {
                status: OfferRequestStatus::Offered,
                ..request
            })
            .collect();

        Ok(OfferChanges {
            offer,
            offers,
            requests,
        })
    }

    /// Accepts an offer: its company becomes preferred and assigned, its
    /// request closes, and any earlier acceptance of another offer is revoked.
    pub fn accept(
        &self,
        ticket: &mut Ticket,
        offer_id: &OfferId,
        now: DateTime<Utc>,
    ) -> Result<OfferChanges, TicketError> {
        let mut offer = self.load(ticket, offer_id)?;
        if !offer.active {
            return Err(TicketError::validation("offer is no longer active"));
        }
        offer.accepted_date = Some(now);

        let mut offers: Vec<Offer> = self
            .store
            .offers(&ticket.id)?
            .into_iter()
            .filter(|other| other.id != offer.id && other.is_accepted())
            .map(|other| Offer {
                accepted_date: None,
                ..other
            })
            .collect();
        offers.push(offer.clone());

        let requests = self
            .store
            .offer_requests(&ticket.id)?
            .into_iter()
            .filter_map(|request| {
                if request.company_id == offer.company_id {
                    Some(OfferRequest {
                        status: OfferRequestStatus::Accepted,
                        ..request
                    })
                } else if request.status == OfferRequestStatus::Accepted {
                    Some(OfferRequest {
                        status: OfferRequestStatus::Expired,
                        ..request
                    })
                } else {
                    None
                }
            })
            .collect();

        ticket.preferred_company = Some(offer.company_id.clone());
        ticket.assigned_company = Some(offer.company_id.clone());

        Ok(OfferChanges {
            offer,
            offers,
            requests,
        })
    }

    /// Rejects an offer. Responsibility returns to the creator and the
    /// company loses any assignment it held.
    pub fn reject(
        &self,
        ticket: &mut Ticket,
        offer_id: &OfferId,
    ) -> Result<OfferChanges, TicketError> {
        let mut offer = self.load(ticket, offer_id)?;
        offer.active = false;
        offer.accepted_date = None;

        let requests = self
            .store
            .offer_requests(&ticket.id)?
            .into_iter()
            .filter(|request| request.company_id == offer.company_id && request.status.is_open())
            .map(|request| OfferRequest {
                status: OfferRequestStatus::Rejected,
                ..request
            })
            .collect();

        ticket.damage_owner = ticket.created_by.clone();
        if ticket.assigned_company.as_ref() == Some(&offer.company_id) {
            ticket.assigned_company = None;
        }
        if ticket.preferred_company.as_ref() == Some(&offer.company_id) {
            ticket.preferred_company = None;
        }

        Ok(OfferChanges {
            offers: vec![offer.clone()],
            offer,
            requests,
        })
    }

    /// Marks unanswered requests older than `ttl` as expired and returns them.
    /// A deadline past the calendar's end never arrives.
    pub fn expire_stale_requests(
        &self,
        ticket: &TicketId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Vec<OfferRequest>, RepositoryError> {
        let stale: Vec<OfferRequest> = self
            .store
            .offer_requests(ticket)?
            .into_iter()
            .filter(|request| {
                request.status == OfferRequestStatus::Requested
                    && request
                        .requested_date
                        .checked_add_signed(ttl)
                        .is_some_and(|deadline| deadline <= now)
            })
            .map(|request| OfferRequest {
                status: OfferRequestStatus::Expired,
                ..request
            })
            .collect();

        for request in &stale {
            self.store.upsert_offer_request(request.clone())?;
        }
        Ok(stale)
    }

    fn load(&self, ticket: &Ticket, offer_id: &OfferId) -> Result<Offer, TicketError> {
        self.store
            .fetch_offer(offer_id)?
            .filter(|offer| offer.ticket_id == ticket.id && !offer.deleted)
            .ok_or_else(|| TicketError::not_found(EntityKind::Offer, offer_id))
    }
}
