//! Recipient resolution: delivery mode, concrete destinations, merge context.
//!
//! Resolution is pure: it reads a recipient row, the contact's routing
//! neighborhood ([`ContactEdges`]), and the run's suppression snapshot, and
//! decides where mail physically goes and which contact fills the merge
//! context. The staff-of-staff guard is enforced upstream at recipient-add
//! time, not here.

use std::collections::HashSet;

use cadence_store::{ContactEdges, ContactId, DeliveryMode, Recipient, normalize_email};

use crate::{merge::MergeContext, suppression::SuppressionSnapshot};

/// The routing decision for one recipient.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub mode: DeliveryMode,
    /// Lowercased destination addresses; empty means "no deliverable
    /// target" and must be treated as a terminal skip by the caller.
    pub destinations: Vec<String>,
    /// Set when staff outreach fell back to the represented contact.
    pub is_fallback: bool,
    /// The contact actually behind each destination address, for the
    /// per-person communication audit rows.
    pub reached: Vec<(ContactId, String)>,
    pub context: MergeContext,
}

/// Resolve one recipient against its contact's routing neighborhood.
///
/// Direct mode routes to the frozen recipient address and is *not*
/// suppression-filtered here — the executor checks the snapshot so it can
/// record the skip distinctly. Staff-outreach destinations are deduplicated
/// and suppression-filtered as part of resolution, because the fallback
/// decision depends on what survives the filter.
#[must_use]
pub fn resolve(
    recipient: &Recipient,
    edges: &ContactEdges,
    suppression: &SuppressionSnapshot,
) -> Resolution {
    if !recipient.email_staff {
        let address = normalize_email(&recipient.email);
        return Resolution {
            mode: DeliveryMode::Direct,
            destinations: vec![address.clone()],
            is_fallback: false,
            reached: vec![(edges.contact.id.clone(), address)],
            context: MergeContext::Direct {
                contact: edges.contact.clone(),
                superior: edges.superior.clone(),
            },
        };
    }

    // Staff outreach: the represented contact fills both merge field sets.
    let context = MergeContext::StaffOutreach {
        represented: edges.contact.clone(),
    };

    let mut seen = HashSet::new();
    let mut destinations = Vec::new();
    let mut reached = Vec::new();
    for staff in &edges.staff {
        let Some(email) = &staff.email else { continue };
        let address = normalize_email(email);
        if suppression.is_suppressed(&address) || !seen.insert(address.clone()) {
            continue;
        }
        reached.push((staff.id.clone(), address.clone()));
        destinations.push(address);
    }

    if !destinations.is_empty() {
        return Resolution {
            mode: DeliveryMode::StaffOutreach,
            destinations,
            is_fallback: false,
            reached,
            context,
        };
    }

    // No reachable staff: fall back to the represented contact's own address.
    if let Some(email) = &edges.contact.email {
        let address = normalize_email(email);
        if !suppression.is_suppressed(&address) {
            return Resolution {
                mode: DeliveryMode::StaffOutreach,
                destinations: vec![address.clone()],
                is_fallback: true,
                reached: vec![(edges.contact.id.clone(), address)],
                context,
            };
        }
    }

    Resolution {
        mode: DeliveryMode::StaffOutreach,
        destinations: Vec::new(),
        is_fallback: false,
        reached: Vec::new(),
        context,
    }
}
