//! Contacts and their staff relationships.
//!
//! Contacts carry the identity fields the merge engine substitutes into
//! templates, plus two directed edge lists: `parent_assignments` ("I am
//! staff of …") and `staff_assignments` ("… is staff of me"). An edge with
//! `end_date = None` is active; only active edges participate in mail
//! routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ContactId;

/// Broad classification of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactType {
    /// The person being represented (a legislator, an executive, …).
    Principal,
    /// A staff member of some principal.
    Staff,
    Organization,
}

/// A directed staff edge: `staff` works for `superior`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffAssignment {
    pub staff: ContactId,
    pub superior: ContactId,
    pub created_at: DateTime<Utc>,
    /// `None` while the assignment is active.
    pub end_date: Option<DateTime<Utc>>,
}

impl StaffAssignment {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.end_date.is_none()
    }
}

/// A person or organization record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub contact_type: ContactType,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub district: Option<String>,
    pub party: Option<String>,
    /// Edges where this contact is the staff member.
    pub parent_assignments: Vec<StaffAssignment>,
    /// Edges where this contact has staff.
    pub staff_assignments: Vec<StaffAssignment>,
}

impl Contact {
    /// Create a bare contact with only the required identity fields.
    #[must_use]
    pub fn new(
        contact_type: ContactType,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            id: ContactId::generate(),
            contact_type,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email,
            title: None,
            organization: None,
            district: None,
            party: None,
            parent_assignments: Vec::new(),
            staff_assignments: Vec::new(),
        }
    }

    /// The active parent edge whose superior is this contact's canonical
    /// boss: earliest-created wins when several are active.
    #[must_use]
    pub fn canonical_superior_edge(&self) -> Option<&StaffAssignment> {
        self.parent_assignments
            .iter()
            .filter(|edge| edge.is_active())
            .min_by_key(|edge| edge.created_at)
    }

    /// Active staff edges, in creation order.
    #[must_use]
    pub fn active_staff_edges(&self) -> Vec<&StaffAssignment> {
        let mut edges: Vec<_> = self
            .staff_assignments
            .iter()
            .filter(|edge| edge.is_active())
            .collect();
        edges.sort_by_key(|edge| edge.created_at);
        edges
    }
}

/// A contact joined with the neighbors mail routing needs: the canonical
/// superior (if any) and the active staff members, resolved to full contact
/// records by the store.
#[derive(Debug, Clone)]
pub struct ContactEdges {
    pub contact: Contact,
    pub superior: Option<Contact>,
    pub staff: Vec<Contact>,
}
