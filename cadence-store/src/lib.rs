pub mod backends;
pub mod campaign;
pub mod contact;
pub mod error;
pub mod event;
pub mod recipient;
pub mod sequence;
pub mod suppression;
pub mod r#trait;
pub mod types;

pub use backends::MemoryStore;
pub use campaign::{Campaign, CampaignStatus, CampaignTotals, CampaignType};
pub use contact::{Contact, ContactEdges, ContactType, StaffAssignment};
pub use error::{Result, StoreError, WriteError};
pub use event::{Communication, EmailEvent, EventKind};
pub use recipient::{DeliveryMode, Recipient, SkipReason};
pub use sequence::{EmailTemplate, SequenceStep};
pub use suppression::{EmailSuppression, SuppressionReason, normalize_email};
pub use r#trait::Store;
pub use types::{CampaignId, CommunicationId, ContactId, EventId, RecipientId, TemplateId};
