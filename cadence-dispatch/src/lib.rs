pub mod engine;
pub mod error;
pub mod executor;
pub mod merge;
pub mod reconciler;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod suppression;
pub mod transport;

pub use engine::{Engine, TriggerSummary};
pub use error::{DispatchError, ValidationError};
pub use executor::{DispatchExecutor, ExecutorConfig, RunSummary};
pub use merge::{MergeContext, MergeValues, render};
pub use reconciler::{EventReconciler, Ingestion, ProviderEvent, map_event_type};
pub use resolver::{Resolution, resolve};
pub use retry::RetryPolicy;
pub use scheduler::{DripScheduler, SchedulerSummary};
pub use suppression::SuppressionSnapshot;
pub use transport::{MailOutline, MockTransport, Transport, TransportError};
