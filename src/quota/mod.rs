pub mod clock;
pub mod ledger;
pub mod notifier;
pub mod scheduler;
pub mod store;
pub mod sync_jobs;
pub mod types;
pub mod youtube;

pub use clock::{Clock, SystemClock};
pub use ledger::QuotaLedger;
pub use notifier::{LogNotifier, Notification, Notifier, PgNotifier, Severity};
pub use scheduler::QuotaResetScheduler;
pub use store::{PgQuotaStore, QuotaStore};
pub use sync_jobs::{PgSyncJobControl, SyncJobControl, SyncPause};
pub use types::*;
pub use youtube::Endpoint;
