pub mod backup;
pub mod bulk;
pub mod detector;
pub mod lifecycle;

pub use backup::{BackupReport, BackupStore, RestoreReport};
pub use bulk::{BulkActionError, BulkResult, ImportResult, RescanResult};
pub use detector::{ModCandidate, ModDetector, PayloadSpec};
pub use lifecycle::{ModLifecycleManager, DEFAULT_BACKUP_DIR};
