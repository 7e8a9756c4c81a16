//! Filesystem coordination substrate: workspace layout, advisory locking,
//! record persistence, and tree utilities.

pub mod layout;
pub mod lock;
pub mod record;
pub mod util;

pub use layout::Workspace;
pub use lock::{LockSettings, RecordLock};
pub use record::{peek_result, JobRecord};
pub use util::{archive_with_suffix, copy_tree, dir_size_kb, free_disk_mb, parse_size_kb};
