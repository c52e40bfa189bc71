//! Built-in repair capabilities. Vendor-specific repairs (game-file
//! verification, runtime reinstalls, anything needing elevation) belong in
//! external collaborators registered through the same [`crate::planner::RepairHandler`]
//! trait.

mod external_tool;
mod restore_backup;

pub use external_tool::ExternalToolHandler;
pub use restore_backup::RestoreBackupHandler;
