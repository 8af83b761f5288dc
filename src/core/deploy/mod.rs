// ─── Deployment ───
// The install/update/uninstall state machine, the family ownership
// table it partitions files with, and the progress-event seam.

mod engine;
mod events;
mod family;

pub use engine::{
    DeploymentEngine, InstallOutcome, InstallRequest, UninstallOutcome, UntrackedFile,
};
pub use events::{DeployEvent, DeployObserver, NoopObserver};
pub use family::ComponentFamily;
