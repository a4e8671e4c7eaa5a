// Domain models shared by the scheduler, sinks, supervisor and control surface

mod probe;
mod process;
mod stats;
mod target;

pub use probe::ProbeReport;
pub use process::{ManagedRole, RoleStatus};
pub use stats::AggregatedStats;
pub use target::DestinationTarget;
