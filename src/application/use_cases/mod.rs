pub mod build_index;
pub mod calendar_ops;
pub mod list_assignments;
pub mod manual_assignment;
pub mod solve;
pub mod validate_event;

pub use build_index::BuildIndex;
pub use calendar_ops::CalendarOps;
pub use list_assignments::ListAssignments;
pub use manual_assignment::{AssignmentResult, ManualAssignmentService};
pub use solve::Solve;
pub use validate_event::ValidateEvent;
