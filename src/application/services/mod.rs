pub mod availability_index;
pub mod calendar_feed;
pub mod org_policy;
pub mod scheduler_engine;
pub mod validation_engine;

pub use availability_index::AvailabilityIndex;
pub use calendar_feed::CalendarFeed;
pub use org_policy::OrgPolicy;
pub use scheduler_engine::{CancelToken, SchedulerEngine, SolverConfig};
pub use validation_engine::ValidationEngine;
