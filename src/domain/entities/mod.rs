pub mod assignment;
pub mod blackout;
pub mod calendar_token;
pub mod event;
pub mod ids;
pub mod organization;
pub mod person;
pub mod solution;
pub mod team;

pub use assignment::Assignment;
pub use blackout::Blackout;
pub use calendar_token::{CalendarToken, TokenResolution};
pub use event::{Event, RoleDemand};
pub use ids::{AssignmentId, BlackoutId, EventId, OrgId, PersonId, SolutionId, TeamId};
pub use organization::Organization;
pub use person::Person;
pub use solution::{Solution, SolutionMetrics};
pub use team::Team;
