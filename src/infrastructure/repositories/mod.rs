pub mod in_memory_store;
pub mod sqlite_store;

pub use in_memory_store::{
    InMemoryAssignmentStore, InMemoryBlackoutRepository, InMemoryCalendarTokenStore,
    InMemoryEventRepository, InMemoryOrganizationRepository, InMemoryPersonRepository,
    InMemoryTeamRepository,
};
pub use sqlite_store::SqliteStore;
