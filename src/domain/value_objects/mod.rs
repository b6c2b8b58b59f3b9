pub mod blocked_reason;
pub mod change_event;
pub mod health_score;
pub mod warning_kind;

pub use blocked_reason::BlockedReason;
pub use change_event::{ChangeEvent, ChangeKind};
pub use health_score::HealthScore;
pub use warning_kind::WarningKind;
