pub mod ics_generator;

pub use ics_generator::{CalendarEntry, IcsGenerator};
