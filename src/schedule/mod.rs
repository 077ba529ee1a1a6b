pub mod recurrence;
pub mod window;

pub use recurrence::{generate, SessionDate};
pub use window::{DatePolicy, DayOfWeek, WeeklyWindow, WindowSpec};
