pub mod click;
pub mod clock;
pub mod midi;
pub mod time;
pub mod voice;

pub use clock::ClockHandle;
pub use time::{AudioTimeSource, SharedTime, SystemTimeSource};
