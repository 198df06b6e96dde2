pub mod ids;
pub mod time;

pub use ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use time::{Clock, LatencyTimer, SteppingClock, SystemClock};
