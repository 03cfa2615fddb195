//! Stream combinators for position subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
