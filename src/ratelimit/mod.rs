//! Per-client sliding-window rate limiting.

mod clock;
mod key;
mod limiter;
mod policy;
mod rules;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::ClientKey;
pub use limiter::RateLimiter;
pub use policy::{GuardedOperation, RatePolicy};
pub use rules::{AdmissionScope, RateLimitConfig, RateLimitRule, RatePolicies, TimeUnit};
pub use window::{Decision, SlidingWindow};
