pub mod audit;
pub mod interests;
pub mod messaging;
pub mod photos;
pub mod rate_limiter;
pub mod visibility;
