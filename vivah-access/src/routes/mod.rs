pub mod health;
pub mod interests;
pub mod messages;
pub mod photos;
pub mod privacy;
