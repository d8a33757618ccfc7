pub mod publisher;

pub use publisher::{Notifier, RabbitNotifier};
