mod health;
mod proxy;

pub use health::health_check;
pub use proxy::forward;
