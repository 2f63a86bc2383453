pub mod config;
pub mod domain;
pub mod phone;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::customer::{Customer, PhoneRecord};
pub use domain::order::{sort_newest_first, CustomerRef, Order};
pub use domain::session::UserSession;
