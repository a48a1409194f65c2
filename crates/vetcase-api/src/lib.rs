pub mod auth;
pub mod case;
pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod notification;
pub mod payment;
pub mod progress;
pub mod router;
pub mod state;
pub mod subscription;
pub mod tracing;
pub mod validation;

pub use config::ApiConfig;
pub use state::ApiState;
