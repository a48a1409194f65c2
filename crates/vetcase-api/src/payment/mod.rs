pub mod gateway;
pub mod routes;

pub use routes::routes;
