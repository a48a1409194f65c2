pub mod extract;
pub mod jwt;

pub use extract::{AuthUser, StaffUser};
