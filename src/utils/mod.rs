pub mod cache;
pub mod clock;
pub mod crypto;
pub mod liveness;
pub mod middleware;
pub mod validation;
