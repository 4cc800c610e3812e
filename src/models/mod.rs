pub mod gate;
pub mod session;
pub mod user;
pub mod verification;
