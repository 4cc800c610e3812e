pub mod auth;
pub mod directory_service;
pub mod identity;
pub mod jwt;
pub mod moderation_service;
pub mod verification_service;
