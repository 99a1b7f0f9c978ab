pub mod health;
pub mod issuer;
pub mod verifier;
