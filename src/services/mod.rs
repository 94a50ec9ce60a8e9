pub mod verifier;
pub mod whitelist;
