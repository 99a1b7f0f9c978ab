pub mod capability;
pub mod credential;
pub mod credential_store;
pub mod did;
pub mod error;
pub mod input_descriptor;
pub mod jwt;
pub mod key;
pub mod matching;
pub mod oid4vci;
pub mod oid4vp;
pub mod presentation_definition;
pub mod presentation_submission;
pub mod signer;
pub mod store;
