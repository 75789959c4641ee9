//! Tencent COS object storage backend.
//!
//! Request signing and the HTTP plumbing live here so no vendor SDK is needed.

pub mod client;
pub mod objects;
pub mod provider;
pub mod request;
pub mod signer;

pub use provider::CosStorage;
