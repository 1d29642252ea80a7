pub mod credentials;
pub mod disk_store;
pub mod entitlement;
pub mod gateway;
pub mod memory_store;
pub mod object_store;
pub mod verifier;
