pub mod filter;
pub mod gateway;
pub mod interact;
pub mod remote;
pub mod store;
