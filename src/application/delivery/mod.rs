pub mod dispatcher;
pub mod retry;
pub mod service;
pub mod signer;
pub mod sweeper;
