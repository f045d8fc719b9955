pub mod backend;
pub mod classify;
pub mod constants;
pub mod coordinator;
pub mod decode;
pub mod types;

pub(crate) mod connector;
pub(crate) mod scanner;
