pub mod awareness;
pub mod chat;
pub mod complaint;
pub mod emergency;
