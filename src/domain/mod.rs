pub mod client;
pub mod note;
pub mod session;
pub mod stage;
