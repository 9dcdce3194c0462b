pub mod message;
pub mod response;
