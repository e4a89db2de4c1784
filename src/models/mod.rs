pub mod ban;
pub mod message;
pub mod notification;
pub mod participant;
pub mod reaction;
pub mod room;
pub mod stream;
