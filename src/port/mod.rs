pub mod notification;
pub mod storage;
