pub mod asset;
pub mod historical;
pub mod realtime;
pub mod timestamp;
