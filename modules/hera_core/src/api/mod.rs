//! API layer - in-process clients

pub mod native;
