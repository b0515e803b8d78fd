//! Native client for in-process calls

mod client;

pub use client::NativeClient;
