//! Blocking HTTP implementation of [`shelfsync_core::RemoteLibrary`].

mod client;

pub use client::HttpLibrary;
