//! Outbound side: the remote content source and its error classification.

mod client;
mod error;
mod request;

pub use client::{HttpRemote, RemoteSource};
pub use error::{ErrorKind, RemoteError};
pub use request::FetchRequest;

pub(crate) use request::normalize;
