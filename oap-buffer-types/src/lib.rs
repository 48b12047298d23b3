//! # OAP Buffer Types
//!
//! This crate defines the traits and types shared by the OAP disk buffer, but does not provide any implementation.
//!
//! The buffer itself never interprets a record: a [`Codec`] turns records into opaque bytes on the way in,
//! and back into records on the way out, where they are handed to a [`RecordCallback`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

mod callback;
mod codec;
mod error;
mod key;
mod state;

pub use callback::*;
pub use codec::*;
pub use error::*;
pub use key::*;
pub use state::*;
