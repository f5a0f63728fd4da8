//! Reader entry points for a host application.
//!
//! [`detect`] answers "can this crate read this source?" and hands back
//! [`read`], which turns a slide into a multiscale layer of lazy arrays.

mod gate;
mod pyramid;

pub use gate::{
    detect, detect_with, has_accepted_suffix, ReaderFn, Source, ACCEPTED_SUFFIXES, OME_TERMINATOR,
};
pub use pyramid::{assemble, read, read_with_options, LayerData, LayerMeta, ReaderOptions};
