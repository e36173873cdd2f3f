//! The write pipeline (§4.1-§4.3): [`framed::FramedOutputStream`] is the raw byte pipe for
//! one physical file; [`column::ColumnStream`] pairs it with its [`crate::mark::MarkLog`].

pub mod column;
pub mod framed;
