//! Built-in binding handlers.

mod element;
mod property;
mod tuple;

pub use element::*;
pub use property::*;
pub use tuple::*;
