//! Filename synthesis and collision resolution.

mod resolver;
mod template;

pub use resolver::ReservationRegistry;
pub use template::{sanitize_stem, NameSynthesizer, UNTITLED};
