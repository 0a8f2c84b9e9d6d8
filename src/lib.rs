//! Harbor, a resolver and packaging tool for coordinate-addressed archives.

#![warn(missing_docs)]

pub mod cli;
