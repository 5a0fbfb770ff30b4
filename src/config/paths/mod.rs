//! Well-known configuration locations.

pub mod xdg_root;
