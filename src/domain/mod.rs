//! Data model layer.
//!
//! ## Files
//! - `model.rs` — compiled graph: world (countries/areas), interned
//!   keywords, flat entity table, lookups, serialization, relative
//!   phone rendering.
//! - `builder.rs` — block-by-block model construction with forward
//!   reference resolution (`parse_block` / `finish_parsing` /
//!   `finalise`).
//!
//! ## Rule of thumb
//! The model is data plus pure queries: no filesystem access, no
//! environment access. Everything that touches the outside world lives
//! in `services/*`.

pub mod builder;
pub mod model;
