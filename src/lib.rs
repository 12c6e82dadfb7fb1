//! oe_retrieval — bounded Gauss-Newton and Optimal-Estimation retrievals.
//!
//! Purpose
//! -------
//! Serve as the crate root for the non-linear inversion engine used to
//! retrieve total column water vapour (and nuisance state variables) from
//! satellite reflectances. Everything numerical lives in [`inversion`].
//!
//! Key behaviors
//! -------------
//! - Re-export the [`inversion`] module as the public crate surface.
//! - Stay free of I/O: satellite product readers, flag decoding, lookup-table
//!   construction, and output writers are collaborators of this crate, not
//!   part of it.
//!
//! Conventions
//! -----------
//! - Logging goes through `tracing`; the crate never installs a subscriber.
//! - The optional `serde` feature derives `Serialize` / `Deserialize` on the
//!   configuration types.
//!
//! Downstream usage
//! ----------------
//! - Implement [`inversion::ForwardModel`] (a closure works) for the
//!   forward simulator, build an [`inversion::Inverter`] per setup, and call
//!   it per pixel.

pub mod inversion;
