//! Utility
//!
//! **This module is exempt from the API stability guarantee** unless specified
//! otherwise.
mod clz;
mod int;
pub mod intrusive_list;
mod prio_bitmap;
pub use self::{int::*, prio_bitmap::*};

/// Trait for types having a constant default value.
pub trait Init {
    /// The default value.
    const INIT: Self;
}
