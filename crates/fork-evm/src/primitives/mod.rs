//! The account model and address derivation.

mod account;
pub use account::*;

mod address;
pub use address::*;
