mod money;
mod secret;

pub mod helpers;

pub use money::{MinorUnits, MinorUnitsConversionError};
pub use secret::Secret;
