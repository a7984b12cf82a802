mod money;

pub mod op;
mod secret;

pub use money::{Paise, INR_CURRENCY_CODE};
pub use secret::Secret;
