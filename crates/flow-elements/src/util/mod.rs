//! Utility elements: pure data transforms and generated values

mod merger;
mod random_generator;
mod selector;
mod time_block;

pub use merger::{merge, MergerElement};
pub use random_generator::{RandomGeneratorElement, RandomSpec};
pub use selector::{select, SelectorElement, SelectorKey};
pub use time_block::{parse_timezone, strftime_pattern, TimeElement};
