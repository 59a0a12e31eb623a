pub mod resolver;
pub mod rounding;
pub mod source;

pub use resolver::RateResolver;
pub use rounding::round_half_up;
pub use source::{HttpRateSource, RateConfig, RateSource, RateTable};
