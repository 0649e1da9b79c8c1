pub mod calendar;
pub mod resolver;

pub use calendar::*;
pub use resolver::*;
