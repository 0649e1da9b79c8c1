pub mod aggregate;
pub mod booking;
pub mod context;
pub mod events;
pub mod lifecycle;
pub mod store;

pub use aggregate::*;
pub use booking::*;
pub use context::*;
pub use events::*;
pub use lifecycle::*;
pub use store::*;
