pub mod context;
pub mod gate;
pub mod gateway;
pub mod signature;
pub mod sweeper;

pub use context::*;
pub use gate::*;
pub use gateway::*;
pub use sweeper::*;
