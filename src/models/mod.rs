pub mod alert;
pub mod dependency;
pub mod event;
pub mod evidence;
pub mod job;
pub mod material;
pub mod task;

pub use alert::*;
pub use dependency::*;
pub use event::*;
pub use evidence::*;
pub use job::*;
pub use material::*;
pub use task::*;
