pub mod audit;
pub mod event;
pub mod job;
pub mod operator;
pub mod scan;
pub mod status;

pub use audit::*;
pub use event::*;
pub use job::*;
pub use operator::*;
pub use scan::*;
pub use status::*;
