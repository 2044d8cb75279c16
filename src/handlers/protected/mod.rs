pub mod logout;
pub mod scheduler;

pub use logout::logout;
pub use scheduler::scheduler_status;
