//! Bodies of the recurring jobs registered by the scheduler leader.

pub mod model_refresh;

pub use model_refresh::ModelRefreshJob;
