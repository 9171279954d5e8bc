pub mod best_result;
pub mod running_average;


// 재수출
pub use best_result::{BestResultTracker, ResultSnapshot};
pub use running_average::{relative_change, RunningAverageEstimator};
