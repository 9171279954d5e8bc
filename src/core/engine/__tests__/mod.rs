pub mod inner_optimizer_test;
pub mod schedule_test;
