pub mod low_rank_model_test;
