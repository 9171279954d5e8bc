pub mod assembly_test;
