pub mod object_commit;
pub mod turn_processor;
