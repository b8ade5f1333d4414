pub mod belts;
pub mod class_levels;
pub mod core;
pub mod evaluations;
pub mod exams;
pub mod school_classes;
pub mod skill_domains;
pub mod students;
pub mod users;
pub mod waitlist;
