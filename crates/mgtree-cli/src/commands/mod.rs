pub mod build;
pub mod export;
pub mod role_assignments;
pub mod show;
