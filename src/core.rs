pub mod buffer;
pub mod cache;
pub mod category;
pub mod display;
pub mod events;
pub mod machine;
pub mod query;
pub mod record;
pub mod supervisor;
pub mod templates;
