pub mod id;
pub mod render;
pub mod snowflake;

pub use render::format_message;
pub use snowflake::SequenceGenerator;
