pub mod create;
pub mod delete;
pub mod target;
pub mod verify;
pub mod version;

pub use create::Create;
pub use delete::Delete;
pub use verify::Verify;
pub use version::Version;
