pub mod ext;
pub mod stack;
pub mod status_code;
pub mod types;

// Publicly re-export all error types from the submodules to simplify access
// from external code.
pub use ext::*;
pub use stack::*;
pub use status_code::*;
pub use types::*;
