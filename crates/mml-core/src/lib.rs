pub mod diagnostic;
pub mod error;
pub mod types;

pub use diagnostic::Diagnostic;
pub use error::MmlError;
pub use types::*;
