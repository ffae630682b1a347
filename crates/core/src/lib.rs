//! Joy core: the value model shared by the evaluator and the C backend.
//!
//! Key design principles:
//! - Value: the tagged union the language talks about (Int, List, Quotation, ...)
//! - Every slot owns its payload; `Clone` is a deep copy by construction
//! - LIST and QUOTATION share one representation; only the tag differs

pub mod error;
pub mod stack;
pub mod value;

pub use error::JoyError;
pub use stack::Stack;
pub use value::{FileHandle, Value};
