//! SQL front end: parsing through `sqlparser`, the lowered AST and its renderer

pub mod ast;
pub mod error;
pub mod parser;
pub mod render;
mod tokens;

pub use ast::*;
pub use error::{ParseError, ParseErrorKind};
pub use parser::parse;
pub use render::render;
