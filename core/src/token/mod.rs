mod error;
mod lexer;

pub use error::ParseError;
pub use lexer::{Scanner, Token};
