//! Text ↔ [`ir::ParsedCommand`]: lexing, parsing and canonical generation.

pub mod generate;
pub mod ir;
pub mod lexer;
pub mod parser;
