#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;
extern crate serde;

pub mod backend;
pub mod context;
pub mod lexer;
pub mod parser;
