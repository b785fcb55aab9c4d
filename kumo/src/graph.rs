mod constant;
mod context;
mod expr;
mod instance;
mod interface;
mod kind;
mod module;
mod signal;
mod stmt;

pub use constant::*;
pub use context::*;
pub use expr::*;
pub use instance::*;
pub use interface::*;
pub use kind::*;
pub use module::*;
pub use signal::*;
pub use stmt::*;
