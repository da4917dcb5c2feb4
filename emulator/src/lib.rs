pub mod constants;
pub mod loader;
pub mod runtime;

pub use self::loader::{load_program, parse_program};
pub use self::runtime::Computer;
