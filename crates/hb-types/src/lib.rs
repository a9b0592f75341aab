pub mod errors;
pub mod results;
pub mod space;

pub use errors::*;
pub use results::*;
pub use space::*;
