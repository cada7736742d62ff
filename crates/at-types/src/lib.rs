pub mod errors;
pub mod executor;
pub mod space;
pub mod trial;

pub use errors::*;
pub use executor::*;
pub use space::*;
pub use trial::*;
