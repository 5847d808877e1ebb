pub mod job;
pub mod request;
pub mod response;

pub use job::*;
pub use request::*;
pub use response::*;
