mod channel;
mod http;

pub use channel::*;
pub use http::*;
