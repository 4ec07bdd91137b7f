mod backend;
mod client;
mod error;

pub use backend::{HttpBackend, HttpRequest, HttpResponse, Method, NetworkFault, ReqwestBackend};
pub use client::{Credentials, PostMode, PostOutcome, RetryPolicy, TokenPair, Transport};
pub use error::{Error, Result};
