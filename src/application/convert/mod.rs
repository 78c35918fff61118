//! The conversion pipeline: normalize a raw request, resolve the format
//! pair, negotiate the output kind, dispatch to the typesetting engine, and
//! shape the result (or a tagged error) for the transport layer.
//!
//! Everything here is per-request and stateless; the only shared state is
//! the read-only engine configuration fixed at process start.

mod data_url;
mod mathml;
mod negotiate;
mod request;
mod service;

pub use data_url::{DataUrl, DataUrlError};
pub use negotiate::negotiate;
pub use request::{BodyParams, QueryParams};
pub use service::{Conversion, ConversionBody, ConvertService};
