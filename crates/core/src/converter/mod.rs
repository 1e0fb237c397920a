//! Converter module for turning source documents into ebooks.
//!
//! This module provides the `Converter` trait, the Calibre `ebook-convert`
//! implementation, a plain copy implementation, and the `ConversionInvoker`
//! that runs a single planned job and classifies its outcome.
//!
//! # Example
//!
//! ```ignore
//! use ebookbatch_core::converter::{build_converter, ConversionInvoker};
//!
//! let converter = build_converter(&run_config);
//! converter.validate().await?;
//!
//! let invoker = ConversionInvoker::new(converter, &run_config);
//! let outcome = invoker.invoke(&job).await;
//! println!("{} in {:?}", outcome.status, outcome.duration);
//! ```

mod config;
mod copy;
mod diagnostic;
mod ebook_convert;
mod error;
mod invoker;
mod locate;
mod traits;

use std::sync::Arc;

use crate::config::RunConfig;

pub use config::ConverterConfig;
pub use copy::CopyConverter;
pub use diagnostic::{headline, truncate_diagnostic, StderrTail, TRUNCATION_MARKER};
pub use ebook_convert::EbookConvert;
pub use error::ConverterError;
pub use invoker::{ConversionInvoker, InvocationOutcome};
pub use locate::{find_in_path, locate_converter, CONVERTER_BINARY};
pub use traits::Converter;

/// The converter a run config asks for.
///
/// Copy mode never touches `ebook-convert`. Otherwise the resolved converter
/// path is used, falling back to the bare binary name so that a missing tool
/// surfaces from `validate()`.
pub fn build_converter(config: &RunConfig) -> Arc<dyn Converter> {
    if config.target.is_copy() {
        return Arc::new(CopyConverter);
    }

    let converter_config = ConverterConfig::from_run_config(config).unwrap_or_default();
    Arc::new(EbookConvert::new(converter_config))
}
