//! Error handling foundation for washline.
//!
//! Only the `Result` alias lives here. Each crate defines its own error
//! enums next to the code that raises them and reports them through
//! rootcause's `Report`.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
