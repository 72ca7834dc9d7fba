//! Record sinks

use crate::ProductRecord;

pub mod csv;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Sink for transformed product rows.
pub trait ProductsWriter: OutputWriter {
    /// Write a single product
    fn write_product(&mut self, product: &ProductRecord) -> OutputResult<()>;

    /// Write multiple products at once
    fn write_products(&mut self, products: &[ProductRecord]) -> OutputResult<()> {
        for product in products {
            self.write_product(product)?;
        }
        Ok(())
    }
}
