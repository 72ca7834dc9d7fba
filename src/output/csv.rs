//! CSV product writer

use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, OutputWriter, ProductsWriter};
use crate::record::CSV_FIELDS;
use crate::ProductRecord;

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// UTF-8 CSV writer with a fixed header row.
///
/// The header is written on creation, so a run with no products still
/// produces a valid file.
pub struct CsvProductsWriter {
    writer: Writer<BufWriter<File>>,
    path: PathBuf,
    products_written: u64,
}

impl CsvProductsWriter {
    /// Create the file at `path`, creating parent directories as needed.
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Same as [`CsvProductsWriter::new`] with a custom write buffer.
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {}", e)))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {}", e)))?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(buffer_size, file));
        writer
            .write_record(CSV_FIELDS)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {}", e)))?;
        debug!(columns = CSV_FIELDS.len(), "CSV header written");

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            products_written: 0,
        })
    }

    /// Number of rows written so far, excluding the header.
    pub fn products_written(&self) -> u64 {
        self.products_written
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProductsWriter for CsvProductsWriter {
    fn write_product(&mut self, product: &ProductRecord) -> OutputResult<()> {
        self.writer
            .serialize(product)
            .map_err(|e| OutputError::CsvError(format!("Failed to write product: {}", e)))?;

        self.products_written += 1;
        if self.products_written % 10_000 == 0 {
            self.flush()?;
            debug!("Progress: {} products written", self.products_written);
        }
        Ok(())
    }
}

impl OutputWriter for CsvProductsWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self.writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get inner writer: {}", e))
        })?;
        let file = buf_writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get file handle: {}", e))
        })?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;

        info!(
            "Saved {} products to {}",
            self.products_written,
            self.path.display()
        );
        Ok(())
    }
}
