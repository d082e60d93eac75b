use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use csv::Writer;
use log::trace;

use crate::context::Context;
use crate::error::SirLaborError;
use crate::{define_data_plugin, HashMap};

// * file_prefix: precedes the report name in the filename. An example of a
// potential prefix might be scenario or simulation name
// * directory: location that the CSVs are written to. An example of this might
// be /data/
// * overwrite: if true, will overwrite existing files in the same location
pub struct ConfigReportOptions {
    pub file_prefix: String,
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl ConfigReportOptions {
    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        trace!("new ConfigReportOptions");
        // Sets the defaults
        ConfigReportOptions {
            file_prefix: String::new(),
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }
    /// Sets the file prefix option (e.g., "historical_")
    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ConfigReportOptions {
        self.file_prefix = file_prefix;
        self
    }
    /// Sets the directory where reports will be output
    pub fn directory(&mut self, directory: PathBuf) -> &mut ConfigReportOptions {
        self.directory = directory;
        self
    }
    /// Sets whether to overwrite existing reports of the same name if they exist
    pub fn overwrite(&mut self, overwrite: bool) -> &mut ConfigReportOptions {
        self.overwrite = overwrite;
        self
    }
}

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>);
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(&self, writer: &mut csv::Writer<std::fs::File>) {
                writer.serialize(self).unwrap();
            }
        }
    };
}
pub use define_report;

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
    config: ConfigReportOptions,
}

// Registers a data container that stores
// * file_writers: Maps report type to file writer
// * config: Contains all the customizable filename options that the user supplies
define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::default()),
        config: ConfigReportOptions::new(),
    }
);

pub trait ContextReportExt {
    /// Add a report file keyed by a `TypeId`.
    /// The `short_name` is used for file naming to distinguish what data each
    /// output file points to.
    ///
    /// # Errors
    /// If the file already exists and `overwrite` is set to false, raises an error and info message.
    /// If the file cannot be created, raises an error.
    fn add_report<T: Report + 'static>(&mut self, short_name: &str) -> Result<(), SirLaborError>;

    /// Write a new row to the appropriate report file
    fn send_report<T: Report>(&self, report: T);

    /// Returns a `ConfigReportOptions` object which has setter methods for report configuration
    fn report_options(&mut self) -> &mut ConfigReportOptions;

    /// Flushes every open report writer.
    ///
    /// # Errors
    /// Returns an error if a writer fails to flush.
    fn flush_reports(&self) -> Result<(), SirLaborError>;
}

impl ContextReportExt for Context {
    fn add_report<T: Report + 'static>(&mut self, short_name: &str) -> Result<(), SirLaborError> {
        trace!("adding report {short_name}");
        let data_container = self.get_data_mut(ReportPlugin);

        let directory = &data_container.config.directory;
        create_dir_all(directory)?;
        let path = directory.join(format!(
            "{}{}.csv",
            data_container.config.file_prefix, short_name
        ));

        if path.exists() && !data_container.config.overwrite {
            return Err(SirLaborError::ReportError(format!(
                "{} already exists; set overwrite to replace it",
                path.display()
            )));
        }
        let file = File::create(&path)?;

        let writer = Writer::from_writer(file);
        let mut file_writer = data_container.file_writers.borrow_mut();
        file_writer.insert(TypeId::of::<T>(), writer);
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) {
        let data_container = self.get_data(ReportPlugin);
        let mut writer_cell = data_container.file_writers.try_borrow_mut().unwrap();
        let writer = writer_cell
            .get_mut(&report.type_id())
            .expect("No writer found for the report type");
        report.serialize(writer);
    }

    fn report_options(&mut self) -> &mut ConfigReportOptions {
        let data_container = self.get_data_mut(ReportPlugin);
        &mut data_container.config
    }

    fn flush_reports(&self) -> Result<(), SirLaborError> {
        if let Some(data_container) = self.try_get_data(ReportPlugin) {
            for writer in data_container.file_writers.borrow_mut().values_mut() {
                writer.flush()?;
            }
        }
        Ok(())
    }
}
