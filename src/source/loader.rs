//! CSV loading for the cohort sources

use log::info;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true);
    builder
}

fn collect_records<T: DeserializeOwned, R: Read>(mut csv_reader: csv::Reader<R>) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for result in csv_reader.deserialize::<T>() {
        records.push(result?);
    }
    Ok(records)
}

/// Read all records of a delimited file from any reader
pub fn read_records<T, R>(reader: R, delimiter: u8) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    collect_records(reader_builder(delimiter).from_reader(reader))
}

/// Read all records of a delimited file on disk
pub fn load_records<T: DeserializeOwned>(path: &Path, delimiter: u8) -> Result<Vec<T>> {
    let records: Vec<T> = collect_records(reader_builder(delimiter).from_path(path)?)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
