use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::BoxBoxError;

/// Write a rendered figure into `dir`, creating the directory when needed
pub fn write_figure(dir: &Path, file_name: &str, svg: &str) -> Result<PathBuf, BoxBoxError> {
    fs::create_dir_all(dir).map_err(|e| BoxBoxError::WriterError { source: e })?;
    let path = dir.join(file_name);
    let figure_file = File::create(&path).map_err(|e| BoxBoxError::WriterError { source: e })?;
    let mut figure_writer = BufWriter::new(figure_file);
    figure_writer
        .write_all(svg.as_bytes())
        .map_err(|e| BoxBoxError::WriterError { source: e })?;
    figure_writer
        .flush()
        .map_err(|e| BoxBoxError::WriterError { source: e })?;
    Ok(path)
}
