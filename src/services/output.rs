use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Report output sink: a file when `--output` was given, otherwise
/// standard output.
pub fn writer(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    })
}
