use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::input::InputError;

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, InputError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InputError::MissingInput(path.display().to_string())
        } else {
            InputError::Io(e)
        }
    })?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Picks the field delimiter from the file name, looking through a trailing `.gz`.
pub fn delimiter_for(path: &Path) -> Result<u8, InputError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "csv" => Ok(b','),
        "tsv" | "tab" | "txt" => Ok(b'\t'),
        "xlsx" | "xls" => Err(InputError::InvalidInput(format!(
            "{}: workbooks are not read directly; export the sheet to .csv or .tsv",
            path.display()
        ))),
        _ => Err(InputError::InvalidInput(format!(
            "{}: unsupported table extension (use .csv, .tsv or .txt, optionally .gz)",
            path.display()
        ))),
    }
}

pub fn csv_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>, InputError> {
    let delimiter = delimiter_for(path)?;
    let reader: Box<dyn Read> = open_maybe_gz(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader))
}
