// src/file.rs

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;

use crate::config::ExportOptions;
use crate::csv::write_dataset;
use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// Write `ds` to `<out_dir>/<stem>.<ext>` according to `export`.
/// Returns the final path written to.
pub fn export_dataset(export: &ExportOptions, stem: &str, ds: &Dataset) -> Result<PathBuf> {
    let path = export.table_path(stem);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let file = File::create(&path).map_err(|e| Error::io(&path, e))?; // truncate/overwrite
    let mut out = BufWriter::new(file);
    write_dataset(&mut out, ds, export.include_headers, export.format.delim())
        .and_then(|_| out.flush())
        .map_err(|e| Error::io(&path, e))?;

    info!("Wrote {} row(s) x {} column(s) to {}", ds.len(), ds.columns().len(), path.display());
    Ok(path)
}

pub fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::Config(format!("Path exists but is not a directory: {}", dir.display())));
    }
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportFormat;
    use crate::normalize::Normalizer;
    use serde_json::json;

    #[test]
    fn export_creates_directory_and_uses_format_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let export = ExportOptions {
            format: ExportFormat::Tsv,
            out_dir: tmp.path().join("nested").join("out"),
            include_headers: true,
            snapshots: false,
        };
        let ds = Normalizer::houses()
            .normalize_batch(&[json!({"houseId": "H1", "address": "A"})])
            .unwrap();

        let path = export_dataset(&export, "houses", &ds).unwrap();
        assert!(path.ends_with("nested/out/houses.tsv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "key\taddress\nH1\tA\n");
    }

    #[test]
    fn file_in_place_of_directory_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("out");
        fs::write(&blocker, "x").unwrap();
        assert!(matches!(ensure_directory(&blocker), Err(Error::Config(_))));
    }
}
