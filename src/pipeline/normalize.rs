use csv::ByteRecord;
use flate2::read::GzDecoder;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::constants::{COMPRESSED_SUFFIX, PARTIAL_SUFFIX};
use crate::dataset::processed_file_name;
use crate::error::{EtlError, Result};
use crate::pipeline::tsv::{self, file_name_of};

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedFile {
    pub source: String,
    pub output: PathBuf,
    pub rows: u64,
    pub nulls_replaced: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct NormalizeReport {
    pub files: Vec<NormalizedFile>,
}

/// Normalize every compressed dump found in the staging directory.
#[instrument(skip_all, fields(staging_dir = %config.storage.staging_dir.display()))]
pub fn normalize_staged(config: &Config) -> Result<NormalizeReport> {
    let processed_dir = &config.storage.processed_dir;
    fs::create_dir_all(processed_dir)?;

    let mut report = NormalizeReport::default();
    for source in tsv::list_files_with_suffix(&config.storage.staging_dir, COMPRESSED_SUFFIX)? {
        let name = file_name_of(&source);
        let output = processed_dir.join(processed_file_name(&name));
        debug!("Reading and normalizing {}...", name);

        let (rows, nulls_replaced) =
            normalize_file(&source, &output, &config.transform.null_sentinel)?;
        debug!(
            "Normalized {}: {} rows, {} null cells, saved to {}",
            name,
            rows,
            nulls_replaced,
            output.display()
        );
        crate::metrics::normalize::file_normalized(rows, nulls_replaced);

        if config.storage.cleanup_consumed {
            fs::remove_file(&source)?;
        }
        report.files.push(NormalizedFile {
            source: name,
            output,
            rows,
            nulls_replaced,
        });
    }

    info!("{} file(s) normalized into {}", report.files.len(), processed_dir.display());
    Ok(report)
}

/// Gunzip `source`, blank every cell equal to `sentinel` and write plain TSV to
/// `dest`. Returns the number of data rows and of replaced cells.
///
/// Rows are written to a `.part` sibling that is renamed onto `dest` only once
/// the whole input has been read, so a failed file never reaches the Loader.
pub fn normalize_file(source: &Path, dest: &Path, sentinel: &str) -> Result<(u64, u64)> {
    let partial = partial_path(dest);
    match write_normalized(source, &partial, sentinel) {
        Ok(counts) => {
            fs::rename(&partial, dest)?;
            Ok(counts)
        }
        Err(e) => {
            if partial.exists() {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    warn!("Could not remove {}: {}", partial.display(), cleanup);
                }
            }
            Err(e)
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn write_normalized(source: &Path, dest: &Path, sentinel: &str) -> Result<(u64, u64)> {
    let name = file_name_of(source);
    let decoder = GzDecoder::new(BufReader::new(File::open(source)?));
    let mut reader = tsv::reader_builder().from_reader(decoder);
    let mut writer = tsv::writer_builder()
        .from_path(dest)
        .map_err(|e| EtlError::tsv(&name, e))?;

    let headers = reader
        .byte_headers()
        .map_err(|e| EtlError::tsv(&name, e))?
        .clone();
    writer
        .write_byte_record(&headers)
        .map_err(|e| EtlError::tsv(&name, e))?;

    let sentinel = sentinel.as_bytes();
    let mut record = ByteRecord::new();
    let mut cleaned = ByteRecord::new();
    let mut rows = 0u64;
    let mut nulls = 0u64;
    while reader
        .read_byte_record(&mut record)
        .map_err(|e| EtlError::tsv(&name, e))?
    {
        cleaned.clear();
        for field in record.iter() {
            if field == sentinel {
                cleaned.push_field(b"");
                nulls += 1;
            } else {
                cleaned.push_field(field);
            }
        }
        writer
            .write_byte_record(&cleaned)
            .map_err(|e| EtlError::tsv(&name, e))?;
        rows += 1;
    }
    writer.flush()?;
    Ok((rows, nulls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_gz(path: &Path, content: &str) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.storage.staging_dir = root.join("data");
        config.storage.processed_dir = root.join("data/tratados");
        fs::create_dir_all(&config.storage.staging_dir).unwrap();
        config
    }

    #[test]
    fn test_sentinel_cells_become_empty() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        write_gz(
            &config.storage.staging_dir.join("title.basics.tsv.gz"),
            "tconst\ttitleType\tendYear\n\
             tt1\tmovie\t\\N\n\
             tt2\tshort\t1999\n\
             tt3\tmovie\tA\\No\n",
        );

        let report = normalize_staged(&config).unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].rows, 3);
        assert_eq!(report.files[0].nulls_replaced, 1);

        let output = fs::read_to_string(config.storage.processed_dir.join("title.basics.tsv")).unwrap();
        assert_eq!(
            output,
            "tconst\ttitleType\tendYear\ntt1\tmovie\t\ntt2\tshort\t1999\ntt3\tmovie\tA\\No\n"
        );
        for line in output.lines() {
            assert!(line.split('\t').all(|cell| cell != "\\N"));
        }
    }

    #[test]
    fn test_source_removed_only_with_cleanup() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        let staged = config.storage.staging_dir.join("title.ratings.tsv.gz");
        write_gz(&staged, "tconst\taverageRating\tnumVotes\ntt1\t7.5\t10\n");

        config.storage.cleanup_consumed = false;
        normalize_staged(&config).unwrap();
        assert!(staged.exists());

        config.storage.cleanup_consumed = true;
        normalize_staged(&config).unwrap();
        assert!(!staged.exists());
        assert!(config.storage.processed_dir.join("title.ratings.tsv").exists());
    }

    #[test]
    fn test_ragged_row_aborts_with_file_name() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let staged = config.storage.staging_dir.join("title.crew.tsv.gz");
        write_gz(&staged, "tconst\tdirectors\twriters\ntt1\tnm1\n");

        let err = normalize_staged(&config).unwrap_err();
        match err {
            EtlError::Tsv { file, .. } => assert_eq!(file, "title.crew.tsv.gz"),
            other => panic!("unexpected error: {other}"),
        }
        // Nothing is deleted when the stage fails, and no output is left behind
        assert!(staged.exists());
        assert!(!config.storage.processed_dir.join("title.crew.tsv").exists());
    }

    #[test]
    fn test_failed_file_leaves_no_output_for_the_loader() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let mut content = String::from("tconst\tdirectors\twriters\n");
        for i in 0..5000 {
            content.push_str(&format!("tt{}\tnm{}\t\\N\n", i, i));
        }
        content.push_str("tt5000\tnm5000\n");
        write_gz(&config.storage.staging_dir.join("title.crew.tsv.gz"), &content);

        assert!(normalize_staged(&config).is_err());
        let processed = &config.storage.processed_dir;
        assert!(!processed.join("title.crew.tsv").exists());
        assert_eq!(fs::read_dir(processed).unwrap().count(), 0);

        let mut load_config = config.clone();
        load_config.storage.database = dir.path().join("imdb_data.db");
        let report = crate::pipeline::load::load_processed(&load_config).unwrap();
        assert!(report.tables.is_empty());
    }

    #[test]
    fn test_single_column_null_row_is_kept() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        write_gz(
            &config.storage.staging_dir.join("title.only.tsv.gz"),
            "only\na\n\\N\nb\n",
        );

        let report = normalize_staged(&config).unwrap();
        assert_eq!(report.files[0].rows, 3);
        assert_eq!(report.files[0].nulls_replaced, 1);
    }
}
