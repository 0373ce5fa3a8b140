use anyhow::Result;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use imdb_etl::app::ports::{HttpClientPort, HttpDownloadResult};
use imdb_etl::config::Config;
use imdb_etl::error::EtlError;
use imdb_etl::pipeline::{Pipeline, RunReport, Stage};
use rusqlite::Connection;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const NAME_BASICS: &str = "nconst\tprimaryName\tbirthYear\tdeathYear\tprimaryProfession\tknownForTitles\n\
nm1\tFred Astaire\t1899\t1987\tactor\ttt1\n\
nm2\tLauren Bacall\t1924\t2014\tactress\ttt1\n";

const TITLE_AKAS: &str = "titleId\tordering\ttitle\tregion\tlanguage\ttypes\tattributes\tisOriginalTitle\n\
tt1\t1\tFirst\tUS\t\\N\t\\N\t\\N\t1\n";

const TITLE_BASICS: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n\
tt1\tmovie\tFirst\tFirst\t0\t1990\t\\N\t90\tDrama\n\
tt2\tshort\tSecond\tSecond\t0\t2001\t2002\t12\tComedy,Short\n\
tt3\ttvSeries\tThird\tThird\t0\t2010\t2015\t45\tAction\n";

const TITLE_CREW: &str = "tconst\tdirectors\twriters\n\
tt1\tnm1\t\\N\n\
tt2\tnm2\tnm1\n";

const TITLE_EPISODE: &str = "tconst\tparentTconst\tseasonNumber\tepisodeNumber\n\
tt4\ttt3\t1\t1\n";

const TITLE_PRINCIPALS: &str = "tconst\tordering\tnconst\tcategory\tjob\tcharacters\n\
tt1\t1\tnm1\tactor\t\\N\t[\"Self\"]\n\
tt1\t2\tnm2\tactress\t\\N\t\\N\n\
tt1\t3\tnm1\tproducer\tproducer\t\\N\n\
tt2\t1\tnm2\tactress\t\\N\t\\N\n";

const TITLE_RATINGS: &str = "tconst\taverageRating\tnumVotes\n\
tt1\t7.5\t120\n\
tt2\t6.1\t15\n";

fn fixtures() -> Vec<(&'static str, &'static str)> {
    vec![
        ("name.basics.tsv.gz", NAME_BASICS),
        ("title.akas.tsv.gz", TITLE_AKAS),
        ("title.basics.tsv.gz", TITLE_BASICS),
        ("title.crew.tsv.gz", TITLE_CREW),
        ("title.episode.tsv.gz", TITLE_EPISODE),
        ("title.principals.tsv.gz", TITLE_PRINCIPALS),
        ("title.ratings.tsv.gz", TITLE_RATINGS),
    ]
}

fn gzip(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Serves gzipped fixtures by file name; anything else is a 404
struct FixtureHttp {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FixtureHttp {
    fn new(missing: &[&str]) -> Self {
        let files = fixtures()
            .into_iter()
            .filter(|(name, _)| !missing.contains(name))
            .map(|(name, content)| (name.to_string(), gzip(content)))
            .collect();
        Self {
            files,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClientPort for FixtureHttp {
    async fn download(&self, url: &str, dest: &Path) -> imdb_etl::error::Result<HttpDownloadResult> {
        self.requests.lock().unwrap().push(url.to_string());
        let name = url.rsplit('/').next().unwrap_or_default();
        match self.files.get(name) {
            Some(body) => {
                std::fs::write(dest, body)?;
                Ok(HttpDownloadResult {
                    status: 200,
                    bytes_written: body.len() as u64,
                })
            }
            None => Ok(HttpDownloadResult {
                status: 404,
                bytes_written: 0,
            }),
        }
    }
}

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.source.base_url = "http://fixtures.local/".to_string();
    config.storage.staging_dir = root.join("data");
    config.storage.processed_dir = root.join("data").join("tratados");
    config.storage.database = root.join("imdb_data.db");
    config.logging.dir = root.join("logs");
    config
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

fn data_lines(content: &str) -> i64 {
    content.lines().count() as i64 - 1
}

#[tokio::test]
async fn test_full_run_loads_every_dataset() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let http = Arc::new(FixtureHttp::new(&[]));
    let pipeline = Pipeline::new(config.clone(), http.clone());

    let report = pipeline.run().await?;
    assert!(report.finished_at.is_some());
    assert_eq!(report.fetch.as_ref().unwrap().downloaded.len(), 7);
    assert_eq!(report.load.as_ref().unwrap().tables.len(), 7);

    let conn = Connection::open(&config.storage.database)?;
    for (name, content) in fixtures() {
        let table = imdb_etl::dataset::DatasetFile::new(name).table_name();
        assert_eq!(count(&conn, &table), data_lines(content), "row count of {}", table);
    }

    // The sentinel cell is stored as NULL, never as the literal token
    let end_year: Option<i64> = conn.query_row(
        "SELECT endYear FROM title_basics WHERE tconst = 'tt1'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(end_year, None);
    let literal: i64 = conn.query_row(
        "SELECT COUNT(*) FROM title_principals WHERE job = '\\N' OR characters = '\\N'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(literal, 0);

    let participants: i64 = conn.query_row(
        "SELECT qtParticipantes FROM analitico_titulos WHERE tconst = 'tt1'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(participants, 2);
    assert_eq!(count(&conn, "analitico_titulos"), 3);
    assert_eq!(count(&conn, "analitico_participantes"), 4);

    // Scratch directories are emptied as each stage consumes its input
    assert_eq!(std::fs::read_dir(&config.storage.processed_dir)?.count(), 0);
    let leftovers = std::fs::read_dir(&config.storage.staging_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .count();
    assert_eq!(leftovers, 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_download_degrades_silently_by_default() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let http = Arc::new(FixtureHttp::new(&["title.crew.tsv.gz"]));
    let pipeline = Pipeline::new(config.clone(), http);

    let report = pipeline.run().await?;
    let fetch = report.fetch.as_ref().unwrap();
    assert_eq!(fetch.failed.len(), 1);
    assert_eq!(fetch.failed[0].file_name, "title.crew.tsv.gz");
    assert_eq!(fetch.failed[0].status, 404);
    assert_eq!(report.load.as_ref().unwrap().tables.len(), 6);

    let conn = Connection::open(&config.storage.database)?;
    assert!(!imdb_etl::db::table_exists(&conn, "title_crew")?);
    assert!(imdb_etl::db::table_exists(&conn, "analitico_titulos")?);
    Ok(())
}

#[tokio::test]
async fn test_strict_mode_stops_before_normalizing() -> Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(dir.path());
    config.source.fail_on_missing_downloads = true;
    let http = Arc::new(FixtureHttp::new(&["title.crew.tsv.gz"]));
    let pipeline = Pipeline::new(config.clone(), http);

    let err = pipeline.run().await.unwrap_err();
    match err {
        EtlError::IncompleteDownload(files) => assert_eq!(files, vec!["title.crew.tsv.gz"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(config.storage.staging_dir.join("title.basics.tsv.gz").exists());
    assert!(!config.storage.database.exists());
    Ok(())
}

#[tokio::test]
async fn test_stages_can_be_driven_one_at_a_time() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let http = Arc::new(FixtureHttp::new(&[]));
    let pipeline = Pipeline::new(config.clone(), http.clone());

    for stage in Stage::ALL {
        let mut report = RunReport::new();
        pipeline.run_stage(stage, &mut report).await?;
    }

    let conn = Connection::open(&config.storage.database)?;
    assert_eq!(count(&conn, "title_basics"), 3);
    assert_eq!(count(&conn, "analitico_participantes"), 4);
    assert_eq!(http.request_count(), 7);
    Ok(())
}

#[tokio::test]
async fn test_rerun_rebuilds_raw_and_analytic_tables() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let http = Arc::new(FixtureHttp::new(&[]));
    let pipeline = Pipeline::new(config.clone(), http.clone());

    pipeline.run().await?;
    {
        let conn = Connection::open(&config.storage.database)?;
        conn.execute_batch("DELETE FROM title_principals WHERE nconst = 'nm2'")?;
    }
    // Staged files were consumed, so the rerun downloads again and reloads raw tables
    pipeline.run().await?;
    assert_eq!(http.request_count(), 14);

    let conn = Connection::open(&config.storage.database)?;
    let participants: i64 = conn.query_row(
        "SELECT qtParticipantes FROM analitico_titulos WHERE tconst = 'tt1'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(participants, 2);
    assert_eq!(count(&conn, "title_principals"), 4);
    Ok(())
}
