/// Dataset constants shared across the pipeline stages.
/// These are the defaults a `Config` starts from; every stage reads them through the config.

/// Public location of the IMDb non-commercial dataset dumps
pub const IMDB_BASE_URL: &str = "https://datasets.imdbws.com/";

// Dataset dump file names, in download order
pub const NAME_BASICS: &str = "name.basics.tsv.gz";
pub const TITLE_AKAS: &str = "title.akas.tsv.gz";
pub const TITLE_BASICS: &str = "title.basics.tsv.gz";
pub const TITLE_CREW: &str = "title.crew.tsv.gz";
pub const TITLE_EPISODE: &str = "title.episode.tsv.gz";
pub const TITLE_PRINCIPALS: &str = "title.principals.tsv.gz";
pub const TITLE_RATINGS: &str = "title.ratings.tsv.gz";

/// Token the dumps use for a missing value
pub const NULL_SENTINEL: &str = "\\N";

pub const COMPRESSED_SUFFIX: &str = ".gz";
pub const PROCESSED_SUFFIX: &str = ".tsv";
/// Suffix of a normalized file still being written
pub const PARTIAL_SUFFIX: &str = ".part";

// Default filesystem layout, relative to the working directory
pub const DEFAULT_STAGING_DIR: &str = "data";
pub const DEFAULT_PROCESSED_DIR: &str = "data/tratados";
pub const DEFAULT_DATABASE: &str = "imdb_data.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "imdb_etl.toml";

/// Every day at 09:00 local time (sec min hour day-of-month month day-of-week)
pub const DEFAULT_SCHEDULE: &str = "0 0 9 * * *";

// Derived analytical tables
pub const ANALYTICS_TITLES: &str = "analitico_titulos";
pub const ANALYTICS_PARTICIPANTS: &str = "analitico_participantes";

/// Get all dataset dump file names in download order
pub fn get_dataset_files() -> Vec<&'static str> {
    vec![
        NAME_BASICS,
        TITLE_AKAS,
        TITLE_BASICS,
        TITLE_CREW,
        TITLE_EPISODE,
        TITLE_PRINCIPALS,
        TITLE_RATINGS,
    ]
}
