use serde::Serialize;
use tracing::{info, instrument};

use crate::config::{AnalyticsRefresh, Config};
use crate::constants::{ANALYTICS_PARTICIPANTS, ANALYTICS_TITLES};
use crate::db::{open_database, quote_ident, row_count};
use crate::error::Result;

/// One title per row with its rating and the number of distinct people credited on it
const TITLES_SELECT: &str = r#"
    WITH
    participantes AS (
        SELECT
            tconst,
            COUNT(DISTINCT nconst) AS qtParticipantes
        FROM title_principals
        GROUP BY 1
    )
    SELECT
        tb.tconst,
        tb.titleType,
        tb.originalTitle,
        tb.startYear,
        tb.endYear,
        tb.genres,
        tr.averageRating,
        tr.numVotes,
        tp.qtParticipantes
    FROM title_basics tb
    LEFT JOIN title_ratings tr
        ON tr.tconst = tb.tconst
    LEFT JOIN participantes tp
        ON tp.tconst = tb.tconst
"#;

/// One principal credit per row with the genres of the credited title
const PARTICIPANTS_SELECT: &str = r#"
    SELECT
        tp.nconst,
        tp.tconst,
        tp.ordering,
        tp.category,
        tb.genres
    FROM title_principals tp
    LEFT JOIN title_basics tb
        ON tb.tconst = tp.tconst
"#;

/// A derived table and the query that defines it
#[derive(Debug, Clone, Copy)]
pub struct AnalyticalTable {
    pub name: &'static str,
    pub select: &'static str,
}

pub const ANALYTICAL_TABLES: [AnalyticalTable; 2] = [
    AnalyticalTable {
        name: ANALYTICS_TITLES,
        select: TITLES_SELECT,
    },
    AnalyticalTable {
        name: ANALYTICS_PARTICIPANTS,
        select: PARTICIPANTS_SELECT,
    },
];

impl AnalyticalTable {
    /// SQL that materializes this table under the given refresh mode
    pub fn statement(&self, refresh: AnalyticsRefresh) -> String {
        let name = quote_ident(self.name);
        match refresh {
            AnalyticsRefresh::Replace => {
                format!("DROP TABLE IF EXISTS {name};\nCREATE TABLE {name} AS {};", self.select)
            }
            AnalyticsRefresh::IfMissing => {
                format!("CREATE TABLE IF NOT EXISTS {name} AS {};", self.select)
            }
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct AggregateReport {
    pub tables: Vec<(String, u64)>,
}

/// Materialize the analytical tables from the loaded raw tables.
#[instrument(skip_all, fields(refresh = ?config.analytics.refresh))]
pub fn build_analytics(config: &Config) -> Result<AggregateReport> {
    let mut conn = open_database(&config.storage.database)?;
    info!("Saving analytical tables to the database");

    let tx = conn.transaction()?;
    for table in &ANALYTICAL_TABLES {
        tx.execute_batch(&table.statement(config.analytics.refresh))?;
    }
    tx.commit()?;

    let mut report = AggregateReport::default();
    for table in &ANALYTICAL_TABLES {
        let rows = row_count(&conn, table.name)?;
        info!("{} holds {} rows", table.name, rows);
        report.tables.push((table.name.to_string(), rows));
    }
    Ok(report)
}
