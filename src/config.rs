//! Command-line and environment configuration

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::dates::parse_date;
use crate::provider::http::DEFAULT_SERVER;
use crate::provider::{ClientOptions, SearchQuery, VintageQuery};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pitexplorer",
    version,
    about = "Point-in-time explorer for CEIC series vintages"
)]
pub struct Config {
    /// API server base URL
    #[arg(long, env = "CEIC_SERVER", default_value = DEFAULT_SERVER, global = true)]
    pub server: String,

    #[arg(long, env = "CEIC_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(long, env = "CEIC_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Retries for transient request failures
    #[arg(long, default_value = "3", global = true)]
    pub max_retries: u32,

    /// First retry delay; doubles on every attempt
    #[arg(long, default_value = "500", global = true)]
    pub initial_backoff_ms: u64,

    #[arg(long, default_value = "30", global = true)]
    pub timeout_secs: u64,

    /// Number of most recent vintages to request
    #[arg(long, default_value = "10000", global = true)]
    pub vintages_count: u32,

    /// Request vintages published on or after this date instead of a count
    #[arg(long, value_parser = parse_date_arg, global = true)]
    pub vintages_start_date: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve a series id and print its metadata
    Load { series_id: String },

    /// Keyword search restricted by frequency, geo and status ids
    Search(SearchArgs),

    /// Fetch a series with its vintages and export every derived view
    Visualize {
        series_id: String,

        /// Directory that receives `ceic_series_<id>_output/`
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Two vintage dates to compare (defaults to the two earliest)
        #[arg(long, num_args = 2, value_names = ["FIRST", "SECOND"], value_parser = parse_date_arg)]
        compare: Option<Vec<NaiveDate>>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    pub keyword: String,
    #[arg(long)]
    pub frequency: String,
    #[arg(long)]
    pub geo: String,
    #[arg(long)]
    pub status: String,
}

impl From<SearchArgs> for SearchQuery {
    fn from(a: SearchArgs) -> Self {
        SearchQuery {
            keyword: a.keyword,
            frequency: a.frequency,
            geo: a.geo,
            status: a.status,
        }
    }
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("expected YYYY-MM-DD, got {:?}", s))
}

impl Config {
    /// Validate the configuration before any network call
    pub fn validate(&self) -> Result<(), String> {
        if url::Url::parse(&self.server).is_err() {
            return Err(format!("server {:?} is not a valid URL", self.server));
        }
        if self.username.as_deref().map_or(true, str::is_empty)
            || self.password.as_deref().map_or(true, str::is_empty)
        {
            return Err("username and password are required (--username/--password or CEIC_USERNAME/CEIC_PASSWORD)".into());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".into());
        }
        if self.vintages_start_date.is_none() && self.vintages_count == 0 {
            return Err("vintages_count must be > 0".into());
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            max_retries: self.max_retries,
            initial_backoff_ms: self.initial_backoff_ms,
            timeout: Duration::from_secs(self.timeout_secs),
            ..ClientOptions::default()
        }
    }

    pub fn vintage_query(&self) -> VintageQuery {
        VintageQuery::from_options(self.vintages_count, self.vintages_start_date)
    }
}
