//! oplog replay basic configuration, express in toml.
//!
//! Basic configuration file example:
//! ```toml
//! [src]
//! # captured oplog, a stream of bson documents.  "-" means stdin.
//! path = "oplog.bson"
//!
//! [dst]
//! # mongodb url to replay oplog against.
//! url = "mongodb://localhost:27017"
//!
//! [replay]
//! # operations per second.
//! speed = 500.0
//! # log progress every N applied operations.
//! progress_interval = 1000
//! # replay into memory only, target database is not touched.
//! dry_run = false
//! ```
use crate::error::{ReplayError, Result};
use crate::throttle::RateController;
use serde::Deserialize;

/// Global oplog replay configuration.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ReplayConf {
    src: Src,
    #[serde(default)]
    dst: Dst,
    #[serde(default)]
    replay: DetailReplayConf,
}

impl ReplayConf {
    /// create a configuration directly, `None` values take their defaults.
    pub fn new(
        path: String,
        url: String,
        speed: Option<f64>,
        progress_interval: Option<u64>,
        dry_run: Option<bool>,
    ) -> Self {
        ReplayConf {
            src: Src { path },
            dst: Dst { url },
            replay: DetailReplayConf {
                speed: speed.unwrap_or_else(default_speed),
                progress_interval: progress_interval.unwrap_or_else(default_progress_interval),
                dry_run: dry_run.unwrap_or(false),
            },
        }
    }

    /// parse configuration from toml `data`.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let conf: ReplayConf = toml::from_slice(data)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Check values which can't be expressed by types.
    pub fn validate(&self) -> Result<()> {
        if self.src.path.is_empty() {
            return Err(ReplayError::InvalidConfig("src.path is empty".to_string()));
        }
        if self.dst.url.is_empty() && !self.replay.dry_run {
            return Err(ReplayError::InvalidConfig("dst.url is empty".to_string()));
        }
        if self.replay.progress_interval == 0 {
            return Err(ReplayError::InvalidConfig(
                "replay.progress_interval must be greater than 0".to_string(),
            ));
        }
        self.rate_controller().map(|_| ())
    }

    /// get oplog file path.
    pub fn get_src_path(&self) -> &str {
        &self.src.path
    }

    /// get target mongodb url.
    pub fn get_dst_url(&self) -> &str {
        &self.dst.url
    }

    /// get replay speed, in operations per second.
    pub fn get_speed(&self) -> f64 {
        self.replay.speed
    }

    /// get progress log interval.
    pub fn get_progress_interval(&self) -> u64 {
        self.replay.progress_interval
    }

    /// is it a dry run?
    pub fn is_dry_run(&self) -> bool {
        self.replay.dry_run
    }

    /// build the rate controller for configured speed.
    pub fn rate_controller(&self) -> Result<RateController> {
        RateController::new(self.replay.speed)
    }

    /// override file values with command line values.
    pub fn merge(
        &mut self,
        path: Option<String>,
        url: Option<String>,
        speed: Option<f64>,
        progress_interval: Option<u64>,
        dry_run: bool,
    ) {
        if let Some(path) = path {
            self.src.path = path;
        }
        if let Some(url) = url {
            self.dst.url = url;
        }
        if let Some(speed) = speed {
            self.replay.speed = speed;
        }
        if let Some(progress_interval) = progress_interval {
            self.replay.progress_interval = progress_interval;
        }
        self.replay.dry_run |= dry_run;
    }
}

/// Source oplog configuration.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Src {
    /// oplog file path.
    path: String,
}

/// Target database configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Dst {
    /// Target database url.  Which begins with 'mongodb://'
    #[serde(default)]
    url: String,
}

/// Detail replay config.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DetailReplayConf {
    /// operations per second.
    #[serde(default = "default_speed")]
    speed: f64,
    /// how many applied operations between two progress logs.
    #[serde(default = "default_progress_interval")]
    progress_interval: u64,
    /// replay into memory only.
    #[serde(default)]
    dry_run: bool,
}

impl Default for DetailReplayConf {
    fn default() -> Self {
        DetailReplayConf {
            speed: default_speed(),
            progress_interval: default_progress_interval(),
            dry_run: false,
        }
    }
}

fn default_speed() -> f64 {
    1.0
}

fn default_progress_interval() -> u64 {
    1000
}
