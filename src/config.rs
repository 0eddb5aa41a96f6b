//! Run configuration: credentials from the environment, everything else from
//! an optional YAML file.

use std::{
    collections::BTreeSet,
    env, fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::{
    error::ConfigError,
    fetch::{Credentials, RetryPolicy, DEFAULT_BASE_ENDPOINT, LOOKBACK_ATTEMPTS},
    process::{DatasetLabel, GapPolicy},
};

pub const ENV_API_ID: &str = "CME_API_ID";
pub const ENV_API_PW: &str = "CME_API_PW";
pub const ENV_CONFIG_PATH: &str = "SETTLESCRAPER_CONFIG";

/// One report identifier and the contract sections to read from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportRequest {
    pub fid: String,
    pub datasets: Vec<DatasetLabel>,
}

/// Everything except credentials; all fields default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_endpoint: String,
    pub reports: Vec<ReportRequest>,
    pub lookback_attempts: usize,
    pub retry: RetryPolicy,
    pub gap_policy: GapPolicy,
    pub holidays: BTreeSet<NaiveDate>,
    pub staging_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        use DatasetLabel::{
            BrentLastDay, CadUsd, CrudeOilLastDay, EurUsd, HenryHubNaturalGas,
            MontBelvieuEthane, MontBelvieuPropane,
        };
        Self {
            base_endpoint: DEFAULT_BASE_ENDPOINT.to_string(),
            reports: vec![
                ReportRequest {
                    fid: "STLBASIC_NYMEX_STLCPC_EOM_0".into(),
                    datasets: vec![
                        CrudeOilLastDay,
                        MontBelvieuPropane,
                        BrentLastDay,
                        MontBelvieuEthane,
                    ],
                },
                ReportRequest {
                    fid: "STLBASIC_SETLCUR_EOM_SUM_0".into(),
                    datasets: vec![CadUsd, EurUsd],
                },
                ReportRequest {
                    fid: "STLBASIC_NYMEX_EOM_SUM_0".into(),
                    datasets: vec![HenryHubNaturalGas],
                },
            ],
            lookback_attempts: LOOKBACK_ATTEMPTS,
            retry: RetryPolicy::default(),
            gap_policy: GapPolicy::default(),
            holidays: BTreeSet::new(),
            staging_dir: None,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub base_endpoint: Url,
    pub settings: Settings,
}

impl Config {
    pub fn new(credentials: Credentials, settings: Settings) -> Result<Self, ConfigError> {
        let base_endpoint = Url::parse(&settings.base_endpoint)?;
        Ok(Self {
            credentials,
            base_endpoint,
            settings,
        })
    }

    /// Credentials from `CME_API_ID` / `CME_API_PW`, settings from the file
    /// named by `SETTLESCRAPER_CONFIG` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = Credentials {
            id: env::var(ENV_API_ID).map_err(|_| ConfigError::MissingEnv(ENV_API_ID))?,
            password: env::var(ENV_API_PW).map_err(|_| ConfigError::MissingEnv(ENV_API_PW))?,
        };
        let settings = match env::var_os(ENV_CONFIG_PATH) {
            Some(path) => {
                info!(path = %Path::new(&path).display(), "loading settings");
                Settings::from_yaml_file(&path)?
            }
            None => Settings::default(),
        };
        Self::new(credentials, settings)
    }
}
