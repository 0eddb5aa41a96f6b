//! One pass over every configured report: fetch, parse each contract section,
//! keep the top month. A failure only costs the report or section it hit.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    config::{Config, ReportRequest},
    fetch::{HttpTransport, ReportFetcher, Transport},
    process::{parse_dataset, DatasetLabel, GapPolicy, TopMonthQuote},
};

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub fid: String,
    /// `None` when the report itself could not be fetched.
    pub data_set: Option<DatasetLabel>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub quotes: Vec<TopMonthQuote>,
    pub failures: Vec<Failure>,
}

pub struct Pipeline<T> {
    fetcher: ReportFetcher<T>,
    reports: Vec<ReportRequest>,
    gap_policy: GapPolicy,
}

impl Pipeline<HttpTransport> {
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let settings = &config.settings;
        let transport = HttpTransport::new(settings.retry.clone())?;
        let mut fetcher = ReportFetcher::new(
            transport,
            config.base_endpoint.clone(),
            config.credentials.clone(),
        )
        .with_attempts(settings.lookback_attempts)
        .with_holidays(settings.holidays.iter().copied());
        if let Some(dir) = &settings.staging_dir {
            fetcher = fetcher.with_staging_dir(dir);
        }
        Ok(Pipeline::new(
            fetcher,
            settings.reports.clone(),
            settings.gap_policy,
        ))
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn new(fetcher: ReportFetcher<T>, reports: Vec<ReportRequest>, gap_policy: GapPolicy) -> Self {
        Self {
            fetcher,
            reports,
            gap_policy,
        }
    }

    pub fn fetcher(&self) -> &ReportFetcher<T> {
        &self.fetcher
    }

    pub async fn run(&self, today: NaiveDate, now: NaiveDateTime) -> RunSummary {
        let mut summary = RunSummary::default();

        for request in &self.reports {
            let report = match self.fetcher.fetch_latest(&request.fid, today, now).await {
                Ok(report) => report,
                Err(e) => {
                    error!(fid = %request.fid, error = %e, "fetch failed");
                    summary.failures.push(Failure {
                        fid: request.fid.clone(),
                        data_set: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            {
                let lines = report.lines();
                for &label in &request.datasets {
                    let parsed = parse_dataset(&lines, label, self.gap_policy).and_then(|table| {
                        TopMonthQuote::from_table(&table, &report.fid, report.date)
                    });
                    match parsed {
                        Ok(quote) => {
                            info!(
                                fid = %report.fid,
                                data_set = label.code(),
                                month = %quote.month,
                                settlement = ?quote.settlement_price,
                                "top month"
                            );
                            summary.quotes.push(quote);
                        }
                        Err(e) => {
                            error!(fid = %report.fid, data_set = label.code(), error = %e, "parse failed");
                            summary.failures.push(Failure {
                                fid: report.fid.clone(),
                                data_set: Some(label),
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }

            let fid = report.fid.clone();
            if let Err(e) = report.discard().await {
                warn!(%fid, error = %e, "failed to delete staged report");
            }
        }

        info!(
            quotes = summary.quotes.len(),
            failures = summary.failures.len(),
            "run complete"
        );
        summary
    }
}
