// src/fetch/report.rs
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use tokio::fs;
use tracing::{info, instrument, warn};
use url::Url;

use super::{
    calendar::Lookback,
    transport::{Credentials, Transport},
};
use crate::error::FetchError;

/// Number of distinct business days tried before giving up on a report.
pub const LOOKBACK_ATTEMPTS: usize = 7;

/// A downloaded report, optionally staged on disk until it has been parsed.
#[derive(Debug)]
pub struct Report {
    pub fid: String,
    /// Business date the report was published for.
    pub date: NaiveDate,
    pub fetched_at: NaiveDateTime,
    pub body: String,
    pub staged: Option<PathBuf>,
}

impl Report {
    /// `{fid}_{timestamp}.txt`, spaces dropped from the fid.
    pub fn file_name(fid: &str, fetched_at: NaiveDateTime) -> String {
        format!(
            "{}_{}.txt",
            fid.replace(' ', ""),
            fetched_at.format("%Y-%m-%d_%H-%M-%S")
        )
    }

    pub fn lines(&self) -> Vec<&str> {
        self.body.lines().collect()
    }

    /// Remove the staged copy, if there is one.
    pub async fn discard(self) -> std::io::Result<()> {
        if let Some(path) = self.staged {
            fs::remove_file(&path).await?;
            info!(path = %path.display(), "deleted staged report");
        }
        Ok(())
    }
}

/// Asks for a report on successive candidate days until the service hands
/// one over.
///
/// Candidates come from [`Lookback`] in offset order, not date order: a
/// weekend offset is pushed further back than the weekday offsets after it,
/// so a Monday run asks for Mon, Wed, Thu, Fri, Tue, Mon, … and takes the
/// first one published. A 200 ends the walk with the report; anything else,
/// including a transport failure, moves on to the next candidate until the
/// attempt budget is spent.
#[derive(Debug, Clone)]
pub struct ReportFetcher<T> {
    transport: T,
    base_endpoint: Url,
    credentials: Credentials,
    attempts: usize,
    holidays: BTreeSet<NaiveDate>,
    staging_dir: Option<PathBuf>,
}

impl<T: Transport> ReportFetcher<T> {
    pub fn new(transport: T, base_endpoint: Url, credentials: Credentials) -> Self {
        Self {
            transport,
            base_endpoint,
            credentials,
            attempts: LOOKBACK_ATTEMPTS,
            holidays: BTreeSet::new(),
            staging_dir: None,
        }
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays = holidays.into_iter().collect();
        self
    }

    /// Write each downloaded body under `dir` before handing it back.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `{base}?fid={YYYYMMDD}-{fid}`
    pub fn endpoint(&self, fid: &str, date: NaiveDate) -> Url {
        let mut url = self.base_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("fid", &format!("{}-{}", date.format("%Y%m%d"), fid));
        url
    }

    #[instrument(level = "info", skip(self, fid, now), fields(fid = %fid))]
    pub async fn fetch_latest(
        &self,
        fid: &str,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Report, FetchError> {
        let mut attempted = Vec::with_capacity(self.attempts);

        for date in Lookback::new(today, &self.holidays).take(self.attempts) {
            attempted.push(date);
            let url = self.endpoint(fid, date);

            match self.transport.get(&url, &self.credentials).await {
                Ok(resp) if resp.status == StatusCode::OK => {
                    info!(%date, bytes = resp.body.len(), "report downloaded");
                    let staged = match &self.staging_dir {
                        Some(dir) => {
                            let name = Report::file_name(fid, now);
                            Some(stage(dir, &name, &resp.body).await?)
                        }
                        None => None,
                    };
                    return Ok(Report {
                        fid: fid.to_string(),
                        date,
                        fetched_at: now,
                        body: resp.body,
                        staged,
                    });
                }
                Ok(resp) => warn!(%date, status = %resp.status, "report not available"),
                Err(e) => warn!(%date, error = %e, "transport failure"),
            }
        }

        Err(FetchError::Exhausted {
            fid: fid.to_string(),
            attempted,
        })
    }
}

async fn stage(dir: &Path, name: &str, body: &str) -> Result<PathBuf, FetchError> {
    let path = dir.join(name);
    let io_err = |source| FetchError::Stage {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(dir).await.map_err(io_err)?;
    if let Err(e) = fs::write(&path, body).await {
        // don't leave a truncated copy behind
        if let Err(rm) = fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %rm, "failed to remove partial report");
        }
        return Err(io_err(e));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::TransportError, fetch::transport::Response};
    use std::sync::Mutex;

    /// Answers with `ok_on`'s body for the listed dates and 404 otherwise,
    /// recording every requested fid parameter.
    struct StubTransport {
        ok_on: Vec<NaiveDate>,
        calls: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn new(ok_on: Vec<NaiveDate>) -> Self {
            Self {
                ok_on,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        async fn get(
            &self,
            url: &Url,
            _credentials: &Credentials,
        ) -> Result<Response, TransportError> {
            let fid = url
                .query_pairs()
                .find(|(k, _)| k == "fid")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            self.calls.lock().unwrap().push(fid.clone());
            let hit = self
                .ok_on
                .iter()
                .any(|d| fid.starts_with(&d.format("%Y%m%d").to_string()));
            Ok(if hit {
                Response {
                    status: StatusCode::OK,
                    body: format!("report {}", fid),
                }
            } else {
                Response {
                    status: StatusCode::NOT_FOUND,
                    body: String::new(),
                }
            })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fetcher(stub: StubTransport) -> ReportFetcher<StubTransport> {
        ReportFetcher::new(
            stub,
            Url::parse("https://datamine.example.com/cme/api/v1/download").unwrap(),
            Credentials {
                id: "id".into(),
                password: "pw".into(),
            },
        )
    }

    fn now() -> NaiveDateTime {
        date(2024, 11, 25).and_hms_opt(18, 30, 5).unwrap()
    }

    #[test]
    fn endpoint_carries_date_and_fid() {
        let f = fetcher(StubTransport::new(vec![]));
        let url = f.endpoint("STLBASIC_NYMEX_EOM_SUM_0", date(2024, 11, 20));
        assert_eq!(
            url.as_str(),
            "https://datamine.example.com/cme/api/v1/download?fid=20241120-STLBASIC_NYMEX_EOM_SUM_0"
        );
    }

    #[test]
    fn file_name_drops_spaces() {
        assert_eq!(
            Report::file_name("STLBASIC NYMEX", now()),
            "STLBASICNYMEX_2024-11-25_18-30-05.txt"
        );
    }

    #[tokio::test]
    async fn monday_takes_wednesday_before_friday() {
        // Sunday's offset resolves to Wednesday, which is asked for before
        // Thursday and Friday even when Friday is also published.
        let stub = StubTransport::new(vec![date(2024, 11, 20), date(2024, 11, 22)]);
        let f = fetcher(stub);
        let report = f
            .fetch_latest("STLBASIC_NYMEX_EOM_SUM_0", date(2024, 11, 25), now())
            .await
            .unwrap();
        assert_eq!(report.date, date(2024, 11, 20));
        assert_eq!(report.body, "report 20241120-STLBASIC_NYMEX_EOM_SUM_0");
        assert!(report.staged.is_none());
        assert_eq!(
            f.transport().calls(),
            vec![
                "20241125-STLBASIC_NYMEX_EOM_SUM_0",
                "20241120-STLBASIC_NYMEX_EOM_SUM_0",
            ]
        );
    }

    #[tokio::test]
    async fn exhausts_after_seven_distinct_dates() {
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(StubTransport::new(vec![])).with_staging_dir(dir.path());
        let err = f
            .fetch_latest("STLBASIC_SETLCUR_EOM_SUM_0", date(2024, 11, 25), now())
            .await
            .unwrap_err();

        let attempted = match err {
            FetchError::Exhausted { attempted, .. } => attempted,
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(
            attempted,
            vec![
                date(2024, 11, 25),
                date(2024, 11, 20),
                date(2024, 11, 21),
                date(2024, 11, 22),
                date(2024, 11, 19),
                date(2024, 11, 18),
                date(2024, 11, 13),
            ]
        );
        let calls = f.transport().calls();
        assert_eq!(calls.len(), LOOKBACK_ATTEMPTS);
        let unique: BTreeSet<_> = calls.iter().collect();
        assert_eq!(unique.len(), LOOKBACK_ATTEMPTS);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_staging_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("staging").join("cme");
        let f = fetcher(StubTransport::new(vec![date(2024, 11, 25)])).with_staging_dir(&dir);
        let report = f
            .fetch_latest("STLBASIC_NYMEX_EOM_SUM_0", date(2024, 11, 25), now())
            .await
            .unwrap();
        let path = report.staged.clone().unwrap();
        assert!(path.starts_with(&dir));
        assert!(path.is_file());
        report.discard().await.unwrap();
    }

    #[tokio::test]
    async fn staging_dir_that_is_a_file_fails_the_fetch() {
        let not_a_dir = tempfile::NamedTempFile::new().unwrap();
        let f = fetcher(StubTransport::new(vec![date(2024, 11, 25)]))
            .with_staging_dir(not_a_dir.path());
        let err = f
            .fetch_latest("STLBASIC_NYMEX_EOM_SUM_0", date(2024, 11, 25), now())
            .await
            .unwrap_err();
        match err {
            FetchError::Stage { path, .. } => {
                assert!(path.starts_with(not_a_dir.path()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        // point the report's file name at a device that is always full
        let target = dir
            .path()
            .join(Report::file_name("STLBASIC_NYMEX_EOM_SUM_0", now()));
        std::os::unix::fs::symlink("/dev/full", &target).unwrap();

        let f = fetcher(StubTransport::new(vec![date(2024, 11, 25)])).with_staging_dir(dir.path());
        let err = f
            .fetch_latest("STLBASIC_NYMEX_EOM_SUM_0", date(2024, 11, 25), now())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Stage { ref path, .. } if *path == target));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn staged_report_is_removed_on_discard() {
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(StubTransport::new(vec![date(2024, 11, 25)])).with_staging_dir(dir.path());
        let report = f
            .fetch_latest("STLBASIC_NYMEX_EOM_SUM_0", date(2024, 11, 25), now())
            .await
            .unwrap();

        let path = report.staged.clone().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "STLBASIC_NYMEX_EOM_SUM_0_2024-11-25_18-30-05.txt"
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), report.body);

        report.discard().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn holidays_are_not_requested() {
        let stub = StubTransport::new(vec![date(2024, 11, 27)]);
        let f = fetcher(stub).with_holidays([date(2024, 11, 28)]);
        let report = f
            .fetch_latest("STLBASIC_NYMEX_EOM_SUM_0", date(2024, 11, 29), now())
            .await
            .unwrap();
        assert_eq!(report.date, date(2024, 11, 27));
        let calls = f.transport().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| !c.starts_with("20241128")));
    }
}
