use anyhow::Context;
use chrono::Utc;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::scrape::models::{RunSummary, ScrapeError};
use crate::scrape::{fetcher, forms, items, parser};
use crate::storage;

/// Drives one full extraction run: landing fetch, state capture, bulk
/// search, listing parse, per-item detail fetches, artifact persistence.
pub struct ScrapeService {
    cfg: Config,
}

impl ScrapeService {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    /// Error-page, no-table, and empty-listing responses are normal
    /// terminal paths: the raw page is captured for inspection and the
    /// run ends with `Ok`. Failures before the listing is parsed have no
    /// partial data to salvage and propagate to the caller.
    pub async fn run(&self) -> anyhow::Result<()> {
        let started = Utc::now();
        let url = &self.cfg.schedule_url;

        // session and tokens live for exactly one run
        let client = fetcher::build_client()?;

        info!(%url, "fetching landing page");
        let landing = fetcher::fetch_html(&client, url)
            .await
            .context("fetching landing page")?;
        let state = forms::extract_form_state(&landing)?;

        let payload = forms::build_search_payload(&state, &self.cfg);

        info!(campus = %self.cfg.campus, term = %self.cfg.term, "submitting bulk search");
        let results_html = fetcher::submit_form(&client, url, &payload)
            .await
            .context("submitting bulk search")?;

        let records = match parser::parse_listing(&results_html) {
            Ok(records) => records,
            Err(ScrapeError::ErrorPage) => {
                warn!("server returned an error page, saving it for inspection");
                let path = storage::save_diagnostic(
                    &self.cfg.output_dir,
                    storage::ERROR_PAGE_FILE,
                    &results_html,
                )
                .await?;
                info!(path = %path.display(), "error page saved");
                return Ok(());
            }
            Err(ScrapeError::NoTableFound) => {
                warn!("no results table in response, saving it for inspection");
                let path = storage::save_diagnostic(
                    &self.cfg.output_dir,
                    storage::RESPONSE_FILE,
                    &results_html,
                )
                .await?;
                info!(path = %path.display(), "response saved");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if records.is_empty() {
            info!("results table has no data rows, saving response for inspection");
            storage::save_diagnostic(
                &self.cfg.output_dir,
                storage::RESPONSE_FILE,
                &results_html,
            )
            .await?;
            return Ok(());
        }

        info!(count = records.len(), "extracted records from listing");

        let run_stamp = started.format("%Y%m%d_%H%M%S").to_string();
        let detail_dir = self.cfg.output_dir.join(format!("details_{run_stamp}"));
        let results = items::fetch_items(
            &client,
            url,
            &payload,
            &records,
            &detail_dir,
            Duration::from_millis(self.cfg.delay_ms),
        )
        .await?;

        let listing_path =
            storage::write_listing_csv(&self.cfg.output_dir, &run_stamp, &records).await?;
        info!(path = %listing_path.display(), "listing saved");

        let summary = RunSummary::new(started, results);
        storage::write_run_summary(&self.cfg.output_dir, &run_stamp, &summary).await?;
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run complete"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Form;
    use axum::routing::get;
    use axum::Router;
    use std::path::Path;

    const LANDING: &str = r#"
        <html><body><form>
            <input type="hidden" name="__VIEWSTATE" value="dDwtMTg3fQ==" />
            <input type="hidden" name="__VIEWSTATEGENERATOR" value="CA0B0334" />
        </form></body></html>
    "#;

    const LISTING: &str = r#"
        <html><body>
        <table id="CourseList">
            <tr><th>Course</th><th>Title</th></tr>
            <tr>
                <td><a href="javascript:__doPostBack('grdSchedule$ctl02$lnkDetail','')">CSC124</a></td>
                <td>Programming I</td>
            </tr>
            <tr><td>MTH240</td><td>Calculus</td></tr>
        </table>
        </body></html>
    "#;

    const ERROR_PAGE: &str = r#"
        <html><body><span id="lblMessage">Search unavailable.</span></body></html>
    "#;

    async fn portal(response_for_search: &'static str) -> String {
        let submit = move |Form(fields): Form<Vec<(String, String)>>| async move {
            let target = fields
                .iter()
                .find(|(k, _)| k == "__EVENTTARGET")
                .map(|(_, v)| v.as_str())
                .unwrap_or("");
            // tokens must be echoed back on every submission
            assert!(fields
                .iter()
                .any(|(k, v)| k == "__VIEWSTATE" && v == "dDwtMTg3fQ=="));
            if target.starts_with("grdSchedule") {
                "<html><body>detail page</body></html>".to_string()
            } else {
                response_for_search.to_string()
            }
        };
        let app = Router::new().route(
            "/CourseSchedule.aspx",
            get(|| async { LANDING }).post(submit),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/CourseSchedule.aspx")
    }

    fn test_config(url: String, output_dir: &Path) -> Config {
        Config {
            schedule_url: url,
            campus: "5".into(),
            term: "1196".into(),
            delay_ms: 0,
            output_dir: output_dir.to_path_buf(),
            public_dir: "public".into(),
            listen_addr: "127.0.0.1:0".into(),
        }
    }

    fn find_file(dir: &Path, prefix: &str) -> Option<std::path::PathBuf> {
        std::fs::read_dir(dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
            })
    }

    #[tokio::test]
    async fn full_run_with_one_target_and_one_skip() {
        let url = portal(LISTING).await;
        let dir = tempfile::tempdir().unwrap();
        let service = ScrapeService::new(test_config(url, dir.path()));

        service.run().await.unwrap();

        // two data rows exported, targets excluded
        let listing = find_file(dir.path(), storage::LISTING_PREFIX).unwrap();
        let rows = crate::storage::read_listing_records(&listing).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Course"], "CSC124");
        assert_eq!(rows[1]["Course"], "MTH240");

        // one row had a postback target, one did not
        let summary_path = find_file(dir.path(), "run_summary_").unwrap();
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(summary_path).unwrap()).unwrap();
        assert_eq!(summary["total"], 1);
        assert_eq!(summary["succeeded"], 1);
        assert_eq!(summary["failed"], 0);
        assert_eq!(summary["results"][0]["course"], "CSC124");

        let detail_dir = find_file(dir.path(), "details_").unwrap();
        assert_eq!(std::fs::read_dir(detail_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn error_page_ends_the_run_normally() {
        let url = portal(ERROR_PAGE).await;
        let dir = tempfile::tempdir().unwrap();
        let service = ScrapeService::new(test_config(url, dir.path()));

        service.run().await.unwrap();

        let capture = dir.path().join(storage::ERROR_PAGE_FILE);
        assert!(capture.exists());
        assert!(find_file(dir.path(), storage::LISTING_PREFIX).is_none());
        assert!(find_file(dir.path(), "run_summary_").is_none());
    }

    #[tokio::test]
    async fn empty_listing_is_captured_without_a_summary() {
        const EMPTY: &str = r#"
            <html><body><table id="CourseList">
                <tr><th>Course</th><th>Title</th></tr>
            </table></body></html>
        "#;
        let url = portal(EMPTY).await;
        let dir = tempfile::tempdir().unwrap();
        let service = ScrapeService::new(test_config(url, dir.path()));

        service.run().await.unwrap();

        assert!(dir.path().join(storage::RESPONSE_FILE).exists());
        assert!(find_file(dir.path(), storage::LISTING_PREFIX).is_none());
    }

    #[tokio::test]
    async fn missing_state_token_aborts_before_any_submission() {
        let handler = || async { "<html><body>no hidden inputs</body></html>" };
        let app = Router::new().route("/CourseSchedule.aspx", get(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let url = format!("http://{addr}/CourseSchedule.aspx");

        let dir = tempfile::tempdir().unwrap();
        let service = ScrapeService::new(test_config(url, dir.path()));

        let err = service.run().await.unwrap_err();
        assert!(err.to_string().contains("__VIEWSTATE"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
