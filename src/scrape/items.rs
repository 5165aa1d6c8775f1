use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::Client;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::scrape::forms::Payload;
use crate::scrape::models::{FetchOutcome, FetchResult, Record};

/// Fetches the detail page for every record with a resolved postback
/// target, saving each raw response under `detail_dir`.
///
/// One item's failure never stops the loop; the outcome is recorded and
/// the next record is attempted. The delay is awaited after every attempt
/// to keep the request rate bounded. Records without a target are logged
/// and skipped without producing a result.
pub async fn fetch_items(
    client: &Client,
    url: &str,
    payload: &Payload,
    records: &[Record],
    detail_dir: &Path,
    delay: Duration,
) -> anyhow::Result<Vec<FetchResult>> {
    tokio::fs::create_dir_all(detail_dir).await?;

    let mut results = Vec::new();
    for record in records {
        let course = record.course_id().to_string();

        let Some(target) = record.postback_target.as_deref() else {
            warn!(course, "no postback target on row, skipping detail fetch");
            continue;
        };

        info!(course, target, "fetching detail page");
        let outcome =
            match fetch_one(client, url, &payload.for_item(target), &course, detail_dir).await
            {
                Ok((saved_path, bytes)) => {
                    info!(course, bytes, path = %saved_path.display(), "detail saved");
                    FetchOutcome::Success { saved_path, bytes }
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    error!(course, error, "detail fetch failed");
                    FetchOutcome::Failure { error }
                }
            };
        results.push(FetchResult { course, outcome });

        // rate limit applies whether the attempt succeeded or not
        sleep(delay).await;
    }

    Ok(results)
}

async fn fetch_one(
    client: &Client,
    url: &str,
    payload: &Payload,
    course: &str,
    detail_dir: &Path,
) -> anyhow::Result<(PathBuf, usize)> {
    let res = client.post(url).form(payload.fields()).send().await?;
    let status = res.status();
    if !status.is_success() {
        anyhow::bail!("unexpected status {status}");
    }
    let body = res.text().await?;

    // nanosecond stamp keeps names unique even for back-to-back fetches
    // of the same course
    let filename = format!(
        "{}_{}.html",
        sanitize(course),
        Utc::now().format("%Y%m%d_%H%M%S_%f")
    );
    let path = detail_dir.join(filename);
    tokio::fs::write(&path, &body).await?;

    Ok((path, body.len()))
}

fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.chars().all(|c| c == '_') {
        "item".to_string()
    } else {
        cleaned
    }
}
