use reqwest::Client;

use crate::scrape::forms::Payload;

/// Identifies this scraper to the schedule portal on every request.
const USER_AGENT: &str = "PctScheduleScraper/1.0 (course schedule export)";

/// Builds the HTTP client shared across one run. The cookie store carries
/// the portal's session cookie between the landing GET and the postbacks.
pub fn build_client() -> anyhow::Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .build()?;
    Ok(client)
}

pub async fn fetch_html(client: &Client, url: &str) -> anyhow::Result<String> {
    let res = client.get(url).send().await?;
    Ok(res.error_for_status()?.text().await?)
}

pub async fn submit_form(
    client: &Client,
    url: &str,
    payload: &Payload,
) -> anyhow::Result<String> {
    let res = client.post(url).form(payload.fields()).send().await?;
    Ok(res.error_for_status()?.text().await?)
}
