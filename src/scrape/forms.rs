use scraper::{Html, Selector};

use crate::config::Config;
use crate::scrape::models::ScrapeError;

pub const VIEWSTATE: &str = "__VIEWSTATE";
pub const VIEWSTATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_TARGET: &str = "__EVENTTARGET";

/// Server-side control the bulk search postback names as its event target.
const SEARCH_TRIGGER: &str = "_ctl0$PlaceHolderMain$_ctl0$btnSearch";

/// The two opaque values the portal renders into every page and expects
/// echoed back verbatim on each submission.
#[derive(Debug, Clone)]
pub struct FormState {
    pub viewstate: String,
    pub generator: String,
}

/// Recovers the hidden state inputs from the landing page. Either one
/// missing means the portal markup changed; no submission can succeed, so
/// this is fatal to the run.
pub fn extract_form_state(html: &str) -> Result<FormState, ScrapeError> {
    let doc = Html::parse_document(html);

    let viewstate = hidden_input_value(&doc, VIEWSTATE)
        .ok_or(ScrapeError::MissingStateToken { name: VIEWSTATE })?;
    let generator = hidden_input_value(&doc, VIEWSTATE_GENERATOR)
        .ok_or(ScrapeError::MissingStateToken {
            name: VIEWSTATE_GENERATOR,
        })?;

    Ok(FormState {
        viewstate,
        generator,
    })
}

fn hidden_input_value(doc: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!("input[name=\"{name}\"]")).unwrap();
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::to_string)
}

/// Complete form body for one submission, in field order.
#[derive(Debug, Clone)]
pub struct Payload {
    fields: Vec<(String, String)>,
}

impl Payload {
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Clone of this payload retargeted at a single row's postback control.
    pub fn for_item(&self, target: &str) -> Payload {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| {
                if name == EVENT_TARGET {
                    (name.clone(), target.to_string())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect();
        Payload { fields }
    }
}

/// Assembles the bulk search submission: all days of the week, the full
/// 0-23 time range, every delivery method, empty keyword and code filters.
pub fn build_search_payload(state: &FormState, cfg: &Config) -> Payload {
    let owned = |pairs: &[(&str, &str)]| {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>()
    };

    let fields = owned(&[
        (VIEWSTATE, &state.viewstate),
        (VIEWSTATE_GENERATOR, &state.generator),
        (EVENT_TARGET, SEARCH_TRIGGER),
        ("__EVENTARGUMENT", ""),
        ("__LASTFOCUS", ""),
        ("_ctl0:PlaceHolderMain:_ctl0:cbCampus", &cfg.campus),
        ("_ctl0:PlaceHolderMain:_ctl0:cbTerm", &cfg.term),
        ("_ctl0:PlaceHolderMain:_ctl0:txtKeyword", ""),
        ("_ctl0:PlaceHolderMain:_ctl0:chkMo", "on"),
        ("_ctl0:PlaceHolderMain:_ctl0:chkTu", "on"),
        ("_ctl0:PlaceHolderMain:_ctl0:chkWe", "on"),
        ("_ctl0:PlaceHolderMain:_ctl0:chkTh", "on"),
        ("_ctl0:PlaceHolderMain:_ctl0:chkFr", "on"),
        ("_ctl0:PlaceHolderMain:_ctl0:chkSa", "on"),
        ("_ctl0:PlaceHolderMain:_ctl0:chkSu", "on"),
        ("_ctl0:PlaceHolderMain:_ctl0:txtCode", ""),
        ("_ctl0:PlaceHolderMain:_ctl0:Sections", "rbOC"),
        ("_ctl0:PlaceHolderMain:_ctl0:cbLowTime", "0"),
        ("_ctl0:PlaceHolderMain:_ctl0:cbHighTime", "23"),
        (
            "_ctl0:PlaceHolderMain:_ctl0:chbDeliveryMethod:chbDeliveryMethod_0",
            "on",
        ),
        (
            "_ctl0:PlaceHolderMain:_ctl0:chbDeliveryMethod:chbDeliveryMethod_1",
            "on",
        ),
        (
            "_ctl0:PlaceHolderMain:_ctl0:chbDeliveryMethod:chbDeliveryMethod_2",
            "on",
        ),
        (
            "_ctl0:PlaceHolderMain:_ctl0:chbDeliveryMethod:chbDeliveryMethod_3",
            "on",
        ),
        (
            "_ctl0:PlaceHolderMain:_ctl0:chbDeliveryMethod:chbDeliveryMethod_4",
            "on",
        ),
    ]);

    Payload { fields }
}
