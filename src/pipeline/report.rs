// src/pipeline/report.rs

//! Markdown summary of the registry.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::{EndpointRecord, Registry, is_official};

/// Headline counts shown at the top of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportCounts {
    pub official: usize,
    pub third_party: usize,
    /// Third-party endpoints known not to require an invite code
    pub open_third_party: usize,
}

impl ReportCounts {
    pub fn from_registry(registry: &Registry, official_suffix: &str) -> Self {
        registry
            .endpoints
            .iter()
            .fold(Self::default(), |mut counts, endpoint| {
                if is_official(&endpoint.url, official_suffix) {
                    counts.official += 1;
                } else {
                    counts.third_party += 1;
                    if endpoint.invite_code_required == Some(false) {
                        counts.open_third_party += 1;
                    }
                }
                counts
            })
    }
}

/// Render the registry as the human-readable report.
pub fn render_report(
    registry: &Registry,
    run_time: DateTime<Utc>,
    official_suffix: &str,
    registry_file: &str,
) -> String {
    let counts = ReportCounts::from_registry(registry, official_suffix);
    let term_start = registry
        .started_at
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string());

    let mut out = String::new();
    out.push_str("# PDS list\n\n");
    out.push_str(
        "AT Protocol personal data servers seen in the PLC directory log. \
         This list is partial, not exhaustive.\n",
    );
    out.push_str(&format!("JSON file is [here](./{registry_file}).\n\n"));
    out.push_str(&format!(
        "Term: {} - {}\n\n",
        term_start,
        run_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    out.push_str("| | Count |\n|---|---:|\n");
    out.push_str(&format!("| Official | {} |\n", counts.official));
    out.push_str(&format!("| Third-party | {} |\n", counts.third_party));
    out.push_str(&format!(
        "| Third-party, no invite code | {} |\n\n",
        counts.open_third_party
    ));

    out.push_str("| URL | Invite code | Phone verification |\n|---|---|---|\n");
    for endpoint in &registry.endpoints {
        out.push_str(&row(endpoint));
    }

    out
}

fn row(endpoint: &EndpointRecord) -> String {
    format!(
        "| {} | {} | {} |\n",
        endpoint.url,
        requirement(endpoint.invite_code_required),
        requirement(endpoint.phone_verification_required)
    )
}

fn requirement(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "required",
        Some(false) => "-",
        None => "?",
    }
}
