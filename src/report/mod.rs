//! Report over the last scan run's results: users sorted with the
//! unauthenticated identity first, results grouped per (URI, method).
//!
//! Report sort order is independent of scan order: the scan attacks the
//! unauthenticated identity last, the report lists it first.

use chrono::Utc;
use serde::Serialize;

use crate::rules::AccessRule;
use crate::scanner::{ScanOutcome, ScanResultEntry};
use crate::site::Context;
use crate::users::{display_name, UserIdentity, UNAUTHENTICATED_USER_ID};

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub context: String,
    pub generated_at: String,
    pub users: Vec<ReportUser>,
    pub results: Vec<UriResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UriResult {
    pub uri: String,
    pub method: String,
    pub entries: Vec<UserResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResult {
    pub user: String,
    pub authorized: bool,
    pub outcome: ScanOutcome,
    pub rule: AccessRule,
}

fn user_sort_key(user: Option<&UserIdentity>) -> (bool, i64) {
    // Unauthenticated first, then named users by id.
    match user {
        None => (false, UNAUTHENTICATED_USER_ID),
        Some(u) => (true, u.id),
    }
}

pub fn build_report(
    context: &Context,
    users: &[Option<UserIdentity>],
    results: &[ScanResultEntry],
) -> ScanReport {
    let mut sorted_users: Vec<Option<UserIdentity>> = users.to_vec();
    sorted_users.sort_by_key(|u| user_sort_key(u.as_ref()));
    let report_users = sorted_users
        .iter()
        .map(|u| ReportUser {
            id: u.as_ref().map_or(UNAUTHENTICATED_USER_ID, |u| u.id),
            name: display_name(u.as_ref()).to_string(),
        })
        .collect();

    // Group results per (URI, method) pair, preserving first-seen order
    // across groups; the entries within a group follow the same
    // unauthenticated-first order as the user list.
    let mut groups: Vec<UriResult> = Vec::new();
    for entry in results {
        if !groups
            .iter()
            .any(|g| g.uri == entry.uri && g.method == entry.method)
        {
            groups.push(UriResult {
                uri: entry.uri.clone(),
                method: entry.method.clone(),
                entries: Vec::new(),
            });
        }
    }
    for group in &mut groups {
        let mut entries: Vec<(&ScanResultEntry, (bool, i64))> = results
            .iter()
            .filter(|e| e.uri == group.uri && e.method == group.method)
            .map(|e| (e, user_sort_key(e.user.as_ref())))
            .collect();
        entries.sort_by_key(|(_, key)| *key);
        group.entries = entries
            .into_iter()
            .map(|(entry, _)| UserResult {
                user: display_name(entry.user.as_ref()).to_string(),
                authorized: entry.authorized,
                outcome: entry.outcome,
                rule: entry.rule,
            })
            .collect();
    }

    ScanReport {
        context: context.name.clone(),
        generated_at: Utc::now().to_rfc3339(),
        users: report_users,
        results: groups,
    }
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders the report as a standalone HTML page.
pub fn render_html(report: &ScanReport) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>Access Control Report - {}</title>\n",
        html_escape(&report.context)
    ));
    html.push_str(
        "<style>body{font-family:sans-serif}table{border-collapse:collapse}\
         td,th{border:1px solid #999;padding:4px 8px}\
         .valid{color:#2a7}.illegal{color:#c33}.unknown{color:#888}</style>\n",
    );
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!(
        "<h1>Access Control Report - {}</h1>\n",
        html_escape(&report.context)
    ));
    html.push_str(&format!("<p>Generated at {}</p>\n", report.generated_at));

    html.push_str("<table>\n<tr><th>URL</th><th>Method</th>");
    for user in &report.users {
        html.push_str(&format!("<th>{}</th>", html_escape(&user.name)));
    }
    html.push_str("</tr>\n");

    for result in &report.results {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td>",
            html_escape(&result.uri),
            html_escape(&result.method)
        ));
        for user in &report.users {
            match result.entries.iter().find(|e| e.user == user.name) {
                Some(entry) => {
                    let authorization = if entry.authorized {
                        "authorized"
                    } else {
                        "unauthorized"
                    };
                    html.push_str(&format!(
                        "<td class=\"{}\">{} ({}, rule: {})</td>",
                        entry.outcome.as_str(),
                        entry.outcome,
                        authorization,
                        entry.rule
                    ));
                }
                None => html.push_str("<td></td>"),
            }
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}
