//! Configurable heuristic for characterizing responses to unauthorized
//! requests, composed from status codes and header/body patterns.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::GatecheckError;
use crate::scanner::AuthorizationDetector;
use crate::site::RecordedResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    And,
    #[default]
    Or,
}

/// Declarative form of a [`ResponseMatcher`], as it appears in session files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMatcherConfig {
    /// Status codes that indicate an unauthorized response (e.g. 401, 403).
    #[serde(default)]
    pub status_codes: Vec<u16>,
    /// Pattern matched against response header lines.
    #[serde(default)]
    pub header_pattern: Option<String>,
    /// Pattern matched against the response body.
    #[serde(default)]
    pub body_pattern: Option<String>,
    #[serde(default)]
    pub operator: MatchOperator,
}

impl ResponseMatcherConfig {
    /// Common default: 401/403 responses are unauthorized.
    pub fn status_defaults() -> Self {
        Self {
            status_codes: vec![401, 403],
            ..Self::default()
        }
    }
}

/// Compiled authorization-detection heuristic.
pub struct ResponseMatcher {
    status_codes: Vec<u16>,
    header_regex: Option<Regex>,
    body_regex: Option<Regex>,
    operator: MatchOperator,
}

impl ResponseMatcher {
    pub fn from_config(config: &ResponseMatcherConfig) -> Result<Self, GatecheckError> {
        let compile = |pattern: &Option<String>| -> Result<Option<Regex>, GatecheckError> {
            pattern
                .as_deref()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        GatecheckError::Config(format!("invalid detection pattern '{p}': {e}"))
                    })
                })
                .transpose()
        };
        Ok(Self {
            status_codes: config.status_codes.clone(),
            header_regex: compile(&config.header_pattern)?,
            body_regex: compile(&config.body_pattern)?,
            operator: config.operator,
        })
    }
}

impl AuthorizationDetector for ResponseMatcher {
    fn is_unauthorized_response(&self, response: &RecordedResponse) -> bool {
        let mut checks = Vec::new();
        if !self.status_codes.is_empty() {
            checks.push(self.status_codes.contains(&response.status));
        }
        if let Some(regex) = &self.header_regex {
            checks.push(
                response
                    .headers
                    .iter()
                    .any(|(k, v)| regex.is_match(&format!("{k}: {v}"))),
            );
        }
        if let Some(regex) = &self.body_regex {
            checks.push(regex.is_match(&response.body));
        }

        // Without any configured criterion every response is authorized.
        if checks.is_empty() {
            return false;
        }
        match self.operator {
            MatchOperator::And => checks.iter().all(|&c| c),
            MatchOperator::Or => checks.iter().any(|&c| c),
        }
    }
}
