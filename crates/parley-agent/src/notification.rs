// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bodies shared by every protocol family: acks and problem reports.

use parley_core::{AgentMessage, MessageType, ParleyError};
use serde::{Deserialize, Serialize};

/// Problem code used when an exchange cannot continue.
pub const ISSUANCE_ABANDONED: &str = "issuance-abandoned";
pub const PRESENTATION_ABANDONED: &str = "abandoned";
pub const REQUEST_NOT_ACCEPTED: &str = "request_not_accepted";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckStatus {
    #[default]
    Ok,
    Pending,
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckBody {
    pub status: AckStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDescription {
    pub code: String,
    pub en: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemReportBody {
    pub description: ProblemDescription,
}

impl ProblemReportBody {
    pub fn new(code: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            description: ProblemDescription {
                code: code.into(),
                en: en.into(),
            },
        }
    }

    /// The `errorMessage` recorded on an abandoned record.
    pub fn error_message(&self) -> String {
        format!("{}: {}", self.description.code, self.description.en)
    }
}

/// An ack on `thread_id`, typed within the family of `family_type`.
pub fn ack_message(family_type: &MessageType, thread_id: &str) -> Result<AgentMessage, ParleyError> {
    Ok(AgentMessage::new(&family_type.sibling("ack"), &AckBody::default())?.with_thread_id(thread_id))
}

/// A problem report on `thread_id`, typed within the family of `family_type`.
pub fn problem_report_message(
    family_type: &MessageType,
    thread_id: &str,
    code: &str,
    description: &str,
) -> Result<AgentMessage, ParleyError> {
    let report_type = family_type.sibling(problem_report_name(family_type));
    Ok(AgentMessage::new(&report_type, &ProblemReportBody::new(code, description))?
        .with_thread_id(thread_id))
}

/// Connection-era families spell it with an underscore.
fn problem_report_name(family_type: &MessageType) -> &'static str {
    match family_type.protocol_name.as_str() {
        "connections" | "didexchange" | "trust_ping" => "problem_report",
        _ => "problem-report",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_report_is_threaded_and_typed_per_family() {
        let offer = MessageType::didcomm("issue-credential", 2, 0, "offer-credential");
        let report = problem_report_message(&offer, "t1", ISSUANCE_ABANDONED, "no offer").unwrap();
        assert_eq!(
            report.message_type,
            "https://didcomm.org/issue-credential/2.0/problem-report"
        );
        assert_eq!(report.thread_id(), "t1");
        let body: ProblemReportBody = report.body().unwrap();
        assert_eq!(body.error_message(), "issuance-abandoned: no offer");

        let request = MessageType::didcomm("didexchange", 1, 0, "request");
        let report = problem_report_message(&request, "t2", "x", "y").unwrap();
        assert!(report.message_type.ends_with("/didexchange/1.0/problem_report"));
    }

    #[test]
    fn ack_serializes_status_uppercase() {
        let ack = ack_message(&MessageType::didcomm("present-proof", 1, 0, "presentation"), "t1")
            .unwrap();
        assert_eq!(ack.body.get("status").and_then(|v| v.as_str()), Some("OK"));
    }
}
