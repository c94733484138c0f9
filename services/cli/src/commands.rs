use crate::cli::{ConnectionArgs, OutputArgs};
use crate::infra::{client_config, declared_media_type, parse_status};
use chrono::Local;
use clap::Args;
use securekyc::config::AppConfig;
use securekyc::error::AppError;
use securekyc::telemetry;
use securekyc::workflows::kyc::{
    AdminView, ApplicantForm, AttemptState, DocumentFile, DocumentPolicy, Finding,
    FormAvailability, HistoryView, HttpVerificationGateway, KycStatus, KycWorkflow,
    SubmissionError, SubmissionIntent, SubmissionMode, VerificationGateway, VerificationResult,
    WorkflowEntry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct SubmitArgs {
    /// Identity document to submit (JPG, PNG or PDF, at most 2MB)
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Full name as printed on the document
    #[arg(long)]
    pub(crate) name: String,
    /// 12-digit Aadhaar number
    #[arg(long)]
    pub(crate) id_number: String,
    /// District of residence
    #[arg(long)]
    pub(crate) district: String,
    /// Applicant age in years
    #[arg(long)]
    pub(crate) age: u32,
    /// Resubmit after a rejection instead of starting a new submission
    #[arg(long)]
    pub(crate) resubmit: bool,
    /// Declared media type; guessed from the file extension when omitted
    #[arg(long)]
    pub(crate) media_type: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct AdminArgs {
    /// Only list records with this status
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<KycStatus>,
    /// Print the raw JSON view instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

fn connect(
    connection: ConnectionArgs,
) -> Result<(AppConfig, Arc<HttpVerificationGateway>), AppError> {
    let config = client_config(connection)?;
    telemetry::init(&config.telemetry)?;
    let gateway = Arc::new(HttpVerificationGateway::new(&config.api)?);
    Ok((config, gateway))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))?;
    println!("{rendered}");
    Ok(())
}

pub(crate) async fn run_status(
    connection: ConnectionArgs,
    args: OutputArgs,
) -> Result<(), AppError> {
    let (_, gateway) = connect(connection)?;
    let workflow = KycWorkflow::new(
        gateway,
        DocumentPolicy::default(),
        SubmissionIntent::Resubmit,
    );
    let entry = workflow.enter().await?;

    if args.json {
        return print_json(&entry);
    }
    for line in status_lines(&entry) {
        println!("{line}");
    }
    Ok(())
}

fn status_lines(entry: &WorkflowEntry) -> Vec<String> {
    let mut lines = vec![format!("Status: {}", entry.state.status.label())];
    if entry.state.status != KycStatus::None {
        lines.push(format!(
            "Attempts used: {} of {}",
            entry.state.attempt_number, entry.state.max_attempts
        ));
    }

    let next = match (&entry.availability, entry.attempt_display) {
        (FormAvailability::Closed { reason }, _) => reason.clone(),
        (FormAvailability::Open, _) if entry.state.status == KycStatus::None => {
            "Next: submit a document".to_string()
        }
        (FormAvailability::Open, Some(display)) if entry.state.resubmission_available() => {
            format!("Next: resubmit ({display})")
        }
        (FormAvailability::Open, _) => "Next: no action required".to_string(),
    };
    lines.push(next);
    lines
}

pub(crate) async fn run_submit(
    connection: ConnectionArgs,
    args: SubmitArgs,
) -> Result<(), AppError> {
    let (config, gateway) = connect(connection)?;
    let intent = if args.resubmit {
        SubmissionIntent::Resubmit
    } else {
        SubmissionIntent::FirstSubmission
    };
    let workflow = KycWorkflow::new(gateway, DocumentPolicy::default(), intent);

    let entry = workflow.enter().await?;
    info!(api = %config.api.base_url, mode = entry.mode.path(), "starting verification run");
    if let FormAvailability::Closed { reason } = &entry.availability {
        println!("{reason}");
        return Err(SubmissionError::MaxAttemptsReached.into());
    }
    if let Some(display) = entry.attempt_display {
        println!("{display}");
    }

    let content = tokio::fs::read(&args.file).await?;
    let filename = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document")
        .to_string();
    let media_type = declared_media_type(&args.file, args.media_type.as_deref());

    let receipt = workflow
        .select_document(DocumentFile::new(filename, media_type, content))
        .await?;
    println!(
        "{} ({}, {} bytes)",
        receipt.message,
        receipt.media_type.label(),
        receipt.byte_len
    );

    workflow.upload(&args.name).await?;
    println!("Document uploaded. Findings:");
    for line in finding_lines(&workflow.findings()) {
        println!("  {line}");
    }

    let form = ApplicantForm {
        name: args.name,
        id_number: args.id_number,
        district: args.district,
        age: args.age,
    };
    let result = workflow.submit(&form).await?;
    for line in result_lines(&result) {
        println!("{line}");
    }
    if result.status == KycStatus::Rejected {
        let state = workflow.attempt_state().await?;
        if let Some(hint) = resubmit_hint(&state) {
            println!("{hint}");
        }
    }
    Ok(())
}

/// Points at the resubmit path while the account still has attempts left.
fn resubmit_hint(state: &AttemptState) -> Option<String> {
    if !state.resubmission_available() {
        return None;
    }
    state
        .display_attempt(SubmissionMode::Resubmit)
        .map(|display| format!("Resubmit with --resubmit ({display})"))
}

fn finding_lines(findings: &[Finding]) -> Vec<String> {
    findings
        .iter()
        .map(|finding| {
            let marker = if finding.passed { "ok" } else { "!!" };
            format!("[{marker}] {}", finding.message)
        })
        .collect()
}

fn result_lines(result: &VerificationResult) -> Vec<String> {
    let mut lines = vec![
        format!("Verification status: {}", result.status.label()),
        format!("Risk score: {}", result.risk_score),
        format!("District risk: {}", result.district_risk),
    ];
    if let Some(attempt) = result.attempt_number {
        lines.push(format!("Attempt: {attempt}"));
    }
    lines.extend(result.reasons.iter().map(|reason| format!("  - {reason}")));
    lines
}

pub(crate) async fn run_history(
    connection: ConnectionArgs,
    args: OutputArgs,
) -> Result<(), AppError> {
    let (_, gateway) = connect(connection)?;
    let view = gateway.history().await?;

    if args.json {
        return print_json(&view);
    }
    for line in history_lines(&view) {
        println!("{line}");
    }
    Ok(())
}

fn history_lines(view: &HistoryView) -> Vec<String> {
    let mut lines = vec![format!(
        "{} submissions: {} approved, {} in review, {} rejected",
        view.total, view.approved, view.review, view.rejected
    )];
    lines.extend(view.records.iter().map(|record| {
        format!(
            "  #{} {} {} ({}, age {}) risk {}",
            record
                .attempt_number
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
            record.status.label(),
            record.name,
            record.district,
            record.age,
            record
                .risk_score
                .map_or_else(|| "n/a".to_string(), |score| score.to_string()),
        )
    }));
    lines
}

pub(crate) async fn run_admin(
    connection: ConnectionArgs,
    args: AdminArgs,
) -> Result<(), AppError> {
    let (_, gateway) = connect(connection)?;
    let view = gateway.all_records().await?;

    if args.json {
        return print_json(&view);
    }
    for line in admin_lines(&view, args.status) {
        println!("{line}");
    }
    Ok(())
}

fn admin_lines(view: &AdminView, status: Option<KycStatus>) -> Vec<String> {
    let mut lines = vec![format!(
        "{} submissions: {} approved, {} in review, {} rejected",
        view.total, view.approved, view.review, view.rejected
    )];
    lines.extend(view.records_with_status(status).into_iter().map(|record| {
        let submitted = record.submission_date.map_or_else(
            || "unknown date".to_string(),
            |date| date.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        );
        format!(
            "  {} {} <{}> {} attempt {} submitted {}",
            record.status.label(),
            record.name,
            record.email,
            record.district,
            record
                .attempt_number
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
            submitted,
        )
    }));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use securekyc::workflows::kyc::{AdminRecord, HistoryRecord};

    fn entry(state: AttemptState, mode: SubmissionMode) -> WorkflowEntry {
        WorkflowEntry {
            state,
            mode,
            attempt_display: state.display_attempt(mode),
            availability: state.availability(),
        }
    }

    #[test]
    fn status_lines_describe_the_next_action() {
        let fresh = entry(AttemptState::none(), SubmissionMode::Submit);
        assert_eq!(
            status_lines(&fresh),
            vec!["Status: NONE", "Next: submit a document"]
        );

        let rejected = AttemptState::observed(KycStatus::Rejected, 1);
        let lines = status_lines(&entry(rejected, SubmissionMode::Resubmit));
        assert_eq!(lines[1], "Attempts used: 1 of 3");
        assert_eq!(lines[2], "Next: resubmit (Attempt 2 of 3)");

        let exhausted = AttemptState::observed(KycStatus::Rejected, 3);
        let lines = status_lines(&entry(exhausted, SubmissionMode::Submit));
        assert_eq!(
            lines[2],
            "Maximum resubmission attempts reached. Please contact support."
        );
    }

    #[test]
    fn rejection_hint_offers_resubmission_until_the_cap() {
        assert_eq!(
            resubmit_hint(&AttemptState::observed(KycStatus::Rejected, 1)).as_deref(),
            Some("Resubmit with --resubmit (Attempt 2 of 3)")
        );
        assert_eq!(
            resubmit_hint(&AttemptState::observed(KycStatus::Rejected, 2)).as_deref(),
            Some("Resubmit with --resubmit (Attempt 3 of 3)")
        );
        assert_eq!(
            resubmit_hint(&AttemptState::observed(KycStatus::Rejected, 3)),
            None
        );
        assert_eq!(
            resubmit_hint(&AttemptState::observed(KycStatus::Approved, 1)),
            None
        );
    }

    #[test]
    fn findings_are_marked_by_outcome() {
        let lines = finding_lines(&[
            Finding {
                passed: true,
                message: "Name found in document".to_string(),
            },
            Finding {
                passed: false,
                message: "blurry".to_string(),
            },
        ]);
        assert_eq!(lines, vec!["[ok] Name found in document", "[!!] blurry"]);
    }

    #[test]
    fn result_lines_list_reasons() {
        let result = VerificationResult {
            status: KycStatus::Review,
            risk_score: 45.0,
            district_risk: 15.0,
            reasons: vec!["Unknown district: Atlantis".to_string()],
            attempt_number: Some(2),
        };

        let lines = result_lines(&result);
        assert_eq!(lines[0], "Verification status: REVIEW");
        assert_eq!(lines[3], "Attempt: 2");
        assert_eq!(lines[4], "  - Unknown district: Atlantis");
    }

    #[test]
    fn history_lines_summarize_counts() {
        let view = HistoryView {
            total: 1,
            approved: 0,
            review: 0,
            rejected: 1,
            records: vec![HistoryRecord {
                name: "Asha Rao".to_string(),
                district: "Chennai".to_string(),
                age: 34,
                risk_score: Some(60.0),
                status: KycStatus::Rejected,
                attempt_number: Some(1),
            }],
        };

        let lines = history_lines(&view);
        assert_eq!(lines[0], "1 submissions: 0 approved, 0 in review, 1 rejected");
        assert_eq!(lines[1], "  #1 REJECTED Asha Rao (Chennai, age 34) risk 60");
    }

    #[test]
    fn admin_lines_apply_the_status_filter() {
        let record = |email: &str, status| AdminRecord {
            email: email.to_string(),
            name: "Applicant".to_string(),
            district: "Delhi".to_string(),
            age: 40,
            risk_score: Some(0.0),
            status,
            attempt_number: Some(1),
            submission_date: None,
        };
        let view = AdminView {
            total: 2,
            approved: 1,
            review: 0,
            rejected: 1,
            records: vec![
                record("a@sandbox.local", KycStatus::Approved),
                record("b@sandbox.local", KycStatus::Rejected),
            ],
        };

        let lines = admin_lines(&view, Some(KycStatus::Rejected));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("<b@sandbox.local>"));
        assert!(lines[1].ends_with("submitted unknown date"));
        assert_eq!(admin_lines(&view, None).len(), 3);
    }
}
