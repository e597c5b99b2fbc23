//! Orchestration of the four-stage workflow over the engine.
//!
//! Each function re-derives everything it needs from the inputs it is
//! handed: the engine holds no state between calls, so a session can be
//! resumed at any stage by re-supplying that stage's persisted inputs.
//! A failed stage leaves the session exactly where it was.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use recount_core::{Aggregate, DomainError, DomainResult};
use recount_engine::{
    AggregatedLine, AuditAction, AuditFact, DistributionReport, EngineWarning, ExtractStatistics,
    FinalRow, TemplateRow, ValidationError, aggregate_rows, distribute_gap, final_rows,
    template_rows, validate_extract,
};
use recount_extract::{DepotContext, LineKey, MaskExtract, ResolvedMaskMetadata, StockRow};

use crate::reconciliation::{
    OpenSession, Reconciliation, ReconciliationCommand, ReconciliationEvent, ReconciliationId,
    RecordCompletion, RecordImport, RecordTemplateIssued,
};

/// An audit fact stamped with business time, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub details: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_fact(fact: AuditFact, recorded_at: DateTime<Utc>) -> Self {
        Self {
            action: fact.action,
            details: fact.detail,
            recorded_at,
        }
    }
}

fn stamp(facts: Vec<AuditFact>, at: DateTime<Utc>) -> Vec<AuditEntry> {
    facts
        .into_iter()
        .map(|fact| AuditEntry::from_fact(fact, at))
        .collect()
}

/// Open a new session at stage 1 with its depot context chosen.
pub fn open_session(
    id: ReconciliationId,
    name: impl Into<String>,
    context: DepotContext,
    occurred_at: DateTime<Utc>,
) -> DomainResult<(Reconciliation, Vec<ReconciliationEvent>)> {
    let mut session = Reconciliation::empty(id);
    let events = session.handle(&ReconciliationCommand::OpenSession(OpenSession {
        session_id: id,
        name: name.into(),
        context,
        occurred_at,
    }))?;
    for event in &events {
        session.apply(event);
    }
    Ok((session, events))
}

/// Outcome of a successful import (stage 1 → 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub stats: ExtractStatistics,
    pub metadata: ResolvedMaskMetadata,
    pub events: Vec<ReconciliationEvent>,
}

/// A rejected import. The session is untouched; quarantine audit
/// entries (if any) ride along so the caller can persist them even
/// though the import failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRejection {
    pub error: DomainError,
    pub entries: Vec<AuditEntry>,
}

impl From<DomainError> for ImportRejection {
    fn from(error: DomainError) -> Self {
        Self {
            error,
            entries: Vec::new(),
        }
    }
}

/// Stage 1 → 2: validate the uploaded extract against the session's
/// depot context.
pub fn import_extract(
    session: &mut Reconciliation,
    mask: &MaskExtract,
    occurred_at: DateTime<Utc>,
) -> Result<ImportOutcome, ImportRejection> {
    let context = session
        .context()
        .ok_or_else(|| DomainError::conflict("session has no depot context"))?;

    let stats = validate_extract(&mask.rows, context).map_err(|err| match err {
        ValidationError::Quarantine { facts } => {
            let entries = stamp(facts.clone(), occurred_at);
            ImportRejection {
                error: ValidationError::Quarantine { facts }.into(),
                entries,
            }
        }
        other => ImportRejection {
            error: other.into(),
            entries: Vec::new(),
        },
    })?;

    let events = session.handle(&ReconciliationCommand::RecordImport(RecordImport {
        session_id: session.id_typed(),
        stats,
        occurred_at,
    }))?;
    for event in &events {
        session.apply(event);
    }

    Ok(ImportOutcome {
        stats,
        metadata: mask.metadata.resolve(occurred_at),
        events,
    })
}

/// Outcome of issuing the counting template (stage 2 → 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOutcome {
    pub lines: Vec<AggregatedLine>,
    pub template: Vec<TemplateRow>,
    pub warnings: Vec<EngineWarning>,
    pub events: Vec<ReconciliationEvent>,
}

/// Stage 2 → 3: aggregate the validated rows and emit the template the
/// operator fills with counted quantities.
pub fn issue_template(
    session: &mut Reconciliation,
    rows: &[StockRow],
    occurred_at: DateTime<Utc>,
) -> DomainResult<TemplateOutcome> {
    let report = aggregate_rows(rows)?;
    let template = template_rows(&report.lines);

    let events = session.handle(&ReconciliationCommand::RecordTemplateIssued(
        RecordTemplateIssued {
            session_id: session.id_typed(),
            line_count: report.lines.len(),
            occurred_at,
        },
    ))?;
    for event in &events {
        session.apply(event);
    }

    Ok(TemplateOutcome {
        lines: report.lines,
        template,
        warnings: report.warnings,
        events,
    })
}

/// Outcome of the final stage (3 → 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub final_rows: Vec<FinalRow>,
    pub reports: Vec<DistributionReport>,
    pub entries: Vec<AuditEntry>,
    pub warnings: Vec<EngineWarning>,
    pub events: Vec<ReconciliationEvent>,
}

/// Stage 3 → 4: re-aggregate the re-supplied extract rows, distribute
/// every line's counted-vs-theoretical gap and emit the corrected rows.
///
/// Lines with no matching counted row fall back to a count of zero;
/// counted rows matching no line are ignored.
pub fn complete(
    session: &mut Reconciliation,
    rows: &[StockRow],
    counts: &[TemplateRow],
    occurred_at: DateTime<Utc>,
) -> DomainResult<CompletionOutcome> {
    let aggregation = aggregate_rows(rows)?;
    let mut warnings = aggregation.warnings;

    let counted_by_key: HashMap<LineKey, Decimal> = counts
        .iter()
        .map(|row| (row.key(), row.counted_or_zero()))
        .collect();

    let mut corrected: Vec<FinalRow> = Vec::new();
    let mut reports: Vec<DistributionReport> = Vec::new();
    let mut entries: Vec<AuditEntry> = Vec::new();
    let mut adjusted_lines = 0usize;
    let mut unresolved_lines = 0usize;

    for line in &aggregation.lines {
        let counted = counted_by_key
            .get(&line.key)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let report = distribute_gap(line, counted)?;

        if !report.gap.is_zero() || report.adjustment_lot.is_some() {
            adjusted_lines += 1;
        }
        if report.residual > Decimal::ZERO {
            unresolved_lines += 1;
        }

        corrected.extend(final_rows(line, &report));
        entries.extend(stamp(report.facts.clone(), occurred_at));
        warnings.extend(report.warnings.clone());
        reports.push(report);
    }

    let events = session.handle(&ReconciliationCommand::RecordCompletion(RecordCompletion {
        session_id: session.id_typed(),
        line_count: aggregation.lines.len(),
        adjusted_lines,
        unresolved_lines,
        occurred_at,
    }))?;
    for event in &events {
        session.apply(event);
    }

    tracing::info!(
        session = %session.id_typed(),
        lines = aggregation.lines.len(),
        adjusted = adjusted_lines,
        unresolved = unresolved_lines,
        "reconciliation completed"
    );

    Ok(CompletionOutcome {
        final_rows: corrected,
        reports,
        entries,
        warnings,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::WorkflowStage;
    use recount_core::AggregateId;
    use recount_extract::{MaskMetadata, StockStatus};
    use rust_decimal_macros::dec;

    fn test_session_id() -> ReconciliationId {
        ReconciliationId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn row(product: &str, lot: &str, status: StockStatus, qty: Decimal) -> StockRow {
        StockRow::new(product, "A-01", status, lot, qty, "UN").unwrap()
    }

    fn mask(rows: Vec<StockRow>) -> MaskExtract {
        MaskExtract {
            metadata: MaskMetadata {
                session_number: Some("SES001".to_string()),
                inventory_number: Some("INV001".to_string()),
                site: Some("DEPOT_A".to_string()),
            },
            rows,
        }
    }

    fn conforme_rows() -> Vec<StockRow> {
        vec![
            row("ART001", "LOT010124", StockStatus::A, dec!(10)),
            row("ART001", "LOT010324", StockStatus::A, dec!(5)),
            row("ART002", "LOT150224", StockStatus::Am, dec!(8)),
        ]
    }

    #[test]
    fn full_workflow_produces_corrected_rows() {
        let (mut session, events) = open_session(
            test_session_id(),
            "Janvier",
            DepotContext::Conforme,
            test_time(),
        )
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(session.stage(), WorkflowStage::ContextSelected);

        let rows = conforme_rows();
        let import = import_extract(&mut session, &mask(rows.clone()), test_time()).unwrap();
        assert_eq!(session.stage(), WorkflowStage::ExtractImported);
        assert_eq!(import.stats.total_rows, 3);
        assert_eq!(import.stats.distinct_products, 2);
        assert_eq!(import.metadata.session_number, "SES001");

        let template = issue_template(&mut session, &rows, test_time()).unwrap();
        assert_eq!(session.stage(), WorkflowStage::AwaitingCounts);
        assert_eq!(template.template.len(), 2);
        assert!(template.template.iter().all(|t| t.counted_qty.is_none()));

        // Count 20 on the first line (surplus of 5), leave the second blank.
        let mut counts = template.template.clone();
        counts[0].counted_qty = Some(dec!(20));

        let completion = complete(&mut session, &rows, &counts, test_time()).unwrap();
        assert!(session.is_completed());

        // Surplus went to the most recent lot of ART001.
        let adjusted = completion
            .final_rows
            .iter()
            .find(|r| r.lot == "LOT010324")
            .unwrap();
        assert_eq!(adjusted.corrected_qty, dec!(10));

        // The blank count drained ART002 to zero.
        let drained = completion
            .final_rows
            .iter()
            .find(|r| r.product == "ART002")
            .unwrap();
        assert_eq!(drained.corrected_qty, Decimal::ZERO);

        // One final row per constituent lot.
        assert_eq!(completion.final_rows.len(), 3);
        assert!(
            completion
                .entries
                .iter()
                .any(|e| e.action == AuditAction::LotExhausted)
        );
    }

    #[test]
    fn quarantine_rejection_carries_stamped_entries_and_leaves_stage() {
        let (mut session, _) = open_session(
            test_session_id(),
            "Janvier",
            DepotContext::Conforme,
            test_time(),
        )
        .unwrap();

        let rows = vec![
            row("ART001", "LOT010124", StockStatus::A, dec!(10)),
            row("ART002", "LQ", StockStatus::Q, dec!(1)),
        ];
        let rejection = import_extract(&mut session, &mask(rows), test_time()).unwrap_err();

        assert!(matches!(rejection.error, DomainError::Quarantine(_)));
        assert!(rejection.error.is_rejection());
        assert_eq!(rejection.entries.len(), 1);
        assert_eq!(rejection.entries[0].action, AuditAction::QuarantineDetected);
        assert_eq!(session.stage(), WorkflowStage::ContextSelected);
    }

    #[test]
    fn context_mismatch_rejection_has_no_entries() {
        let (mut session, _) = open_session(
            test_session_id(),
            "Janvier",
            DepotContext::NonConforme,
            test_time(),
        )
        .unwrap();

        let rejection =
            import_extract(&mut session, &mask(conforme_rows()), test_time()).unwrap_err();
        assert!(matches!(rejection.error, DomainError::ContextMismatch(_)));
        assert!(rejection.error.is_rejection());
        assert!(rejection.entries.is_empty());
        assert_eq!(session.stage(), WorkflowStage::ContextSelected);
    }

    #[test]
    fn import_cannot_run_twice() {
        let (mut session, _) = open_session(
            test_session_id(),
            "Janvier",
            DepotContext::Conforme,
            test_time(),
        )
        .unwrap();

        let rows = conforme_rows();
        import_extract(&mut session, &mask(rows.clone()), test_time()).unwrap();
        let rejection = import_extract(&mut session, &mask(rows), test_time()).unwrap_err();
        assert!(matches!(rejection.error, DomainError::Conflict(_)));
    }

    #[test]
    fn counted_rows_without_a_line_are_ignored() {
        let (mut session, _) = open_session(
            test_session_id(),
            "Janvier",
            DepotContext::Conforme,
            test_time(),
        )
        .unwrap();

        let rows = vec![row("ART001", "LOT010124", StockStatus::A, dec!(10))];
        import_extract(&mut session, &mask(rows.clone()), test_time()).unwrap();
        let template = issue_template(&mut session, &rows, test_time()).unwrap();

        let mut counts = template.template.clone();
        counts[0].counted_qty = Some(dec!(10));
        counts.push(TemplateRow {
            product: "GHOST".to_string(),
            location: "Z-99".to_string(),
            theoretical_qty: dec!(1),
            counted_qty: Some(dec!(4)),
            unit: "UN".to_string(),
        });

        let completion = complete(&mut session, &rows, &counts, test_time()).unwrap();
        assert_eq!(completion.final_rows.len(), 1);
        assert_eq!(completion.final_rows[0].corrected_qty, dec!(10));
        assert!(completion.entries.is_empty());
    }
}
