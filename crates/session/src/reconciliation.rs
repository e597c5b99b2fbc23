use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recount_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use recount_engine::ExtractStatistics;
use recount_events::Event;
use recount_extract::DepotContext;

/// Reconciliation session identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReconciliationId(pub AggregateId);

impl ReconciliationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReconciliationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Workflow stage lifecycle. Transitions are strictly forward and only
/// ever triggered by successful completion of the matching engine stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// A depot context has been chosen; waiting for the extract.
    ContextSelected,
    /// The extract passed validation.
    ExtractImported,
    /// The counting template went out; waiting for counted quantities.
    AwaitingCounts,
    /// The corrected rows were produced. Terminal.
    Completed,
}

impl WorkflowStage {
    /// 1-based stage number surfaced in session listings.
    pub fn number(&self) -> u8 {
        match self {
            Self::ContextSelected => 1,
            Self::ExtractImported => 2,
            Self::AwaitingCounts => 3,
            Self::Completed => 4,
        }
    }
}

/// Aggregate root: a reconciliation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    id: ReconciliationId,
    name: String,
    context: Option<DepotContext>,
    stage: WorkflowStage,
    stats: Option<ExtractStatistics>,
    version: u64,
    created: bool,
}

impl Reconciliation {
    /// Create an empty, not-yet-opened instance for rehydration.
    pub fn empty(id: ReconciliationId) -> Self {
        Self {
            id,
            name: String::new(),
            context: None,
            stage: WorkflowStage::ContextSelected,
            stats: None,
            version: 0,
            created: false,
        }
    }

    /// Rebuild a session from an external snapshot (the session store
    /// persists stage, context and stats; events are not replayed).
    ///
    /// The version is derived from the stage so later commands still see
    /// a monotonically advanced aggregate.
    pub fn restore(
        id: ReconciliationId,
        name: impl Into<String>,
        context: DepotContext,
        stage: WorkflowStage,
        stats: Option<ExtractStatistics>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            context: Some(context),
            stage,
            stats,
            version: u64::from(stage.number()),
            created: true,
        }
    }

    pub fn id_typed(&self) -> ReconciliationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> Option<DepotContext> {
        self.context
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn stats(&self) -> Option<ExtractStatistics> {
        self.stats
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.stage, WorkflowStage::Completed)
    }
}

impl AggregateRoot for Reconciliation {
    type Id = ReconciliationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSession {
    pub session_id: ReconciliationId,
    pub name: String,
    pub context: DepotContext,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordImport. Records that the extract passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordImport {
    pub session_id: ReconciliationId,
    pub stats: ExtractStatistics,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordTemplateIssued. Records that aggregation produced the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTemplateIssued {
    pub session_id: ReconciliationId,
    pub line_count: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCompletion. Records that gaps were distributed and the
/// corrected rows emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCompletion {
    pub session_id: ReconciliationId,
    pub line_count: usize,
    pub adjusted_lines: usize,
    pub unresolved_lines: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationCommand {
    OpenSession(OpenSession),
    RecordImport(RecordImport),
    RecordTemplateIssued(RecordTemplateIssued),
    RecordCompletion(RecordCompletion),
}

/// Event: SessionOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOpened {
    pub session_id: ReconciliationId,
    pub name: String,
    pub context: DepotContext,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExtractValidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractValidated {
    pub session_id: ReconciliationId,
    pub stats: ExtractStatistics,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TemplateIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIssued {
    pub session_id: ReconciliationId,
    pub line_count: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReconciliationCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCompleted {
    pub session_id: ReconciliationId,
    pub line_count: usize,
    pub adjusted_lines: usize,
    pub unresolved_lines: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationEvent {
    SessionOpened(SessionOpened),
    ExtractValidated(ExtractValidated),
    TemplateIssued(TemplateIssued),
    ReconciliationCompleted(ReconciliationCompleted),
}

impl Event for ReconciliationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconciliationEvent::SessionOpened(_) => "reconciliation.session.opened",
            ReconciliationEvent::ExtractValidated(_) => "reconciliation.extract.validated",
            ReconciliationEvent::TemplateIssued(_) => "reconciliation.template.issued",
            ReconciliationEvent::ReconciliationCompleted(_) => "reconciliation.session.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReconciliationEvent::SessionOpened(e) => e.occurred_at,
            ReconciliationEvent::ExtractValidated(e) => e.occurred_at,
            ReconciliationEvent::TemplateIssued(e) => e.occurred_at,
            ReconciliationEvent::ReconciliationCompleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Reconciliation {
    type Command = ReconciliationCommand;
    type Event = ReconciliationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReconciliationEvent::SessionOpened(e) => {
                self.id = e.session_id;
                self.name = e.name.clone();
                self.context = Some(e.context);
                self.stage = WorkflowStage::ContextSelected;
                self.created = true;
            }
            ReconciliationEvent::ExtractValidated(e) => {
                self.stats = Some(e.stats);
                self.stage = WorkflowStage::ExtractImported;
            }
            ReconciliationEvent::TemplateIssued(_) => {
                self.stage = WorkflowStage::AwaitingCounts;
            }
            ReconciliationEvent::ReconciliationCompleted(_) => {
                self.stage = WorkflowStage::Completed;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReconciliationCommand::OpenSession(cmd) => self.handle_open(cmd),
            ReconciliationCommand::RecordImport(cmd) => self.handle_import(cmd),
            ReconciliationCommand::RecordTemplateIssued(cmd) => self.handle_template(cmd),
            ReconciliationCommand::RecordCompletion(cmd) => self.handle_completion(cmd),
        }
    }
}

impl Reconciliation {
    fn ensure_session_id(&self, session_id: ReconciliationId) -> Result<(), DomainError> {
        if self.id != session_id {
            return Err(DomainError::invariant("session_id mismatch"));
        }
        Ok(())
    }

    fn ensure_stage(&self, expected: WorkflowStage) -> Result<(), DomainError> {
        if self.is_completed() {
            return Err(DomainError::conflict("session is complete and immutable"));
        }
        if self.stage != expected {
            return Err(DomainError::conflict(format!(
                "workflow stage is {} but the command requires {}",
                self.stage.number(),
                expected.number()
            )));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenSession) -> Result<Vec<ReconciliationEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("session already opened"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("session name cannot be empty"));
        }
        Ok(vec![ReconciliationEvent::SessionOpened(SessionOpened {
            session_id: cmd.session_id,
            name: cmd.name.clone(),
            context: cmd.context,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_import(&self, cmd: &RecordImport) -> Result<Vec<ReconciliationEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_stage(WorkflowStage::ContextSelected)?;

        Ok(vec![ReconciliationEvent::ExtractValidated(
            ExtractValidated {
                session_id: cmd.session_id,
                stats: cmd.stats,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_template(
        &self,
        cmd: &RecordTemplateIssued,
    ) -> Result<Vec<ReconciliationEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_stage(WorkflowStage::ExtractImported)?;

        if cmd.line_count == 0 {
            return Err(DomainError::validation(
                "cannot issue a template with no aggregated lines",
            ));
        }

        Ok(vec![ReconciliationEvent::TemplateIssued(TemplateIssued {
            session_id: cmd.session_id,
            line_count: cmd.line_count,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_completion(
        &self,
        cmd: &RecordCompletion,
    ) -> Result<Vec<ReconciliationEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_session_id(cmd.session_id)?;
        self.ensure_stage(WorkflowStage::AwaitingCounts)?;

        Ok(vec![ReconciliationEvent::ReconciliationCompleted(
            ReconciliationCompleted {
                session_id: cmd.session_id,
                line_count: cmd.line_count,
                adjusted_lines: cmd.adjusted_lines,
                unresolved_lines: cmd.unresolved_lines,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
