//! The tagged set of DDL requests and the envelope they are dispatched in.

use std::sync::Arc;

use granite_id::{DdlRequestId, ParticipantId, SequenceNumber, SessionId};
use serde::{Deserialize, Serialize};

/// The data type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// The column set of a table to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(columns: impl IntoIterator<Item = ColumnSpec>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }
}

/// A single step of an ALTER TABLE statement.
///
/// `DropColumn` carries the full column definition, not just the name, so
/// the inverse alter can be derived without consulting any catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlterOp {
    AddColumn(ColumnSpec),
    DropColumn(ColumnSpec),
    RenameTable { new_name: String },
}

impl AlterOp {
    /// The alter step undoing this one.
    pub fn inverse(&self, current_table: &str) -> Self {
        match self {
            Self::AddColumn(column) => Self::DropColumn(column.clone()),
            Self::DropColumn(column) => Self::AddColumn(column.clone()),
            Self::RenameTable { .. } => Self::RenameTable {
                new_name: current_table.to_string(),
            },
        }
    }
}

/// The ordered steps of an ALTER TABLE statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterSpec {
    pub ops: Vec<AlterOp>,
}

impl AlterSpec {
    pub fn new(ops: impl IntoIterator<Item = AlterOp>) -> Self {
        Self {
            ops: ops.into_iter().collect(),
        }
    }
}

/// A single data-definition statement, the unit a coordinator run
/// distributes to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlStatement {
    CreateTable {
        schema: String,
        table: String,
        spec: TableSpec,
    },
    AlterTable {
        schema: String,
        table: String,
        spec: AlterSpec,
    },
    DropTable {
        schema: String,
        table: String,
    },
}

impl DdlStatement {
    /// The statement kind, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create table",
            Self::AlterTable { .. } => "alter table",
            Self::DropTable { .. } => "drop table",
        }
    }

    /// The schema-qualified name of the table this statement targets.
    pub fn table_ref(&self) -> String {
        match self {
            Self::CreateTable { schema, table, .. }
            | Self::AlterTable { schema, table, .. }
            | Self::DropTable { schema, table } => format!("{schema}.{table}"),
        }
    }
}

/// One inbound DDL request.
///
/// Constructed once per request and consumed by exactly one coordinator
/// run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlOperation {
    pub request_id: DdlRequestId,
    pub session_id: SessionId,
    pub statement: DdlStatement,
}

impl DdlOperation {
    pub fn new(session_id: SessionId, statement: DdlStatement) -> Self {
        Self {
            request_id: DdlRequestId::new(),
            session_id,
            statement,
        }
    }

    /// Construct with an explicit request id, for replay paths and tests.
    pub fn with_request_id(
        request_id: DdlRequestId,
        session_id: SessionId,
        statement: DdlStatement,
    ) -> Self {
        Self {
            request_id,
            session_id,
            statement,
        }
    }
}

/// A dispatch bound to the target set frozen at snapshot time.
///
/// Immutable once created: the coordinator never re-reads the membership
/// registry for a run in flight.
#[derive(Debug, Clone)]
pub struct DispatchEnvelope {
    operation: DdlOperation,
    targets: Arc<[ParticipantId]>,
    sequence_number: SequenceNumber,
}

impl DispatchEnvelope {
    pub fn new(
        operation: DdlOperation,
        targets: Arc<[ParticipantId]>,
        sequence_number: SequenceNumber,
    ) -> Self {
        Self {
            operation,
            targets,
            sequence_number,
        }
    }

    pub fn operation(&self) -> &DdlOperation {
        &self.operation
    }

    pub fn targets(&self) -> &Arc<[ParticipantId]> {
        &self.targets
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }
}
