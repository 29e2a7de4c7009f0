//! Per-statement-kind processing: validation, payload construction, reply
//! interpretation and compensation.
//!
//! One [`StatementProcessor`] variant exists per statement kind, selected
//! once per coordinator run through [`StatementProcessor::for_statement`].
//! Adding a statement kind means adding a variant here and its arm in each
//! operation - there is no trait hierarchy to thread it through.

use std::collections::HashSet;
use std::fmt::Display;

use bytes::Bytes;
use granite_id::{DdlRequestId, SequenceNumber};

use crate::{
    AlterSpec, ColumnSpec, DdlError, DdlOperation, DdlStatement, DispatchPayload, NodeReply,
    Result, TableSpec, WireReply,
};

/// A node reply attributed to the run and fan-out it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub request_id: DdlRequestId,
    pub sequence_number: SequenceNumber,
    pub reply: NodeReply,
}

/// The per-kind strategy for one coordinator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementProcessor {
    CreateTable,
    AlterTable,
    DropTable,
}

impl Display for StatementProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateTable => write!(f, "create table"),
            Self::AlterTable => write!(f, "alter table"),
            Self::DropTable => write!(f, "drop table"),
        }
    }
}

impl StatementProcessor {
    /// Select the processor for `statement`.
    ///
    /// This is the single dispatch point: everything downstream of it is
    /// per-kind.
    pub fn for_statement(statement: &DdlStatement) -> Self {
        match statement {
            DdlStatement::CreateTable { .. } => Self::CreateTable,
            DdlStatement::AlterTable { .. } => Self::AlterTable,
            DdlStatement::DropTable { .. } => Self::DropTable,
        }
    }

    /// Structurally validate `op`.
    ///
    /// Catalog-level semantic checks (does a referenced column exist, does
    /// the table already exist) are deliberately not performed here; they
    /// are the business of node-local execution and come back as `Nack`s.
    pub fn validate(&self, op: &DdlOperation) -> Result<()> {
        match (self, &op.statement) {
            (Self::CreateTable, DdlStatement::CreateTable { schema, table, spec }) => {
                validate_table_name(schema, table)?;
                validate_table_spec(spec)
            }
            (Self::AlterTable, DdlStatement::AlterTable { schema, table, spec }) => {
                validate_table_name(schema, table)?;
                validate_alter_spec(table, spec)
            }
            (Self::DropTable, DdlStatement::DropTable { schema, table }) => {
                validate_table_name(schema, table)
            }
            (processor, statement) => Err(mismatch(*processor, statement)),
        }
    }

    /// Build the one payload sent identically to every target.
    pub fn build_dispatch_payload(
        &self,
        op: &DdlOperation,
        sequence_number: SequenceNumber,
    ) -> Result<Bytes> {
        if *self != Self::for_statement(&op.statement) {
            return Err(mismatch(*self, &op.statement));
        }

        DispatchPayload {
            request_id: op.request_id,
            sequence_number,
            statement: op.statement.clone(),
        }
        .encode()
    }

    /// Parse one raw node response into the reply recorded for the run.
    pub fn interpret_reply(&self, raw: &[u8]) -> Result<ReplyEnvelope> {
        let wire = WireReply::decode(raw)?;
        Ok(ReplyEnvelope {
            request_id: wire.request_id,
            sequence_number: wire.sequence_number,
            reply: wire.into_node_reply(),
        })
    }

    /// The statement undoing `op` on a node that already applied it, or
    /// `None` when no such statement exists.
    ///
    /// A dropped table cannot be resurrected: this core keeps no undo log,
    /// so `DropTable` returns `None` and a rolled-back drop with applied
    /// targets surfaces as a partial failure.
    pub fn compensate(&self, op: &DdlOperation) -> Option<DdlStatement> {
        match (self, &op.statement) {
            (Self::CreateTable, DdlStatement::CreateTable { schema, table, .. }) => {
                Some(DdlStatement::DropTable {
                    schema: schema.clone(),
                    table: table.clone(),
                })
            }
            (Self::AlterTable, DdlStatement::AlterTable { schema, table, spec }) => {
                let (target_table, inverse) = inverse_alter(table, spec);
                Some(DdlStatement::AlterTable {
                    schema: schema.clone(),
                    table: target_table,
                    spec: inverse,
                })
            }
            (Self::DropTable, DdlStatement::DropTable { .. }) => None,
            _ => None,
        }
    }
}

fn mismatch(processor: StatementProcessor, statement: &DdlStatement) -> DdlError {
    DdlError::invalid_operation(format!(
        "{} statement handed to the {} processor",
        statement.kind(),
        processor,
    ))
}

fn validate_table_name(schema: &str, table: &str) -> Result<()> {
    if schema.is_empty() {
        return Err(DdlError::invalid_operation("schema name is empty"));
    }
    if table.is_empty() {
        return Err(DdlError::invalid_operation("table name is empty"));
    }
    Ok(())
}

fn validate_column(column: &ColumnSpec) -> Result<()> {
    if column.name.is_empty() {
        return Err(DdlError::invalid_operation("column name is empty"));
    }
    Ok(())
}

fn validate_table_spec(spec: &TableSpec) -> Result<()> {
    if spec.columns.is_empty() {
        return Err(DdlError::invalid_operation("table has no columns"));
    }

    let mut seen = HashSet::new();
    for column in &spec.columns {
        validate_column(column)?;
        if !seen.insert(column.name.as_str()) {
            return Err(DdlError::invalid_operation(format!(
                "duplicate column name {:?}",
                column.name
            )));
        }
    }
    Ok(())
}

fn validate_alter_spec(table: &str, spec: &AlterSpec) -> Result<()> {
    if spec.ops.is_empty() {
        return Err(DdlError::invalid_operation("alter has no steps"));
    }

    let mut renames = 0;
    for op in &spec.ops {
        match op {
            crate::AlterOp::AddColumn(column) | crate::AlterOp::DropColumn(column) => {
                validate_column(column)?;
            }
            crate::AlterOp::RenameTable { new_name } => {
                if new_name.is_empty() {
                    return Err(DdlError::invalid_operation("rename target is empty"));
                }
                if new_name == table {
                    return Err(DdlError::invalid_operation(
                        "rename target equals current table name",
                    ));
                }
                // A second rename would make the inverse ambiguous.
                renames += 1;
                if renames > 1 {
                    return Err(DdlError::invalid_operation(
                        "alter contains more than one rename",
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Derive the alter undoing `spec`, and the table name it must target.
///
/// Inverse steps run in reverse order so a drop-then-add of the same
/// column unwinds correctly. When `spec` renames the table, the applied
/// nodes know it by the new name, so the compensating alter targets that
/// name and renames back.
fn inverse_alter(table: &str, spec: &AlterSpec) -> (String, AlterSpec) {
    let mut target_table = table.to_string();

    for op in &spec.ops {
        if let crate::AlterOp::RenameTable { new_name } = op {
            target_table = new_name.clone();
        }
    }

    let inverse = AlterSpec::new(spec.ops.iter().rev().map(|op| op.inverse(table)));
    (target_table, inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlterOp, ColumnType, WireReplyStatus};
    use granite_id::{ParticipantId, SessionId};

    fn create_table_op() -> DdlOperation {
        DdlOperation::new(
            SessionId::new(),
            DdlStatement::CreateTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
                spec: TableSpec::new([
                    ColumnSpec::new("id", ColumnType::Integer),
                    ColumnSpec::new("name", ColumnType::Text),
                ]),
            },
        )
    }

    #[test]
    fn test_processor_selection() {
        let op = create_table_op();
        assert_eq!(
            StatementProcessor::for_statement(&op.statement),
            StatementProcessor::CreateTable
        );
    }

    #[test]
    fn test_validate_accepts_well_formed_create() {
        let op = create_table_op();
        StatementProcessor::CreateTable.validate(&op).unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let op = DdlOperation::new(
            SessionId::new(),
            DdlStatement::CreateTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
                spec: TableSpec::new([
                    ColumnSpec::new("id", ColumnType::Integer),
                    ColumnSpec::new("id", ColumnType::Text),
                ]),
            },
        );

        let err = StatementProcessor::CreateTable
            .validate(&op)
            .expect_err("duplicate columns should not validate");
        assert!(matches!(err, DdlError::InvalidOperation { .. }));
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let op = DdlOperation::new(
            SessionId::new(),
            DdlStatement::DropTable {
                schema: String::new(),
                table: "t1".to_string(),
            },
        );

        let err = StatementProcessor::DropTable
            .validate(&op)
            .expect_err("empty schema should not validate");
        assert!(matches!(err, DdlError::InvalidOperation { .. }));
    }

    #[test]
    fn test_validate_rejects_empty_alter() {
        let op = DdlOperation::new(
            SessionId::new(),
            DdlStatement::AlterTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
                spec: AlterSpec::new([]),
            },
        );

        let err = StatementProcessor::AlterTable
            .validate(&op)
            .expect_err("empty alter should not validate");
        assert!(matches!(err, DdlError::InvalidOperation { .. }));
    }

    #[test]
    fn test_validate_rejects_double_rename() {
        let op = DdlOperation::new(
            SessionId::new(),
            DdlStatement::AlterTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
                spec: AlterSpec::new([
                    AlterOp::RenameTable {
                        new_name: "t2".to_string(),
                    },
                    AlterOp::RenameTable {
                        new_name: "t3".to_string(),
                    },
                ]),
            },
        );

        let err = StatementProcessor::AlterTable
            .validate(&op)
            .expect_err("double rename should not validate");
        assert!(matches!(err, DdlError::InvalidOperation { .. }));
    }

    #[test]
    fn test_validate_rejects_mismatched_statement() {
        let op = create_table_op();
        let err = StatementProcessor::DropTable
            .validate(&op)
            .expect_err("kind mismatch should not validate");
        assert!(matches!(err, DdlError::InvalidOperation { .. }));
    }

    #[test]
    fn test_payload_carries_statement_verbatim() {
        let op = create_table_op();
        let raw = StatementProcessor::CreateTable
            .build_dispatch_payload(&op, SequenceNumber::new(7))
            .unwrap();

        let payload = DispatchPayload::decode(&raw).unwrap();
        assert_eq!(payload.request_id, op.request_id);
        assert_eq!(payload.sequence_number, SequenceNumber::new(7));
        assert_eq!(payload.statement, op.statement);
    }

    #[test]
    fn test_interpret_reply_routes_by_request_id() {
        let wire = WireReply::ack(
            DdlRequestId::from(42),
            ParticipantId::new(3),
            SequenceNumber::new(6),
        );
        let raw = wire.encode().unwrap();

        let envelope = StatementProcessor::CreateTable
            .interpret_reply(&raw)
            .unwrap();
        assert_eq!(envelope.request_id, DdlRequestId::from(42));
        assert_eq!(envelope.sequence_number, SequenceNumber::new(6));
        assert!(envelope.reply.is_ack());
        assert_eq!(wire.status, WireReplyStatus::Ack);
    }

    #[test]
    fn test_interpret_reply_rejects_garbage() {
        let err = StatementProcessor::CreateTable
            .interpret_reply(b"\x00\x01")
            .expect_err("garbage should not interpret");
        assert!(matches!(err, DdlError::MalformedReply { .. }));
    }

    #[test]
    fn test_create_compensates_to_drop() {
        let op = create_table_op();
        let compensation = StatementProcessor::CreateTable.compensate(&op).unwrap();

        assert_eq!(
            compensation,
            DdlStatement::DropTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
            }
        );
    }

    #[test]
    fn test_drop_has_no_compensation() {
        let op = DdlOperation::new(
            SessionId::new(),
            DdlStatement::DropTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
            },
        );

        assert_eq!(StatementProcessor::DropTable.compensate(&op), None);
    }

    #[test]
    fn test_alter_compensation_reverses_steps() {
        let added = ColumnSpec::new("a", ColumnType::Integer);
        let dropped = ColumnSpec::new("b", ColumnType::Float);
        let op = DdlOperation::new(
            SessionId::new(),
            DdlStatement::AlterTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
                spec: AlterSpec::new([
                    AlterOp::AddColumn(added.clone()),
                    AlterOp::DropColumn(dropped.clone()),
                ]),
            },
        );

        let compensation = StatementProcessor::AlterTable.compensate(&op).unwrap();
        assert_eq!(
            compensation,
            DdlStatement::AlterTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
                spec: AlterSpec::new([
                    AlterOp::AddColumn(dropped),
                    AlterOp::DropColumn(added),
                ]),
            }
        );
    }

    #[test]
    fn test_alter_compensation_targets_renamed_table() {
        let op = DdlOperation::new(
            SessionId::new(),
            DdlStatement::AlterTable {
                schema: "app".to_string(),
                table: "t1".to_string(),
                spec: AlterSpec::new([AlterOp::RenameTable {
                    new_name: "t2".to_string(),
                }]),
            },
        );

        let compensation = StatementProcessor::AlterTable.compensate(&op).unwrap();
        assert_eq!(
            compensation,
            DdlStatement::AlterTable {
                schema: "app".to_string(),
                table: "t2".to_string(),
                spec: AlterSpec::new([AlterOp::RenameTable {
                    new_name: "t1".to_string(),
                }]),
            }
        );
    }

    #[test]
    fn test_inverse_of_inverse_round_trips() {
        let spec = AlterSpec::new([
            AlterOp::AddColumn(ColumnSpec::new("a", ColumnType::Integer)),
            AlterOp::RenameTable {
                new_name: "t2".to_string(),
            },
        ]);

        let (renamed, inverse) = inverse_alter("t1", &spec);
        assert_eq!(renamed, "t2");

        let (back, double_inverse) = inverse_alter(&renamed, &inverse);
        assert_eq!(back, "t1");
        // Steps come back in the original order.
        assert_eq!(double_inverse, spec);
    }
}
