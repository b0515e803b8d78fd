//! Transaction ledger operations

use super::{generate_code, internal, parse_smart_code, require_non_empty, Service};
use crate::contract::{
    CoreError, NewTransaction, Page, PageResult, Transaction, TransactionFilter,
    TransactionHeader, TransactionLine,
};
use std::collections::HashSet;
use uuid::Uuid;

/// Status of a transaction created without one
pub const DEFAULT_TRANSACTION_STATUS: &str = "pending";

impl Service {
    /// Record a header with its lines in one store transaction
    pub async fn create_transaction(
        &self,
        org: Uuid,
        new: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        require_non_empty(&new.transaction_type, "transaction_type")?;
        parse_smart_code(&new.smart_code)?;

        let mut line_numbers = HashSet::with_capacity(new.lines.len());
        let mut references: Vec<Uuid> = new
            .source_entity_id
            .into_iter()
            .chain(new.target_entity_id)
            .collect();
        for line in &new.lines {
            parse_smart_code(&line.smart_code)?;
            require_non_empty(&line.line_type, "line_type")?;
            if !line_numbers.insert(line.line_number) {
                return Err(CoreError::validation(format!(
                    "line_number {} is used more than once",
                    line.line_number
                )));
            }
            let amounts = [Some(line.line_amount), line.quantity, line.unit_amount];
            if amounts.into_iter().flatten().any(|a| !a.is_finite()) {
                return Err(CoreError::validation(format!(
                    "line {} has a non-finite amount",
                    line.line_number
                )));
            }
            references.extend(line.entity_id);
        }

        let total_amount = new
            .total_amount
            .unwrap_or_else(|| new.lines.iter().map(|l| l.line_amount).sum());
        if !total_amount.is_finite() {
            return Err(CoreError::validation("total_amount must be finite"));
        }

        references.sort_unstable();
        references.dedup();
        for entity_id in references {
            self.resolve_reference(org, entity_id).await?;
        }

        let now = chrono::Utc::now();
        let id = Uuid::new_v4();
        let header = TransactionHeader {
            id,
            organization_id: org,
            transaction_code: match new.transaction_code {
                Some(code) => code,
                None => generate_code(&new.transaction_type),
            },
            transaction_type: new.transaction_type,
            smart_code: new.smart_code,
            status: new
                .status
                .unwrap_or_else(|| DEFAULT_TRANSACTION_STATUS.to_string()),
            total_amount,
            source_entity_id: new.source_entity_id,
            target_entity_id: new.target_entity_id,
            transaction_date: new.transaction_date.unwrap_or(now),
            metadata: new.metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        };

        let mut lines: Vec<TransactionLine> = new
            .lines
            .into_iter()
            .map(|line| {
                let quantity = line.quantity.unwrap_or(1.0);
                let unit_amount = line.unit_amount.unwrap_or(if quantity != 0.0 {
                    line.line_amount / quantity
                } else {
                    0.0
                });
                TransactionLine {
                    id: Uuid::new_v4(),
                    organization_id: org,
                    transaction_id: id,
                    line_number: line.line_number,
                    line_type: line.line_type,
                    entity_id: line.entity_id,
                    description: line.description,
                    quantity,
                    unit_amount,
                    line_amount: line.line_amount,
                    smart_code: line.smart_code,
                    metadata: line.metadata.unwrap_or_else(|| serde_json::json!({})),
                    created_at: now,
                }
            })
            .collect();
        lines.sort_by_key(|l| l.line_number);

        let created = self
            .transaction_repo
            .insert(&Transaction { header, lines })
            .await
            .map_err(internal("insert transaction"))?;

        tracing::info!(
            %org,
            transaction_id = %created.header.id,
            transaction_type = %created.header.transaction_type,
            lines = created.lines.len(),
            total_amount = created.header.total_amount,
            "created transaction"
        );
        Ok(created)
    }

    /// Header and lines ordered by line number
    pub async fn get_transaction(&self, org: Uuid, id: Uuid) -> Result<Transaction, CoreError> {
        tracing::debug!(%org, transaction_id = %id, "get transaction");
        self.transaction_repo
            .find_by_id(org, id)
            .await
            .map_err(internal("find transaction"))?
            .ok_or_else(|| CoreError::not_found("transaction", id))
    }

    /// Filtered page of headers
    pub async fn list_transactions(
        &self,
        org: Uuid,
        filter: TransactionFilter,
        page: Page,
    ) -> Result<PageResult<TransactionHeader>, CoreError> {
        let (items, total) = self
            .transaction_repo
            .query(org, &filter, self.page(page))
            .await
            .map_err(internal("query transactions"))?;
        Ok(PageResult { items, total })
    }

    /// Change the status of a header
    pub async fn update_transaction_status(
        &self,
        org: Uuid,
        id: Uuid,
        status: &str,
    ) -> Result<TransactionHeader, CoreError> {
        require_non_empty(status, "status")?;
        let header = self
            .transaction_repo
            .update_status(org, id, status)
            .await
            .map_err(internal("update transaction status"))?
            .ok_or_else(|| CoreError::not_found("transaction", id))?;

        tracing::info!(%org, transaction_id = %id, status, "updated transaction status");
        Ok(header)
    }
}
