//! Per-ledger postings derived from journal entries.
//!
//! Every item of a posted entry becomes one posting on its ledger. Voiding an
//! entry removes its postings, so balances only ever see live entries.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;

use templeerp_accounting::{AcYearId, EntryEvent, EntryId, LedgerId, Posting};
use templeerp_core::TenantId;
use templeerp_events::EventEnvelope;

use crate::projections::aggregate_view::decode_checked;
use crate::projections::{Projection, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryTenantStore, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerPosting {
    pub entry_id: EntryId,
    pub entry_no: String,
    pub date: NaiveDate,
    pub ac_year_id: AcYearId,
    pub fund_code: Option<String>,
    pub debit: i64,
    pub credit: i64,
}

impl LedgerPosting {
    pub fn as_posting(&self) -> Posting {
        Posting {
            date: self.date,
            debit: self.debit,
            credit: self.credit,
        }
    }
}

#[derive(Debug, Default)]
pub struct LedgerPostingsProjection {
    by_ledger: InMemoryTenantStore<LedgerId, Vec<LedgerPosting>>,
    by_entry: InMemoryTenantStore<EntryId, Vec<LedgerId>>,
    cursors: StreamCursors,
}

impl LedgerPostingsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live postings of one ledger, ordered by date then entry number.
    pub fn postings(&self, tenant_id: TenantId, ledger_id: LedgerId) -> Vec<LedgerPosting> {
        let mut postings = self.by_ledger.get(tenant_id, &ledger_id).unwrap_or_default();
        postings.sort_by(|a, b| (a.date, &a.entry_no).cmp(&(b.date, &b.entry_no)));
        postings
    }

    /// Postings of one ledger tagged with `fund_code`.
    pub fn fund_postings(
        &self,
        tenant_id: TenantId,
        ledger_id: LedgerId,
        fund_code: &str,
    ) -> Vec<LedgerPosting> {
        let mut postings = self.postings(tenant_id, ledger_id);
        postings.retain(|p| p.fund_code.as_deref() == Some(fund_code));
        postings
    }

    fn apply(&self, tenant_id: TenantId, event: EntryEvent) {
        match event {
            EntryEvent::EntryPosted(e) => {
                let mut touched: Vec<LedgerId> = Vec::new();
                for item in &e.items {
                    let posting = LedgerPosting {
                        entry_id: e.entry_id,
                        entry_no: e.entry_no.clone(),
                        date: e.date,
                        ac_year_id: e.ac_year_id,
                        fund_code: e.fund_code.clone(),
                        debit: item.debit(),
                        credit: item.credit(),
                    };
                    self.by_ledger
                        .update(tenant_id, item.ledger_id, &mut |postings| postings.push(posting.clone()));
                    if !touched.contains(&item.ledger_id) {
                        touched.push(item.ledger_id);
                    }
                }
                self.by_entry.upsert(tenant_id, e.entry_id, touched);
            }
            EntryEvent::EntryVoided(e) => {
                let ledgers = self.by_entry.remove(tenant_id, &e.entry_id).unwrap_or_default();
                for ledger_id in ledgers {
                    self.by_ledger.update(tenant_id, ledger_id, &mut |postings| {
                        postings.retain(|p| p.entry_id != e.entry_id)
                    });
                }
            }
        }
    }
}

impl Projection for LedgerPostingsProjection {
    fn name(&self) -> &'static str {
        "ledger_postings"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        aggregate_type == streams::ENTRY
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        self.cursors
            .advance(tenant_id, envelope.aggregate_id(), envelope.sequence_number(), || {
                let event: EntryEvent = decode_checked(envelope)?;
                self.apply(tenant_id, event);
                Ok(())
            })
            .map(|_| ())
    }

    fn reset(&self) {
        self.by_ledger.clear_all();
        self.by_entry.clear_all();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use templeerp_accounting::{EntryItem, EntryPosted, EntryType, EntryVoided, Side};
    use templeerp_events::{Event, StreamPosition};
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId, seq: u64, event: &EntryEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            StreamPosition {
                tenant_id,
                aggregate_id: event.entry_id().aggregate_id(),
                aggregate_type: streams::ENTRY.to_string(),
                sequence_number: seq,
            },
            event.event_type(),
            event.occurred_at(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn posted(tenant_id: TenantId, entry_id: EntryId, cash: LedgerId, income: LedgerId) -> EntryEvent {
        EntryEvent::EntryPosted(EntryPosted {
            tenant_id,
            entry_id,
            entry_no: "R-1".into(),
            entry_type: EntryType::Receipt,
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            ac_year_id: AcYearId::generate(),
            fund_code: Some("GENERAL".into()),
            narration: None,
            items: vec![
                EntryItem { ledger_id: cash, side: Side::Debit, amount: 500, narration: None },
                EntryItem { ledger_id: income, side: Side::Credit, amount: 500, narration: None },
            ],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn posting_then_voiding_removes_postings() {
        let projection = LedgerPostingsProjection::new();
        let tenant_id = TenantId::new();
        let entry_id = EntryId::generate();
        let (cash, income) = (LedgerId::generate(), LedgerId::generate());

        let post = posted(tenant_id, entry_id, cash, income);
        projection.apply_envelope(&envelope(tenant_id, 1, &post)).unwrap();
        // Redelivery is ignored.
        projection.apply_envelope(&envelope(tenant_id, 1, &post)).unwrap();

        assert_eq!(projection.postings(tenant_id, cash).len(), 1);
        assert_eq!(projection.postings(tenant_id, income)[0].credit, 500);
        assert_eq!(projection.fund_postings(tenant_id, cash, "GENERAL").len(), 1);
        assert!(projection.fund_postings(tenant_id, cash, "BUILDING").is_empty());

        let void = EntryEvent::EntryVoided(EntryVoided {
            tenant_id,
            entry_id,
            reason: "duplicate".into(),
            occurred_at: Utc::now(),
        });
        projection.apply_envelope(&envelope(tenant_id, 2, &void)).unwrap();

        assert!(projection.postings(tenant_id, cash).is_empty());
        assert!(projection.postings(tenant_id, income).is_empty());
    }

    #[test]
    fn envelope_for_another_tenant_is_rejected() {
        let projection = LedgerPostingsProjection::new();
        let tenant_id = TenantId::new();
        let post = posted(tenant_id, EntryId::generate(), LedgerId::generate(), LedgerId::generate());

        let err = projection
            .apply_envelope(&envelope(TenantId::new(), 1, &post))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::TenantIsolation(_)));
    }
}
