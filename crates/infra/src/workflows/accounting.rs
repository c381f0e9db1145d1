//! Accounting workflows: chart of accounts, years, postings and year close.

use chrono::{DateTime, Months, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use templeerp_accounting::{
    AcYear, AcYearCommand, AcYearId, AcYearStatus, AccountKind, ChangeActivation, CloseAcYear,
    ClosingBalance, CreateAcYear, CreateLedger, EntryCommand, EntryId, JournalEntry, Ledger,
    LedgerCommand, LedgerId, PostEntry, SetOpeningBalance, rollover_openings,
};
use templeerp_core::TenantId;
use templeerp_events::{EventBus, EventEnvelope};

use crate::event_store::EventStore;
use crate::workflows::{WorkflowError, Workflows};

/// Parameters of a year-end close.
#[derive(Debug, Clone)]
pub struct CloseYear {
    pub year_id: AcYearId,
    pub next_year_id: AcYearId,
    pub next_year_name: String,
    /// Equity ledger that absorbs the year's revenue and expense.
    pub surplus_ledger_id: LedgerId,
    pub occurred_at: DateTime<Utc>,
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create a ledger whose code is unique within the tenant.
    ///
    /// A parent must exist and be a group ledger.
    pub fn create_ledger(&self, tenant_id: TenantId, cmd: CreateLedger) -> Result<LedgerId, WorkflowError> {
        let code = cmd.code.trim();
        let taken = self
            .projections
            .ledgers
            .list(tenant_id)
            .iter()
            .any(|l| l.code().eq_ignore_ascii_case(code));
        if taken {
            return Err(WorkflowError::Conflict(format!("ledger code {code} already exists")));
        }

        if let Some(parent_id) = cmd.parent {
            let parent: Ledger = self.fetch(tenant_id, parent_id.aggregate_id(), "parent ledger")?;
            if !parent.is_group() {
                return Err(WorkflowError::Validation(format!(
                    "parent ledger {} is not a group ledger",
                    parent.code()
                )));
            }
        }

        let ledger_id = cmd.ledger_id;
        self.execute::<Ledger>(tenant_id, ledger_id.aggregate_id(), LedgerCommand::CreateLedger(cmd))?;
        Ok(ledger_id)
    }

    /// Create an accounting year that overlaps no existing year of the tenant.
    pub fn create_year(&self, tenant_id: TenantId, cmd: CreateAcYear) -> Result<AcYearId, WorkflowError> {
        if let Some(clash) = self
            .projections
            .years
            .list(tenant_id)
            .into_iter()
            .find(|y| y.from_date() <= cmd.to_date && cmd.from_date <= y.to_date())
        {
            return Err(WorkflowError::Conflict(format!(
                "accounting year overlaps {} ({} to {})",
                clash.name(),
                clash.from_date(),
                clash.to_date()
            )));
        }

        let year_id = cmd.year_id;
        self.execute::<AcYear>(tenant_id, year_id.aggregate_id(), AcYearCommand::CreateAcYear(cmd))?;
        Ok(year_id)
    }

    /// Make `year_id` the tenant's only active year.
    pub fn activate_year(
        &self,
        tenant_id: TenantId,
        year_id: AcYearId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let change = |year_id| ChangeActivation {
            tenant_id,
            year_id,
            occurred_at,
        };

        // Reject a closed or unknown year before touching the others.
        self.fetch::<AcYear>(tenant_id, year_id.aggregate_id(), "accounting year")?;
        self.dispatcher.check::<AcYear>(
            tenant_id,
            year_id.aggregate_id(),
            &AcYearCommand::ActivateAcYear(change(year_id)),
        )?;

        for other in self.projections.years.list(tenant_id) {
            if other.is_active() && other.id_typed() != year_id {
                self.execute::<AcYear>(
                    tenant_id,
                    other.id_typed().aggregate_id(),
                    AcYearCommand::DeactivateAcYear(change(other.id_typed())),
                )?;
                info!(%tenant_id, year = %other.id_typed(), "accounting year deactivated");
            }
        }

        self.execute::<AcYear>(
            tenant_id,
            year_id.aggregate_id(),
            AcYearCommand::ActivateAcYear(change(year_id)),
        )?;
        info!(%tenant_id, year = %year_id, "accounting year activated");
        Ok(())
    }

    /// Post a balanced entry into an open year that contains its date.
    ///
    /// Every ledger must be an active, non-group ledger.
    pub fn post_entry(&self, tenant_id: TenantId, cmd: PostEntry) -> Result<EntryId, WorkflowError> {
        let year: AcYear = self.fetch(tenant_id, cmd.ac_year_id.aggregate_id(), "accounting year")?;
        if !year.accepts_postings_on(cmd.date) {
            return Err(WorkflowError::InvariantViolation(format!(
                "accounting year {} does not accept postings dated {}",
                year.name(),
                cmd.date
            )));
        }

        for item in &cmd.items {
            let ledger: Ledger = self.fetch(tenant_id, item.ledger_id.aggregate_id(), "ledger")?;
            if !ledger.can_post() {
                return Err(WorkflowError::InvariantViolation(format!(
                    "ledger {} cannot receive postings",
                    ledger.code()
                )));
            }
        }

        let entry_id = cmd.entry_id;
        self.execute::<JournalEntry>(tenant_id, entry_id.aggregate_id(), EntryCommand::PostEntry(cmd))?;
        Ok(entry_id)
    }

    /// Close a year and open the next one with rolled-over balances.
    ///
    /// Closing balances come from the postings read model as of the year end.
    /// The next year starts the day after and runs twelve months.
    pub fn close_year(&self, tenant_id: TenantId, req: CloseYear) -> Result<AcYearId, WorkflowError> {
        let year: AcYear = self.fetch(tenant_id, req.year_id.aggregate_id(), "accounting year")?;
        if year.status() != AcYearStatus::Open {
            return Err(WorkflowError::InvariantViolation(format!(
                "accounting year {} is already closed",
                year.name()
            )));
        }

        let surplus: Ledger = self.fetch(tenant_id, req.surplus_ledger_id.aggregate_id(), "surplus ledger")?;
        if surplus.kind() != AccountKind::Equity || surplus.is_group() {
            return Err(WorkflowError::Validation(format!(
                "surplus ledger {} must be a non-group equity ledger",
                surplus.code()
            )));
        }

        let closing = self.projections.accounting().closing_balances(tenant_id, req.year_id)?;
        let openings = rollover_openings(&closing, req.surplus_ledger_id)?;
        let closing_balances = closing
            .iter()
            .filter(|(_, _, balance)| *balance != 0)
            .map(|(ledger_id, _, balance)| {
                i64::try_from(*balance)
                    .map(|balance| ClosingBalance {
                        ledger_id: *ledger_id,
                        balance,
                    })
                    .map_err(|_| WorkflowError::Validation("closing balance out of range".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let from_date = year
            .to_date()
            .succ_opt()
            .ok_or_else(|| WorkflowError::Validation("year end is the last representable date".into()))?;
        let to_date = year
            .to_date()
            .checked_add_months(Months::new(12))
            .ok_or_else(|| WorkflowError::Validation("next year end out of range".into()))?;

        info!(%tenant_id, year = %req.year_id, ledgers = closing_balances.len(), "closing accounting year");

        let next_year_id = self.create_year(
            tenant_id,
            CreateAcYear {
                tenant_id,
                year_id: req.next_year_id,
                name: req.next_year_name,
                from_date,
                to_date,
                occurred_at: req.occurred_at,
            },
        )?;

        for (ledger_id, opening) in &openings {
            self.execute::<AcYear>(
                tenant_id,
                next_year_id.aggregate_id(),
                AcYearCommand::SetOpeningBalance(SetOpeningBalance {
                    tenant_id,
                    year_id: next_year_id,
                    ledger_id: *ledger_id,
                    debit: opening.debit,
                    credit: opening.credit,
                    occurred_at: req.occurred_at,
                }),
            )
            .map_err(|err| incomplete("set opening balance", err))?;
        }

        self.execute::<AcYear>(
            tenant_id,
            req.year_id.aggregate_id(),
            AcYearCommand::CloseAcYear(CloseAcYear {
                tenant_id,
                year_id: req.year_id,
                closing_balances,
                next_year_id: Some(next_year_id),
                occurred_at: req.occurred_at,
            }),
        )
        .map_err(|err| incomplete("close year", err))?;

        self.activate_year(tenant_id, next_year_id, req.occurred_at)
            .map_err(|err| incomplete("activate next year", err))?;

        info!(
            %tenant_id,
            closed = %req.year_id,
            next = %next_year_id,
            openings = openings.len(),
            "accounting year closed"
        );
        Ok(next_year_id)
    }
}

/// Wrap a failure that happened after the next year was already created.
fn incomplete(step: &'static str, err: WorkflowError) -> WorkflowError {
    warn!(step, error = %err, "year close stopped part way");
    WorkflowError::after_commit(step, err)
}
