//! Accounting reports computed from the ledger, year and postings read models.

use chrono::NaiveDate;
use serde::Serialize;

use templeerp_accounting::{
    AcYear, AcYearId, AccountKind, BudgetId, BudgetUtilization, FundBudget, Ledger, LedgerId,
    LedgerTree, Posting, balance_as_of, compute_utilization, format_balance, split_columns,
};
use templeerp_core::{DomainError, DomainResult, TenantId};

use crate::projections::{AggregateProjection, LedgerPostingsProjection};

/// Balance of one ledger for an accounting year, signed debit-positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerBalance {
    pub ledger_id: LedgerId,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub is_group: bool,
    pub ac_year_id: AcYearId,
    pub as_of: NaiveDate,
    pub balance: i128,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalanceRow {
    pub ledger_id: LedgerId,
    pub code: String,
    pub name: String,
    pub debit: i128,
    pub credit: i128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalance {
    pub ac_year_id: AcYearId,
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: i128,
    pub total_credit: i128,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

/// Read-only view over the accounting read models of one process.
#[derive(Debug, Clone, Copy)]
pub struct AccountingQueries<'a> {
    pub ledgers: &'a AggregateProjection<Ledger>,
    pub years: &'a AggregateProjection<AcYear>,
    pub budgets: &'a AggregateProjection<FundBudget>,
    pub postings: &'a LedgerPostingsProjection,
}

impl AccountingQueries<'_> {
    /// Balance as of `as_of`, counting postings from the year start up to
    /// `min(as_of, year end)`. Group ledgers roll up their descendants.
    pub fn ledger_balance(
        &self,
        tenant_id: TenantId,
        ledger_id: LedgerId,
        ac_year_id: AcYearId,
        as_of: NaiveDate,
    ) -> DomainResult<LedgerBalance> {
        let year = self.year(tenant_id, ac_year_id)?;
        let ledger = self
            .ledgers
            .get(tenant_id, ledger_id.aggregate_id())
            .ok_or_else(DomainError::not_found)?;

        let balance = if ledger.is_group() {
            let tree = self.tree(tenant_id);
            tree.rollup(ledger_id, |id| self.leaf_balance(tenant_id, &year, id, as_of))
        } else {
            self.leaf_balance(tenant_id, &year, ledger_id, as_of)
        };

        Ok(LedgerBalance {
            ledger_id,
            code: ledger.code().to_string(),
            name: ledger.name().to_string(),
            kind: ledger.kind(),
            is_group: ledger.is_group(),
            ac_year_id,
            as_of,
            balance,
            display: format_balance(balance),
        })
    }

    /// Every posting ledger with its balance split into debit/credit columns,
    /// ordered by ledger code.
    pub fn trial_balance(
        &self,
        tenant_id: TenantId,
        ac_year_id: AcYearId,
        as_of: NaiveDate,
    ) -> DomainResult<TrialBalance> {
        let year = self.year(tenant_id, ac_year_id)?;
        let mut ledgers = self.ledgers.list(tenant_id);
        ledgers.retain(|l| !l.is_group());
        ledgers.sort_by(|a, b| a.code().cmp(b.code()));

        let rows: Vec<TrialBalanceRow> = ledgers
            .iter()
            .map(|ledger| {
                let balance = self.leaf_balance(tenant_id, &year, ledger.id_typed(), as_of);
                let (debit, credit) = split_columns(balance);
                TrialBalanceRow {
                    ledger_id: ledger.id_typed(),
                    code: ledger.code().to_string(),
                    name: ledger.name().to_string(),
                    debit,
                    credit,
                }
            })
            .collect();

        Ok(TrialBalance {
            ac_year_id,
            as_of,
            total_debit: rows.iter().map(|r| r.debit).sum(),
            total_credit: rows.iter().map(|r| r.credit).sum(),
            rows,
        })
    }

    /// Year-end balance of every posting ledger, for rollover.
    pub fn closing_balances(
        &self,
        tenant_id: TenantId,
        ac_year_id: AcYearId,
    ) -> DomainResult<Vec<(LedgerId, AccountKind, i128)>> {
        let year = self.year(tenant_id, ac_year_id)?;
        Ok(self
            .ledgers
            .list(tenant_id)
            .iter()
            .filter(|l| !l.is_group())
            .map(|l| {
                let balance = self.leaf_balance(tenant_id, &year, l.id_typed(), year.to_date());
                (l.id_typed(), l.kind(), balance)
            })
            .collect())
    }

    /// Budgeted versus actual spend for the budget's fund within its year.
    pub fn budget_utilization(
        &self,
        tenant_id: TenantId,
        budget_id: BudgetId,
    ) -> DomainResult<BudgetUtilization> {
        let budget = self
            .budgets
            .get(tenant_id, budget_id.aggregate_id())
            .ok_or_else(DomainError::not_found)?;
        let year_id = budget
            .ac_year_id()
            .ok_or_else(|| DomainError::invariant("budget has no accounting year"))?;
        let year = self.year(tenant_id, year_id)?;

        Ok(compute_utilization(budget.lines(), |ledger_id| {
            let spent: i128 = self
                .postings
                .fund_postings(tenant_id, ledger_id, budget.fund_code())
                .iter()
                .filter(|p| year.contains(p.date))
                .map(|p| p.as_posting().net())
                .sum();
            i64::try_from(spent.max(0)).unwrap_or(i64::MAX)
        }))
    }

    fn year(&self, tenant_id: TenantId, ac_year_id: AcYearId) -> DomainResult<AcYear> {
        self.years
            .get(tenant_id, ac_year_id.aggregate_id())
            .ok_or_else(DomainError::not_found)
    }

    fn tree(&self, tenant_id: TenantId) -> LedgerTree {
        LedgerTree::new(
            self.ledgers
                .list(tenant_id)
                .iter()
                .map(|l| (l.id_typed(), l.parent())),
        )
    }

    fn leaf_balance(
        &self,
        tenant_id: TenantId,
        year: &AcYear,
        ledger_id: LedgerId,
        as_of: NaiveDate,
    ) -> i128 {
        let postings: Vec<Posting> = self
            .postings
            .postings(tenant_id, ledger_id)
            .iter()
            .map(|p| p.as_posting())
            .collect();
        balance_as_of(
            year.opening_for(ledger_id),
            &postings,
            year.from_date(),
            as_of.min(year.to_date()),
        )
    }
}
