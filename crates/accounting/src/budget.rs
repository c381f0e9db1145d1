use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use templeerp_events::Event;

use crate::ac_year::AcYearId;
use crate::ledger::LedgerId;

templeerp_core::aggregate_id!(
    /// Fund budget identifier.
    BudgetId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Draft,
    Approved,
    Rejected,
    Closed,
}

/// Budgeted amount for one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub ledger_id: LedgerId,
    pub amount: i64,
}

/// Aggregate root: FundBudget.
///
/// A budget allocates amounts per ledger for one fund within one accounting
/// year. Utilization is measured against posted entries tagged with the same
/// fund code (see [`compute_utilization`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundBudget {
    id: BudgetId,
    tenant_id: Option<TenantId>,
    name: String,
    fund_code: String,
    ac_year_id: Option<AcYearId>,
    lines: Vec<BudgetLine>,
    status: BudgetStatus,
    version: u64,
    created: bool,
}

impl FundBudget {
    pub fn empty(id: BudgetId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            fund_code: String::new(),
            ac_year_id: None,
            lines: Vec::new(),
            status: BudgetStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BudgetId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fund_code(&self) -> &str {
        &self.fund_code
    }

    pub fn ac_year_id(&self) -> Option<AcYearId> {
        self.ac_year_id
    }

    pub fn lines(&self) -> &[BudgetLine] {
        &self.lines
    }

    pub fn status(&self) -> BudgetStatus {
        self.status
    }

    pub fn total_budgeted(&self) -> i128 {
        self.lines.iter().map(|l| l.amount as i128).sum()
    }
}

impl AggregateRoot for FundBudget {
    type Id = BudgetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateBudget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBudget {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub name: String,
    pub fund_code: String,
    pub ac_year_id: AcYearId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetBudgetLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBudgetLine {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub ledger_id: LedgerId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveBudgetLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveBudgetLine {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub ledger_id: LedgerId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveBudget / RejectBudget / CloseBudget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBudgetStatus {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetCommand {
    CreateBudget(CreateBudget),
    SetBudgetLine(SetBudgetLine),
    RemoveBudgetLine(RemoveBudgetLine),
    ApproveBudget(ChangeBudgetStatus),
    RejectBudget(ChangeBudgetStatus),
    CloseBudget(ChangeBudgetStatus),
}

/// Event: BudgetCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCreated {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub name: String,
    pub fund_code: String,
    pub ac_year_id: AcYearId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetLineSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLineSet {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub ledger_id: LedgerId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetLineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLineRemoved {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub ledger_id: LedgerId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetApproved / BudgetRejected / BudgetClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStatusChanged {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetEvent {
    BudgetCreated(BudgetCreated),
    BudgetLineSet(BudgetLineSet),
    BudgetLineRemoved(BudgetLineRemoved),
    BudgetApproved(BudgetStatusChanged),
    BudgetRejected(BudgetStatusChanged),
    BudgetClosed(BudgetStatusChanged),
}

impl BudgetEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            BudgetEvent::BudgetCreated(e) => e.tenant_id,
            BudgetEvent::BudgetLineSet(e) => e.tenant_id,
            BudgetEvent::BudgetLineRemoved(e) => e.tenant_id,
            BudgetEvent::BudgetApproved(e)
            | BudgetEvent::BudgetRejected(e)
            | BudgetEvent::BudgetClosed(e) => e.tenant_id,
        }
    }

    pub fn budget_id(&self) -> BudgetId {
        match self {
            BudgetEvent::BudgetCreated(e) => e.budget_id,
            BudgetEvent::BudgetLineSet(e) => e.budget_id,
            BudgetEvent::BudgetLineRemoved(e) => e.budget_id,
            BudgetEvent::BudgetApproved(e)
            | BudgetEvent::BudgetRejected(e)
            | BudgetEvent::BudgetClosed(e) => e.budget_id,
        }
    }
}

impl Event for BudgetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BudgetEvent::BudgetCreated(_) => "accounting.budget.created",
            BudgetEvent::BudgetLineSet(_) => "accounting.budget.line_set",
            BudgetEvent::BudgetLineRemoved(_) => "accounting.budget.line_removed",
            BudgetEvent::BudgetApproved(_) => "accounting.budget.approved",
            BudgetEvent::BudgetRejected(_) => "accounting.budget.rejected",
            BudgetEvent::BudgetClosed(_) => "accounting.budget.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BudgetEvent::BudgetCreated(e) => e.occurred_at,
            BudgetEvent::BudgetLineSet(e) => e.occurred_at,
            BudgetEvent::BudgetLineRemoved(e) => e.occurred_at,
            BudgetEvent::BudgetApproved(e)
            | BudgetEvent::BudgetRejected(e)
            | BudgetEvent::BudgetClosed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for FundBudget {
    type Command = BudgetCommand;
    type Event = BudgetEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BudgetEvent::BudgetCreated(e) => {
                self.id = e.budget_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.fund_code = e.fund_code.clone();
                self.ac_year_id = Some(e.ac_year_id);
                self.lines.clear();
                self.status = BudgetStatus::Draft;
                self.created = true;
            }
            BudgetEvent::BudgetLineSet(e) => {
                match self.lines.iter_mut().find(|l| l.ledger_id == e.ledger_id) {
                    Some(line) => line.amount = e.amount,
                    None => self.lines.push(BudgetLine {
                        ledger_id: e.ledger_id,
                        amount: e.amount,
                    }),
                }
            }
            BudgetEvent::BudgetLineRemoved(e) => {
                self.lines.retain(|l| l.ledger_id != e.ledger_id);
            }
            BudgetEvent::BudgetApproved(_) => self.status = BudgetStatus::Approved,
            BudgetEvent::BudgetRejected(_) => self.status = BudgetStatus::Rejected,
            BudgetEvent::BudgetClosed(_) => self.status = BudgetStatus::Closed,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BudgetCommand::CreateBudget(cmd) => self.handle_create(cmd),
            BudgetCommand::SetBudgetLine(cmd) => self.handle_set_line(cmd),
            BudgetCommand::RemoveBudgetLine(cmd) => self.handle_remove_line(cmd),
            BudgetCommand::ApproveBudget(cmd) => self.handle_approve(cmd),
            BudgetCommand::RejectBudget(cmd) => self.handle_reject(cmd),
            BudgetCommand::CloseBudget(cmd) => self.handle_close(cmd),
        }
    }
}

impl FundBudget {
    fn ensure_existing(&self, tenant_id: TenantId, budget_id: BudgetId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != budget_id {
            return Err(DomainError::invariant("budget_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != BudgetStatus::Draft {
            return Err(DomainError::invariant(format!(
                "budget is {:?}; only draft budgets can be changed",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateBudget) -> Result<Vec<BudgetEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("budget already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("budget name cannot be empty"));
        }
        if cmd.fund_code.trim().is_empty() {
            return Err(DomainError::validation("fund code cannot be empty"));
        }

        Ok(vec![BudgetEvent::BudgetCreated(BudgetCreated {
            tenant_id: cmd.tenant_id,
            budget_id: cmd.budget_id,
            name: cmd.name.trim().to_string(),
            fund_code: cmd.fund_code.trim().to_uppercase(),
            ac_year_id: cmd.ac_year_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_line(&self, cmd: &SetBudgetLine) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.budget_id)?;
        self.ensure_draft()?;
        if cmd.amount <= 0 {
            return Err(DomainError::validation("budget amount must be positive"));
        }

        Ok(vec![BudgetEvent::BudgetLineSet(BudgetLineSet {
            tenant_id: cmd.tenant_id,
            budget_id: cmd.budget_id,
            ledger_id: cmd.ledger_id,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveBudgetLine) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.budget_id)?;
        self.ensure_draft()?;
        if !self.lines.iter().any(|l| l.ledger_id == cmd.ledger_id) {
            return Err(DomainError::not_found());
        }

        Ok(vec![BudgetEvent::BudgetLineRemoved(BudgetLineRemoved {
            tenant_id: cmd.tenant_id,
            budget_id: cmd.budget_id,
            ledger_id: cmd.ledger_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ChangeBudgetStatus) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.budget_id)?;
        self.ensure_draft()?;
        if self.lines.is_empty() {
            return Err(DomainError::invariant("cannot approve a budget without lines"));
        }

        Ok(vec![BudgetEvent::BudgetApproved(self.status_changed(cmd))])
    }

    fn handle_reject(&self, cmd: &ChangeBudgetStatus) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.budget_id)?;
        self.ensure_draft()?;
        Ok(vec![BudgetEvent::BudgetRejected(self.status_changed(cmd))])
    }

    fn handle_close(&self, cmd: &ChangeBudgetStatus) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.budget_id)?;
        if self.status != BudgetStatus::Approved {
            return Err(DomainError::invariant("only approved budgets can be closed"));
        }
        Ok(vec![BudgetEvent::BudgetClosed(self.status_changed(cmd))])
    }

    fn status_changed(&self, cmd: &ChangeBudgetStatus) -> BudgetStatusChanged {
        BudgetStatusChanged {
            tenant_id: cmd.tenant_id,
            budget_id: cmd.budget_id,
            occurred_at: cmd.occurred_at,
        }
    }
}

/// Utilization of one budget line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineUtilization {
    pub ledger_id: LedgerId,
    pub budgeted: i64,
    pub utilized: i64,
    /// Negative when overspent.
    pub remaining: i64,
    pub percent_used: Decimal,
    pub over_budget: bool,
}

/// Utilization of a whole budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetUtilization {
    pub lines: Vec<LineUtilization>,
    pub budgeted: i64,
    pub utilized: i64,
    pub remaining: i64,
    pub percent_used: Decimal,
    pub over_budget: bool,
}

/// Compare budget lines with utilized amounts.
///
/// `utilized(ledger)` is the net spend on that ledger for the budget's fund and
/// year, floored at zero by the caller.
pub fn compute_utilization(
    lines: &[BudgetLine],
    utilized: impl Fn(LedgerId) -> i64,
) -> BudgetUtilization {
    let lines: Vec<LineUtilization> = lines
        .iter()
        .map(|line| {
            let used = utilized(line.ledger_id).max(0);
            LineUtilization {
                ledger_id: line.ledger_id,
                budgeted: line.amount,
                utilized: used,
                remaining: line.amount - used,
                percent_used: percent(used, line.amount),
                over_budget: used > line.amount,
            }
        })
        .collect();

    let budgeted: i64 = lines.iter().map(|l| l.budgeted).sum();
    let used: i64 = lines.iter().map(|l| l.utilized).sum();

    BudgetUtilization {
        over_budget: lines.iter().any(|l| l.over_budget),
        budgeted,
        utilized: used,
        remaining: budgeted - used,
        percent_used: percent(used, budgeted),
        lines,
    }
}

fn percent(used: i64, budgeted: i64) -> Decimal {
    if budgeted <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(used) * Decimal::ONE_HUNDRED / Decimal::from(budgeted))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use templeerp_events::execute;

    fn status(tenant_id: TenantId, budget_id: BudgetId) -> ChangeBudgetStatus {
        ChangeBudgetStatus {
            tenant_id,
            budget_id,
            occurred_at: Utc::now(),
        }
    }

    fn draft(tenant_id: TenantId) -> FundBudget {
        let budget_id = BudgetId::generate();
        let mut budget = FundBudget::empty(budget_id);
        execute(
            &mut budget,
            &BudgetCommand::CreateBudget(CreateBudget {
                tenant_id,
                budget_id,
                name: "Annual festival".to_string(),
                fund_code: "festival".to_string(),
                ac_year_id: AcYearId::generate(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        budget
    }

    fn set_line(budget: &FundBudget, tenant_id: TenantId, ledger_id: LedgerId, amount: i64) -> BudgetCommand {
        BudgetCommand::SetBudgetLine(SetBudgetLine {
            tenant_id,
            budget_id: budget.id_typed(),
            ledger_id,
            amount,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn fund_code_is_normalised() {
        let budget = draft(TenantId::new());
        assert_eq!(budget.fund_code(), "FESTIVAL");
    }

    #[test]
    fn setting_a_line_twice_replaces_it() {
        let tenant_id = TenantId::new();
        let mut budget = draft(tenant_id);
        let flowers = LedgerId::generate();

        let cmd = set_line(&budget, tenant_id, flowers, 10_000);
        execute(&mut budget, &cmd).unwrap();
        let cmd = set_line(&budget, tenant_id, flowers, 15_000);
        execute(&mut budget, &cmd).unwrap();

        assert_eq!(budget.lines().len(), 1);
        assert_eq!(budget.total_budgeted(), 15_000);
    }

    #[test]
    fn approve_requires_lines_and_freezes_budget() {
        let tenant_id = TenantId::new();
        let mut budget = draft(tenant_id);
        let budget_id = budget.id_typed();

        let err = budget
            .handle(&BudgetCommand::ApproveBudget(status(tenant_id, budget_id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let cmd = set_line(&budget, tenant_id, LedgerId::generate(), 5_000);
        execute(&mut budget, &cmd).unwrap();
        execute(&mut budget, &BudgetCommand::ApproveBudget(status(tenant_id, budget_id))).unwrap();
        assert_eq!(budget.status(), BudgetStatus::Approved);

        let err = budget
            .handle(&set_line(&budget, tenant_id, LedgerId::generate(), 1))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        execute(&mut budget, &BudgetCommand::CloseBudget(status(tenant_id, budget_id))).unwrap();
        assert_eq!(budget.status(), BudgetStatus::Closed);
    }

    #[test]
    fn draft_budget_cannot_be_closed() {
        let tenant_id = TenantId::new();
        let budget = draft(tenant_id);
        let err = budget
            .handle(&BudgetCommand::CloseBudget(status(tenant_id, budget.id_typed())))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn utilization_reports_remaining_and_overspend() {
        let flowers = LedgerId::generate();
        let lighting = LedgerId::generate();
        let lines = vec![
            BudgetLine { ledger_id: flowers, amount: 20_000 },
            BudgetLine { ledger_id: lighting, amount: 10_000 },
        ];
        let spent: HashMap<LedgerId, i64> = [(flowers, 5_000), (lighting, 12_500)].into_iter().collect();

        let u = compute_utilization(&lines, |id| spent.get(&id).copied().unwrap_or(0));

        assert_eq!(u.budgeted, 30_000);
        assert_eq!(u.utilized, 17_500);
        assert_eq!(u.remaining, 12_500);
        assert_eq!(u.percent_used, Decimal::new(5833, 2));
        assert!(u.over_budget);

        assert_eq!(u.lines[0].percent_used, Decimal::new(2500, 2));
        assert!(!u.lines[0].over_budget);
        assert_eq!(u.lines[1].remaining, -2_500);
        assert!(u.lines[1].over_budget);
    }

    #[test]
    fn negative_spend_counts_as_zero() {
        let ledger_id = LedgerId::generate();
        let u = compute_utilization(&[BudgetLine { ledger_id, amount: 1_000 }], |_| -400);
        assert_eq!(u.utilized, 0);
        assert_eq!(u.percent_used, Decimal::ZERO);
    }
}
