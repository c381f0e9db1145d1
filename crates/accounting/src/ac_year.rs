use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use templeerp_events::Event;

use crate::ledger::LedgerId;

templeerp_core::aggregate_id!(
    /// Accounting year identifier.
    AcYearId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcYearStatus {
    Open,
    Closed,
}

/// Opening balance of one ledger for one accounting year (minor units).
///
/// At most one side is non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalance {
    pub debit: i64,
    pub credit: i64,
}

impl OpeningBalance {
    /// Build from a signed, debit-positive balance.
    pub fn from_signed(balance: i128) -> Result<Self, DomainError> {
        let amount = i64::try_from(balance.unsigned_abs())
            .map_err(|_| DomainError::validation("opening balance out of range"))?;
        Ok(if balance >= 0 {
            Self { debit: amount, credit: 0 }
        } else {
            Self { debit: 0, credit: amount }
        })
    }

    /// Signed, debit-positive value.
    pub fn net(&self) -> i128 {
        self.debit as i128 - self.credit as i128
    }

    pub fn is_zero(&self) -> bool {
        self.debit == 0 && self.credit == 0
    }
}

/// Closing balance of one ledger, snapshotted when the year is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingBalance {
    pub ledger_id: LedgerId,
    /// Signed, debit-positive.
    pub balance: i64,
}

/// Aggregate root: AcYear (accounting / fiscal year).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcYear {
    id: AcYearId,
    tenant_id: Option<TenantId>,
    name: String,
    from_date: NaiveDate,
    to_date: NaiveDate,
    status: AcYearStatus,
    active: bool,
    opening_balances: BTreeMap<LedgerId, OpeningBalance>,
    closing_balances: Vec<ClosingBalance>,
    next_year_id: Option<AcYearId>,
    version: u64,
    created: bool,
}

impl AcYear {
    /// Empty aggregate for rehydration.
    pub fn empty(id: AcYearId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            from_date: NaiveDate::MIN,
            to_date: NaiveDate::MIN,
            status: AcYearStatus::Open,
            active: false,
            opening_balances: BTreeMap::new(),
            closing_balances: Vec::new(),
            next_year_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AcYearId {
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

    pub fn from_date(&self) -> NaiveDate {
        self.from_date
    }

    pub fn to_date(&self) -> NaiveDate {
        self.to_date
    }

    pub fn status(&self) -> AcYearStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn next_year_id(&self) -> Option<AcYearId> {
        self.next_year_id
    }

    pub fn opening_balances(&self) -> &BTreeMap<LedgerId, OpeningBalance> {
        &self.opening_balances
    }

    pub fn closing_balances(&self) -> &[ClosingBalance] {
        &self.closing_balances
    }

    /// Inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from_date <= date && date <= self.to_date
    }

    /// Signed, debit-positive opening balance for a ledger (zero when unset).
    pub fn opening_for(&self, ledger_id: LedgerId) -> i128 {
        self.opening_balances
            .get(&ledger_id)
            .map(OpeningBalance::net)
            .unwrap_or(0)
    }

    /// Whether entries dated `date` may be posted into this year.
    pub fn accepts_postings_on(&self, date: NaiveDate) -> bool {
        self.created && self.status == AcYearStatus::Open && self.contains(date)
    }
}

impl AggregateRoot for AcYear {
    type Id = AcYearId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateAcYear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAcYear {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub name: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetOpeningBalance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOpeningBalance {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub ledger_id: LedgerId,
    pub debit: i64,
    pub credit: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateAcYear / DeactivateAcYear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeActivation {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseAcYear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAcYear {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub closing_balances: Vec<ClosingBalance>,
    pub next_year_id: Option<AcYearId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcYearCommand {
    CreateAcYear(CreateAcYear),
    SetOpeningBalance(SetOpeningBalance),
    ActivateAcYear(ChangeActivation),
    DeactivateAcYear(ChangeActivation),
    CloseAcYear(CloseAcYear),
}

/// Event: AcYearCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcYearCreated {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub name: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OpeningBalanceSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalanceSet {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub ledger_id: LedgerId,
    pub debit: i64,
    pub credit: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AcYearActivated / AcYearDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcYearActivationChanged {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AcYearClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcYearClosed {
    pub tenant_id: TenantId,
    pub year_id: AcYearId,
    pub closing_balances: Vec<ClosingBalance>,
    pub next_year_id: Option<AcYearId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcYearEvent {
    AcYearCreated(AcYearCreated),
    OpeningBalanceSet(OpeningBalanceSet),
    AcYearActivated(AcYearActivationChanged),
    AcYearDeactivated(AcYearActivationChanged),
    AcYearClosed(AcYearClosed),
}

impl AcYearEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            AcYearEvent::AcYearCreated(e) => e.tenant_id,
            AcYearEvent::OpeningBalanceSet(e) => e.tenant_id,
            AcYearEvent::AcYearActivated(e) | AcYearEvent::AcYearDeactivated(e) => e.tenant_id,
            AcYearEvent::AcYearClosed(e) => e.tenant_id,
        }
    }

    pub fn year_id(&self) -> AcYearId {
        match self {
            AcYearEvent::AcYearCreated(e) => e.year_id,
            AcYearEvent::OpeningBalanceSet(e) => e.year_id,
            AcYearEvent::AcYearActivated(e) | AcYearEvent::AcYearDeactivated(e) => e.year_id,
            AcYearEvent::AcYearClosed(e) => e.year_id,
        }
    }
}

impl Event for AcYearEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AcYearEvent::AcYearCreated(_) => "accounting.ac_year.created",
            AcYearEvent::OpeningBalanceSet(_) => "accounting.ac_year.opening_balance_set",
            AcYearEvent::AcYearActivated(_) => "accounting.ac_year.activated",
            AcYearEvent::AcYearDeactivated(_) => "accounting.ac_year.deactivated",
            AcYearEvent::AcYearClosed(_) => "accounting.ac_year.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AcYearEvent::AcYearCreated(e) => e.occurred_at,
            AcYearEvent::OpeningBalanceSet(e) => e.occurred_at,
            AcYearEvent::AcYearActivated(e) | AcYearEvent::AcYearDeactivated(e) => e.occurred_at,
            AcYearEvent::AcYearClosed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for AcYear {
    type Command = AcYearCommand;
    type Event = AcYearEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AcYearEvent::AcYearCreated(e) => {
                self.id = e.year_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.from_date = e.from_date;
                self.to_date = e.to_date;
                self.status = AcYearStatus::Open;
                self.active = false;
                self.opening_balances.clear();
                self.created = true;
            }
            AcYearEvent::OpeningBalanceSet(e) => {
                let opening = OpeningBalance {
                    debit: e.debit,
                    credit: e.credit,
                };
                if opening.is_zero() {
                    self.opening_balances.remove(&e.ledger_id);
                } else {
                    self.opening_balances.insert(e.ledger_id, opening);
                }
            }
            AcYearEvent::AcYearActivated(_) => {
                self.active = true;
            }
            AcYearEvent::AcYearDeactivated(_) => {
                self.active = false;
            }
            AcYearEvent::AcYearClosed(e) => {
                self.status = AcYearStatus::Closed;
                self.active = false;
                self.closing_balances = e.closing_balances.clone();
                self.next_year_id = e.next_year_id;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AcYearCommand::CreateAcYear(cmd) => self.handle_create(cmd),
            AcYearCommand::SetOpeningBalance(cmd) => self.handle_set_opening(cmd),
            AcYearCommand::ActivateAcYear(cmd) => self.handle_activate(cmd),
            AcYearCommand::DeactivateAcYear(cmd) => self.handle_deactivate(cmd),
            AcYearCommand::CloseAcYear(cmd) => self.handle_close(cmd),
        }
    }
}

impl AcYear {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_year_id(&self, year_id: AcYearId) -> Result<(), DomainError> {
        if self.id != year_id {
            return Err(DomainError::invariant("year_id mismatch"));
        }
        Ok(())
    }

    fn ensure_open(&self, tenant_id: TenantId, year_id: AcYearId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_year_id(year_id)?;
        if self.status == AcYearStatus::Closed {
            return Err(DomainError::invariant("accounting year is closed"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateAcYear) -> Result<Vec<AcYearEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("accounting year already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("accounting year name cannot be empty"));
        }
        if cmd.from_date >= cmd.to_date {
            return Err(DomainError::validation("from_date must be before to_date"));
        }

        Ok(vec![AcYearEvent::AcYearCreated(AcYearCreated {
            tenant_id: cmd.tenant_id,
            year_id: cmd.year_id,
            name: cmd.name.trim().to_string(),
            from_date: cmd.from_date,
            to_date: cmd.to_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_opening(&self, cmd: &SetOpeningBalance) -> Result<Vec<AcYearEvent>, DomainError> {
        self.ensure_open(cmd.tenant_id, cmd.year_id)?;
        if cmd.debit < 0 || cmd.credit < 0 {
            return Err(DomainError::validation("opening balance cannot be negative"));
        }
        if cmd.debit > 0 && cmd.credit > 0 {
            return Err(DomainError::validation(
                "opening balance must be either debit or credit, not both",
            ));
        }

        Ok(vec![AcYearEvent::OpeningBalanceSet(OpeningBalanceSet {
            tenant_id: cmd.tenant_id,
            year_id: cmd.year_id,
            ledger_id: cmd.ledger_id,
            debit: cmd.debit,
            credit: cmd.credit,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ChangeActivation) -> Result<Vec<AcYearEvent>, DomainError> {
        self.ensure_open(cmd.tenant_id, cmd.year_id)?;
        if self.active {
            return Ok(vec![]);
        }

        Ok(vec![AcYearEvent::AcYearActivated(AcYearActivationChanged {
            tenant_id: cmd.tenant_id,
            year_id: cmd.year_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &ChangeActivation) -> Result<Vec<AcYearEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_year_id(cmd.year_id)?;
        if !self.active {
            return Ok(vec![]);
        }

        Ok(vec![AcYearEvent::AcYearDeactivated(AcYearActivationChanged {
            tenant_id: cmd.tenant_id,
            year_id: cmd.year_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseAcYear) -> Result<Vec<AcYearEvent>, DomainError> {
        self.ensure_open(cmd.tenant_id, cmd.year_id)?;
        if cmd.next_year_id == Some(self.id) {
            return Err(DomainError::validation("next year cannot be the closing year"));
        }

        Ok(vec![AcYearEvent::AcYearClosed(AcYearClosed {
            tenant_id: cmd.tenant_id,
            year_id: cmd.year_id,
            closing_balances: cmd.closing_balances.clone(),
            next_year_id: cmd.next_year_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use templeerp_events::execute;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn created_year(tenant_id: TenantId) -> AcYear {
        let year_id = AcYearId::generate();
        let mut year = AcYear::empty(year_id);
        execute(
            &mut year,
            &AcYearCommand::CreateAcYear(CreateAcYear {
                tenant_id,
                year_id,
                name: "FY 2025-26".to_string(),
                from_date: date(2025, 4, 1),
                to_date: date(2026, 3, 31),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        year
    }

    fn opening(year: &AcYear, tenant_id: TenantId, ledger_id: LedgerId, debit: i64, credit: i64) -> AcYearCommand {
        AcYearCommand::SetOpeningBalance(SetOpeningBalance {
            tenant_id,
            year_id: year.id_typed(),
            ledger_id,
            debit,
            credit,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn year_range_must_be_ordered() {
        let year_id = AcYearId::generate();
        let err = AcYear::empty(year_id)
            .handle(&AcYearCommand::CreateAcYear(CreateAcYear {
                tenant_id: TenantId::new(),
                year_id,
                name: "bad".to_string(),
                from_date: date(2026, 3, 31),
                to_date: date(2025, 4, 1),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn contains_is_inclusive() {
        let year = created_year(TenantId::new());
        assert!(year.contains(date(2025, 4, 1)));
        assert!(year.contains(date(2026, 3, 31)));
        assert!(!year.contains(date(2026, 4, 1)));
        assert!(!year.contains(date(2025, 3, 31)));
    }

    #[test]
    fn opening_balance_replaces_previous_value() {
        let tenant_id = TenantId::new();
        let mut year = created_year(tenant_id);
        let cash = LedgerId::generate();

        let cmd = opening(&year, tenant_id, cash, 10_000, 0);
        execute(&mut year, &cmd).unwrap();
        let cmd = opening(&year, tenant_id, cash, 0, 2_500);
        execute(&mut year, &cmd).unwrap();

        assert_eq!(year.opening_for(cash), -2_500);
        assert_eq!(year.opening_for(LedgerId::generate()), 0);
    }

    #[test]
    fn opening_balance_cannot_have_both_sides() {
        let tenant_id = TenantId::new();
        let year = created_year(tenant_id);
        let err = year
            .handle(&opening(&year, tenant_id, LedgerId::generate(), 100, 100))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn closed_year_rejects_changes_and_is_inactive() {
        let tenant_id = TenantId::new();
        let mut year = created_year(tenant_id);
        let year_id = year.id_typed();
        execute(
            &mut year,
            &AcYearCommand::ActivateAcYear(ChangeActivation {
                tenant_id,
                year_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(year.is_active());

        execute(
            &mut year,
            &AcYearCommand::CloseAcYear(CloseAcYear {
                tenant_id,
                year_id,
                closing_balances: vec![],
                next_year_id: Some(AcYearId::generate()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(year.status(), AcYearStatus::Closed);
        assert!(!year.is_active());
        assert!(!year.accepts_postings_on(date(2025, 6, 1)));

        let err = year
            .handle(&opening(&year, tenant_id, LedgerId::generate(), 1, 0))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("closed")));
    }

    #[test]
    fn activating_an_active_year_emits_nothing() {
        let tenant_id = TenantId::new();
        let mut year = created_year(tenant_id);
        let cmd = AcYearCommand::ActivateAcYear(ChangeActivation {
            tenant_id,
            year_id: year.id_typed(),
            occurred_at: Utc::now(),
        });
        execute(&mut year, &cmd).unwrap();
        assert!(year.handle(&cmd).unwrap().is_empty());
    }

    #[test]
    fn opening_balance_from_signed() {
        assert_eq!(
            OpeningBalance::from_signed(-500).unwrap(),
            OpeningBalance { debit: 0, credit: 500 }
        );
        assert_eq!(OpeningBalance::from_signed(700).unwrap().net(), 700);
    }
}
