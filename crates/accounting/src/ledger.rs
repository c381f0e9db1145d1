use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use templeerp_events::Event;

templeerp_core::aggregate_id!(
    /// Ledger (chart-of-accounts entry) identifier.
    LedgerId
);

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    /// Balance-sheet kinds carry their closing balance into the next year.
    pub fn is_balance_sheet(self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Liability | AccountKind::Equity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Active,
    Inactive,
}

/// Aggregate root: Ledger.
///
/// A ledger is either a posting ledger (receives entry items) or a group
/// ledger that only rolls up the balances of its children. The ledger never
/// holds its own balance; balances are projected from posted entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    id: LedgerId,
    tenant_id: Option<TenantId>,
    code: String,
    name: String,
    kind: AccountKind,
    parent: Option<LedgerId>,
    is_group: bool,
    status: LedgerStatus,
    version: u64,
    created: bool,
}

impl Ledger {
    /// Empty aggregate for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            name: String::new(),
            kind: AccountKind::Asset,
            parent: None,
            is_group: false,
            status: LedgerStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn parent(&self) -> Option<LedgerId> {
        self.parent
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn status(&self) -> LedgerStatus {
        self.status
    }

    /// Entry items may only target active, non-group ledgers.
    pub fn can_post(&self) -> bool {
        self.created && self.status == LedgerStatus::Active && !self.is_group
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateLedger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLedger {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub parent: Option<LedgerId>,
    pub is_group: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameLedger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameLedger {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateLedger / ReactivateLedger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLedgerStatus {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    CreateLedger(CreateLedger),
    RenameLedger(RenameLedger),
    DeactivateLedger(ChangeLedgerStatus),
    ReactivateLedger(ChangeLedgerStatus),
}

/// Event: LedgerCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCreated {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub parent: Option<LedgerId>,
    pub is_group: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LedgerRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRenamed {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LedgerDeactivated / LedgerReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatusChanged {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    LedgerCreated(LedgerCreated),
    LedgerRenamed(LedgerRenamed),
    LedgerDeactivated(LedgerStatusChanged),
    LedgerReactivated(LedgerStatusChanged),
}

impl LedgerEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            LedgerEvent::LedgerCreated(e) => e.tenant_id,
            LedgerEvent::LedgerRenamed(e) => e.tenant_id,
            LedgerEvent::LedgerDeactivated(e) | LedgerEvent::LedgerReactivated(e) => e.tenant_id,
        }
    }

    pub fn ledger_id(&self) -> LedgerId {
        match self {
            LedgerEvent::LedgerCreated(e) => e.ledger_id,
            LedgerEvent::LedgerRenamed(e) => e.ledger_id,
            LedgerEvent::LedgerDeactivated(e) | LedgerEvent::LedgerReactivated(e) => e.ledger_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::LedgerCreated(_) => "accounting.ledger.created",
            LedgerEvent::LedgerRenamed(_) => "accounting.ledger.renamed",
            LedgerEvent::LedgerDeactivated(_) => "accounting.ledger.deactivated",
            LedgerEvent::LedgerReactivated(_) => "accounting.ledger.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::LedgerCreated(e) => e.occurred_at,
            LedgerEvent::LedgerRenamed(e) => e.occurred_at,
            LedgerEvent::LedgerDeactivated(e) | LedgerEvent::LedgerReactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::LedgerCreated(e) => {
                self.id = e.ledger_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.kind = e.kind;
                self.parent = e.parent;
                self.is_group = e.is_group;
                self.status = LedgerStatus::Active;
                self.created = true;
            }
            LedgerEvent::LedgerRenamed(e) => {
                self.name = e.name.clone();
            }
            LedgerEvent::LedgerDeactivated(_) => {
                self.status = LedgerStatus::Inactive;
            }
            LedgerEvent::LedgerReactivated(_) => {
                self.status = LedgerStatus::Active;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::CreateLedger(cmd) => self.handle_create(cmd),
            LedgerCommand::RenameLedger(cmd) => self.handle_rename(cmd),
            LedgerCommand::DeactivateLedger(cmd) => self.handle_deactivate(cmd),
            LedgerCommand::ReactivateLedger(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Ledger {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_ledger_id(&self, ledger_id: LedgerId) -> Result<(), DomainError> {
        if self.id != ledger_id {
            return Err(DomainError::invariant("ledger_id mismatch"));
        }
        Ok(())
    }

    fn ensure_existing(&self, tenant_id: TenantId, ledger_id: LedgerId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_ledger_id(ledger_id)
    }

    fn handle_create(&self, cmd: &CreateLedger) -> Result<Vec<LedgerEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ledger already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("ledger code cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("ledger name cannot be empty"));
        }
        if cmd.parent == Some(cmd.ledger_id) {
            return Err(DomainError::validation("ledger cannot be its own parent"));
        }

        Ok(vec![LedgerEvent::LedgerCreated(LedgerCreated {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            code: cmd.code.trim().to_string(),
            name: cmd.name.trim().to_string(),
            kind: cmd.kind,
            parent: cmd.parent,
            is_group: cmd.is_group,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameLedger) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.ledger_id)?;
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("ledger name cannot be empty"));
        }
        if name == self.name {
            return Ok(vec![]);
        }

        Ok(vec![LedgerEvent::LedgerRenamed(LedgerRenamed {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            name: name.to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &ChangeLedgerStatus) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.ledger_id)?;
        if self.status == LedgerStatus::Inactive {
            return Err(DomainError::invariant("ledger is already inactive"));
        }

        Ok(vec![LedgerEvent::LedgerDeactivated(LedgerStatusChanged {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ChangeLedgerStatus) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.ledger_id)?;
        if self.status == LedgerStatus::Active {
            return Err(DomainError::invariant("ledger is already active"));
        }

        Ok(vec![LedgerEvent::LedgerReactivated(LedgerStatusChanged {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use templeerp_events::execute;

    fn create(tenant_id: TenantId, ledger_id: LedgerId, is_group: bool) -> LedgerCommand {
        LedgerCommand::CreateLedger(CreateLedger {
            tenant_id,
            ledger_id,
            code: " 1000 ".to_string(),
            name: "Cash in hand".to_string(),
            kind: AccountKind::Asset,
            parent: None,
            is_group,
            occurred_at: Utc::now(),
        })
    }

    fn status_change(tenant_id: TenantId, ledger_id: LedgerId) -> ChangeLedgerStatus {
        ChangeLedgerStatus {
            tenant_id,
            ledger_id,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn create_trims_code_and_marks_postable() {
        let tenant_id = TenantId::new();
        let ledger_id = LedgerId::generate();
        let mut ledger = Ledger::empty(ledger_id);

        execute(&mut ledger, &create(tenant_id, ledger_id, false)).unwrap();

        assert_eq!(ledger.code(), "1000");
        assert!(ledger.can_post());
        assert_eq!(ledger.version(), 1);
    }

    #[test]
    fn group_ledgers_cannot_receive_postings() {
        let tenant_id = TenantId::new();
        let ledger_id = LedgerId::generate();
        let mut ledger = Ledger::empty(ledger_id);

        execute(&mut ledger, &create(tenant_id, ledger_id, true)).unwrap();

        assert!(ledger.is_group());
        assert!(!ledger.can_post());
    }

    #[test]
    fn ledger_cannot_be_its_own_parent() {
        let ledger_id = LedgerId::generate();
        let ledger = Ledger::empty(ledger_id);
        let LedgerCommand::CreateLedger(mut cmd) = create(TenantId::new(), ledger_id, false) else {
            unreachable!()
        };
        cmd.parent = Some(ledger_id);

        let err = ledger.handle(&LedgerCommand::CreateLedger(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deactivate_twice_is_rejected() {
        let tenant_id = TenantId::new();
        let ledger_id = LedgerId::generate();
        let mut ledger = Ledger::empty(ledger_id);
        execute(&mut ledger, &create(tenant_id, ledger_id, false)).unwrap();

        let deactivate = LedgerCommand::DeactivateLedger(status_change(tenant_id, ledger_id));
        execute(&mut ledger, &deactivate).unwrap();
        assert!(!ledger.can_post());

        let err = ledger.handle(&deactivate).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        execute(
            &mut ledger,
            &LedgerCommand::ReactivateLedger(status_change(tenant_id, ledger_id)),
        )
        .unwrap();
        assert!(ledger.can_post());
    }

    #[test]
    fn other_tenants_cannot_touch_the_ledger() {
        let ledger_id = LedgerId::generate();
        let mut ledger = Ledger::empty(ledger_id);
        execute(&mut ledger, &create(TenantId::new(), ledger_id, false)).unwrap();

        let err = ledger
            .handle(&LedgerCommand::DeactivateLedger(status_change(TenantId::new(), ledger_id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg == "tenant mismatch"));
    }

    #[test]
    fn renaming_to_the_same_name_is_a_no_op() {
        let tenant_id = TenantId::new();
        let ledger_id = LedgerId::generate();
        let mut ledger = Ledger::empty(ledger_id);
        execute(&mut ledger, &create(tenant_id, ledger_id, false)).unwrap();

        let events = ledger
            .handle(&LedgerCommand::RenameLedger(RenameLedger {
                tenant_id,
                ledger_id,
                name: "Cash in hand".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }
}
