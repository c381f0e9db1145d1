use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId, format_amount};
use templeerp_events::Event;

use crate::ac_year::AcYearId;
use crate::ledger::LedgerId;

templeerp_core::aggregate_id!(
    /// Journal entry identifier.
    EntryId
);

/// Voucher type of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money received (donations, offerings, sales).
    Receipt,
    /// Money paid out.
    Payment,
    Journal,
    /// Transfer between cash and bank ledgers.
    Contra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// One debit or credit line of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryItem {
    pub ledger_id: LedgerId,
    pub side: Side,
    /// Positive amount in minor units.
    pub amount: i64,
    pub narration: Option<String>,
}

impl EntryItem {
    pub fn debit(&self) -> i64 {
        if self.side == Side::Debit { self.amount } else { 0 }
    }

    pub fn credit(&self) -> i64 {
        if self.side == Side::Credit { self.amount } else { 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Posted,
    Voided,
}

/// Aggregate root: JournalEntry (an `Entry` with its `EntryItem`s).
///
/// Entries are immutable once posted; corrections are made by voiding and
/// posting again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    id: EntryId,
    tenant_id: Option<TenantId>,
    entry_no: String,
    entry_type: EntryType,
    date: NaiveDate,
    ac_year_id: Option<AcYearId>,
    fund_code: Option<String>,
    narration: Option<String>,
    items: Vec<EntryItem>,
    status: EntryStatus,
    version: u64,
    created: bool,
}

impl JournalEntry {
    /// Empty aggregate for rehydration.
    pub fn empty(id: EntryId) -> Self {
        Self {
            id,
            tenant_id: None,
            entry_no: String::new(),
            entry_type: EntryType::Journal,
            date: NaiveDate::MIN,
            ac_year_id: None,
            fund_code: None,
            narration: None,
            items: Vec::new(),
            status: EntryStatus::Posted,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> EntryId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn entry_no(&self) -> &str {
        &self.entry_no
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn ac_year_id(&self) -> Option<AcYearId> {
        self.ac_year_id
    }

    pub fn fund_code(&self) -> Option<&str> {
        self.fund_code.as_deref()
    }

    pub fn items(&self) -> &[EntryItem] {
        &self.items
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn total_debit(&self) -> i128 {
        self.items.iter().map(|i| i.debit() as i128).sum()
    }

    pub fn total_credit(&self) -> i128 {
        self.items.iter().map(|i| i.credit() as i128).sum()
    }

    /// Voucher amount for display, e.g. `"12,500.00"`.
    pub fn amount_display(&self) -> String {
        format_amount(self.total_debit())
    }
}

impl AggregateRoot for JournalEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PostEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    pub tenant_id: TenantId,
    pub entry_id: EntryId,
    pub entry_no: String,
    pub entry_type: EntryType,
    pub date: NaiveDate,
    pub ac_year_id: AcYearId,
    pub fund_code: Option<String>,
    pub narration: Option<String>,
    pub items: Vec<EntryItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidEntry {
    pub tenant_id: TenantId,
    pub entry_id: EntryId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryCommand {
    PostEntry(PostEntry),
    VoidEntry(VoidEntry),
}

/// Event: EntryPosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPosted {
    pub tenant_id: TenantId,
    pub entry_id: EntryId,
    pub entry_no: String,
    pub entry_type: EntryType,
    pub date: NaiveDate,
    pub ac_year_id: AcYearId,
    pub fund_code: Option<String>,
    pub narration: Option<String>,
    pub items: Vec<EntryItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryVoided {
    pub tenant_id: TenantId,
    pub entry_id: EntryId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryEvent {
    EntryPosted(EntryPosted),
    EntryVoided(EntryVoided),
}

impl EntryEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            EntryEvent::EntryPosted(e) => e.tenant_id,
            EntryEvent::EntryVoided(e) => e.tenant_id,
        }
    }

    pub fn entry_id(&self) -> EntryId {
        match self {
            EntryEvent::EntryPosted(e) => e.entry_id,
            EntryEvent::EntryVoided(e) => e.entry_id,
        }
    }
}

impl Event for EntryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EntryEvent::EntryPosted(_) => "accounting.entry.posted",
            EntryEvent::EntryVoided(_) => "accounting.entry.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EntryEvent::EntryPosted(e) => e.occurred_at,
            EntryEvent::EntryVoided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for JournalEntry {
    type Command = EntryCommand;
    type Event = EntryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EntryEvent::EntryPosted(e) => {
                self.id = e.entry_id;
                self.tenant_id = Some(e.tenant_id);
                self.entry_no = e.entry_no.clone();
                self.entry_type = e.entry_type;
                self.date = e.date;
                self.ac_year_id = Some(e.ac_year_id);
                self.fund_code = e.fund_code.clone();
                self.narration = e.narration.clone();
                self.items = e.items.clone();
                self.status = EntryStatus::Posted;
                self.created = true;
            }
            EntryEvent::EntryVoided(_) => {
                self.status = EntryStatus::Voided;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EntryCommand::PostEntry(cmd) => self.handle_post(cmd),
            EntryCommand::VoidEntry(cmd) => self.handle_void(cmd),
        }
    }
}

impl JournalEntry {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_post(&self, cmd: &PostEntry) -> Result<Vec<EntryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("entry already posted"));
        }
        if cmd.entry_no.trim().is_empty() {
            return Err(DomainError::validation("entry number cannot be empty"));
        }
        if cmd.items.len() < 2 {
            return Err(DomainError::validation("entry must have at least two items"));
        }

        let mut debit_total: i128 = 0;
        let mut credit_total: i128 = 0;
        for item in &cmd.items {
            if item.amount <= 0 {
                return Err(DomainError::validation("amount must be positive"));
            }
            match item.side {
                Side::Debit => debit_total += item.amount as i128,
                Side::Credit => credit_total += item.amount as i128,
            }
        }

        if debit_total == 0 || credit_total == 0 {
            return Err(DomainError::invariant(
                "entry needs at least one debit and one credit",
            ));
        }
        if debit_total != credit_total {
            return Err(DomainError::invariant("debits must equal credits"));
        }

        Ok(vec![EntryEvent::EntryPosted(EntryPosted {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            entry_no: cmd.entry_no.trim().to_string(),
            entry_type: cmd.entry_type,
            date: cmd.date,
            ac_year_id: cmd.ac_year_id,
            fund_code: cmd.fund_code.clone().filter(|f| !f.trim().is_empty()),
            narration: cmd.narration.clone(),
            items: cmd.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidEntry) -> Result<Vec<EntryEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        if self.id != cmd.entry_id {
            return Err(DomainError::invariant("entry_id mismatch"));
        }
        if self.status == EntryStatus::Voided {
            return Err(DomainError::invariant("entry is already voided"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("void reason is required"));
        }

        Ok(vec![EntryEvent::EntryVoided(EntryVoided {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
