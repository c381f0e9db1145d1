//! Pagoda light tower: numbered lights rented to devotees for a period.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, DomainResult, TenantId, extend};
use templeerp_events::Event;

templeerp_core::aggregate_id!(
    /// Pagoda tower identifier.
    PagodaTowerId
);

templeerp_core::aggregate_id!(
    /// Identifier of one light registration inside a tower.
    RegistrationId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Active,
    Cancelled,
}

/// Status shown to staff for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Active,
    Upcoming,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightRegistration {
    pub registration_id: RegistrationId,
    pub light_number: u32,
    pub devotee_name: String,
    pub devotee_contact: Option<String>,
    pub dedicated_to: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_paid: i64,
    pub status: RegistrationStatus,
}

impl LightRegistration {
    pub fn display_status(&self, on: NaiveDate) -> DisplayStatus {
        if self.status == RegistrationStatus::Cancelled {
            DisplayStatus::Cancelled
        } else if on < self.start_date {
            DisplayStatus::Upcoming
        } else if on > self.end_date {
            DisplayStatus::Expired
        } else {
            DisplayStatus::Active
        }
    }

    fn overlaps(&self, light_number: u32, start: NaiveDate, end: NaiveDate) -> bool {
        self.status == RegistrationStatus::Active
            && self.light_number == light_number
            && self.start_date <= end
            && start <= self.end_date
    }
}

/// Aggregate root: PagodaTower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagodaTower {
    id: PagodaTowerId,
    tenant_id: Option<TenantId>,
    code: String,
    name: String,
    total_lights: u32,
    annual_fee: i64,
    registrations: Vec<LightRegistration>,
    version: u64,
    created: bool,
}

impl PagodaTower {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PagodaTowerId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            name: String::new(),
            total_lights: 0,
            annual_fee: 0,
            registrations: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PagodaTowerId {
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

    pub fn total_lights(&self) -> u32 {
        self.total_lights
    }

    pub fn annual_fee(&self) -> i64 {
        self.annual_fee
    }

    pub fn registrations(&self) -> &[LightRegistration] {
        &self.registrations
    }

    pub fn registration(&self, id: RegistrationId) -> Option<&LightRegistration> {
        self.registrations.iter().find(|r| r.registration_id == id)
    }

    /// Pro-rated fee: `annual_fee × months / 12`, rounded to the minor unit.
    pub fn fee_for_months(&self, months: u32) -> DomainResult<i64> {
        extend(Decimal::from(months) / Decimal::from(12), self.annual_fee)
    }

    /// Light numbers with a live (not cancelled) registration covering `on`.
    pub fn occupied_lights(&self, on: NaiveDate) -> Vec<u32> {
        let mut lights: Vec<u32> = self
            .registrations
            .iter()
            .filter(|r| r.display_status(on) == DisplayStatus::Active)
            .map(|r| r.light_number)
            .collect();
        lights.sort_unstable();
        lights.dedup();
        lights
    }

    pub fn available_lights(&self, on: NaiveDate) -> u32 {
        self.total_lights
            .saturating_sub(self.occupied_lights(on).len() as u32)
    }

    fn conflicting(
        &self,
        light_number: u32,
        start: NaiveDate,
        end: NaiveDate,
        except: Option<RegistrationId>,
    ) -> Option<&LightRegistration> {
        self.registrations
            .iter()
            .filter(|r| Some(r.registration_id) != except)
            .find(|r| r.overlaps(light_number, start, end))
    }
}

impl AggregateRoot for PagodaTower {
    type Id = PagodaTowerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTower {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub code: String,
    pub name: String,
    pub total_lights: u32,
    pub annual_fee: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterLight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLight {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub registration_id: RegistrationId,
    pub light_number: u32,
    pub devotee_name: String,
    pub devotee_contact: Option<String>,
    pub dedicated_to: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_paid: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenewRegistration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewRegistration {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub registration_id: RegistrationId,
    pub months: u32,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRegistration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRegistration {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub registration_id: RegistrationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagodaCommand {
    CreateTower(CreateTower),
    RegisterLight(RegisterLight),
    RenewRegistration(RenewRegistration),
    CancelRegistration(CancelRegistration),
}

/// Event: TowerCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerCreated {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub code: String,
    pub name: String,
    pub total_lights: u32,
    pub annual_fee: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LightRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightRegistered {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub registration: LightRegistration,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RegistrationRenewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRenewed {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub registration_id: RegistrationId,
    pub months: u32,
    pub amount: i64,
    pub new_end_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RegistrationCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCancelled {
    pub tenant_id: TenantId,
    pub tower_id: PagodaTowerId,
    pub registration_id: RegistrationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagodaEvent {
    TowerCreated(TowerCreated),
    LightRegistered(LightRegistered),
    RegistrationRenewed(RegistrationRenewed),
    RegistrationCancelled(RegistrationCancelled),
}

impl PagodaEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            PagodaEvent::TowerCreated(e) => e.tenant_id,
            PagodaEvent::LightRegistered(e) => e.tenant_id,
            PagodaEvent::RegistrationRenewed(e) => e.tenant_id,
            PagodaEvent::RegistrationCancelled(e) => e.tenant_id,
        }
    }

    pub fn tower_id(&self) -> PagodaTowerId {
        match self {
            PagodaEvent::TowerCreated(e) => e.tower_id,
            PagodaEvent::LightRegistered(e) => e.tower_id,
            PagodaEvent::RegistrationRenewed(e) => e.tower_id,
            PagodaEvent::RegistrationCancelled(e) => e.tower_id,
        }
    }
}

impl Event for PagodaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PagodaEvent::TowerCreated(_) => "temple.pagoda_tower.created",
            PagodaEvent::LightRegistered(_) => "temple.pagoda_tower.light_registered",
            PagodaEvent::RegistrationRenewed(_) => "temple.pagoda_tower.registration_renewed",
            PagodaEvent::RegistrationCancelled(_) => "temple.pagoda_tower.registration_cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PagodaEvent::TowerCreated(e) => e.occurred_at,
            PagodaEvent::LightRegistered(e) => e.occurred_at,
            PagodaEvent::RegistrationRenewed(e) => e.occurred_at,
            PagodaEvent::RegistrationCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PagodaTower {
    type Command = PagodaCommand;
    type Event = PagodaEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PagodaEvent::TowerCreated(e) => {
                self.id = e.tower_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.total_lights = e.total_lights;
                self.annual_fee = e.annual_fee;
                self.created = true;
            }
            PagodaEvent::LightRegistered(e) => {
                self.registrations.push(e.registration.clone());
            }
            PagodaEvent::RegistrationRenewed(e) => {
                if let Some(r) = self.registration_mut(e.registration_id) {
                    r.end_date = e.new_end_date;
                    r.amount_paid += e.amount;
                }
            }
            PagodaEvent::RegistrationCancelled(e) => {
                if let Some(r) = self.registration_mut(e.registration_id) {
                    r.status = RegistrationStatus::Cancelled;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PagodaCommand::CreateTower(cmd) => self.handle_create(cmd),
            PagodaCommand::RegisterLight(cmd) => self.handle_register(cmd),
            PagodaCommand::RenewRegistration(cmd) => self.handle_renew(cmd),
            PagodaCommand::CancelRegistration(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PagodaTower {
    fn registration_mut(&mut self, id: RegistrationId) -> Option<&mut LightRegistration> {
        self.registrations.iter_mut().find(|r| r.registration_id == id)
    }

    fn ensure_existing(&self, tenant_id: TenantId, tower_id: PagodaTowerId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != tower_id {
            return Err(DomainError::invariant("tower_id mismatch"));
        }
        Ok(())
    }

    fn active_registration(&self, id: RegistrationId) -> Result<&LightRegistration, DomainError> {
        let registration = self
            .registration(id)
            .ok_or_else(|| DomainError::validation(format!("unknown registration {id}")))?;
        if registration.status == RegistrationStatus::Cancelled {
            return Err(DomainError::invariant("registration is cancelled"));
        }
        Ok(registration)
    }

    fn handle_create(&self, cmd: &CreateTower) -> Result<Vec<PagodaEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("pagoda tower already exists"));
        }
        if cmd.code.trim().is_empty() || cmd.name.trim().is_empty() {
            return Err(DomainError::validation("code and name are required"));
        }
        if cmd.total_lights == 0 {
            return Err(DomainError::validation("a tower needs at least one light"));
        }
        if cmd.annual_fee < 0 {
            return Err(DomainError::validation("annual fee cannot be negative"));
        }

        Ok(vec![PagodaEvent::TowerCreated(TowerCreated {
            tenant_id: cmd.tenant_id,
            tower_id: cmd.tower_id,
            code: cmd.code.trim().to_string(),
            name: cmd.name.trim().to_string(),
            total_lights: cmd.total_lights,
            annual_fee: cmd.annual_fee,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register(&self, cmd: &RegisterLight) -> Result<Vec<PagodaEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.tower_id)?;

        if cmd.light_number == 0 || cmd.light_number > self.total_lights {
            return Err(DomainError::validation(format!(
                "light number must be between 1 and {}",
                self.total_lights
            )));
        }
        if cmd.devotee_name.trim().is_empty() {
            return Err(DomainError::validation("devotee name is required"));
        }
        if cmd.end_date < cmd.start_date {
            return Err(DomainError::validation("end date cannot be before start date"));
        }
        if cmd.amount_paid < 0 {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        if self.registration(cmd.registration_id).is_some() {
            return Err(DomainError::conflict("registration already exists"));
        }
        if let Some(existing) =
            self.conflicting(cmd.light_number, cmd.start_date, cmd.end_date, None)
        {
            return Err(DomainError::conflict(format!(
                "light {} is already registered from {} to {}",
                cmd.light_number, existing.start_date, existing.end_date
            )));
        }

        Ok(vec![PagodaEvent::LightRegistered(LightRegistered {
            tenant_id: cmd.tenant_id,
            tower_id: cmd.tower_id,
            registration: LightRegistration {
                registration_id: cmd.registration_id,
                light_number: cmd.light_number,
                devotee_name: cmd.devotee_name.trim().to_string(),
                devotee_contact: cmd.devotee_contact.clone(),
                dedicated_to: cmd.dedicated_to.clone(),
                start_date: cmd.start_date,
                end_date: cmd.end_date,
                amount_paid: cmd.amount_paid,
                status: RegistrationStatus::Active,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_renew(&self, cmd: &RenewRegistration) -> Result<Vec<PagodaEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.tower_id)?;
        let registration = self.active_registration(cmd.registration_id)?;

        if cmd.months == 0 {
            return Err(DomainError::validation("renewal must be for at least one month"));
        }
        if cmd.amount < 0 {
            return Err(DomainError::validation("amount cannot be negative"));
        }

        let new_end_date = registration
            .end_date
            .checked_add_months(Months::new(cmd.months))
            .ok_or_else(|| DomainError::validation("renewal period out of range"))?;

        if let Some(existing) = self.conflicting(
            registration.light_number,
            registration.start_date,
            new_end_date,
            Some(registration.registration_id),
        ) {
            return Err(DomainError::conflict(format!(
                "light {} is already registered from {}",
                registration.light_number, existing.start_date
            )));
        }

        Ok(vec![PagodaEvent::RegistrationRenewed(RegistrationRenewed {
            tenant_id: cmd.tenant_id,
            tower_id: cmd.tower_id,
            registration_id: cmd.registration_id,
            months: cmd.months,
            amount: cmd.amount,
            new_end_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelRegistration) -> Result<Vec<PagodaEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.tower_id)?;
        self.active_registration(cmd.registration_id)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![PagodaEvent::RegistrationCancelled(RegistrationCancelled {
            tenant_id: cmd.tenant_id,
            tower_id: cmd.tower_id,
            registration_id: cmd.registration_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
