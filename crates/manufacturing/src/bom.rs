use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId, round_quantity};
use templeerp_events::Event;
use templeerp_products::ProductId;

templeerp_core::aggregate_id!(
    /// Bill of materials identifier.
    BomId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BomStatus {
    Draft,
    Active,
    Inactive,
}

/// One input of a recipe, per `output_quantity` units of the finished product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomComponent {
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Extra material lost in production, 0..=100.
    pub wastage_percent: Decimal,
}

/// Quantity of one component needed for a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
}

/// Aggregate root: BomMaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomMaster {
    id: BomId,
    tenant_id: Option<TenantId>,
    code: String,
    name: String,
    product_id: Option<ProductId>,
    output_quantity: Decimal,
    components: Vec<BomComponent>,
    status: BomStatus,
    version: u64,
    created: bool,
}

impl BomMaster {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BomId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            name: String::new(),
            product_id: None,
            output_quantity: Decimal::ONE,
            components: Vec::new(),
            status: BomStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BomId {
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

    /// Finished product made by this recipe.
    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn output_quantity(&self) -> Decimal {
        self.output_quantity
    }

    pub fn components(&self) -> &[BomComponent] {
        &self.components
    }

    pub fn status(&self) -> BomStatus {
        self.status
    }

    /// Component quantities needed to produce `quantity` units, wastage included.
    pub fn requirements(&self, quantity: Decimal) -> Vec<RequirementLine> {
        if self.output_quantity.is_zero() {
            return Vec::new();
        }
        self.components
            .iter()
            .map(|c| {
                let base = c.quantity * quantity / self.output_quantity;
                let with_wastage = base * (Decimal::ONE + c.wastage_percent / Decimal::ONE_HUNDRED);
                RequirementLine {
                    product_id: c.product_id,
                    quantity: round_quantity(with_wastage),
                }
            })
            .collect()
    }
}

impl AggregateRoot for BomMaster {
    type Id = BomId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateBom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBom {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub code: String,
    pub name: String,
    pub product_id: ProductId,
    pub output_quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddComponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddComponent {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub component: BomComponent,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveComponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveComponent {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command payload shared by ActivateBom and DeactivateBom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBomStatus {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BomCommand {
    CreateBom(CreateBom),
    AddComponent(AddComponent),
    RemoveComponent(RemoveComponent),
    ActivateBom(ChangeBomStatus),
    DeactivateBom(ChangeBomStatus),
}

/// Event: BomCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomCreated {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub code: String,
    pub name: String,
    pub product_id: ProductId,
    pub output_quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ComponentAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAdded {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub component: BomComponent,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ComponentRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRemoved {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event payload shared by BomActivated and BomDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomStatusChanged {
    pub tenant_id: TenantId,
    pub bom_id: BomId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BomEvent {
    BomCreated(BomCreated),
    ComponentAdded(ComponentAdded),
    ComponentRemoved(ComponentRemoved),
    BomActivated(BomStatusChanged),
    BomDeactivated(BomStatusChanged),
}

impl BomEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            BomEvent::BomCreated(e) => e.tenant_id,
            BomEvent::ComponentAdded(e) => e.tenant_id,
            BomEvent::ComponentRemoved(e) => e.tenant_id,
            BomEvent::BomActivated(e) | BomEvent::BomDeactivated(e) => e.tenant_id,
        }
    }

    pub fn bom_id(&self) -> BomId {
        match self {
            BomEvent::BomCreated(e) => e.bom_id,
            BomEvent::ComponentAdded(e) => e.bom_id,
            BomEvent::ComponentRemoved(e) => e.bom_id,
            BomEvent::BomActivated(e) | BomEvent::BomDeactivated(e) => e.bom_id,
        }
    }
}

impl Event for BomEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BomEvent::BomCreated(_) => "manufacturing.bom.created",
            BomEvent::ComponentAdded(_) => "manufacturing.bom.component_added",
            BomEvent::ComponentRemoved(_) => "manufacturing.bom.component_removed",
            BomEvent::BomActivated(_) => "manufacturing.bom.activated",
            BomEvent::BomDeactivated(_) => "manufacturing.bom.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BomEvent::BomCreated(e) => e.occurred_at,
            BomEvent::ComponentAdded(e) => e.occurred_at,
            BomEvent::ComponentRemoved(e) => e.occurred_at,
            BomEvent::BomActivated(e) | BomEvent::BomDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BomMaster {
    type Command = BomCommand;
    type Event = BomEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BomEvent::BomCreated(e) => {
                self.id = e.bom_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.product_id = Some(e.product_id);
                self.output_quantity = e.output_quantity;
                self.status = BomStatus::Draft;
                self.created = true;
            }
            BomEvent::ComponentAdded(e) => {
                self.components.push(e.component.clone());
            }
            BomEvent::ComponentRemoved(e) => {
                self.components.retain(|c| c.product_id != e.product_id);
            }
            BomEvent::BomActivated(_) => self.status = BomStatus::Active,
            BomEvent::BomDeactivated(_) => self.status = BomStatus::Inactive,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BomCommand::CreateBom(cmd) => self.handle_create(cmd),
            BomCommand::AddComponent(cmd) => self.handle_add_component(cmd),
            BomCommand::RemoveComponent(cmd) => self.handle_remove_component(cmd),
            BomCommand::ActivateBom(cmd) => self.handle_activate(cmd),
            BomCommand::DeactivateBom(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl BomMaster {
    fn ensure_existing(&self, tenant_id: TenantId, bom_id: BomId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != bom_id {
            return Err(DomainError::invariant("bom_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != BomStatus::Draft {
            return Err(DomainError::invariant("components can only change while the BOM is a draft"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateBom) -> Result<Vec<BomEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("BOM already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.output_quantity <= Decimal::ZERO {
            return Err(DomainError::validation("output quantity must be greater than zero"));
        }

        Ok(vec![BomEvent::BomCreated(BomCreated {
            tenant_id: cmd.tenant_id,
            bom_id: cmd.bom_id,
            code: cmd.code.trim().to_string(),
            name: cmd.name.trim().to_string(),
            product_id: cmd.product_id,
            output_quantity: cmd.output_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_component(&self, cmd: &AddComponent) -> Result<Vec<BomEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.bom_id)?;
        self.ensure_draft()?;

        let component = &cmd.component;
        if component.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("component quantity must be greater than zero"));
        }
        if component.wastage_percent < Decimal::ZERO
            || component.wastage_percent > Decimal::ONE_HUNDRED
        {
            return Err(DomainError::validation("wastage must be between 0 and 100 percent"));
        }
        if Some(component.product_id) == self.product_id {
            return Err(DomainError::validation("a product cannot be a component of itself"));
        }
        if self.components.iter().any(|c| c.product_id == component.product_id) {
            return Err(DomainError::conflict("component is already on this BOM"));
        }

        Ok(vec![BomEvent::ComponentAdded(ComponentAdded {
            tenant_id: cmd.tenant_id,
            bom_id: cmd.bom_id,
            component: component.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_component(&self, cmd: &RemoveComponent) -> Result<Vec<BomEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.bom_id)?;
        self.ensure_draft()?;

        if !self.components.iter().any(|c| c.product_id == cmd.product_id) {
            return Err(DomainError::validation("component is not on this BOM"));
        }

        Ok(vec![BomEvent::ComponentRemoved(ComponentRemoved {
            tenant_id: cmd.tenant_id,
            bom_id: cmd.bom_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ChangeBomStatus) -> Result<Vec<BomEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.bom_id)?;

        if self.status == BomStatus::Active {
            return Err(DomainError::conflict("BOM is already active"));
        }
        if self.components.is_empty() {
            return Err(DomainError::invariant("a BOM needs at least one component"));
        }

        Ok(vec![BomEvent::BomActivated(BomStatusChanged {
            tenant_id: cmd.tenant_id,
            bom_id: cmd.bom_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &ChangeBomStatus) -> Result<Vec<BomEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.bom_id)?;

        if self.status != BomStatus::Active {
            return Err(DomainError::invariant("only an active BOM can be deactivated"));
        }

        Ok(vec![BomEvent::BomDeactivated(BomStatusChanged {
            tenant_id: cmd.tenant_id,
            bom_id: cmd.bom_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
