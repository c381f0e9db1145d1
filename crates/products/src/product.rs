use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use templeerp_events::Event;

templeerp_core::aggregate_id!(
    /// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
    ProductId
);

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Ghee, oil, wicks, flowers: consumed by manufacturing orders.
    RawMaterial,
    /// Prasadam packs, lamps: produced by manufacturing orders.
    FinishedGood,
    Consumable,
    /// Pujas and sevas: sold but never stocked.
    Service,
}

/// How individual units are traced in stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    None,
    Batch,
    Serial,
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    kind: ProductKind,
    uom: String,
    tracking: TrackingMode,
    standard_cost: i64,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            kind: ProductKind::RawMaterial,
            uom: String::new(),
            tracking: TrackingMode::None,
            standard_cost: 0,
            status: ProductStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn uom(&self) -> &str {
        &self.uom
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    /// Cost per unit in minor units, used to value stock and manufacturing output.
    pub fn standard_cost(&self) -> i64 {
        self.standard_cost
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn can_be_stocked(&self) -> bool {
        self.created && self.status == ProductStatus::Active && self.kind != ProductKind::Service
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub uom: String,
    pub tracking: TrackingMode,
    pub standard_cost: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ActivateProduct(ActivateProduct),
    ArchiveProduct(ArchiveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub uom: String,
    pub tracking: TrackingMode,
    pub standard_cost: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductActivated(ProductActivated),
    ProductArchived(ProductArchived),
}

impl ProductEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ProductEvent::ProductCreated(e) => e.tenant_id,
            ProductEvent::ProductActivated(e) => e.tenant_id,
            ProductEvent::ProductArchived(e) => e.tenant_id,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductActivated(e) => e.product_id,
            ProductEvent::ProductArchived(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductActivated(_) => "products.product.activated",
            ProductEvent::ProductArchived(_) => "products.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.kind = e.kind;
                self.uom = e.uom.clone();
                self.tracking = e.tracking;
                self.standard_cost = e.standard_cost;
                self.status = ProductStatus::Draft;
                self.created = true;
            }
            ProductEvent::ProductActivated(_) => {
                self.status = ProductStatus::Active;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ActivateProduct(cmd) => self.handle_activate(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Product {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if cmd.uom.trim().is_empty() {
            return Err(DomainError::validation("unit of measure cannot be empty"));
        }
        if cmd.standard_cost < 0 {
            return Err(DomainError::validation("standard cost cannot be negative"));
        }
        if cmd.kind == ProductKind::Service && cmd.tracking != TrackingMode::None {
            return Err(DomainError::validation("services cannot be batch or serial tracked"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            kind: cmd.kind,
            uom: cmd.uom.trim().to_string(),
            tracking: cmd.tracking,
            standard_cost: cmd.standard_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        match self.status {
            ProductStatus::Active => Err(DomainError::conflict("product is already active")),
            ProductStatus::Archived => {
                Err(DomainError::invariant("archived products cannot be activated"))
            }
            ProductStatus::Draft => Ok(vec![ProductEvent::ProductActivated(ProductActivated {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use templeerp_events::execute;

    fn create_cmd(tenant_id: TenantId, product_id: ProductId, kind: ProductKind) -> ProductCommand {
        ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id,
            sku: "GHEE-1KG".to_string(),
            name: "Cow ghee".to_string(),
            kind,
            uom: "kg".to_string(),
            tracking: TrackingMode::Batch,
            standard_cost: 65_000,
            occurred_at: Utc::now(),
        })
    }

    fn activate_cmd(tenant_id: TenantId, product_id: ProductId) -> ProductCommand {
        ProductCommand::ActivateProduct(ActivateProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn new_products_start_in_draft_and_are_not_stockable() {
        let tenant_id = TenantId::new();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);

        execute(&mut product, &create_cmd(tenant_id, product_id, ProductKind::RawMaterial)).unwrap();

        assert_eq!(product.status(), ProductStatus::Draft);
        assert!(!product.can_be_stocked());

        execute(&mut product, &activate_cmd(tenant_id, product_id)).unwrap();
        assert!(product.can_be_stocked());
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn services_are_never_stocked() {
        let tenant_id = TenantId::new();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        let ProductCommand::CreateProduct(mut cmd) =
            create_cmd(tenant_id, product_id, ProductKind::Service)
        else {
            unreachable!()
        };
        cmd.tracking = TrackingMode::None;

        execute(&mut product, &ProductCommand::CreateProduct(cmd)).unwrap();
        execute(&mut product, &activate_cmd(tenant_id, product_id)).unwrap();

        assert!(!product.can_be_stocked());
    }

    #[test]
    fn tracked_services_are_rejected() {
        let product_id = ProductId::generate();
        let err = Product::empty(product_id)
            .handle(&create_cmd(TenantId::new(), product_id, ProductKind::Service))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn archived_is_terminal() {
        let tenant_id = TenantId::new();
        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        execute(&mut product, &create_cmd(tenant_id, product_id, ProductKind::FinishedGood)).unwrap();
        execute(
            &mut product,
            &ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id,
                product_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = product.handle(&activate_cmd(tenant_id, product_id)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn commands_on_missing_product_are_not_found() {
        let product_id = ProductId::generate();
        let err = Product::empty(product_id)
            .handle(&activate_cmd(TenantId::new(), product_id))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    proptest! {
        /// Blank SKUs or names never produce events.
        #[test]
        fn blank_identity_fields_are_rejected(sku in "[ ]{0,3}", name in "[a-z]{0,3}") {
            let product_id = ProductId::generate();
            let ProductCommand::CreateProduct(mut cmd) =
                create_cmd(TenantId::new(), product_id, ProductKind::RawMaterial)
            else {
                unreachable!()
            };
            cmd.sku = sku;
            cmd.name = name;
            prop_assert!(Product::empty(product_id).handle(&ProductCommand::CreateProduct(cmd)).is_err());
        }
    }
}
