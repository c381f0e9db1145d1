use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId, extend, round_quantity};
use templeerp_events::Event;
use templeerp_inventory::{BatchReceipt, WarehouseId};
use templeerp_products::ProductId;

templeerp_core::aggregate_id!(
    /// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
    PurchaseOrderId
);

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
    PartiallyReceived,
    Received,
    Cancelled,
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Cost per unit in minor units.
    pub unit_cost: i64,
    pub received_quantity: Decimal,
}

impl LineItem {
    pub fn outstanding(&self) -> Decimal {
        self.quantity - self.received_quantity
    }
}

/// One line of a goods received note, as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnLine {
    pub line_no: u32,
    pub quantity: Decimal,
    #[serde(default)]
    pub batch: Option<BatchReceipt>,
    #[serde(default)]
    pub serials: Vec<String>,
}

/// One line of a goods received note, resolved against the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: i64,
    pub batch: Option<BatchReceipt>,
    pub serials: Vec<String>,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    order_no: String,
    supplier_name: String,
    warehouse_id: Option<WarehouseId>,
    status: PurchaseOrderStatus,
    lines: Vec<LineItem>,
    grn_numbers: BTreeSet<String>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            order_no: String::new(),
            supplier_name: String::new(),
            warehouse_id: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            grn_numbers: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn order_no(&self) -> &str {
        &self.order_no
    }

    pub fn supplier_name(&self) -> &str {
        &self.supplier_name
    }

    /// Warehouse receiving the goods.
    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn grn_numbers(&self) -> impl Iterator<Item = &str> {
        self.grn_numbers.iter().map(String::as_str)
    }

    pub fn has_receipts(&self) -> bool {
        !self.grn_numbers.is_empty()
    }

    /// Ordered value in minor units. Lines were range-checked when added.
    pub fn total_value(&self) -> i64 {
        self.lines
            .iter()
            .map(|l| extend(l.quantity, l.unit_cost).unwrap_or(0))
            .sum()
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub order_no: String,
    pub supplier_name: String,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveGoods (one goods received note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub grn_no: String,
    pub lines: Vec<GrnLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    AddLine(AddLine),
    Approve(Approve),
    ReceiveGoods(ReceiveGoods),
    CancelOrder(CancelPurchaseOrder),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub order_no: String,
    pub supplier_name: String,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderApproved {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLineAdded {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// Carries everything the receiving warehouse needs: product, quantity, cost,
/// batch and serials per line. The `receive_goods` workflow turns each line
/// into a `ReceiveStock` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub grn_no: String,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<ReceivedLine>,
    /// True when this receipt completes every line.
    pub fully_received: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderLineAdded(PurchaseOrderLineAdded),
    PurchaseOrderApproved(PurchaseOrderApproved),
    GoodsReceived(GoodsReceived),
    PurchaseOrderCancelled(PurchaseOrderCancelled),
}

impl PurchaseOrderEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.tenant_id,
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => e.tenant_id,
            PurchaseOrderEvent::PurchaseOrderApproved(e) => e.tenant_id,
            PurchaseOrderEvent::GoodsReceived(e) => e.tenant_id,
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => e.tenant_id,
        }
    }

    pub fn order_id(&self) -> PurchaseOrderId {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.order_id,
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => e.order_id,
            PurchaseOrderEvent::PurchaseOrderApproved(e) => e.order_id,
            PurchaseOrderEvent::GoodsReceived(e) => e.order_id,
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => e.order_id,
        }
    }
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderLineAdded(_) => "purchasing.order.line_added",
            PurchaseOrderEvent::PurchaseOrderApproved(_) => "purchasing.order.approved",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            PurchaseOrderEvent::PurchaseOrderCancelled(_) => "purchasing.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderApproved(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_no = e.order_no.clone();
                self.supplier_name = e.supplier_name.clone();
                self.warehouse_id = Some(e.warehouse_id);
                self.status = PurchaseOrderStatus::Draft;
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => {
                self.lines.push(LineItem {
                    line_no: e.line_no,
                    product_id: e.product_id,
                    quantity: e.quantity,
                    unit_cost: e.unit_cost,
                    received_quantity: Decimal::ZERO,
                });
            }
            PurchaseOrderEvent::PurchaseOrderApproved(_) => {
                self.status = PurchaseOrderStatus::Approved;
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                for received in &e.lines {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == received.line_no) {
                        line.received_quantity += received.quantity;
                    }
                }
                self.grn_numbers.insert(e.grn_no.clone());
                self.status = if e.fully_received {
                    PurchaseOrderStatus::Received
                } else {
                    PurchaseOrderStatus::PartiallyReceived
                };
            }
            PurchaseOrderEvent::PurchaseOrderCancelled(_) => {
                self.status = PurchaseOrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::Approve(cmd) => self.handle_approve(cmd),
            PurchaseOrderCommand::ReceiveGoods(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_existing(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.order_no.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if cmd.supplier_name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(PurchaseOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_no: cmd.order_no.trim().to_string(),
            supplier_name: cmd.supplier_name.trim().to_string(),
            warehouse_id: cmd.warehouse_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "cannot modify purchase order after approval",
            ));
        }
        if cmd.quantity <= Decimal::ZERO || round_quantity(cmd.quantity) != cmd.quantity {
            return Err(DomainError::validation("quantity must be positive with at most 4 decimals"));
        }
        if cmd.unit_cost < 0 {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        extend(cmd.quantity, cmd.unit_cost)?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderLineAdded(PurchaseOrderLineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: self.lines.len() as u32 + 1,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_cost: cmd.unit_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant("only draft purchase orders can be approved"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot approve purchase order without lines"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderApproved(PurchaseOrderApproved {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveGoods) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        // Invariant: Cannot receive before approval or after the order is closed.
        if !matches!(
            self.status,
            PurchaseOrderStatus::Approved | PurchaseOrderStatus::PartiallyReceived
        ) {
            return Err(DomainError::invariant(
                "goods can only be received against an approved, open purchase order",
            ));
        }
        let grn_no = cmd.grn_no.trim();
        if grn_no.is_empty() {
            return Err(DomainError::validation("GRN number cannot be empty"));
        }
        if self.grn_numbers.contains(grn_no) {
            return Err(DomainError::conflict(format!("GRN {grn_no} was already recorded")));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("a goods receipt needs at least one line"));
        }

        let mut seen = BTreeSet::new();
        let mut received = Vec::with_capacity(cmd.lines.len());
        for grn_line in &cmd.lines {
            if !seen.insert(grn_line.line_no) {
                return Err(DomainError::validation(format!(
                    "line {} appears twice on the receipt",
                    grn_line.line_no
                )));
            }
            let line = self
                .lines
                .iter()
                .find(|l| l.line_no == grn_line.line_no)
                .ok_or_else(|| {
                    DomainError::validation(format!("order has no line {}", grn_line.line_no))
                })?;
            if grn_line.quantity <= Decimal::ZERO
                || round_quantity(grn_line.quantity) != grn_line.quantity
            {
                return Err(DomainError::validation("received quantity must be positive"));
            }
            if grn_line.quantity > line.outstanding() {
                return Err(DomainError::invariant(format!(
                    "line {} would be over-received: outstanding {}, received {}",
                    line.line_no,
                    line.outstanding(),
                    grn_line.quantity
                )));
            }
            received.push(ReceivedLine {
                line_no: line.line_no,
                product_id: line.product_id,
                quantity: grn_line.quantity,
                unit_cost: line.unit_cost,
                batch: grn_line.batch.clone(),
                serials: grn_line.serials.clone(),
            });
        }

        let fully_received = self.lines.iter().all(|line| {
            let now = received
                .iter()
                .find(|r| r.line_no == line.line_no)
                .map(|r| r.quantity)
                .unwrap_or(Decimal::ZERO);
            line.received_quantity + now >= line.quantity
        });

        let warehouse_id = self
            .warehouse_id
            .ok_or_else(|| DomainError::invariant("purchase order has no warehouse"))?;

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            grn_no: grn_no.to_string(),
            warehouse_id,
            lines: received,
            fully_received,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        let cancellable = match self.status {
            PurchaseOrderStatus::Draft => true,
            PurchaseOrderStatus::Approved => !self.has_receipts(),
            _ => false,
        };
        if !cancellable {
            return Err(DomainError::invariant(
                "only draft or unreceived approved purchase orders can be cancelled",
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCancelled(PurchaseOrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
