use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId, round_quantity};
use templeerp_events::Event;
use templeerp_products::ProductId;

templeerp_core::aggregate_id!(
    /// Warehouse identifier (tenant-scoped via `tenant_id` fields in events/commands).
    WarehouseId
);

/// Why stock moved. Every stock-changing event maps to one or more movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Receipt,
    Issue,
    Adjustment,
    Reservation,
    Release,
    Consumption,
    Production,
    PurchaseReceipt,
    SalesIssue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub batch_no: String,
    pub expiry: Option<NaiveDate>,
}

/// Quantity of one batch still on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLot {
    pub batch_no: String,
    pub expiry: Option<NaiveDate>,
    pub quantity: Decimal,
}

impl BatchLot {
    /// Earliest expiry first, undated lots last, ties broken by batch number.
    fn draw_key(&self) -> (bool, Option<NaiveDate>, &str) {
        (self.expiry.is_none(), self.expiry, self.batch_no.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_no: String,
    pub quantity: Decimal,
}

/// Stock leaving one product row: how much, from which batches, which serials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDraw {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub batches: Vec<BatchDraw>,
    pub serials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
}

/// Finished goods credited when a reservation is consumed by production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOutput {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: i64,
    pub batch: Option<BatchReceipt>,
}

/// Stock of one product inside a warehouse.
///
/// `quantity` includes reserved stock. Batches are kept in draw order and may
/// cover less than `quantity`; the remainder is untracked stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub reserved: Decimal,
    pub batches: Vec<BatchLot>,
    pub serials: BTreeSet<String>,
    /// Weighted average receipt cost in minor units.
    pub average_cost: i64,
}

impl ProductStock {
    fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            quantity: Decimal::ZERO,
            reserved: Decimal::ZERO,
            batches: Vec::new(),
            serials: BTreeSet::new(),
            average_cost: 0,
        }
    }

    pub fn available(&self) -> Decimal {
        self.quantity - self.reserved
    }

    pub fn batched_quantity(&self) -> Decimal {
        self.batches.iter().map(|b| b.quantity).sum()
    }

    fn receive(
        &mut self,
        quantity: Decimal,
        unit_cost: i64,
        batch: Option<&BatchReceipt>,
        serials: &[String],
    ) {
        let total = self.quantity + quantity;
        if total > Decimal::ZERO {
            let weighted = (Decimal::from(self.average_cost) * self.quantity
                + Decimal::from(unit_cost) * quantity)
                / total;
            self.average_cost = weighted
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
                .unwrap_or(unit_cost);
        }
        self.quantity = total;

        if let Some(batch) = batch {
            match self.batches.iter_mut().find(|b| b.batch_no == batch.batch_no) {
                Some(lot) => lot.quantity += quantity,
                None => {
                    self.batches.push(BatchLot {
                        batch_no: batch.batch_no.clone(),
                        expiry: batch.expiry,
                        quantity,
                    });
                    self.batches.sort_by(|a, b| a.draw_key().cmp(&b.draw_key()));
                }
            }
        }

        self.serials.extend(serials.iter().cloned());
    }

    fn draw(&mut self, draw: &StockDraw) {
        self.quantity -= draw.quantity;
        for taken in &draw.batches {
            if let Some(lot) = self.batches.iter_mut().find(|b| b.batch_no == taken.batch_no) {
                lot.quantity -= taken.quantity;
            }
        }
        self.batches.retain(|b| b.quantity > Decimal::ZERO);
        for serial in &draw.serials {
            self.serials.remove(serial);
        }
    }

    /// Decide which batches and serials a withdrawal of `quantity` takes.
    ///
    /// Batches are drawn earliest expiry first, before untracked stock. Without explicit serials,
    /// the lowest serial numbers on hand are taken.
    fn plan_draw(&self, quantity: Decimal, serials: &[String]) -> Result<StockDraw, DomainError> {
        if quantity > self.quantity {
            return Err(DomainError::insufficient_stock(self.product_id, self.quantity, quantity));
        }

        let serials = if !serials.is_empty() {
            ensure_serial_count(quantity, serials)?;
            if let Some(missing) = serials.iter().find(|s| !self.serials.contains(*s)) {
                return Err(DomainError::invariant(format!("serial {missing} is not on hand")));
            }
            serials.to_vec()
        } else if self.serials.is_empty() {
            Vec::new()
        } else {
            let count = quantity
                .to_usize()
                .filter(|_| quantity.fract().is_zero())
                .ok_or_else(|| {
                    DomainError::validation("serial-tracked stock moves in whole units")
                })?;
            self.serials.iter().take(count).cloned().collect()
        };

        let mut remaining = quantity;
        let mut batches = Vec::new();
        for lot in &self.batches {
            if remaining.is_zero() {
                break;
            }
            let take = lot.quantity.min(remaining);
            batches.push(BatchDraw {
                batch_no: lot.batch_no.clone(),
                quantity: take,
            });
            remaining -= take;
        }

        Ok(StockDraw {
            product_id: self.product_id,
            quantity,
            batches,
            serials,
        })
    }
}

/// Aggregate root: Warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warehouse {
    id: WarehouseId,
    tenant_id: Option<TenantId>,
    code: String,
    name: String,
    stock: BTreeMap<ProductId, ProductStock>,
    reservations: BTreeMap<String, Vec<ReservationLine>>,
    version: u64,
    created: bool,
}

impl Warehouse {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: WarehouseId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            name: String::new(),
            stock: BTreeMap::new(),
            reservations: BTreeMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> WarehouseId {
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

    pub fn stock(&self, product_id: ProductId) -> Option<&ProductStock> {
        self.stock.get(&product_id)
    }

    pub fn stock_rows(&self) -> impl Iterator<Item = &ProductStock> {
        self.stock.values()
    }

    pub fn available(&self, product_id: ProductId) -> Decimal {
        self.stock
            .get(&product_id)
            .map(ProductStock::available)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn reservation(&self, reference: &str) -> Option<&[ReservationLine]> {
        self.reservations.get(reference).map(Vec::as_slice)
    }

    /// Open reservations keyed by reference.
    pub fn reservations(&self) -> impl Iterator<Item = (&str, &[ReservationLine])> {
        self.reservations
            .iter()
            .map(|(reference, lines)| (reference.as_str(), lines.as_slice()))
    }

    pub fn has_reservation(&self, reference: &str) -> bool {
        self.reservations.contains_key(reference)
    }
}

impl AggregateRoot for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateWarehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWarehouse {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: i64,
    pub batch: Option<BatchReceipt>,
    pub serials: Vec<String>,
    pub reference: String,
    pub movement_type: MovementType,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub serials: Vec<String>,
    pub reference: String,
    pub movement_type: MovementType,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (stock count corrections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub delta: Decimal,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock. All lines are reserved or none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub lines: Vec<ReservationLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConsumeReservation (production completion).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeReservation {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub output: ProductionOutput,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseCommand {
    CreateWarehouse(CreateWarehouse),
    ReceiveStock(ReceiveStock),
    IssueStock(IssueStock),
    AdjustStock(AdjustStock),
    ReserveStock(ReserveStock),
    ReleaseReservation(ReleaseReservation),
    ConsumeReservation(ConsumeReservation),
}

/// Event: WarehouseCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseCreated {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: i64,
    pub batch: Option<BatchReceipt>,
    pub serials: Vec<String>,
    pub reference: String,
    pub movement_type: MovementType,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub draw: StockDraw,
    pub reference: String,
    pub movement_type: MovementType,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted. Negative adjustments carry the draw they made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub delta: Decimal,
    pub draw: Option<StockDraw>,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub lines: Vec<ReservationLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub lines: Vec<ReservationLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationConsumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationConsumed {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub draws: Vec<StockDraw>,
    pub output: ProductionOutput,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseEvent {
    WarehouseCreated(WarehouseCreated),
    StockReceived(StockReceived),
    StockIssued(StockIssued),
    StockAdjusted(StockAdjusted),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    ReservationConsumed(ReservationConsumed),
}

impl WarehouseEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            WarehouseEvent::WarehouseCreated(e) => e.tenant_id,
            WarehouseEvent::StockReceived(e) => e.tenant_id,
            WarehouseEvent::StockIssued(e) => e.tenant_id,
            WarehouseEvent::StockAdjusted(e) => e.tenant_id,
            WarehouseEvent::StockReserved(e) => e.tenant_id,
            WarehouseEvent::ReservationReleased(e) => e.tenant_id,
            WarehouseEvent::ReservationConsumed(e) => e.tenant_id,
        }
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        match self {
            WarehouseEvent::WarehouseCreated(e) => e.warehouse_id,
            WarehouseEvent::StockReceived(e) => e.warehouse_id,
            WarehouseEvent::StockIssued(e) => e.warehouse_id,
            WarehouseEvent::StockAdjusted(e) => e.warehouse_id,
            WarehouseEvent::StockReserved(e) => e.warehouse_id,
            WarehouseEvent::ReservationReleased(e) => e.warehouse_id,
            WarehouseEvent::ReservationConsumed(e) => e.warehouse_id,
        }
    }
}

impl Event for WarehouseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WarehouseEvent::WarehouseCreated(_) => "inventory.warehouse.created",
            WarehouseEvent::StockReceived(_) => "inventory.warehouse.stock_received",
            WarehouseEvent::StockIssued(_) => "inventory.warehouse.stock_issued",
            WarehouseEvent::StockAdjusted(_) => "inventory.warehouse.stock_adjusted",
            WarehouseEvent::StockReserved(_) => "inventory.warehouse.stock_reserved",
            WarehouseEvent::ReservationReleased(_) => "inventory.warehouse.reservation_released",
            WarehouseEvent::ReservationConsumed(_) => "inventory.warehouse.reservation_consumed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WarehouseEvent::WarehouseCreated(e) => e.occurred_at,
            WarehouseEvent::StockReceived(e) => e.occurred_at,
            WarehouseEvent::StockIssued(e) => e.occurred_at,
            WarehouseEvent::StockAdjusted(e) => e.occurred_at,
            WarehouseEvent::StockReserved(e) => e.occurred_at,
            WarehouseEvent::ReservationReleased(e) => e.occurred_at,
            WarehouseEvent::ReservationConsumed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Warehouse {
    type Command = WarehouseCommand;
    type Event = WarehouseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WarehouseEvent::WarehouseCreated(e) => {
                self.id = e.warehouse_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.created = true;
            }
            WarehouseEvent::StockReceived(e) => {
                self.row_mut(e.product_id).receive(
                    e.quantity,
                    e.unit_cost,
                    e.batch.as_ref(),
                    &e.serials,
                );
            }
            WarehouseEvent::StockIssued(e) => {
                self.row_mut(e.draw.product_id).draw(&e.draw);
            }
            WarehouseEvent::StockAdjusted(e) => {
                let row = self.row_mut(e.product_id);
                match &e.draw {
                    Some(draw) => row.draw(draw),
                    None => row.quantity += e.delta,
                }
            }
            WarehouseEvent::StockReserved(e) => {
                for line in &e.lines {
                    self.row_mut(line.product_id).reserved += line.quantity;
                }
                self.reservations.insert(e.reference.clone(), e.lines.clone());
            }
            WarehouseEvent::ReservationReleased(e) => {
                for line in &e.lines {
                    self.row_mut(line.product_id).reserved -= line.quantity;
                }
                self.reservations.remove(&e.reference);
            }
            WarehouseEvent::ReservationConsumed(e) => {
                for draw in &e.draws {
                    let row = self.row_mut(draw.product_id);
                    row.reserved -= draw.quantity;
                    row.draw(draw);
                }
                let output = &e.output;
                self.row_mut(output.product_id).receive(
                    output.quantity,
                    output.unit_cost,
                    output.batch.as_ref(),
                    &[],
                );
                self.reservations.remove(&e.reference);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WarehouseCommand::CreateWarehouse(cmd) => self.handle_create(cmd),
            WarehouseCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
            WarehouseCommand::IssueStock(cmd) => self.handle_issue(cmd),
            WarehouseCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            WarehouseCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            WarehouseCommand::ReleaseReservation(cmd) => self.handle_release(cmd),
            WarehouseCommand::ConsumeReservation(cmd) => self.handle_consume(cmd),
        }
    }
}

fn ensure_quantity(quantity: Decimal) -> Result<(), DomainError> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    if round_quantity(quantity) != quantity {
        return Err(DomainError::validation("quantity has too many decimal places"));
    }
    Ok(())
}

fn ensure_serial_count(quantity: Decimal, serials: &[String]) -> Result<(), DomainError> {
    if Decimal::from(serials.len()) != quantity {
        return Err(DomainError::validation(format!(
            "{} serial numbers given for a quantity of {}",
            serials.len(),
            quantity
        )));
    }
    let unique: BTreeSet<&String> = serials.iter().collect();
    if unique.len() != serials.len() {
        return Err(DomainError::validation("duplicate serial numbers"));
    }
    if serials.iter().any(|s| s.trim().is_empty()) {
        return Err(DomainError::validation("serial numbers cannot be empty"));
    }
    Ok(())
}

impl Warehouse {
    fn row_mut(&mut self, product_id: ProductId) -> &mut ProductStock {
        self.stock
            .entry(product_id)
            .or_insert_with(|| ProductStock::new(product_id))
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_existing(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        if self.id != warehouse_id {
            return Err(DomainError::invariant("warehouse_id mismatch"));
        }
        Ok(())
    }

    fn ensure_batch(&self, product_id: ProductId, batch: &BatchReceipt) -> Result<(), DomainError> {
        if batch.batch_no.trim().is_empty() {
            return Err(DomainError::validation("batch number cannot be empty"));
        }
        let existing = self
            .stock
            .get(&product_id)
            .and_then(|row| row.batches.iter().find(|b| b.batch_no == batch.batch_no));
        if let Some(lot) = existing {
            if lot.expiry != batch.expiry {
                return Err(DomainError::validation(format!(
                    "batch {} is already on hand with a different expiry",
                    batch.batch_no
                )));
            }
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateWarehouse) -> Result<Vec<WarehouseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("warehouse already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![WarehouseEvent::WarehouseCreated(WarehouseCreated {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            code: cmd.code.trim().to_string(),
            name: cmd.name.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.warehouse_id)?;
        ensure_quantity(cmd.quantity)?;

        if !matches!(cmd.movement_type, MovementType::Receipt | MovementType::PurchaseReceipt) {
            return Err(DomainError::validation(format!(
                "{:?} is not a receipt movement",
                cmd.movement_type
            )));
        }
        if cmd.unit_cost < 0 {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        if let Some(batch) = &cmd.batch {
            self.ensure_batch(cmd.product_id, batch)?;
        }
        if !cmd.serials.is_empty() {
            ensure_serial_count(cmd.quantity, &cmd.serials)?;
            if let Some(row) = self.stock.get(&cmd.product_id) {
                if let Some(dup) = cmd.serials.iter().find(|s| row.serials.contains(*s)) {
                    return Err(DomainError::conflict(format!("serial {dup} is already on hand")));
                }
            }
        }

        Ok(vec![WarehouseEvent::StockReceived(StockReceived {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_cost: cmd.unit_cost,
            batch: cmd.batch.clone(),
            serials: cmd.serials.clone(),
            reference: cmd.reference.clone(),
            movement_type: cmd.movement_type,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.warehouse_id)?;
        ensure_quantity(cmd.quantity)?;

        if !matches!(cmd.movement_type, MovementType::Issue | MovementType::SalesIssue) {
            return Err(DomainError::validation(format!(
                "{:?} is not an issue movement",
                cmd.movement_type
            )));
        }

        let available = self.available(cmd.product_id);
        if cmd.quantity > available {
            return Err(DomainError::insufficient_stock(cmd.product_id, available, cmd.quantity));
        }

        let row = self
            .stock
            .get(&cmd.product_id)
            .ok_or_else(|| DomainError::invariant("product is not stocked in this warehouse"))?;
        let draw = row.plan_draw(cmd.quantity, &cmd.serials)?;

        Ok(vec![WarehouseEvent::StockIssued(StockIssued {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            draw,
            reference: cmd.reference.clone(),
            movement_type: cmd.movement_type,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.warehouse_id)?;

        if cmd.delta.is_zero() {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        ensure_quantity(cmd.delta.abs())?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("adjustment reason is required"));
        }

        let draw = if cmd.delta < Decimal::ZERO {
            let row = self
                .stock
                .get(&cmd.product_id)
                .ok_or_else(|| DomainError::invariant("stock cannot go negative"))?;
            if row.quantity + cmd.delta < row.reserved {
                return Err(DomainError::invariant(
                    "adjustment would leave less stock than is reserved",
                ));
            }
            Some(row.plan_draw(-cmd.delta, &[])?)
        } else {
            None
        };

        Ok(vec![WarehouseEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            product_id: cmd.product_id,
            delta: cmd.delta,
            draw,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.warehouse_id)?;

        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reservation reference cannot be empty"));
        }
        if self.reservations.contains_key(&cmd.reference) {
            return Err(DomainError::conflict(format!(
                "reservation {} already exists",
                cmd.reference
            )));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("reservation must have at least one line"));
        }

        // Merge repeated products so availability is checked against the total.
        let mut merged: BTreeMap<ProductId, Decimal> = BTreeMap::new();
        for line in &cmd.lines {
            ensure_quantity(line.quantity)?;
            *merged.entry(line.product_id).or_default() += line.quantity;
        }

        for (product_id, quantity) in &merged {
            let available = self.available(*product_id);
            if *quantity > available {
                return Err(DomainError::insufficient_stock(product_id, available, quantity));
            }
        }

        Ok(vec![WarehouseEvent::StockReserved(StockReserved {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            reference: cmd.reference.clone(),
            lines: merged
                .into_iter()
                .map(|(product_id, quantity)| ReservationLine { product_id, quantity })
                .collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseReservation) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.warehouse_id)?;

        let lines = self.reservations.get(&cmd.reference).ok_or_else(|| {
            DomainError::invariant(format!("no open reservation {}", cmd.reference))
        })?;

        Ok(vec![WarehouseEvent::ReservationReleased(ReservationReleased {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            reference: cmd.reference.clone(),
            lines: lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_consume(&self, cmd: &ConsumeReservation) -> Result<Vec<WarehouseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.warehouse_id)?;

        let lines = self.reservations.get(&cmd.reference).ok_or_else(|| {
            DomainError::invariant(format!("no open reservation {}", cmd.reference))
        })?;

        ensure_quantity(cmd.output.quantity)?;
        if cmd.output.unit_cost < 0 {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        if let Some(batch) = &cmd.output.batch {
            self.ensure_batch(cmd.output.product_id, batch)?;
        }

        let draws = lines
            .iter()
            .map(|line| {
                self.stock
                    .get(&line.product_id)
                    .ok_or_else(|| DomainError::invariant("reserved product is not stocked"))?
                    .plan_draw(line.quantity, &[])
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(vec![WarehouseEvent::ReservationConsumed(ReservationConsumed {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            reference: cmd.reference.clone(),
            draws,
            output: cmd.output.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use templeerp_events::execute;

    struct Fixture {
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        warehouse: Warehouse,
    }

    fn qty(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    impl Fixture {
        fn new() -> Self {
            let tenant_id = TenantId::new();
            let warehouse_id = WarehouseId::generate();
            let mut warehouse = Warehouse::empty(warehouse_id);
            execute(
                &mut warehouse,
                &WarehouseCommand::CreateWarehouse(CreateWarehouse {
                    tenant_id,
                    warehouse_id,
                    code: "MAIN".to_string(),
                    name: "Main store".to_string(),
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();
            Self { tenant_id, warehouse_id, warehouse }
        }

        fn receive_cmd(&self, product_id: ProductId, quantity: Decimal, unit_cost: i64) -> ReceiveStock {
            ReceiveStock {
                tenant_id: self.tenant_id,
                warehouse_id: self.warehouse_id,
                product_id,
                quantity,
                unit_cost,
                batch: None,
                serials: Vec::new(),
                reference: "GRN-1".to_string(),
                movement_type: MovementType::Receipt,
                occurred_at: Utc::now(),
            }
        }

        fn run(&mut self, cmd: WarehouseCommand) -> Result<Vec<WarehouseEvent>, DomainError> {
            execute(&mut self.warehouse, &cmd)
        }

        fn receive(&mut self, product_id: ProductId, quantity: Decimal) {
            let cmd = self.receive_cmd(product_id, quantity, 100);
            self.run(WarehouseCommand::ReceiveStock(cmd)).unwrap();
        }

        fn receive_batch(&mut self, product_id: ProductId, quantity: Decimal, batch_no: &str, expiry: Option<NaiveDate>) {
            let mut cmd = self.receive_cmd(product_id, quantity, 100);
            cmd.batch = Some(BatchReceipt { batch_no: batch_no.to_string(), expiry });
            self.run(WarehouseCommand::ReceiveStock(cmd)).unwrap();
        }

        fn issue(&mut self, product_id: ProductId, quantity: Decimal) -> Result<Vec<WarehouseEvent>, DomainError> {
            self.run(WarehouseCommand::IssueStock(IssueStock {
                tenant_id: self.tenant_id,
                warehouse_id: self.warehouse_id,
                product_id,
                quantity,
                serials: Vec::new(),
                reference: "SO-1".to_string(),
                movement_type: MovementType::SalesIssue,
                occurred_at: Utc::now(),
            }))
        }

        fn reserve(&mut self, reference: &str, lines: Vec<(ProductId, Decimal)>) -> Result<Vec<WarehouseEvent>, DomainError> {
            self.run(WarehouseCommand::ReserveStock(ReserveStock {
                tenant_id: self.tenant_id,
                warehouse_id: self.warehouse_id,
                reference: reference.to_string(),
                lines: lines
                    .into_iter()
                    .map(|(product_id, quantity)| ReservationLine { product_id, quantity })
                    .collect(),
                occurred_at: Utc::now(),
            }))
        }

        fn adjust(&mut self, product_id: ProductId, delta: Decimal) -> Result<Vec<WarehouseEvent>, DomainError> {
            self.run(WarehouseCommand::AdjustStock(AdjustStock {
                tenant_id: self.tenant_id,
                warehouse_id: self.warehouse_id,
                product_id,
                delta,
                reason: "stock count".to_string(),
                occurred_at: Utc::now(),
            }))
        }

        fn release(&mut self, reference: &str) -> Result<Vec<WarehouseEvent>, DomainError> {
            self.run(WarehouseCommand::ReleaseReservation(ReleaseReservation {
                tenant_id: self.tenant_id,
                warehouse_id: self.warehouse_id,
                reference: reference.to_string(),
                occurred_at: Utc::now(),
            }))
        }
    }

    #[test]
    fn receipts_average_the_unit_cost() {
        let mut fx = Fixture::new();
        let ghee = ProductId::generate();
        let first = fx.receive_cmd(ghee, qty(10), 500);
        let second = fx.receive_cmd(ghee, qty(30), 700);
        fx.run(WarehouseCommand::ReceiveStock(first)).unwrap();
        fx.run(WarehouseCommand::ReceiveStock(second)).unwrap();

        let row = fx.warehouse.stock(ghee).unwrap();
        assert_eq!(row.quantity, qty(40));
        assert_eq!(row.average_cost, 650);
    }

    #[test]
    fn issue_consumes_batches_by_earliest_expiry() {
        let mut fx = Fixture::new();
        let oil = ProductId::generate();
        fx.receive_batch(oil, qty(5), "B-2", Some(date(2026, 12, 1)));
        fx.receive_batch(oil, qty(5), "B-1", Some(date(2027, 6, 1)));
        fx.receive_batch(oil, qty(5), "B-0", None);

        let events = fx.issue(oil, qty(7)).unwrap();
        let WarehouseEvent::StockIssued(issued) = &events[0] else {
            panic!("expected StockIssued");
        };
        let drawn: Vec<_> = issued
            .draw
            .batches
            .iter()
            .map(|b| (b.batch_no.as_str(), b.quantity))
            .collect();
        assert_eq!(drawn, vec![("B-2", qty(5)), ("B-1", qty(2))]);

        let row = fx.warehouse.stock(oil).unwrap();
        assert_eq!(row.quantity, qty(8));
        assert_eq!(row.batches.len(), 2);
        assert_eq!(row.batches[0].batch_no, "B-1");
        assert_eq!(row.batches[0].quantity, qty(3));
    }

    #[test]
    fn issue_cannot_touch_reserved_stock() {
        let mut fx = Fixture::new();
        let wick = ProductId::generate();
        fx.receive(wick, qty(10));
        fx.reserve("MO-1", vec![(wick, qty(8))]).unwrap();

        let err = fx.issue(wick, qty(3)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert!(fx.issue(wick, qty(2)).is_ok());
        assert_eq!(fx.warehouse.available(wick), Decimal::ZERO);
    }

    #[test]
    fn reservation_is_all_or_nothing() {
        let mut fx = Fixture::new();
        let ghee = ProductId::generate();
        let wick = ProductId::generate();
        fx.receive(ghee, qty(10));
        fx.receive(wick, qty(1));

        let err = fx.reserve("MO-1", vec![(ghee, qty(5)), (wick, qty(2))]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(fx.warehouse.stock(ghee).unwrap().reserved, Decimal::ZERO);
        assert!(!fx.warehouse.has_reservation("MO-1"));
    }

    #[test]
    fn repeated_lines_are_checked_against_their_total() {
        let mut fx = Fixture::new();
        let ghee = ProductId::generate();
        fx.receive(ghee, qty(10));

        assert!(fx.reserve("MO-1", vec![(ghee, qty(6)), (ghee, qty(6))]).is_err());

        let events = fx.reserve("MO-2", vec![(ghee, qty(4)), (ghee, qty(5))]).unwrap();
        let WarehouseEvent::StockReserved(reserved) = &events[0] else {
            panic!("expected StockReserved");
        };
        assert_eq!(reserved.lines, vec![ReservationLine { product_id: ghee, quantity: qty(9) }]);
    }

    #[test]
    fn duplicate_reservation_reference_conflicts() {
        let mut fx = Fixture::new();
        let ghee = ProductId::generate();
        fx.receive(ghee, qty(10));
        fx.reserve("MO-1", vec![(ghee, qty(1))]).unwrap();

        let err = fx.reserve("MO-1", vec![(ghee, qty(1))]).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn release_returns_stock_to_available() {
        let mut fx = Fixture::new();
        let ghee = ProductId::generate();
        fx.receive(ghee, qty(10));
        fx.reserve("MO-1", vec![(ghee, qty(4))]).unwrap();
        fx.release("MO-1").unwrap();

        assert_eq!(fx.warehouse.available(ghee), qty(10));
        assert!(fx.release("MO-1").is_err());
    }

    #[test]
    fn adjustment_cannot_go_below_reserved() {
        let mut fx = Fixture::new();
        let ghee = ProductId::generate();
        fx.receive(ghee, qty(10));
        fx.reserve("MO-1", vec![(ghee, qty(7))]).unwrap();

        let err = fx.adjust(ghee, qty(-4)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        fx.adjust(ghee, qty(-3)).unwrap();
        fx.adjust(ghee, Decimal::new(25, 1)).unwrap();
        assert_eq!(fx.warehouse.stock(ghee).unwrap().quantity, Decimal::new(95, 1));
    }

    #[test]
    fn consuming_a_reservation_credits_finished_goods_in_one_event() {
        let mut fx = Fixture::new();
        let ghee = ProductId::generate();
        let lamp = ProductId::generate();
        fx.receive_batch(ghee, qty(10), "G-1", Some(date(2026, 11, 1)));
        fx.reserve("MO-1", vec![(ghee, qty(6))]).unwrap();

        let events = fx
            .run(WarehouseCommand::ConsumeReservation(ConsumeReservation {
                tenant_id: fx.tenant_id,
                warehouse_id: fx.warehouse_id,
                reference: "MO-1".to_string(),
                output: ProductionOutput {
                    product_id: lamp,
                    quantity: qty(12),
                    unit_cost: 50,
                    batch: Some(BatchReceipt { batch_no: "L-1".to_string(), expiry: None }),
                },
                occurred_at: Utc::now(),
            }))
            .unwrap();

        assert_eq!(events.len(), 1);
        let ghee_row = fx.warehouse.stock(ghee).unwrap();
        assert_eq!(ghee_row.quantity, qty(4));
        assert_eq!(ghee_row.reserved, Decimal::ZERO);
        assert_eq!(ghee_row.batches[0].quantity, qty(4));

        let lamp_row = fx.warehouse.stock(lamp).unwrap();
        assert_eq!(lamp_row.quantity, qty(12));
        assert_eq!(lamp_row.average_cost, 50);
        assert!(!fx.warehouse.has_reservation("MO-1"));
    }

    #[test]
    fn serials_must_match_quantity_and_be_unique_on_hand() {
        let mut fx = Fixture::new();
        let bell = ProductId::generate();
        let mut cmd = fx.receive_cmd(bell, qty(2), 10_000);
        cmd.serials = vec!["SN-1".to_string()];
        assert!(matches!(
            fx.run(WarehouseCommand::ReceiveStock(cmd.clone())).unwrap_err(),
            DomainError::Validation(_)
        ));

        cmd.serials = vec!["SN-1".to_string(), "SN-2".to_string()];
        fx.run(WarehouseCommand::ReceiveStock(cmd.clone())).unwrap();

        cmd.quantity = qty(1);
        cmd.serials = vec!["SN-2".to_string()];
        assert!(matches!(
            fx.run(WarehouseCommand::ReceiveStock(cmd)).unwrap_err(),
            DomainError::Conflict(_)
        ));

        let err = fx
            .run(WarehouseCommand::IssueStock(IssueStock {
                tenant_id: fx.tenant_id,
                warehouse_id: fx.warehouse_id,
                product_id: bell,
                quantity: qty(1),
                serials: vec!["SN-9".to_string()],
                reference: "SO-1".to_string(),
                movement_type: MovementType::Issue,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        fx.issue(bell, qty(1)).unwrap();
        let serials: Vec<_> = fx.warehouse.stock(bell).unwrap().serials.iter().cloned().collect();
        assert_eq!(serials, vec!["SN-2".to_string()]);
    }

    #[test]
    fn stock_commands_on_missing_warehouse_are_not_found() {
        let warehouse_id = WarehouseId::generate();
        let err = Warehouse::empty(warehouse_id)
            .handle(&WarehouseCommand::ReleaseReservation(ReleaseReservation {
                tenant_id: TenantId::new(),
                warehouse_id,
                reference: "MO-1".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Receive(i64),
        Issue(i64),
        Adjust(i64),
        Reserve(i64),
        Release,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..50).prop_map(Op::Receive),
            (1i64..50).prop_map(Op::Issue),
            (-30i64..30).prop_map(Op::Adjust),
            (1i64..50).prop_map(Op::Reserve),
            Just(Op::Release),
        ]
    }

    proptest! {
        /// Whatever sequence of commands is accepted, reserved stock never exceeds on-hand.
        #[test]
        fn reserved_never_exceeds_on_hand(ops in prop::collection::vec(op(), 1..60)) {
            let mut fx = Fixture::new();
            let product = ProductId::generate();
            let mut next_ref = 0u32;

            for op in ops {
                let _ = match op {
                    Op::Receive(n) => {
                        let cmd = fx.receive_cmd(product, qty(n), 100);
                        fx.run(WarehouseCommand::ReceiveStock(cmd))
                    }
                    Op::Issue(n) => fx.issue(product, qty(n)),
                    Op::Adjust(n) => fx.adjust(product, qty(n)),
                    Op::Reserve(n) => {
                        next_ref += 1;
                        fx.reserve(&format!("R-{next_ref}"), vec![(product, qty(n))])
                    }
                    Op::Release => fx.release(&format!("R-{next_ref}")),
                };

                if let Some(row) = fx.warehouse.stock(product) {
                    prop_assert!(row.reserved >= Decimal::ZERO);
                    prop_assert!(row.reserved <= row.quantity);
                    prop_assert!(row.batched_quantity() <= row.quantity);
                }
            }
        }
    }
}
