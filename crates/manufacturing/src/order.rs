use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, DomainResult, TenantId, extend};
use templeerp_events::Event;
use templeerp_inventory::WarehouseId;
use templeerp_products::ProductId;

use crate::bom::{BomId, RequirementLine};

templeerp_core::aggregate_id!(
    /// Manufacturing order identifier.
    ManufacturingOrderId
);

/// Manufacturing order lifecycle.
///
/// `DRAFT → VALIDATED → IN_PROGRESS → COMPLETED`, with `CANCELLED` reachable
/// from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    Validated,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether an order in this state has stock reserved in its warehouse.
    pub fn holds_reservation(self) -> bool {
        matches!(self, OrderStatus::Validated | OrderStatus::InProgress)
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Draft, Validated)
                | (Validated, InProgress)
                | (InProgress, Completed)
                | (Draft | Validated | InProgress, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Validated => "VALIDATED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Unit cost of produced goods: component standard costs over the produced quantity.
///
/// `standard_cost` looks up each component; its first failure is returned.
pub fn production_unit_cost<E>(
    requirements: &[RequirementLine],
    mut standard_cost: impl FnMut(ProductId) -> Result<i64, E>,
    produced: Decimal,
) -> Result<i64, E>
where
    E: From<DomainError>,
{
    if produced <= Decimal::ZERO {
        return Err(DomainError::validation("produced quantity must be greater than zero").into());
    }
    let mut total: i64 = 0;
    for line in requirements {
        let value = extend(line.quantity, standard_cost(line.product_id)?)?;
        total = total
            .checked_add(value)
            .ok_or_else(|| DomainError::validation("amount out of range"))?;
    }
    let unit_cost = (Decimal::from(total) / produced)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| DomainError::validation("amount out of range"))?;
    Ok(unit_cost)
}

/// Aggregate root: ManufacturingOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturingOrder {
    id: ManufacturingOrderId,
    tenant_id: Option<TenantId>,
    order_no: String,
    bom_id: Option<BomId>,
    product_id: Option<ProductId>,
    quantity: Decimal,
    warehouse_id: Option<WarehouseId>,
    planned_date: Option<NaiveDate>,
    requirements: Vec<RequirementLine>,
    status: OrderStatus,
    produced_quantity: Option<Decimal>,
    batch_no: Option<String>,
    unit_cost: Option<i64>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl ManufacturingOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ManufacturingOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            order_no: String::new(),
            bom_id: None,
            product_id: None,
            quantity: Decimal::ZERO,
            warehouse_id: None,
            planned_date: None,
            requirements: Vec::new(),
            status: OrderStatus::Draft,
            produced_quantity: None,
            batch_no: None,
            unit_cost: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ManufacturingOrderId {
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

    pub fn bom_id(&self) -> Option<BomId> {
        self.bom_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn planned_date(&self) -> Option<NaiveDate> {
        self.planned_date
    }

    pub fn requirements(&self) -> &[RequirementLine] {
        &self.requirements
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn produced_quantity(&self) -> Option<Decimal> {
        self.produced_quantity
    }

    pub fn batch_no(&self) -> Option<&str> {
        self.batch_no.as_deref()
    }

    pub fn unit_cost(&self) -> Option<i64> {
        self.unit_cost
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Reference under which this order's stock is reserved in its warehouse.
    pub fn reservation_reference(&self) -> String {
        format!("MO-{}", self.id)
    }
}

impl AggregateRoot for ManufacturingOrder {
    type Id = ManufacturingOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder. Requirements are a snapshot of the BOM at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub order_no: String,
    pub bom_id: BomId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub warehouse_id: WarehouseId,
    pub planned_date: NaiveDate,
    pub requirements: Vec<RequirementLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ValidateOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOrder {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOrder {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOrder {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub produced_quantity: Decimal,
    pub batch_no: Option<String>,
    pub unit_cost: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    ValidateOrder(ValidateOrder),
    StartOrder(StartOrder),
    CompleteOrder(CompleteOrder),
    CancelOrder(CancelOrder),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub order_no: String,
    pub bom_id: BomId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub warehouse_id: WarehouseId,
    pub planned_date: NaiveDate,
    pub requirements: Vec<RequirementLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderValidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderValidated {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub reservation_reference: String,
    pub reserved_lines: Vec<RequirementLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStarted {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub produced_quantity: Decimal,
    pub batch_no: Option<String>,
    pub unit_cost: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: ManufacturingOrderId,
    pub reason: String,
    /// True when the order held a stock reservation that must be released.
    pub release_reservation: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    OrderValidated(OrderValidated),
    OrderStarted(OrderStarted),
    OrderCompleted(OrderCompleted),
    OrderCancelled(OrderCancelled),
}

impl OrderEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            OrderEvent::OrderCreated(e) => e.tenant_id,
            OrderEvent::OrderValidated(e) => e.tenant_id,
            OrderEvent::OrderStarted(e) => e.tenant_id,
            OrderEvent::OrderCompleted(e) => e.tenant_id,
            OrderEvent::OrderCancelled(e) => e.tenant_id,
        }
    }

    pub fn order_id(&self) -> ManufacturingOrderId {
        match self {
            OrderEvent::OrderCreated(e) => e.order_id,
            OrderEvent::OrderValidated(e) => e.order_id,
            OrderEvent::OrderStarted(e) => e.order_id,
            OrderEvent::OrderCompleted(e) => e.order_id,
            OrderEvent::OrderCancelled(e) => e.order_id,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "manufacturing.order.created",
            OrderEvent::OrderValidated(_) => "manufacturing.order.validated",
            OrderEvent::OrderStarted(_) => "manufacturing.order.started",
            OrderEvent::OrderCompleted(_) => "manufacturing.order.completed",
            OrderEvent::OrderCancelled(_) => "manufacturing.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::OrderValidated(e) => e.occurred_at,
            OrderEvent::OrderStarted(e) => e.occurred_at,
            OrderEvent::OrderCompleted(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ManufacturingOrder {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_no = e.order_no.clone();
                self.bom_id = Some(e.bom_id);
                self.product_id = Some(e.product_id);
                self.quantity = e.quantity;
                self.warehouse_id = Some(e.warehouse_id);
                self.planned_date = Some(e.planned_date);
                self.requirements = e.requirements.clone();
                self.status = OrderStatus::Draft;
                self.created = true;
            }
            OrderEvent::OrderValidated(_) => self.status = OrderStatus::Validated,
            OrderEvent::OrderStarted(_) => self.status = OrderStatus::InProgress,
            OrderEvent::OrderCompleted(e) => {
                self.status = OrderStatus::Completed;
                self.produced_quantity = Some(e.produced_quantity);
                self.batch_no = e.batch_no.clone();
                self.unit_cost = Some(e.unit_cost);
            }
            OrderEvent::OrderCancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancel_reason = Some(e.reason.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::ValidateOrder(cmd) => {
                self.ensure_transition(cmd.tenant_id, cmd.order_id, OrderStatus::Validated)?;
                Ok(vec![OrderEvent::OrderValidated(OrderValidated {
                    tenant_id: cmd.tenant_id,
                    order_id: cmd.order_id,
                    reservation_reference: self.reservation_reference(),
                    reserved_lines: self.requirements.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            OrderCommand::StartOrder(cmd) => {
                self.ensure_transition(cmd.tenant_id, cmd.order_id, OrderStatus::InProgress)?;
                Ok(vec![OrderEvent::OrderStarted(OrderStarted {
                    tenant_id: cmd.tenant_id,
                    order_id: cmd.order_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            OrderCommand::CompleteOrder(cmd) => self.handle_complete(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ManufacturingOrder {
    fn ensure_existing(
        &self,
        tenant_id: TenantId,
        order_id: ManufacturingOrderId,
    ) -> Result<(), DomainError> {
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

    fn ensure_transition(
        &self,
        tenant_id: TenantId,
        order_id: ManufacturingOrderId,
        next: OrderStatus,
    ) -> Result<(), DomainError> {
        self.ensure_existing(tenant_id, order_id)?;
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "manufacturing order cannot move from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("manufacturing order already exists"));
        }
        if cmd.order_no.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if cmd.requirements.is_empty() {
            return Err(DomainError::validation("order has no material requirements"));
        }
        if cmd.requirements.iter().any(|r| r.quantity <= Decimal::ZERO) {
            return Err(DomainError::validation("requirement quantities must be positive"));
        }

        Ok(vec![OrderEvent::OrderCreated(OrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_no: cmd.order_no.trim().to_string(),
            bom_id: cmd.bom_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            warehouse_id: cmd.warehouse_id,
            planned_date: cmd.planned_date,
            requirements: cmd.requirements.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_transition(cmd.tenant_id, cmd.order_id, OrderStatus::Completed)?;

        if cmd.produced_quantity <= Decimal::ZERO {
            return Err(DomainError::validation("produced quantity must be greater than zero"));
        }
        if cmd.unit_cost < 0 {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }

        Ok(vec![OrderEvent::OrderCompleted(OrderCompleted {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            produced_quantity: cmd.produced_quantity,
            batch_no: cmd
                .batch_no
                .as_ref()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty()),
            unit_cost: cmd.unit_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_transition(cmd.tenant_id, cmd.order_id, OrderStatus::Cancelled)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            reason: cmd.reason.trim().to_string(),
            release_reservation: self.status.holds_reservation(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use templeerp_events::execute;

    struct Fixture {
        tenant_id: TenantId,
        order_id: ManufacturingOrderId,
        order: ManufacturingOrder,
    }

    impl Fixture {
        fn created() -> Self {
            let tenant_id = TenantId::new();
            let order_id = ManufacturingOrderId::generate();
            let mut order = ManufacturingOrder::empty(order_id);
            execute(
                &mut order,
                &OrderCommand::CreateOrder(CreateOrder {
                    tenant_id,
                    order_id,
                    order_no: "MO-0001".to_string(),
                    bom_id: BomId::generate(),
                    product_id: ProductId::generate(),
                    quantity: Decimal::from(100),
                    warehouse_id: WarehouseId::generate(),
                    planned_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                    requirements: vec![RequirementLine {
                        product_id: ProductId::generate(),
                        quantity: Decimal::from(5),
                    }],
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();
            Self { tenant_id, order_id, order }
        }

        fn validate(&mut self) -> Result<Vec<OrderEvent>, DomainError> {
            let cmd = OrderCommand::ValidateOrder(ValidateOrder {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                occurred_at: Utc::now(),
            });
            execute(&mut self.order, &cmd)
        }

        fn start(&mut self) -> Result<Vec<OrderEvent>, DomainError> {
            let cmd = OrderCommand::StartOrder(StartOrder {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                occurred_at: Utc::now(),
            });
            execute(&mut self.order, &cmd)
        }

        fn complete(&mut self, produced: Decimal) -> Result<Vec<OrderEvent>, DomainError> {
            let cmd = OrderCommand::CompleteOrder(CompleteOrder {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                produced_quantity: produced,
                batch_no: Some(" LAMP-2026-10 ".to_string()),
                unit_cost: 1_250,
                occurred_at: Utc::now(),
            });
            execute(&mut self.order, &cmd)
        }

        fn cancel(&mut self) -> Result<Vec<OrderEvent>, DomainError> {
            let cmd = OrderCommand::CancelOrder(CancelOrder {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                reason: "festival postponed".to_string(),
                occurred_at: Utc::now(),
            });
            execute(&mut self.order, &cmd)
        }
    }

    fn cancelled_event(events: Vec<OrderEvent>) -> OrderCancelled {
        match events.into_iter().next() {
            Some(OrderEvent::OrderCancelled(e)) => e,
            other => panic!("expected OrderCancelled, got {other:?}"),
        }
    }

    #[test]
    fn happy_path_runs_through_every_state() {
        let mut fx = Fixture::created();
        let validated = fx.validate().unwrap();
        let OrderEvent::OrderValidated(v) = &validated[0] else {
            panic!("expected OrderValidated");
        };
        assert_eq!(v.reserved_lines, fx.order.requirements());
        assert_eq!(v.reservation_reference, fx.order.reservation_reference());

        fx.start().unwrap();
        fx.complete(Decimal::from(98)).unwrap();

        assert_eq!(fx.order.status(), OrderStatus::Completed);
        assert_eq!(fx.order.produced_quantity(), Some(Decimal::from(98)));
        assert_eq!(fx.order.batch_no(), Some("LAMP-2026-10"));
        assert_eq!(fx.order.version(), 4);
    }

    #[test]
    fn skipping_states_is_an_invariant_violation() {
        let mut fx = Fixture::created();
        let err = fx.complete(Decimal::ONE).unwrap_err();
        assert_eq!(
            err,
            DomainError::invariant("manufacturing order cannot move from DRAFT to COMPLETED")
        );
        assert!(fx.start().is_err());
        assert_eq!(fx.order.status(), OrderStatus::Draft);
    }

    #[test]
    fn cancelling_records_whether_stock_was_reserved() {
        let mut draft = Fixture::created();
        assert!(!cancelled_event(draft.cancel().unwrap()).release_reservation);

        let mut validated = Fixture::created();
        validated.validate().unwrap();
        assert!(cancelled_event(validated.cancel().unwrap()).release_reservation);

        let mut running = Fixture::created();
        running.validate().unwrap();
        running.start().unwrap();
        assert!(cancelled_event(running.cancel().unwrap()).release_reservation);
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let mut fx = Fixture::created();
        fx.cancel().unwrap();
        assert!(fx.cancel().is_err());
        assert!(fx.validate().is_err());

        let mut done = Fixture::created();
        done.validate().unwrap();
        done.start().unwrap();
        done.complete(Decimal::ONE).unwrap();
        assert!(matches!(done.cancel().unwrap_err(), DomainError::InvariantViolation(_)));
    }

    #[test]
    fn completion_needs_output() {
        let mut fx = Fixture::created();
        fx.validate().unwrap();
        fx.start().unwrap();
        assert!(matches!(
            fx.complete(Decimal::ZERO).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn transition_table() {
        use OrderStatus::*;
        let all = [Draft, Validated, InProgress, Completed, Cancelled];
        let allowed = [
            (Draft, Validated),
            (Validated, InProgress),
            (InProgress, Completed),
            (Draft, Cancelled),
            (Validated, Cancelled),
            (InProgress, Cancelled),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn unit_cost_spreads_component_cost_over_output() {
        let ghee = ProductId::generate();
        let wick = ProductId::generate();
        let requirements = vec![
            RequirementLine { product_id: ghee, quantity: Decimal::new(13, 1) },
            RequirementLine { product_id: wick, quantity: Decimal::from(25) },
        ];
        let cost = |id: ProductId| -> DomainResult<i64> { Ok(if id == ghee { 60_000 } else { 200 }) };

        // 1.3 × 600.00 + 25 × 2.00 = 830.00 over 25 lamps
        assert_eq!(production_unit_cost(&requirements, cost, Decimal::from(25)).unwrap(), 3_320);
        assert!(production_unit_cost(&requirements, cost, Decimal::ZERO).is_err());

        let missing: DomainResult<i64> = production_unit_cost(
            &requirements,
            |id| if id == ghee { Err(DomainError::not_found()) } else { Ok(200) },
            Decimal::from(25),
        );
        assert!(matches!(missing, Err(DomainError::NotFound)));
    }
}
