use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use templeerp_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, TenantId, extend, percent_of,
    round_quantity,
};
use templeerp_events::Event;
use templeerp_inventory::WarehouseId;
use templeerp_products::ProductId;

templeerp_core::aggregate_id!(
    /// Sales order identifier (tenant-scoped via `tenant_id` fields in events/commands).
    SalesOrderId
);

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Draft,
    Confirmed,
    Delivered,
    Cancelled,
}

/// Money amounts of one line, fixed when the line is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineAmounts {
    pub gross: i64,
    pub discount: i64,
    pub tax: i64,
}

impl LineAmounts {
    /// Discount applies to the gross value, tax to the discounted value.
    pub fn compute(
        quantity: Decimal,
        unit_price: i64,
        discount_percent: Decimal,
        tax_percent: Decimal,
    ) -> DomainResult<Self> {
        let gross = extend(quantity, unit_price)?;
        let discount = percent_of(gross, discount_percent)?;
        let tax = percent_of(gross - discount, tax_percent)?;
        Ok(Self { gross, discount, tax })
    }

    pub fn total(&self) -> i64 {
        self.gross - self.discount + self.tax
    }
}

/// Order line: product, quantity, unit price, discount and tax rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Price in minor units.
    pub unit_price: i64,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
    pub amounts: LineAmounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub grand_total: i64,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    tenant_id: Option<TenantId>,
    order_no: String,
    customer_name: String,
    warehouse_id: Option<WarehouseId>,
    status: SalesOrderStatus,
    lines: Vec<OrderLine>,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            order_no: String::new(),
            customer_name: String::new(),
            warehouse_id: None,
            status: SalesOrderStatus::Draft,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
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

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    /// Warehouse the order ships from.
    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_modifiable(&self) -> bool {
        self.status == SalesOrderStatus::Draft
    }

    pub fn totals(&self) -> OrderTotals {
        self.lines.iter().fold(OrderTotals::default(), |mut acc, line| {
            acc.subtotal += line.amounts.gross;
            acc.discount += line.amounts.discount;
            acc.tax += line.amounts.tax;
            acc.grand_total += line.amounts.total();
            acc
        })
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub order_no: String,
    pub customer_name: String,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: i64,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDelivered {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    AddLine(AddLine),
    ConfirmOrder(ConfirmOrder),
    MarkDelivered(MarkDelivered),
    CancelOrder(CancelSalesOrder),
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub order_no: String,
    pub customer_name: String,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line: OrderLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SalesOrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    LineAdded(LineAdded),
    OrderConfirmed(OrderConfirmed),
    OrderDelivered(OrderDelivered),
    OrderCancelled(SalesOrderCancelled),
}

impl SalesOrderEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.tenant_id,
            SalesOrderEvent::LineAdded(e) => e.tenant_id,
            SalesOrderEvent::OrderConfirmed(e) => e.tenant_id,
            SalesOrderEvent::OrderDelivered(e) => e.tenant_id,
            SalesOrderEvent::OrderCancelled(e) => e.tenant_id,
        }
    }

    pub fn order_id(&self) -> SalesOrderId {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.order_id,
            SalesOrderEvent::LineAdded(e) => e.order_id,
            SalesOrderEvent::OrderConfirmed(e) => e.order_id,
            SalesOrderEvent::OrderDelivered(e) => e.order_id,
            SalesOrderEvent::OrderCancelled(e) => e.order_id,
        }
    }
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::LineAdded(_) => "sales.order.line_added",
            SalesOrderEvent::OrderConfirmed(_) => "sales.order.confirmed",
            SalesOrderEvent::OrderDelivered(_) => "sales.order.delivered",
            SalesOrderEvent::OrderCancelled(_) => "sales.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::LineAdded(e) => e.occurred_at,
            SalesOrderEvent::OrderConfirmed(e) => e.occurred_at,
            SalesOrderEvent::OrderDelivered(e) => e.occurred_at,
            SalesOrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_no = e.order_no.clone();
                self.customer_name = e.customer_name.clone();
                self.warehouse_id = Some(e.warehouse_id);
                self.status = SalesOrderStatus::Draft;
                self.created = true;
            }
            SalesOrderEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            SalesOrderEvent::OrderConfirmed(_) => self.status = SalesOrderStatus::Confirmed,
            SalesOrderEvent::OrderDelivered(_) => self.status = SalesOrderStatus::Delivered,
            SalesOrderEvent::OrderCancelled(_) => self.status = SalesOrderStatus::Cancelled,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            SalesOrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
            SalesOrderCommand::MarkDelivered(cmd) => self.handle_mark_delivered(cmd),
            SalesOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl SalesOrder {
    fn ensure_existing(&self, tenant_id: TenantId, order_id: SalesOrderId) -> Result<(), DomainError> {
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

    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        if cmd.order_no.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if cmd.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_no: cmd.order_no.trim().to_string(),
            customer_name: cmd.customer_name.trim().to_string(),
            warehouse_id: cmd.warehouse_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify order after it has been confirmed",
            ));
        }
        if cmd.quantity <= Decimal::ZERO || round_quantity(cmd.quantity) != cmd.quantity {
            return Err(DomainError::validation("quantity must be positive with at most 4 decimals"));
        }
        if cmd.unit_price < 0 {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        for (label, rate) in [("discount", cmd.discount_percent), ("tax", cmd.tax_percent)] {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(DomainError::validation(format!(
                    "{label} must be between 0 and 100 percent"
                )));
            }
        }

        let amounts = LineAmounts::compute(
            cmd.quantity,
            cmd.unit_price,
            cmd.discount_percent,
            cmd.tax_percent,
        )?;

        Ok(vec![SalesOrderEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line: OrderLine {
                line_no: self.lines.len() as u32 + 1,
                product_id: cmd.product_id,
                quantity: cmd.quantity,
                unit_price: cmd.unit_price,
                discount_percent: cmd.discount_percent,
                tax_percent: cmd.tax_percent,
                amounts,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != SalesOrderStatus::Draft {
            return Err(DomainError::invariant("only draft orders can be confirmed"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot confirm order without lines"));
        }

        Ok(vec![SalesOrderEvent::OrderConfirmed(OrderConfirmed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_delivered(&self, cmd: &MarkDelivered) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != SalesOrderStatus::Confirmed {
            return Err(DomainError::invariant("only confirmed orders can be delivered"));
        }

        Ok(vec![SalesOrderEvent::OrderDelivered(OrderDelivered {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if !matches!(self.status, SalesOrderStatus::Draft | SalesOrderStatus::Confirmed) {
            return Err(DomainError::invariant(
                "delivered or cancelled orders cannot be cancelled",
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![SalesOrderEvent::OrderCancelled(SalesOrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_order() -> (TenantId, SalesOrderId, SalesOrder) {
        let tenant_id = TenantId::new();
        let order_id = SalesOrderId::generate();
        let mut order = SalesOrder::empty(order_id);
        let events = order
            .handle(&SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                tenant_id,
                order_id,
                order_no: "SO-0001".to_string(),
                customer_name: "Counter sale".to_string(),
                warehouse_id: WarehouseId::generate(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        (tenant_id, order_id, order)
    }

    fn add_line_cmd(tenant_id: TenantId, order_id: SalesOrderId, quantity: Decimal, unit_price: i64) -> AddLine {
        AddLine {
            tenant_id,
            order_id,
            product_id: ProductId::generate(),
            quantity,
            unit_price,
            discount_percent: Decimal::ZERO,
            tax_percent: Decimal::ZERO,
            occurred_at: test_time(),
        }
    }

    fn run(order: &mut SalesOrder, cmd: SalesOrderCommand) -> Result<(), DomainError> {
        for ev in order.handle(&cmd)? {
            order.apply(&ev);
        }
        Ok(())
    }

    #[test]
    fn add_line_numbers_lines_and_fixes_amounts() {
        let (tenant_id, order_id, mut order) = created_order();
        let mut cmd = add_line_cmd(tenant_id, order_id, Decimal::from(4), 2_500);
        cmd.discount_percent = Decimal::from(10);
        cmd.tax_percent = Decimal::from(5);

        let events = order.handle(&SalesOrderCommand::AddLine(cmd)).unwrap();
        match &events[0] {
            SalesOrderEvent::LineAdded(e) => {
                assert_eq!(e.line.line_no, 1);
                assert_eq!(e.line.amounts, LineAmounts { gross: 10_000, discount: 1_000, tax: 450 });
            }
            other => panic!("Expected LineAdded event, got {other:?}"),
        }
        order.apply(&events[0]);

        assert_eq!(
            order.totals(),
            OrderTotals { subtotal: 10_000, discount: 1_000, tax: 450, grand_total: 9_450 }
        );
    }

    #[test]
    fn cannot_modify_confirmed_order() {
        let (tenant_id, order_id, mut order) = created_order();
        run(&mut order, SalesOrderCommand::AddLine(add_line_cmd(tenant_id, order_id, Decimal::ONE, 100))).unwrap();
        run(&mut order, SalesOrderCommand::ConfirmOrder(ConfirmOrder { tenant_id, order_id, occurred_at: test_time() })).unwrap();

        let err = order
            .handle(&SalesOrderCommand::AddLine(add_line_cmd(tenant_id, order_id, Decimal::ONE, 100)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn cannot_confirm_empty_order() {
        let (tenant_id, order_id, order) = created_order();
        let err = order
            .handle(&SalesOrderCommand::ConfirmOrder(ConfirmOrder { tenant_id, order_id, occurred_at: test_time() }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn delivery_requires_confirmation_and_is_terminal() {
        let (tenant_id, order_id, mut order) = created_order();
        let deliver = SalesOrderCommand::MarkDelivered(MarkDelivered { tenant_id, order_id, occurred_at: test_time() });
        assert!(order.handle(&deliver).is_err());

        run(&mut order, SalesOrderCommand::AddLine(add_line_cmd(tenant_id, order_id, Decimal::ONE, 100))).unwrap();
        run(&mut order, SalesOrderCommand::ConfirmOrder(ConfirmOrder { tenant_id, order_id, occurred_at: test_time() })).unwrap();
        run(&mut order, deliver).unwrap();
        assert_eq!(order.status(), SalesOrderStatus::Delivered);

        let cancel = SalesOrderCommand::CancelOrder(CancelSalesOrder {
            tenant_id,
            order_id,
            reason: "customer changed mind".to_string(),
            occurred_at: test_time(),
        });
        assert!(matches!(order.handle(&cancel).unwrap_err(), DomainError::InvariantViolation(_)));
    }

    #[test]
    fn confirmed_orders_can_be_cancelled() {
        let (tenant_id, order_id, mut order) = created_order();
        run(&mut order, SalesOrderCommand::AddLine(add_line_cmd(tenant_id, order_id, Decimal::ONE, 100))).unwrap();
        run(&mut order, SalesOrderCommand::ConfirmOrder(ConfirmOrder { tenant_id, order_id, occurred_at: test_time() })).unwrap();
        run(
            &mut order,
            SalesOrderCommand::CancelOrder(CancelSalesOrder {
                tenant_id,
                order_id,
                reason: "out of stock".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(order.status(), SalesOrderStatus::Cancelled);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let (tenant_id, order_id, order) = created_order();
        let initial_version = order.version();
        let cmd = SalesOrderCommand::AddLine(add_line_cmd(tenant_id, order_id, Decimal::ONE, 100));

        let events1 = order.handle(&cmd).unwrap();
        let events2 = order.handle(&cmd).unwrap();

        assert_eq!(order.version(), initial_version);
        assert!(order.lines().is_empty());
        assert_eq!(events1, events2);
    }

    proptest! {
        /// Grand total always equals subtotal − discount + tax.
        #[test]
        fn totals_are_consistent(
            lines in prop::collection::vec((1i64..1_000, 0i64..100_000, 0i64..=100, 0i64..=28), 1..10)
        ) {
            let (tenant_id, order_id, mut order) = created_order();
            for (qty, price, disc, tax) in lines {
                let mut cmd = add_line_cmd(tenant_id, order_id, Decimal::from(qty), price);
                cmd.discount_percent = Decimal::from(disc);
                cmd.tax_percent = Decimal::from(tax);
                run(&mut order, SalesOrderCommand::AddLine(cmd)).unwrap();
            }

            let t = order.totals();
            prop_assert_eq!(t.grand_total, t.subtotal - t.discount + t.tax);
            prop_assert!(t.discount <= t.subtotal);
        }
    }
}
