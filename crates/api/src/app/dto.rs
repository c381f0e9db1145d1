use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use templeerp_accounting::{
    AcYear, AccountKind, EntryItem, EntryType, FundBudget, JournalEntry, Ledger, LedgerId,
};
use templeerp_inventory::{BatchReceipt, Warehouse, WarehouseId};
use templeerp_manufacturing::{BomComponent, BomId, BomMaster, ManufacturingOrder};
use templeerp_products::{Product, ProductId, ProductKind, TrackingMode};
use templeerp_purchasing::{GrnLine, PurchaseOrder};
use templeerp_sales::SalesOrder;
use templeerp_temple::{Booking, PagodaTower};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateLedgerRequest {
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    pub parent_id: Option<LedgerId>,
    #[serde(default)]
    pub is_group: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateYearRequest {
    pub name: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct OpeningBalanceRequest {
    pub ledger_id: LedgerId,
    #[serde(default)]
    pub debit: i64,
    #[serde(default)]
    pub credit: i64,
}

#[derive(Debug, Deserialize)]
pub struct CloseYearRequest {
    pub surplus_ledger_id: LedgerId,
    pub next_year_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PostEntryRequest {
    pub entry_no: String,
    pub entry_type: EntryType,
    pub date: NaiveDate,
    pub ac_year_id: templeerp_accounting::AcYearId,
    pub fund_code: Option<String>,
    pub narration: Option<String>,
    pub items: Vec<EntryItem>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub ac_year_id: templeerp_accounting::AcYearId,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBudgetRequest {
    pub name: String,
    pub fund_code: String,
    pub ac_year_id: templeerp_accounting::AcYearId,
}

#[derive(Debug, Deserialize)]
pub struct BudgetLineRequest {
    pub ledger_id: LedgerId,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub kind: ProductKind,
    pub uom: String,
    #[serde(default = "default_tracking")]
    pub tracking: TrackingMode,
    #[serde(default)]
    pub standard_cost: i64,
}

fn default_tracking() -> TrackingMode {
    TrackingMode::None
}

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveStockRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_cost: i64,
    pub batch: Option<BatchReceipt>,
    #[serde(default)]
    pub serials: Vec<String>,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueStockRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    #[serde(default)]
    pub serials: Vec<String>,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: ProductId,
    pub delta: Decimal,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub product_id: Option<ProductId>,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBomRequest {
    pub code: String,
    pub name: String,
    pub product_id: ProductId,
    pub output_quantity: Decimal,
    #[serde(default)]
    pub components: Vec<BomComponent>,
}

#[derive(Debug, Deserialize)]
pub struct CreateManufacturingOrderRequest {
    pub order_no: String,
    pub bom_id: BomId,
    pub quantity: Decimal,
    pub warehouse_id: WarehouseId,
    pub planned_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CompleteManufacturingOrderRequest {
    pub produced_quantity: Decimal,
    pub batch_no: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderRequest {
    pub order_no: String,
    pub customer_name: String,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub lines: Vec<SalesLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SalesLineRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: i64,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub tax_percent: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub order_no: String,
    pub supplier_name: String,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub lines: Vec<PurchaseLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseLineRequest {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveGoodsRequest {
    pub grn_no: String,
    pub lines: Vec<GrnLine>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTowerRequest {
    pub code: String,
    pub name: String,
    pub total_lights: u32,
    pub annual_fee: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterLightRequest {
    pub light_number: u32,
    pub devotee_name: String,
    pub devotee_contact: Option<String>,
    pub dedicated_to: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_paid: i64,
}

#[derive(Debug, Deserialize)]
pub struct RenewRegistrationRequest {
    pub months: u32,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub booking_no: String,
    pub service_name: String,
    pub devotee_name: String,
    pub devotee_contact: Option<String>,
    pub booking_date: NaiveDate,
    pub slot: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: i64,
    pub payment_mode: String,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn ledger_to_json(l: &Ledger) -> Value {
    json!({
        "id": l.id_typed().to_string(),
        "code": l.code(),
        "name": l.name(),
        "kind": l.kind(),
        "parent_id": l.parent().map(|p| p.to_string()),
        "is_group": l.is_group(),
        "status": l.status(),
    })
}

pub fn year_to_json(y: &AcYear) -> Value {
    json!({
        "id": y.id_typed().to_string(),
        "name": y.name(),
        "from_date": y.from_date(),
        "to_date": y.to_date(),
        "status": y.status(),
        "is_active": y.is_active(),
        "next_year_id": y.next_year_id().map(|id| id.to_string()),
        "opening_balances": y.opening_balances().iter().map(|(ledger_id, ob)| json!({
            "ledger_id": ledger_id.to_string(),
            "debit": ob.debit,
            "credit": ob.credit,
        })).collect::<Vec<_>>(),
    })
}

pub fn entry_to_json(e: &JournalEntry) -> Value {
    json!({
        "id": e.id_typed().to_string(),
        "entry_no": e.entry_no(),
        "entry_type": e.entry_type(),
        "date": e.date(),
        "ac_year_id": e.ac_year_id().map(|id| id.to_string()),
        "fund_code": e.fund_code(),
        "status": e.status(),
        "amount": e.amount_display(),
        "items": e.items(),
    })
}

pub fn budget_to_json(b: &FundBudget) -> Value {
    json!({
        "id": b.id_typed().to_string(),
        "name": b.name(),
        "fund_code": b.fund_code(),
        "ac_year_id": b.ac_year_id().map(|id| id.to_string()),
        "status": b.status(),
        "lines": b.lines(),
        "total_budgeted": b.total_budgeted().to_string(),
    })
}

pub fn product_to_json(p: &Product) -> Value {
    json!({
        "id": p.id_typed().to_string(),
        "sku": p.sku(),
        "name": p.name(),
        "kind": p.kind(),
        "uom": p.uom(),
        "tracking": p.tracking(),
        "standard_cost": p.standard_cost(),
        "status": p.status(),
    })
}

pub fn warehouse_to_json(w: &Warehouse) -> Value {
    json!({
        "id": w.id_typed().to_string(),
        "code": w.code(),
        "name": w.name(),
        "reservations": w.reservations().map(|(reference, lines)| json!({
            "reference": reference,
            "lines": lines,
        })).collect::<Vec<_>>(),
    })
}

pub fn bom_to_json(b: &BomMaster) -> Value {
    json!({
        "id": b.id_typed().to_string(),
        "code": b.code(),
        "name": b.name(),
        "product_id": b.product_id().map(|id| id.to_string()),
        "output_quantity": b.output_quantity(),
        "components": b.components(),
        "status": b.status(),
    })
}

pub fn manufacturing_order_to_json(o: &ManufacturingOrder) -> Value {
    json!({
        "id": o.id_typed().to_string(),
        "order_no": o.order_no(),
        "bom_id": o.bom_id().map(|id| id.to_string()),
        "product_id": o.product_id().map(|id| id.to_string()),
        "quantity": o.quantity(),
        "warehouse_id": o.warehouse_id().map(|id| id.to_string()),
        "planned_date": o.planned_date(),
        "status": o.status(),
        "requirements": o.requirements(),
        "produced_quantity": o.produced_quantity(),
        "batch_no": o.batch_no(),
        "unit_cost": o.unit_cost(),
        "cancel_reason": o.cancel_reason(),
    })
}

pub fn sales_order_to_json(o: &SalesOrder) -> Value {
    json!({
        "id": o.id_typed().to_string(),
        "order_no": o.order_no(),
        "customer_name": o.customer_name(),
        "warehouse_id": o.warehouse_id().map(|id| id.to_string()),
        "status": o.status(),
        "lines": o.lines(),
        "totals": o.totals(),
    })
}

pub fn purchase_order_to_json(o: &PurchaseOrder) -> Value {
    json!({
        "id": o.id_typed().to_string(),
        "order_no": o.order_no(),
        "supplier_name": o.supplier_name(),
        "warehouse_id": o.warehouse_id().map(|id| id.to_string()),
        "status": o.status(),
        "lines": o.lines(),
        "grn_numbers": o.grn_numbers().collect::<Vec<_>>(),
        "total_value": o.total_value(),
    })
}

pub fn tower_to_json(t: &PagodaTower, on: NaiveDate) -> Value {
    json!({
        "id": t.id_typed().to_string(),
        "code": t.code(),
        "name": t.name(),
        "total_lights": t.total_lights(),
        "annual_fee": t.annual_fee(),
        "available_lights": t.available_lights(on),
        "registrations": t.registrations().iter().map(|r| json!({
            "registration_id": r.registration_id.to_string(),
            "light_number": r.light_number,
            "devotee_name": r.devotee_name,
            "dedicated_to": r.dedicated_to,
            "start_date": r.start_date,
            "end_date": r.end_date,
            "amount_paid": r.amount_paid,
            "status": r.status,
            "display_status": r.display_status(on),
        })).collect::<Vec<_>>(),
    })
}

pub fn booking_to_json(b: &Booking) -> Value {
    json!({
        "id": b.id_typed().to_string(),
        "booking_no": b.booking_no(),
        "service_name": b.service_name(),
        "devotee_name": b.devotee_name(),
        "devotee_contact": b.devotee_contact(),
        "booking_date": b.booking_date(),
        "slot": b.slot(),
        "amount": b.amount(),
        "paid": b.paid(),
        "balance_due": b.balance_due(),
        "status": b.status(),
        "payment_status": b.payment_status(),
    })
}
