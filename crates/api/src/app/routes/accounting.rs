use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;

use templeerp_accounting::{
    AcYear, AcYearCommand, AcYearId, BudgetCommand, BudgetId, ChangeBudgetStatus,
    ChangeLedgerStatus, CreateAcYear, CreateBudget, CreateLedger, EntryCommand, EntryId,
    FundBudget, JournalEntry, Ledger, LedgerCommand, LedgerId, PostEntry, RemoveBudgetLine,
    RenameLedger, SetBudgetLine, SetOpeningBalance, VoidEntry,
};

use templeerp_infra::projections::TrialBalance;

use crate::app::dto;
use crate::app::routes::common::{
    ApiResult, Body, committed, created, done, guard, items, one, parse_id,
};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/ledgers", post(create_ledger).get(list_ledgers))
        .route("/ledgers/:id", get(get_ledger))
        .route("/ledgers/:id/rename", post(rename_ledger))
        .route("/ledgers/:id/deactivate", post(deactivate_ledger))
        .route("/ledgers/:id/reactivate", post(reactivate_ledger))
        .route("/years", post(create_year).get(list_years))
        .route("/years/:id", get(get_year))
        .route("/years/:id/activate", post(activate_year))
        .route("/years/:id/opening-balances", post(set_opening_balance))
        .route("/years/:id/close", post(close_year))
        .route("/entries", post(post_entry))
        .route("/entries/:id", get(get_entry))
        .route("/entries/:id/void", post(void_entry))
        .route("/balances/:ledger_id", get(ledger_balance))
        .route("/trial-balance", get(trial_balance))
        .route("/budgets", post(create_budget).get(list_budgets))
        .route("/budgets/:id", get(get_budget))
        .route("/budgets/:id/lines", post(set_budget_line))
        .route("/budgets/:id/lines/:ledger_id", axum::routing::delete(remove_budget_line))
        .route("/budgets/:id/approve", post(approve_budget))
        .route("/budgets/:id/reject", post(reject_budget))
        .route("/budgets/:id/close", post(close_budget))
        .route("/budgets/:id/utilization", get(budget_utilization))
}

// -------------------------
// Ledgers
// -------------------------

pub async fn create_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateLedgerRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.ledgers.create")?;
    let tenant_id = tenant.tenant_id();
    let id = services.workflows().create_ledger(
        tenant_id,
        CreateLedger {
            tenant_id,
            ledger_id: LedgerId::generate(),
            code: body.code,
            name: body.name,
            kind: body.kind,
            parent: body.parent_id,
            is_group: body.is_group,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(created(id))
}

pub async fn list_ledgers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let mut ledgers = services.projections().ledgers.list(tenant.tenant_id());
    ledgers.sort_by(|a, b| a.code().cmp(b.code()));
    Ok(items(ledgers.iter().map(dto::ledger_to_json).collect()))
}

pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let ledger_id: LedgerId = parse_id(&id, "ledger")?;
    let ledger: Ledger = services
        .workflows()
        .fetch(tenant.tenant_id(), ledger_id.aggregate_id(), "ledger")?;
    Ok(one(dto::ledger_to_json(&ledger)))
}

pub async fn rename_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::RenameRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.ledgers.update")?;
    let tenant_id = tenant.tenant_id();
    let ledger_id: LedgerId = parse_id(&id, "ledger")?;
    let events = services.workflows().execute::<Ledger>(
        tenant_id,
        ledger_id.aggregate_id(),
        LedgerCommand::RenameLedger(RenameLedger {
            tenant_id,
            ledger_id,
            name: body.name,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(ledger_id, &events))
}

async fn change_ledger_status(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    make: fn(ChangeLedgerStatus) -> LedgerCommand,
) -> ApiResult {
    guard(tenant, principal, "accounting.ledgers.update")?;
    let tenant_id = tenant.tenant_id();
    let ledger_id: LedgerId = parse_id(id, "ledger")?;
    let events = services.workflows().execute::<Ledger>(
        tenant_id,
        ledger_id.aggregate_id(),
        make(ChangeLedgerStatus {
            tenant_id,
            ledger_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(ledger_id, &events))
}

pub async fn deactivate_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_ledger_status(&services, &tenant, &principal, &id, LedgerCommand::DeactivateLedger).await
}

pub async fn reactivate_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_ledger_status(&services, &tenant, &principal, &id, LedgerCommand::ReactivateLedger).await
}

// -------------------------
// Accounting years
// -------------------------

pub async fn create_year(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateYearRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.years.create")?;
    let tenant_id = tenant.tenant_id();
    let id = services.workflows().create_year(
        tenant_id,
        CreateAcYear {
            tenant_id,
            year_id: AcYearId::generate(),
            name: body.name,
            from_date: body.from_date,
            to_date: body.to_date,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(created(id))
}

pub async fn list_years(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let mut years = services.projections().years.list(tenant.tenant_id());
    years.sort_by_key(|y| y.from_date());
    Ok(items(years.iter().map(dto::year_to_json).collect()))
}

pub async fn get_year(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let year_id: AcYearId = parse_id(&id, "accounting year")?;
    let year: AcYear = services
        .workflows()
        .fetch(tenant.tenant_id(), year_id.aggregate_id(), "accounting year")?;
    Ok(one(dto::year_to_json(&year)))
}

pub async fn activate_year(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.years.activate")?;
    let year_id: AcYearId = parse_id(&id, "accounting year")?;
    services
        .workflows()
        .activate_year(tenant.tenant_id(), year_id, Utc::now())?;
    Ok(done(year_id))
}

pub async fn set_opening_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::OpeningBalanceRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.years.update")?;
    let tenant_id = tenant.tenant_id();
    let year_id: AcYearId = parse_id(&id, "accounting year")?;
    let events = services.workflows().execute::<AcYear>(
        tenant_id,
        year_id.aggregate_id(),
        AcYearCommand::SetOpeningBalance(SetOpeningBalance {
            tenant_id,
            year_id,
            ledger_id: body.ledger_id,
            debit: body.debit,
            credit: body.credit,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(year_id, &events))
}

pub async fn close_year(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::CloseYearRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.years.close")?;
    let year_id: AcYearId = parse_id(&id, "accounting year")?;
    let next = services.workflows().close_year(
        tenant.tenant_id(),
        templeerp_infra::workflows::CloseYear {
            year_id,
            next_year_id: AcYearId::generate(),
            next_year_name: body.next_year_name,
            surplus_ledger_id: body.surplus_ledger_id,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(one(serde_json::json!({
        "id": year_id.to_string(),
        "next_year_id": next.to_string(),
    })))
}

// -------------------------
// Entries
// -------------------------

pub async fn post_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::PostEntryRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.entries.post")?;
    let tenant_id = tenant.tenant_id();
    let id = services.workflows().post_entry(
        tenant_id,
        PostEntry {
            tenant_id,
            entry_id: EntryId::generate(),
            entry_no: body.entry_no,
            entry_type: body.entry_type,
            date: body.date,
            ac_year_id: body.ac_year_id,
            fund_code: body.fund_code,
            narration: body.narration,
            items: body.items,
            occurred_at: Utc::now(),
        },
    )?;
    Ok(created(id))
}

pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let entry_id: EntryId = parse_id(&id, "entry")?;
    let entry: JournalEntry = services
        .workflows()
        .fetch(tenant.tenant_id(), entry_id.aggregate_id(), "entry")?;
    Ok(one(dto::entry_to_json(&entry)))
}

pub async fn void_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::ReasonRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.entries.void")?;
    let tenant_id = tenant.tenant_id();
    let entry_id: EntryId = parse_id(&id, "entry")?;
    let events = services.workflows().execute::<JournalEntry>(
        tenant_id,
        entry_id.aggregate_id(),
        EntryCommand::VoidEntry(VoidEntry {
            tenant_id,
            entry_id,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(entry_id, &events))
}

// -------------------------
// Reports
// -------------------------

#[derive(Serialize)]
struct TrialBalanceBody {
    #[serde(flatten)]
    trial_balance: TrialBalance,
    balanced: bool,
}

pub async fn ledger_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(ledger_id): Path<String>,
    Query(q): Query<dto::BalanceQuery>,
) -> ApiResult {
    let ledger_id: LedgerId = parse_id(&ledger_id, "ledger")?;
    let as_of = q.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let balance = services.projections().accounting().ledger_balance(
        tenant.tenant_id(),
        ledger_id,
        q.ac_year_id,
        as_of,
    )?;
    Ok(one(balance))
}

pub async fn trial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(q): Query<dto::BalanceQuery>,
) -> ApiResult {
    let as_of = q.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let tb = services
        .projections()
        .accounting()
        .trial_balance(tenant.tenant_id(), q.ac_year_id, as_of)?;
    Ok(one(TrialBalanceBody {
        balanced: tb.is_balanced(),
        trial_balance: tb,
    }))
}

// -------------------------
// Budgets
// -------------------------

pub async fn create_budget(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Body(body): Body<dto::CreateBudgetRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.budgets.create")?;
    let tenant_id = tenant.tenant_id();
    let budget_id = BudgetId::generate();
    services.workflows().execute::<FundBudget>(
        tenant_id,
        budget_id.aggregate_id(),
        BudgetCommand::CreateBudget(CreateBudget {
            tenant_id,
            budget_id,
            name: body.name,
            fund_code: body.fund_code,
            ac_year_id: body.ac_year_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(created(budget_id))
}

pub async fn list_budgets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult {
    let budgets = services.projections().budgets.list(tenant.tenant_id());
    Ok(items(budgets.iter().map(dto::budget_to_json).collect()))
}

pub async fn get_budget(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let budget_id: BudgetId = parse_id(&id, "budget")?;
    let budget: FundBudget = services
        .workflows()
        .fetch(tenant.tenant_id(), budget_id.aggregate_id(), "budget")?;
    Ok(one(dto::budget_to_json(&budget)))
}

pub async fn set_budget_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Body(body): Body<dto::BudgetLineRequest>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.budgets.update")?;
    let tenant_id = tenant.tenant_id();
    let budget_id: BudgetId = parse_id(&id, "budget")?;
    let events = services.workflows().execute::<FundBudget>(
        tenant_id,
        budget_id.aggregate_id(),
        BudgetCommand::SetBudgetLine(SetBudgetLine {
            tenant_id,
            budget_id,
            ledger_id: body.ledger_id,
            amount: body.amount,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(budget_id, &events))
}

pub async fn remove_budget_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, ledger_id)): Path<(String, String)>,
) -> ApiResult {
    guard(&tenant, &principal, "accounting.budgets.update")?;
    let tenant_id = tenant.tenant_id();
    let budget_id: BudgetId = parse_id(&id, "budget")?;
    let ledger_id: LedgerId = parse_id(&ledger_id, "ledger")?;
    let events = services.workflows().execute::<FundBudget>(
        tenant_id,
        budget_id.aggregate_id(),
        BudgetCommand::RemoveBudgetLine(RemoveBudgetLine {
            tenant_id,
            budget_id,
            ledger_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(budget_id, &events))
}

async fn change_budget_status(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    make: fn(ChangeBudgetStatus) -> BudgetCommand,
) -> ApiResult {
    guard(tenant, principal, "accounting.budgets.approve")?;
    let tenant_id = tenant.tenant_id();
    let budget_id: BudgetId = parse_id(id, "budget")?;
    let events = services.workflows().execute::<FundBudget>(
        tenant_id,
        budget_id.aggregate_id(),
        make(ChangeBudgetStatus {
            tenant_id,
            budget_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(committed(budget_id, &events))
}

pub async fn approve_budget(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_budget_status(&services, &tenant, &principal, &id, BudgetCommand::ApproveBudget).await
}

pub async fn reject_budget(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_budget_status(&services, &tenant, &principal, &id, BudgetCommand::RejectBudget).await
}

pub async fn close_budget(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    change_budget_status(&services, &tenant, &principal, &id, BudgetCommand::CloseBudget).await
}

pub async fn budget_utilization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let budget_id: BudgetId = parse_id(&id, "budget")?;
    let usage = services
        .projections()
        .accounting()
        .budget_utilization(tenant.tenant_id(), budget_id)?;
    Ok(one(usage))
}
