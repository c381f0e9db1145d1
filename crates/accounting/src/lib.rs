//! Accounting bounded context: chart of accounts, accounting years,
//! double-entry journal entries and fund budgets.
//!
//! Pure domain logic only. Balances are derived from posted entries by the
//! read side; the arithmetic for that lives in [`balance`].

pub mod ac_year;
pub mod balance;
pub mod budget;
pub mod entry;
pub mod ledger;

pub use ac_year::{
    AcYear, AcYearActivationChanged, AcYearClosed, AcYearCommand, AcYearCreated, AcYearEvent,
    AcYearId, AcYearStatus, ChangeActivation, CloseAcYear, ClosingBalance, CreateAcYear,
    OpeningBalance, OpeningBalanceSet, SetOpeningBalance,
};
pub use balance::{
    LedgerTree, Posting, balance_as_of, format_balance, normal_side, rollover_openings,
    split_columns,
};
pub use budget::{
    BudgetCommand, BudgetCreated, BudgetEvent, BudgetId, BudgetLine, BudgetLineRemoved,
    BudgetLineSet, BudgetStatus, BudgetStatusChanged, BudgetUtilization, ChangeBudgetStatus,
    CreateBudget, FundBudget, LineUtilization, RemoveBudgetLine, SetBudgetLine,
    compute_utilization,
};
pub use entry::{
    EntryCommand, EntryEvent, EntryId, EntryItem, EntryPosted, EntryStatus, EntryType,
    EntryVoided, JournalEntry, PostEntry, Side, VoidEntry,
};
pub use ledger::{
    AccountKind, ChangeLedgerStatus, CreateLedger, Ledger, LedgerCommand, LedgerCreated,
    LedgerEvent, LedgerId, LedgerRenamed, LedgerStatus, LedgerStatusChanged, RenameLedger,
};
