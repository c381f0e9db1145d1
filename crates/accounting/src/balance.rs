//! Ledger balance arithmetic.
//!
//! All balances are signed and debit-positive (`debit - credit`). A ledger's
//! balance for a year is its opening balance plus every non-voided posting
//! dated inside the year up to the as-of date. Group ledgers report the sum of
//! their descendants.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use templeerp_core::format_amount;

use crate::ac_year::OpeningBalance;
use crate::entry::Side;
use crate::ledger::{AccountKind, LedgerId};

/// One ledger-level movement derived from an entry item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub date: NaiveDate,
    pub debit: i64,
    pub credit: i64,
}

impl Posting {
    pub fn net(&self) -> i128 {
        self.debit as i128 - self.credit as i128
    }
}

/// Side on which a ledger of this kind normally carries its balance.
pub fn normal_side(kind: AccountKind) -> Side {
    match kind {
        AccountKind::Asset | AccountKind::Expense => Side::Debit,
        AccountKind::Liability | AccountKind::Equity | AccountKind::Revenue => Side::Credit,
    }
}

/// `opening + Σ(debit − credit)` over postings with `from <= date <= as_of`.
pub fn balance_as_of<'a>(
    opening: i128,
    postings: impl IntoIterator<Item = &'a Posting>,
    from: NaiveDate,
    as_of: NaiveDate,
) -> i128 {
    opening
        + postings
            .into_iter()
            .filter(|p| from <= p.date && p.date <= as_of)
            .map(Posting::net)
            .sum::<i128>()
}

/// Split a signed balance into `(debit, credit)` trial-balance columns.
pub fn split_columns(balance: i128) -> (i128, i128) {
    if balance >= 0 { (balance, 0) } else { (0, -balance) }
}

/// Display form: `"1,234.50 Dr"`, `"1,234.50 Cr"` or `"0.00"`.
pub fn format_balance(balance: i128) -> String {
    match balance.cmp(&0) {
        core::cmp::Ordering::Equal => format_amount(0),
        core::cmp::Ordering::Greater => format!("{} Dr", format_amount(balance)),
        core::cmp::Ordering::Less => format!("{} Cr", format_amount(-balance)),
    }
}

/// Next-year opening balances from this year's closing balances.
///
/// Balance-sheet ledgers carry forward unchanged. Revenue and expense ledgers
/// are netted into `surplus_ledger`, which also keeps its own closing balance.
/// Ledgers ending at zero get no opening.
pub fn rollover_openings(
    closing: &[(LedgerId, AccountKind, i128)],
    surplus_ledger: LedgerId,
) -> Result<Vec<(LedgerId, OpeningBalance)>, templeerp_core::DomainError> {
    let mut carried: BTreeMap<LedgerId, i128> = BTreeMap::new();

    for (ledger_id, kind, balance) in closing {
        let target = if kind.is_balance_sheet() {
            *ledger_id
        } else {
            surplus_ledger
        };
        *carried.entry(target).or_default() += balance;
    }

    carried
        .into_iter()
        .filter(|(_, balance)| *balance != 0)
        .map(|(ledger_id, balance)| Ok((ledger_id, OpeningBalance::from_signed(balance)?)))
        .collect()
}

/// Parent/child index over the chart of accounts.
#[derive(Debug, Clone, Default)]
pub struct LedgerTree {
    children: HashMap<LedgerId, Vec<LedgerId>>,
}

impl LedgerTree {
    pub fn new(edges: impl IntoIterator<Item = (LedgerId, Option<LedgerId>)>) -> Self {
        let mut children: HashMap<LedgerId, Vec<LedgerId>> = HashMap::new();
        for (ledger_id, parent) in edges {
            if let Some(parent) = parent {
                children.entry(parent).or_default().push(ledger_id);
            }
        }
        for list in children.values_mut() {
            list.sort();
        }
        Self { children }
    }

    /// `root` and every ledger below it. Cycles are cut at the first revisit.
    pub fn subtree(&self, root: LedgerId) -> Vec<LedgerId> {
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        let mut out = Vec::new();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if let Some(kids) = self.children.get(&id) {
                stack.extend(kids.iter().rev().copied());
            }
        }

        out
    }

    /// Sum of `leaf_balance` over the subtree rooted at `root`.
    pub fn rollup(&self, root: LedgerId, leaf_balance: impl Fn(LedgerId) -> i128) -> i128 {
        self.subtree(root).into_iter().map(leaf_balance).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn posting(d: NaiveDate, debit: i64, credit: i64) -> Posting {
        Posting { date: d, debit, credit }
    }

    #[test]
    fn balance_respects_year_start_and_as_of_date() {
        let from = date(2025, 4, 1);
        let postings = vec![
            posting(date(2025, 3, 31), 9_999, 0), // previous year
            posting(date(2025, 4, 1), 1_000, 0),
            posting(date(2025, 6, 15), 0, 300),
            posting(date(2025, 7, 1), 500, 0),
        ];

        assert_eq!(balance_as_of(200, &postings, from, date(2025, 6, 30)), 900);
        assert_eq!(balance_as_of(200, &postings, from, date(2025, 7, 1)), 1_400);
        assert_eq!(balance_as_of(200, &postings, from, date(2025, 3, 31)), 200);
    }

    #[test]
    fn display_uses_dr_cr_suffix() {
        assert_eq!(format_balance(123_450), "1,234.50 Dr");
        assert_eq!(format_balance(-123_450), "1,234.50 Cr");
        assert_eq!(format_balance(0), "0.00");
    }

    #[test]
    fn normal_sides() {
        assert_eq!(normal_side(AccountKind::Asset), Side::Debit);
        assert_eq!(normal_side(AccountKind::Expense), Side::Debit);
        assert_eq!(normal_side(AccountKind::Revenue), Side::Credit);
        assert_eq!(normal_side(AccountKind::Liability), Side::Credit);
    }

    #[test]
    fn rollover_carries_balance_sheet_and_nets_income_into_surplus() {
        let cash = LedgerId::generate();
        let corpus = LedgerId::generate();
        let donations = LedgerId::generate();
        let electricity = LedgerId::generate();
        let surplus = LedgerId::generate();
        let empty = LedgerId::generate();

        let closing = vec![
            (cash, AccountKind::Asset, 71_000),
            (corpus, AccountKind::Equity, -20_000),
            (donations, AccountKind::Revenue, -80_000),
            (electricity, AccountKind::Expense, 30_000),
            (surplus, AccountKind::Equity, -1_000),
            (empty, AccountKind::Asset, 0),
        ];

        let openings: BTreeMap<_, _> = rollover_openings(&closing, surplus)
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(openings[&cash], OpeningBalance { debit: 71_000, credit: 0 });
        assert_eq!(openings[&corpus].net(), -20_000);
        assert_eq!(openings[&surplus].net(), -51_000);
        assert!(!openings.contains_key(&donations));
        assert!(!openings.contains_key(&electricity));
        assert!(!openings.contains_key(&empty));

        // Balanced closing balances stay balanced after rollover.
        let total: i128 = openings.values().map(OpeningBalance::net).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn group_rollup_sums_descendants() {
        let assets = LedgerId::generate();
        let cash_group = LedgerId::generate();
        let hundi = LedgerId::generate();
        let counter = LedgerId::generate();
        let bank = LedgerId::generate();

        let tree = LedgerTree::new(vec![
            (assets, None),
            (cash_group, Some(assets)),
            (hundi, Some(cash_group)),
            (counter, Some(cash_group)),
            (bank, Some(assets)),
        ]);

        let balances: HashMap<LedgerId, i128> =
            [(hundi, 500), (counter, 250), (bank, 1_000)].into_iter().collect();
        let leaf = |id: LedgerId| balances.get(&id).copied().unwrap_or(0);

        assert_eq!(tree.rollup(cash_group, leaf), 750);
        assert_eq!(tree.rollup(assets, leaf), 1_750);
        assert_eq!(tree.rollup(bank, leaf), 1_000);
    }

    #[test]
    fn cyclic_parent_links_terminate() {
        let a = LedgerId::generate();
        let b = LedgerId::generate();
        let tree = LedgerTree::new(vec![(a, Some(b)), (b, Some(a))]);

        let mut subtree = tree.subtree(a);
        subtree.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(subtree, expected);
    }

    proptest! {
        /// Balance after N postings equals opening + Σ(debit − credit).
        #[test]
        fn balance_is_opening_plus_net_postings(
            opening in -1_000_000i64..1_000_000i64,
            moves in prop::collection::vec((0i64..100_000, 0i64..100_000, 0u32..365), 0..40),
        ) {
            let from = date(2025, 4, 1);
            let postings: Vec<Posting> = moves
                .iter()
                .map(|(d, c, offset)| posting(from + chrono::Days::new(*offset as u64), *d, *c))
                .collect();
            let expected: i128 = opening as i128
                + moves.iter().map(|(d, c, _)| *d as i128 - *c as i128).sum::<i128>();

            prop_assert_eq!(
                balance_as_of(opening as i128, &postings, from, date(2026, 3, 31)),
                expected
            );
        }
    }
}
