//! Property-based tests for totals, the status machine and access rules
//!
//! These use proptest to check the invariants that must hold for every
//! input, not only the worked examples in `scenarios.rs`.

use garage_invoicing::{
    access::{AccessMode, Actor, Ownership, can_access},
    calculator::{LineInput, compute_totals, line_amounts},
    config::{GroupAccess, StockPolicy},
    invoice::{InvoiceDraft, ItemInput},
    lifecycle::InvoiceStatus,
    types::Money,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

// PROPERTY TEST STRATEGIES

/// Quantities from 0.01 to 999.99
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=99_999).prop_map(|cents| Decimal::new(cents, 2))
}

/// Unit prices from 0.00 to 9999.99
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=999_999).prop_map(|cents| Decimal::new(cents, 2))
}

/// VAT rates in use plus arbitrary tenths in [0, 100]
fn vat_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(Decimal::new(20, 0)),
        Just(Decimal::new(10, 0)),
        Just(Decimal::new(55, 1)),
        Just(Decimal::ZERO),
        (0i64..=1000).prop_map(|tenths| Decimal::new(tenths, 1)),
    ]
}

fn line_strategy() -> impl Strategy<Value = LineInput> {
    (quantity_strategy(), price_strategy(), vat_strategy())
        .prop_map(|(q, p, v)| LineInput::new(q, p, v))
}

fn status_strategy() -> impl Strategy<Value = InvoiceStatus> {
    prop::sample::select(InvoiceStatus::ALL.to_vec())
}

fn is_allowed(from: InvoiceStatus, to: InvoiceStatus) -> bool {
    use InvoiceStatus::*;
    matches!(
        (from, to),
        (Draft, Issued) | (Draft, Canceled) | (Draft, Draft) | (Issued, Paid) | (Issued, Canceled) | (Issued, Draft)
    )
}

// PROPERTY TESTS
proptest! {
    /// Property: TTC is exactly HT plus VAT, and both are exact line sums
    #[test]
    fn prop_totals_are_exact_sums(lines in prop::collection::vec(line_strategy(), 1..20)) {
        let totals = compute_totals(&lines).unwrap();

        let ht: Money = lines.iter().map(|l| line_amounts(l).unwrap().total_ht).sum();
        let vat: Decimal = lines
            .iter()
            .map(|l| l.quantity * l.unit_price_ht * l.vat_rate / Decimal::ONE_HUNDRED)
            .sum();

        prop_assert_eq!(totals.subtotal_ht, ht);
        prop_assert_eq!(totals.vat_total.amount(), vat);
        prop_assert_eq!(totals.total_ttc, totals.subtotal_ht + totals.vat_total);
    }

    /// Property: recomputing from the same lines gives identical totals,
    /// whatever order the lines are summed in
    #[test]
    fn prop_recomputation_is_stable(lines in prop::collection::vec(line_strategy(), 1..20)) {
        let first = compute_totals(&lines).unwrap();
        let second = compute_totals(&lines).unwrap();

        let mut reversed = lines.clone();
        reversed.reverse();

        prop_assert_eq!(first, second);
        prop_assert_eq!(first, compute_totals(&reversed).unwrap());
    }

    /// Property: a validated draft numbers its lines 0..n in submission order
    #[test]
    fn prop_positions_are_sequential(lines in prop::collection::vec(line_strategy(), 1..12)) {
        let draft = lines.iter().fold(InvoiceDraft::new().set_customer("cust_1"), |draft, line| {
            draft.add_item(ItemInput::labor("Ligne", line.quantity, line.unit_price_ht, line.vat_rate))
        });

        let prepared = draft.validate_and_finalise().unwrap();

        for (index, item) in prepared.items.iter().enumerate() {
            prop_assert_eq!(item.position as usize, index);
        }
        prop_assert_eq!(prepared.totals, compute_totals(&lines).unwrap());
    }

    /// Property: exactly the pairs of the transition table are accepted
    #[test]
    fn prop_transition_table(from in status_strategy(), to in status_strategy()) {
        let result = from.transition_to(to, StockPolicy::Keep);

        prop_assert_eq!(result.is_ok(), is_allowed(from, to), "{} -> {}", from, to);
    }

    /// Property: a non-admin outside the owner's group is always denied
    #[test]
    fn prop_strangers_are_denied(
        owner_group in prop::option::of("grp_[a-c]"),
        actor_group in prop::option::of("grp_[d-f]"),
        write in any::<bool>(),
        read_only in any::<bool>(),
    ) {
        let owner = Ownership { created_by_id: "user_owner", group_id: owner_group.as_deref() };
        let stranger = Actor::user("user_stranger", actor_group);
        let mode = if write { AccessMode::Write } else { AccessMode::Read };
        let groups = if read_only { GroupAccess::ReadOnly } else { GroupAccess::ReadWrite };

        prop_assert!(!can_access(&stranger, &owner, mode, groups));
        prop_assert!(can_access(&Actor::admin("root"), &owner, mode, groups));
    }
}
