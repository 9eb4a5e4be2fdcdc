//! Positional ordering of a user's cached address list.
//!
//! The cached list encodes default roles by position: index 0 holds the
//! default billing address, index 1 the default shipping address, and the
//! remaining addresses follow in no particular order. When a single address
//! holds both roles it appears at index 0 and again at index 1 and the list
//! is said to be *collapsed*.
//!
//! [`order`] takes the distinct address set (see [`normalize`]) and moves the
//! role holders into place. It never drops an address; only the collapse
//! cases grow the list, by exactly one entry.

use std::collections::HashSet;

use crate::types::{Address, DefaultFlags, DefaultRole};

/// Whether the default-role flags could be placed unambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Every role holder sits in its slot.
    Resolved,
    /// The flags violate the one-default-per-role invariant and the list
    /// was left as far as it could be sorted. Callers should log this.
    Unresolved,
}

/// Result of [`order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedAddresses {
    pub addresses: Vec<Address>,
    /// One address fills both role slots.
    pub collapsed: bool,
    pub outcome: OrderOutcome,
}

impl OrderedAddresses {
    const fn resolved(addresses: Vec<Address>, collapsed: bool) -> Self {
        Self {
            addresses,
            collapsed,
            outcome: OrderOutcome::Resolved,
        }
    }

    const fn unresolved(addresses: Vec<Address>, collapsed: bool) -> Self {
        Self {
            addresses,
            collapsed,
            outcome: OrderOutcome::Unresolved,
        }
    }
}

/// Drop repeated entries (by id), keeping the first occurrence.
///
/// Turns a collapsed list back into the distinct address set so that it can
/// be patched and passed through [`order`] again.
#[must_use]
pub fn normalize(addresses: Vec<Address>) -> Vec<Address> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .into_iter()
        .filter(|address| seen.insert(address.id))
        .collect()
}

/// Arrange `addresses` so that position encodes the default roles.
#[must_use]
pub fn order(mut addresses: Vec<Address>) -> OrderedAddresses {
    let (first, second) = match addresses.as_slice() {
        [] => return OrderedAddresses::resolved(addresses, false),
        [only] => {
            let duplicate = only.clone();
            addresses.push(duplicate);
            return OrderedAddresses::resolved(addresses, true);
        }
        [first, second, ..] if first.id == second.id => {
            // Already collapsed by a previous pass.
            return OrderedAddresses::resolved(addresses, true);
        }
        [first, second, ..] => (first.flags(), second.flags()),
    };

    match (
        first.billing,
        first.shipping,
        second.billing,
        second.shipping,
    ) {
        (true, true, true, true) => OrderedAddresses::unresolved(addresses, true),
        (true, true, false, false) => {
            collapse_front(&mut addresses);
            OrderedAddresses::resolved(addresses, true)
        }
        // A second holder of a role already held in slot 0.
        (true, true, _, _) => {
            collapse_front(&mut addresses);
            OrderedAddresses::unresolved(addresses, true)
        }
        (false, false, true, true) => {
            addresses.swap(0, 1);
            collapse_front(&mut addresses);
            OrderedAddresses::resolved(addresses, true)
        }
        (_, _, true, true) => {
            addresses.swap(0, 1);
            collapse_front(&mut addresses);
            OrderedAddresses::unresolved(addresses, true)
        }
        (true, false, true, false) => {
            if pull_into_slot(&mut addresses, 1, DefaultRole::Shipping) {
                OrderedAddresses::resolved(addresses, false)
            } else {
                OrderedAddresses::unresolved(addresses, false)
            }
        }
        (false, true, false, true) => {
            if pull_into_slot(&mut addresses, 0, DefaultRole::Billing) {
                OrderedAddresses::resolved(addresses, false)
            } else {
                OrderedAddresses::unresolved(addresses, false)
            }
        }
        (true, false, false, false) => {
            pull_into_slot(&mut addresses, 1, DefaultRole::Shipping);
            OrderedAddresses::resolved(addresses, false)
        }
        (false, false, false, true) => {
            pull_into_slot(&mut addresses, 0, DefaultRole::Billing);
            OrderedAddresses::resolved(addresses, false)
        }
        (false, false, true, false) => {
            addresses.swap(0, 1);
            pull_into_slot(&mut addresses, 1, DefaultRole::Shipping);
            OrderedAddresses::resolved(addresses, false)
        }
        (false, true, true, false) => {
            addresses.swap(0, 1);
            OrderedAddresses::resolved(addresses, false)
        }
        (false, true, false, false) => {
            addresses.swap(0, 1);
            pull_into_slot(&mut addresses, 0, DefaultRole::Billing);
            OrderedAddresses::resolved(addresses, false)
        }
        (false, false, false, false) => order_from_tail(addresses),
        // Billing in slot 0, shipping in slot 1: already in place.
        (true, false, false, true) => OrderedAddresses::resolved(addresses, false),
    }
}

/// Slot 0 holds both roles: send the slot 1 entry to the end and duplicate
/// slot 0 into slot 1.
fn collapse_front(addresses: &mut Vec<Address>) {
    let displaced = addresses.remove(1);
    addresses.push(displaced);
    if let Some(front) = addresses.first().cloned() {
        addresses.insert(1, front);
    }
}

/// Swap the first holder of `role` found at index >= 2 into `slot`.
fn pull_into_slot(addresses: &mut [Address], slot: usize, role: DefaultRole) -> bool {
    match find_in_tail(addresses, |flags| flags.holds(role)) {
        Some(index) => {
            addresses.swap(slot, index);
            true
        }
        None => false,
    }
}

fn find_in_tail(addresses: &[Address], predicate: impl Fn(DefaultFlags) -> bool) -> Option<usize> {
    addresses
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, address)| predicate(address.flags()))
        .map(|(index, _)| index)
}

/// Neither of the first two entries holds a role: look for both holders in
/// the tail.
fn order_from_tail(mut addresses: Vec<Address>) -> OrderedAddresses {
    let billing = find_in_tail(&addresses, |flags| flags.billing);
    let shipping = find_in_tail(&addresses, |flags| flags.shipping);

    match (billing, shipping) {
        (Some(b), Some(s)) if b == s => {
            let holder = addresses.remove(b);
            addresses.insert(0, holder.clone());
            addresses.insert(0, holder);
            OrderedAddresses::resolved(addresses, true)
        }
        (billing, shipping) => {
            if let Some(b) = billing {
                addresses.swap(0, b);
            }
            if let Some(s) = shipping {
                addresses.swap(1, s);
            }
            OrderedAddresses::resolved(addresses, false)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::types::{AddressId, AddressKind, CountryId, RegionId, UserId, ValidationFlag};

    fn address(id: i32, billing: bool, shipping: bool) -> Address {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Address {
            id: AddressId::new(id),
            user_id: UserId::new(7),
            first_name: format!("Name{id}"),
            last_name: String::new(),
            address1: "12 Main Street".to_owned(),
            address2: String::new(),
            city: "Pune".to_owned(),
            region_id: RegionId::new(1),
            region_name: "Maharashtra".to_owned(),
            postcode: "411001".to_owned(),
            country_id: CountryId::new(1),
            phone: String::new(),
            alternate_phone: String::new(),
            is_default_billing: billing,
            is_default_shipping: shipping,
            address_type: AddressKind::Home,
            sms_opt: false,
            validation_flag: ValidationFlag::Clean,
            created_at: at,
            updated_at: at,
        }
    }

    fn ids(ordered: &OrderedAddresses) -> Vec<i32> {
        ordered.addresses.iter().map(|a| a.id.as_i32()).collect()
    }

    #[test]
    fn test_empty_list() {
        let ordered = order(Vec::new());
        assert!(ordered.addresses.is_empty());
        assert!(!ordered.collapsed);
    }

    #[test]
    fn test_single_address_is_duplicated() {
        let ordered = order(vec![address(1, true, true)]);
        assert_eq!(ids(&ordered), vec![1, 1]);
        assert!(ordered.collapsed);
    }

    #[test]
    fn test_both_roles_in_front_collapses() {
        let ordered = order(vec![
            address(1, true, true),
            address(2, false, false),
            address(3, false, false),
        ]);
        assert_eq!(ids(&ordered), vec![1, 1, 3, 2]);
        assert!(ordered.collapsed);
        assert_eq!(ordered.outcome, OrderOutcome::Resolved);
    }

    #[test]
    fn test_both_roles_in_second_slot_collapses() {
        let ordered = order(vec![address(1, false, false), address(2, true, true)]);
        assert_eq!(ids(&ordered), vec![2, 2, 1]);
        assert!(ordered.collapsed);
    }

    #[test]
    fn test_reversed_roles_swap() {
        let ordered = order(vec![address(1, false, true), address(2, true, false)]);
        assert_eq!(ids(&ordered), vec![2, 1]);
        assert!(!ordered.collapsed);
    }

    #[test]
    fn test_billing_first_pulls_shipping_from_tail() {
        let ordered = order(vec![
            address(1, true, false),
            address(2, false, false),
            address(3, false, true),
        ]);
        assert_eq!(ids(&ordered), vec![1, 3, 2]);
    }

    #[test]
    fn test_shipping_second_pulls_billing_from_tail() {
        let ordered = order(vec![
            address(1, false, false),
            address(2, false, true),
            address(3, true, false),
        ]);
        assert_eq!(ids(&ordered), vec![3, 2, 1]);
    }

    #[test]
    fn test_tail_holders_are_brought_forward() {
        // C has no role, B ships, A bills.
        let ordered = order(vec![
            address(3, false, false),
            address(2, false, true),
            address(1, true, false),
        ]);
        assert_eq!(ids(&ordered), vec![1, 2, 3]);
        assert_eq!(ordered.outcome, OrderOutcome::Resolved);
    }

    #[test]
    fn test_billing_in_second_slot_then_shipping_from_tail() {
        let ordered = order(vec![
            address(1, false, false),
            address(2, true, false),
            address(3, false, false),
            address(4, false, true),
        ]);
        assert_eq!(ids(&ordered), vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_no_roles_in_front_finds_both_in_tail() {
        let ordered = order(vec![
            address(1, false, false),
            address(2, false, false),
            address(3, false, true),
            address(4, true, false),
        ]);
        assert_eq!(ids(&ordered), vec![4, 3, 2, 1]);
        assert!(!ordered.collapsed);
    }

    #[test]
    fn test_single_tail_holder_of_both_roles_collapses() {
        let ordered = order(vec![
            address(1, false, false),
            address(2, false, false),
            address(3, true, true),
        ]);
        assert_eq!(ids(&ordered), vec![3, 3, 1, 2]);
        assert!(ordered.collapsed);
    }

    #[test]
    fn test_two_billing_holders_without_shipping_is_unresolved() {
        let input = vec![
            address(1, true, false),
            address(2, true, false),
            address(3, false, false),
        ];
        let ordered = order(input.clone());
        assert_eq!(ordered.addresses, input);
        assert_eq!(ordered.outcome, OrderOutcome::Unresolved);
    }

    #[test]
    fn test_two_billing_holders_with_shipping_in_tail() {
        let ordered = order(vec![
            address(1, true, false),
            address(2, true, false),
            address(3, false, true),
        ]);
        assert_eq!(ids(&ordered), vec![1, 3, 2]);
        assert_eq!(ordered.outcome, OrderOutcome::Resolved);
    }

    #[test]
    fn test_two_shipping_holders_without_billing_is_unresolved() {
        let ordered = order(vec![address(1, false, true), address(2, false, true)]);
        assert_eq!(ids(&ordered), vec![1, 2]);
        assert_eq!(ordered.outcome, OrderOutcome::Unresolved);
    }

    #[test]
    fn test_degenerate_double_holders_left_in_place() {
        let ordered = order(vec![address(1, true, true), address(2, true, true)]);
        assert_eq!(ids(&ordered), vec![1, 2]);
        assert!(ordered.collapsed);
        assert_eq!(ordered.outcome, OrderOutcome::Unresolved);
    }

    #[test]
    fn test_collapsed_front_with_extra_billing_holder() {
        let ordered = order(vec![address(1, true, true), address(2, true, false)]);
        assert_eq!(ids(&ordered), vec![1, 1, 2]);
        assert_eq!(ordered.outcome, OrderOutcome::Unresolved);
    }

    #[test]
    fn test_billing_then_shipping_is_untouched() {
        let ordered = order(vec![
            address(1, true, false),
            address(2, false, true),
            address(3, false, false),
        ]);
        assert_eq!(ids(&ordered), vec![1, 2, 3]);
        assert_eq!(ordered.outcome, OrderOutcome::Resolved);
    }

    #[test]
    fn test_order_is_idempotent_on_its_output() {
        let once = order(vec![
            address(2, false, false),
            address(1, true, true),
            address(3, false, false),
        ]);
        let twice = order(once.addresses.clone());
        assert_eq!(once, twice);

        let renormalized = order(normalize(once.addresses.clone()));
        assert_eq!(ids(&renormalized)[..2], [1, 1]);
        assert_eq!(renormalized.addresses.len(), once.addresses.len());
    }

    #[test]
    fn test_normalize_drops_collapsed_duplicate() {
        let list = vec![
            address(1, true, true),
            address(1, true, true),
            address(2, false, false),
        ];
        let distinct = normalize(list);
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].id, AddressId::new(1));
        assert_eq!(distinct[1].id, AddressId::new(2));
    }

    #[test]
    fn test_length_grows_by_at_most_one() {
        let flags = [false, true];
        for &b0 in &flags {
            for &s0 in &flags {
                for &b1 in &flags {
                    for &s1 in &flags {
                        let input = vec![
                            address(1, b0, s0),
                            address(2, b1, s1),
                            address(3, false, false),
                        ];
                        let ordered = order(input);
                        let len = ordered.addresses.len();
                        assert!(len == 3 || (len == 4 && ordered.collapsed));
                        let distinct = normalize(ordered.addresses);
                        assert_eq!(distinct.len(), 3);
                    }
                }
            }
        }
    }
}
