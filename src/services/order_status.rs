use crate::entities::OrderStatus;

/// Outcome of asking to move an order from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current status; nothing to write.
    Unchanged,
    Allowed,
    /// Leaving a terminal status.
    Rejected,
}

/// The order state machine.
///
/// `Ordering` may move to `Paid` or `Cancelled`. Both of those are terminal.
/// Requesting the current status is always accepted as a no-op. Whether a
/// move to `Paid` additionally needs a payment row is checked by the caller.
pub fn transition(from: OrderStatus, to: OrderStatus) -> Transition {
    use OrderStatus::*;

    match (from, to) {
        (a, b) if a == b => Transition::Unchanged,
        (Ordering, Paid) | (Ordering, Cancelled) => Transition::Allowed,
        (Paid, _) | (Cancelled, _) => Transition::Rejected,
        (Ordering, Ordering) => Transition::Unchanged,
    }
}

/// Items may only be added, changed or removed while the tab is open.
pub fn is_mutable(status: OrderStatus) -> bool {
    status == OrderStatus::Ordering
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use OrderStatus::*;

    #[rstest]
    #[case(Ordering, Ordering, Transition::Unchanged)]
    #[case(Ordering, Paid, Transition::Allowed)]
    #[case(Ordering, Cancelled, Transition::Allowed)]
    #[case(Paid, Paid, Transition::Unchanged)]
    #[case(Paid, Ordering, Transition::Rejected)]
    #[case(Paid, Cancelled, Transition::Rejected)]
    #[case(Cancelled, Cancelled, Transition::Unchanged)]
    #[case(Cancelled, Ordering, Transition::Rejected)]
    #[case(Cancelled, Paid, Transition::Rejected)]
    fn transition_table(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
        #[case] expected: Transition,
    ) {
        assert_eq!(transition(from, to), expected);
    }

    #[rstest]
    #[case(Paid)]
    #[case(Cancelled)]
    fn terminal_statuses_are_frozen(#[case] status: OrderStatus) {
        assert!(status.is_terminal());
        assert!(!is_mutable(status));
    }

    #[test]
    fn open_order_is_mutable() {
        assert!(is_mutable(Ordering));
        assert!(!Ordering.is_terminal());
    }
}
