use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// ```text
/// Pending ──► Submitted ──► PartiallyFilled ──► Filled
///    │            │                │
///    └► Rejected  ├► Filled        ├► Canceled
///                 ├► Canceled      └► Expired
///                 ├► Rejected
///                 └► Expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order has been created and validated but not sent to the broker
    Pending,
    /// Broker accepted the order
    Submitted,
    /// Order has been partially filled
    PartiallyFilled,
    /// Order has been completely filled
    Filled,
    /// Order has been canceled by the user
    Canceled,
    /// Order was rejected by validation at the broker
    Rejected,
    /// Order has expired (DAY/IOC)
    Expired,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Returns true if the order is still live at the broker
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Submitted | OrderStatus::PartiallyFilled)
    }

    /// Returns true if `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Pending => matches!(next, Submitted | Rejected),
            Submitted => matches!(next, PartiallyFilled | Filled | Canceled | Rejected | Expired),
            PartiallyFilled => matches!(next, PartiallyFilled | Filled | Canceled | Expired),
            Filled | Canceled | Rejected | Expired => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_successors() {
        let all = [
            OrderStatus::Pending,
            OrderStatus::Submitted,
            OrderStatus::PartiallyFilled,
            OrderStatus::Filled,
            OrderStatus::Canceled,
            OrderStatus::Rejected,
            OrderStatus::Expired,
        ];
        for status in all.iter().filter(|s| s.is_terminal()) {
            for next in all {
                assert!(!status.can_transition_to(next), "{status:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn test_pending_cannot_skip_to_filled() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Filled));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Canceled));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Submitted));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::Submitted));
        assert!(!OrderStatus::Submitted.can_transition_to(OrderStatus::Pending));
    }
}
