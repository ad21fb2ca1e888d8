//! Order status vocabulary and transition tables.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order or seller order.
///
/// Orders and seller orders share this vocabulary but are checked against
/// separate tables, so one seller's portion can move without forcing the
/// whole order along with it.
///
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered ──► Completed
///    │            │             │                          │             │
///    └────────────┴─────────────┴──► Cancelled             └──► Refunded ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation.
    #[default]
    Pending,

    /// Payment or seller acknowledged the order.
    Confirmed,

    /// Order is being prepared.
    Processing,

    /// Handed over to the carrier.
    Shipped,

    /// Received by the buyer.
    Delivered,

    /// Order closed out after delivery.
    Completed,

    /// Order was cancelled (terminal state).
    Cancelled,

    /// Order was refunded (terminal state).
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Returns true if no transition leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    /// Parses a wire name. Matching is exact and case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// Which transition table a status change is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusScope {
    /// The buyer-facing order aggregate.
    Order,
    /// A single seller's portion of an order.
    SellerOrder,
}

impl StatusScope {
    /// Returns the scope name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusScope::Order => "order",
            StatusScope::SellerOrder => "seller_order",
        }
    }

    /// Returns true if `from -> to` is an edge in this scope's table.
    pub fn can_transition(&self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            StatusScope::Order => can_transition_order(from, to),
            StatusScope::SellerOrder => can_transition_seller_order(from, to),
        }
    }
}

impl std::fmt::Display for StatusScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns true if an order may move from `from` to `to`.
pub fn can_transition_order(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    match from {
        Pending => matches!(to, Confirmed | Cancelled),
        Confirmed => matches!(to, Processing | Cancelled),
        Processing => matches!(to, Shipped | Cancelled),
        Shipped => matches!(to, Delivered),
        Delivered => matches!(to, Completed | Refunded),
        Completed => matches!(to, Refunded),
        Cancelled | Refunded => false,
    }
}

/// Returns true if a seller order may move from `from` to `to`.
pub fn can_transition_seller_order(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    match from {
        Pending => matches!(to, Confirmed | Cancelled),
        Confirmed => matches!(to, Processing | Cancelled),
        Processing => matches!(to, Shipped | Cancelled),
        Shipped => matches!(to, Delivered),
        Delivered => matches!(to, Completed | Refunded),
        Completed => matches!(to, Refunded),
        Cancelled | Refunded => false,
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    const ORDER_EDGES: [(OrderStatus, OrderStatus); 10] = [
        (Pending, Confirmed),
        (Pending, Cancelled),
        (Confirmed, Processing),
        (Confirmed, Cancelled),
        (Processing, Shipped),
        (Processing, Cancelled),
        (Shipped, Delivered),
        (Delivered, Completed),
        (Delivered, Refunded),
        (Completed, Refunded),
    ];

    #[test]
    fn test_listed_edges_are_allowed_in_both_scopes() {
        for (from, to) in ORDER_EDGES {
            assert!(can_transition_order(from, to), "{from} -> {to}");
            assert!(can_transition_seller_order(from, to), "{from} -> {to}");
        }
    }

    #[test]
    fn test_every_unlisted_pair_is_rejected() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let listed = ORDER_EDGES.contains(&(from, to));
                assert_eq!(can_transition_order(from, to), listed, "{from} -> {to}");
                assert_eq!(
                    can_transition_seller_order(from, to),
                    listed,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_no_self_loops() {
        for status in OrderStatus::ALL {
            assert!(!StatusScope::Order.can_transition(status, status));
            assert!(!StatusScope::SellerOrder.can_transition(status, status));
        }
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for to in OrderStatus::ALL {
            assert!(!can_transition_order(Cancelled, to));
            assert!(!can_transition_order(Refunded, to));
        }
        assert!(Cancelled.is_terminal());
        assert!(Refunded.is_terminal());
        assert!(!Completed.is_terminal());
    }

    #[test]
    fn test_shipped_can_only_be_delivered() {
        let targets: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|to| can_transition_order(Shipped, *to))
            .collect();
        assert_eq!(targets, vec![Delivered]);
    }

    #[test]
    fn test_parse_is_exact_and_case_sensitive() {
        assert_eq!("confirmed".parse::<OrderStatus>().unwrap(), Confirmed);
        assert!(matches!(
            "Confirmed".parse::<OrderStatus>(),
            Err(OrderError::UnknownStatus(s)) if s == "Confirmed"
        ));
        assert!("".parse::<OrderStatus>().is_err());
        assert!("on_hold".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_display_matches_wire_name() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
