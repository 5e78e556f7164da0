/// A single typed event describing how one item's recorded state changed
/// during a batch. Emitted in-memory by the state machine; never persisted
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// First sighting as available.
    NewListing { source_id: String, price: i64 },
    /// First sighting, already sold (listed-and-sold between crawls).
    NewSold { source_id: String, price: i64 },
    /// available -> sold.
    Sold { source_id: String, price: i64 },
    /// available -> available with a different price.
    PriceChange {
        source_id: String,
        old_price: i64,
        new_price: i64,
    },
    /// sold -> available (rare).
    Relisted { source_id: String, price: i64 },
}

impl Transition {
    pub fn source_id(&self) -> &str {
        match self {
            Transition::NewListing { source_id, .. }
            | Transition::NewSold { source_id, .. }
            | Transition::Sold { source_id, .. }
            | Transition::PriceChange { source_id, .. }
            | Transition::Relisted { source_id, .. } => source_id,
        }
    }

    /// `new_listing` increments inflow.
    pub fn is_inflow(&self) -> bool {
        matches!(self, Transition::NewListing { .. })
    }

    /// `sold` and `new_sold` both increment outflow.
    pub fn is_outflow(&self) -> bool {
        matches!(self, Transition::Sold { .. } | Transition::NewSold { .. })
    }

    pub fn sold_price(&self) -> Option<i64> {
        match self {
            Transition::Sold { price, .. } | Transition::NewSold { price, .. } => Some(*price),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflow_outflow_classification_follows_the_summary_reducer() {
        let nl = Transition::NewListing {
            source_id: "a".into(),
            price: 100,
        };
        let ns = Transition::NewSold {
            source_id: "b".into(),
            price: 200,
        };
        let sold = Transition::Sold {
            source_id: "c".into(),
            price: 300,
        };
        let pc = Transition::PriceChange {
            source_id: "d".into(),
            old_price: 100,
            new_price: 90,
        };
        let rl = Transition::Relisted {
            source_id: "e".into(),
            price: 50,
        };

        assert!(nl.is_inflow() && !nl.is_outflow());
        assert!(ns.is_outflow() && !ns.is_inflow());
        assert!(sold.is_outflow() && !sold.is_inflow());
        assert!(!pc.is_inflow() && !pc.is_outflow());
        assert!(!rl.is_inflow() && !rl.is_outflow());
    }

    #[test]
    fn sold_price_only_present_on_outflow_transitions() {
        let sold = Transition::Sold {
            source_id: "c".into(),
            price: 300,
        };
        assert_eq!(sold.sold_price(), Some(300));

        let pc = Transition::PriceChange {
            source_id: "d".into(),
            old_price: 100,
            new_price: 90,
        };
        assert_eq!(pc.sold_price(), None);
    }
}
