use domain::item::{ItemState, ItemStatus};
use domain::message::{ResultItem, ResultItemStatus};
use domain::transition::Transition;

use crate::repository::ItemStateRepository;

const READ_SUBBATCH: usize = 500;

/// TTL, in seconds, applied to an item-state entry based on its new status.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub available_s: u64,
    pub sold_s: u64,
}

impl TtlPolicy {
    pub fn ttl_for(&self, status: ItemStatus) -> u64 {
        match status {
            ItemStatus::Available => self.available_s,
            ItemStatus::Sold => self.sold_s,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub transitions: Vec<Transition>,
    pub inflow: i64,
    pub outflow: i64,
}

fn incoming_status(status: ResultItemStatus) -> ItemStatus {
    match status {
        ResultItemStatus::OnSale => ItemStatus::Available,
        ResultItemStatus::Sold => ItemStatus::Sold,
    }
}

/// Pure per-item transition rule. `prior` is `None` for a never-seen
/// `(ipID, sourceID)` pair.
fn determine_transition(prior: Option<&ItemState>, incoming: &ResultItem) -> Option<Transition> {
    let new_status = incoming_status(incoming.status);
    match prior {
        None => match new_status {
            ItemStatus::Available => Some(Transition::NewListing {
                source_id: incoming.source_id.clone(),
                price: incoming.price,
            }),
            ItemStatus::Sold => Some(Transition::NewSold {
                source_id: incoming.source_id.clone(),
                price: incoming.price,
            }),
        },
        Some(prior) => match (prior.status, new_status) {
            (ItemStatus::Available, ItemStatus::Sold) => Some(Transition::Sold {
                source_id: incoming.source_id.clone(),
                price: incoming.price,
            }),
            (ItemStatus::Sold, ItemStatus::Available) => Some(Transition::Relisted {
                source_id: incoming.source_id.clone(),
                price: incoming.price,
            }),
            (ItemStatus::Available, ItemStatus::Available) if prior.price != incoming.price => {
                Some(Transition::PriceChange {
                    source_id: incoming.source_id.clone(),
                    old_price: prior.price,
                    new_price: incoming.price,
                })
            }
            _ => None,
        },
    }
}

/// Runs one IP's crawl result through the per-item state machine: reads
/// prior state in pipelined sub-batches of at most [`READ_SUBBATCH`],
/// computes a transition per item, then writes the updated states (first_seen
/// preserved, last_seen refreshed, TTL set by the new status) in a second
/// pipelined sub-batch. Items with an empty `source_id` are skipped.
pub async fn process_items_batch(
    repo: &dyn ItemStateRepository,
    ip_id: u64,
    items: &[ResultItem],
    now_s: u64,
    ttl: TtlPolicy,
) -> anyhow::Result<BatchOutcome> {
    let items: Vec<&ResultItem> = items.iter().filter(|i| !i.source_id.is_empty()).collect();
    if items.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let mut outcome = BatchOutcome::default();

    for chunk in items.chunks(READ_SUBBATCH) {
        let source_ids: Vec<String> = chunk.iter().map(|i| i.source_id.clone()).collect();
        let prior_states = repo.get_batch(ip_id, &source_ids).await?;

        let mut writes = Vec::with_capacity(chunk.len());
        for item in chunk {
            let prior = prior_states.get(&item.source_id);
            let transition = determine_transition(prior, item);

            let new_status = incoming_status(item.status);
            let first_seen_s = prior.map(|p| p.first_seen_s).unwrap_or(now_s);
            let new_state = ItemState {
                source_id: item.source_id.clone(),
                status: new_status,
                price: item.price,
                first_seen_s,
                last_seen_s: now_s,
            };
            writes.push((item.source_id.clone(), new_state, ttl.ttl_for(new_status)));

            if let Some(transition) = transition {
                if transition.is_inflow() {
                    outcome.inflow += 1;
                }
                if transition.is_outflow() {
                    outcome.outflow += 1;
                }
                outcome.transitions.push(transition);
            }
        }

        repo.put_batch(ip_id, &writes).await?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockItemStateRepository;

    fn item(source_id: &str, price: i64, status: ResultItemStatus) -> ResultItem {
        ResultItem {
            source_id: source_id.to_string(),
            title: "t".to_string(),
            price,
            status,
            image_url: None,
            item_url: None,
        }
    }

    fn ttl() -> TtlPolicy {
        TtlPolicy {
            available_s: 86_400,
            sold_s: 172_800,
        }
    }

    #[tokio::test]
    async fn first_crawl_yields_new_listing_and_new_sold() {
        let repo = MockItemStateRepository::new();
        let items = vec![
            item("a", 1000, ResultItemStatus::OnSale),
            item("b", 2000, ResultItemStatus::OnSale),
            item("c", 3000, ResultItemStatus::Sold),
        ];
        let outcome = process_items_batch(&repo, 11, &items, 1_000, ttl()).await.unwrap();

        assert_eq!(outcome.transitions.len(), 3);
        assert_eq!(outcome.inflow, 0);
        assert_eq!(outcome.outflow, 0);
        assert!(matches!(outcome.transitions[0], Transition::NewListing { .. }));
        assert!(matches!(outcome.transitions[1], Transition::NewListing { .. }));
        assert!(matches!(outcome.transitions[2], Transition::NewSold { .. }));
    }

    #[tokio::test]
    async fn second_crawl_detects_price_change_and_leaves_unchanged_item_alone() {
        let repo = MockItemStateRepository::new();
        let first = vec![
            item("a", 1000, ResultItemStatus::OnSale),
            item("b", 2000, ResultItemStatus::OnSale),
        ];
        process_items_batch(&repo, 11, &first, 1_000, ttl()).await.unwrap();

        let second = vec![
            item("a", 1000, ResultItemStatus::OnSale),
            item("b", 1800, ResultItemStatus::OnSale),
        ];
        let outcome = process_items_batch(&repo, 11, &second, 2_000, ttl()).await.unwrap();

        assert_eq!(outcome.transitions.len(), 1);
        match &outcome.transitions[0] {
            Transition::PriceChange {
                source_id,
                old_price,
                new_price,
            } => {
                assert_eq!(source_id, "b");
                assert_eq!(*old_price, 2000);
                assert_eq!(*new_price, 1800);
            }
            other => panic!("unexpected transition: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sold_after_available_increments_outflow() {
        let repo = MockItemStateRepository::new();
        process_items_batch(&repo, 11, &[item("b", 1800, ResultItemStatus::OnSale)], 2_000, ttl())
            .await
            .unwrap();

        let outcome = process_items_batch(&repo, 11, &[item("b", 1800, ResultItemStatus::Sold)], 3_000, ttl())
            .await
            .unwrap();

        assert_eq!(outcome.outflow, 1);
        assert_eq!(outcome.inflow, 0);
        assert!(matches!(outcome.transitions[0], Transition::Sold { .. }));
    }

    #[tokio::test]
    async fn empty_source_id_is_skipped() {
        let repo = MockItemStateRepository::new();
        let items = vec![item("", 100, ResultItemStatus::OnSale)];
        let outcome = process_items_batch(&repo, 11, &items, 1_000, ttl()).await.unwrap();
        assert!(outcome.transitions.is_empty());
    }

    #[tokio::test]
    async fn first_seen_is_preserved_across_updates() {
        let repo = MockItemStateRepository::new();
        process_items_batch(&repo, 11, &[item("a", 100, ResultItemStatus::OnSale)], 1_000, ttl())
            .await
            .unwrap();
        process_items_batch(&repo, 11, &[item("a", 90, ResultItemStatus::OnSale)], 5_000, ttl())
            .await
            .unwrap();

        let state = repo
            .get_batch(11, &["a".to_string()])
            .await
            .unwrap()
            .remove("a")
            .unwrap();
        assert_eq!(state.first_seen_s, 1_000);
        assert_eq!(state.last_seen_s, 5_000);
    }
}
