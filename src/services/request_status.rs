//! Derives a purchase request's status from the statuses of its items.

use crate::errors::ServiceError;
use crate::models::{ItemStatus, RequestStatus};

/// Aggregates item statuses into a request status.
///
/// Rules, first match wins:
/// 1. any item `pending` gives `pending`;
/// 2. every item `approved` gives `approved`;
/// 3. every item `rejected` gives `rejected`;
/// 4. anything else gives `partial`.
///
/// Returns `None` for an empty slice; a request always has at least one item.
pub fn compute_request_status<I>(items: I) -> Option<RequestStatus>
where
    I: IntoIterator<Item = ItemStatus>,
{
    let mut seen_any = false;
    let mut all_approved = true;
    let mut all_rejected = true;

    for status in items {
        seen_any = true;
        match status {
            ItemStatus::Pending => return Some(RequestStatus::Pending),
            ItemStatus::Approved => all_rejected = false,
            ItemStatus::Rejected => all_approved = false,
            ItemStatus::Suspended => {
                all_approved = false;
                all_rejected = false;
            }
        }
    }

    if !seen_any {
        None
    } else if all_approved {
        Some(RequestStatus::Approved)
    } else if all_rejected {
        Some(RequestStatus::Rejected)
    } else {
        Some(RequestStatus::Partial)
    }
}

/// Like [`compute_request_status`] but treats an empty item set as an
/// internal invariant violation.
pub fn require_request_status<I>(items: I) -> Result<RequestStatus, ServiceError>
where
    I: IntoIterator<Item = ItemStatus>,
{
    compute_request_status(items).ok_or_else(|| {
        ServiceError::InternalError("purchase request has no items to aggregate".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use ItemStatus::*;

    #[rstest]
    #[case(&[Approved, Approved], RequestStatus::Approved)]
    #[case(&[Approved, Rejected], RequestStatus::Partial)]
    #[case(&[Rejected, Rejected], RequestStatus::Rejected)]
    #[case(&[Approved, Pending, Rejected], RequestStatus::Pending)]
    #[case(&[Suspended], RequestStatus::Partial)]
    #[case(&[Suspended, Approved], RequestStatus::Partial)]
    #[case(&[Rejected, Suspended], RequestStatus::Partial)]
    #[case(&[Pending], RequestStatus::Pending)]
    fn aggregates_known_mixes(#[case] items: &[ItemStatus], #[case] expected: RequestStatus) {
        assert_eq!(compute_request_status(items.iter().copied()), Some(expected));
    }

    #[test]
    fn empty_item_set_has_no_status() {
        assert_eq!(compute_request_status(Vec::new()), None);
        assert!(matches!(
            require_request_status(Vec::new()),
            Err(ServiceError::InternalError(_))
        ));
    }

    fn item_status() -> impl Strategy<Value = ItemStatus> {
        prop_oneof![Just(Pending), Just(Approved), Just(Rejected), Just(Suspended)]
    }

    proptest! {
        #[test]
        fn total_and_never_completed(items in prop::collection::vec(item_status(), 1..32)) {
            let status = compute_request_status(items.iter().copied());
            prop_assert!(matches!(
                status,
                Some(RequestStatus::Pending)
                    | Some(RequestStatus::Approved)
                    | Some(RequestStatus::Rejected)
                    | Some(RequestStatus::Partial)
            ));
        }

        #[test]
        fn order_independent(items in prop::collection::vec(item_status(), 1..32)) {
            let forward = compute_request_status(items.iter().copied());
            let reversed = compute_request_status(items.iter().rev().copied());
            let mut sorted = items.clone();
            sorted.sort_by_key(|s| s.to_string());
            prop_assert_eq!(forward, reversed);
            prop_assert_eq!(forward, compute_request_status(sorted));
        }

        #[test]
        fn pending_dominates(
            mut items in prop::collection::vec(item_status(), 0..32),
            at in any::<prop::sample::Index>(),
        ) {
            let idx = at.index(items.len() + 1);
            items.insert(idx, Pending);
            prop_assert_eq!(compute_request_status(items), Some(RequestStatus::Pending));
        }

        #[test]
        fn unanimity(n in 1usize..32) {
            prop_assert_eq!(
                compute_request_status(std::iter::repeat(Approved).take(n)),
                Some(RequestStatus::Approved)
            );
            prop_assert_eq!(
                compute_request_status(std::iter::repeat(Rejected).take(n)),
                Some(RequestStatus::Rejected)
            );
        }
    }
}
