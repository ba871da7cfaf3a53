use cartsmart::datasource::mock::RecordedSubmission;
use cartsmart::datasource::{ApiError, MockDealApi};
use cartsmart::engine::{CandidateFilter, SelectionError, SubmissionError};
use cartsmart::{
    Composer, ComposerError, ComposerSettings, Deal, DealId, DealType, Decimal, ProductId,
    StoreId,
};
use std::sync::Arc;
use std::time::Duration;

const PRODUCT: ProductId = ProductId(7);

fn deal(id: i64, store: Option<i64>, deal_type: DealType, price: &str, discount: &str) -> Deal {
    Deal::new(
        DealId::new(id),
        store.map(StoreId::new),
        deal_type,
        Decimal::from_str_canonical(price).unwrap(),
        Decimal::from_str_canonical(discount).unwrap(),
    )
}

fn catalog() -> Vec<Deal> {
    vec![
        deal(1, Some(1), DealType::Direct, "100", "0"),
        deal(2, Some(1), DealType::Coupon, "0", "20"),
        deal(3, Some(1), DealType::External, "0", "10"),
        deal(4, Some(2), DealType::Coupon, "50", "5"),
        deal(5, Some(2), DealType::Direct, "45", "0"),
        deal(6, None, DealType::Coupon, "30", "15"),
        deal(7, Some(1), DealType::Direct, "95", "0"),
    ]
}

fn composer_with(mock: &MockDealApi, page_size: u32) -> Composer {
    Composer::new(
        Arc::new(mock.clone()),
        ComposerSettings {
            page_size,
            ..ComposerSettings::default()
        },
    )
}

fn idle_composer(mock: &MockDealApi, idle_timeout: Duration) -> Composer {
    Composer::new(
        Arc::new(mock.clone()),
        ComposerSettings {
            idle_timeout,
            ..ComposerSettings::default()
        },
    )
}

fn ids(deals: &[Deal]) -> Vec<i64> {
    deals.iter().map(|d| d.id.as_i64()).collect()
}

#[tokio::test]
async fn test_open_loads_first_page() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 3);

    let view = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap();

    assert_eq!(ids(&view.candidates), vec![1, 2, 3]);
    assert!(view.has_more);
    assert!(!view.loading);
    assert_eq!(view.mode, "create");
    assert!(view.selected.is_empty());
    assert_eq!(composer.session_count().await, 1);
}

#[tokio::test]
async fn test_short_page_stops_further_fetches() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 4);

    let view = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap();
    assert!(view.has_more);

    let view = composer.load_next(view.session_id).await.unwrap();
    assert_eq!(view.candidates.len(), 7);
    assert!(!view.has_more);
    assert_eq!(mock.candidate_calls(), 2);

    let view = composer.load_next(view.session_id).await.unwrap();
    assert_eq!(view.candidates.len(), 7);
    assert_eq!(mock.candidate_calls(), 2);
}

#[tokio::test]
async fn test_store_filter_and_exclude_selected() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 10);

    let view = composer
        .open(
            PRODUCT,
            CandidateFilter {
                store_id: Some(StoreId::new(1)),
                exclude_selected: true,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(ids(&view.candidates), vec![1, 2, 3, 7]);

    let id = view.session_id;
    composer.select_first(id, DealId::new(1)).await.unwrap();
    let view = composer
        .set_filter(
            id,
            CandidateFilter {
                store_id: Some(StoreId::new(1)),
                exclude_selected: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(ids(&view.candidates), vec![2, 3, 7]);
    assert_eq!(ids(&view.selected), vec![1]);
}

#[tokio::test]
async fn test_stacking_rules_and_price() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    let err = composer.select_first(id, DealId::new(6)).await.unwrap_err();
    assert!(matches!(
        err,
        ComposerError::Selection(SelectionError::MissingStore)
    ));

    composer.select_first(id, DealId::new(1)).await.unwrap();
    composer.toggle(id, DealId::new(2)).await.unwrap();
    let view = composer.toggle(id, DealId::new(3)).await.unwrap();
    assert_eq!(view.price.as_deref(), Some("72.00"));
    assert_eq!(view.discount_percent.as_deref(), Some("30.00"));

    let err = composer.toggle(id, DealId::new(4)).await.unwrap_err();
    assert!(matches!(
        err,
        ComposerError::Selection(SelectionError::StoreMismatch { .. })
    ));
    let err = composer.toggle(id, DealId::new(7)).await.unwrap_err();
    assert!(matches!(
        err,
        ComposerError::Selection(SelectionError::DuplicateDirect)
    ));

    let view = composer.view(id).await.unwrap();
    assert_eq!(ids(&view.selected), vec![1, 2, 3]);
    assert_eq!(view.active_store_id, Some(StoreId::new(1)));
}

#[tokio::test]
async fn test_override_then_reorder_keeps_price() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    composer.toggle(id, DealId::new(1)).await.unwrap();
    composer.toggle(id, DealId::new(2)).await.unwrap();
    composer
        .set_price(id, Decimal::from_str_canonical("70").unwrap())
        .await
        .unwrap();
    composer.toggle(id, DealId::new(3)).await.unwrap();
    let view = composer.reorder(id, 2, 0).await.unwrap();

    assert_eq!(ids(&view.selected), vec![3, 1, 2]);
    assert_eq!(view.price.as_deref(), Some("70.00"));
    assert_eq!(view.discount_percent.as_deref(), Some("30.00"));
    assert!(view.price_overridden);
}

#[tokio::test]
async fn test_emptying_stack_releases_lock() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    composer.select_first(id, DealId::new(2)).await.unwrap();
    let view = composer.toggle(id, DealId::new(2)).await.unwrap();
    assert_eq!(view.price, None);
    assert_eq!(view.discount_percent, None);
    assert_eq!(view.active_store_id, None);

    let view = composer.select_first(id, DealId::new(4)).await.unwrap();
    assert_eq!(view.active_store_id, Some(StoreId::new(2)));
}

#[tokio::test]
async fn test_initial_load_failure_keeps_session_usable() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_candidate_error(ApiError::Http {
            status: 503,
            message: "Deals are temporarily unavailable".to_string(),
        });
    let composer = composer_with(&mock, 10);

    let view = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap();
    assert!(view.candidates.is_empty());
    assert!(!view.has_more);
    assert_eq!(
        view.last_error.as_deref(),
        Some("Deals are temporarily unavailable")
    );

    let view = composer
        .set_description(view.session_id, "still here".to_string())
        .await
        .unwrap();
    assert_eq!(view.description, "still here");
}

#[tokio::test]
async fn test_later_page_failure_keeps_accumulated_list() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_candidate_error_from_page(2, ApiError::Network("reset".to_string()));
    let composer = composer_with(&mock, 3);

    let view = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap();
    let view = composer.load_next(view.session_id).await.unwrap();
    assert_eq!(ids(&view.candidates), vec![1, 2, 3]);
    assert!(!view.has_more);
    assert!(view.last_error.is_some());
}

#[tokio::test]
async fn test_concurrent_load_is_rejected() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_delay(Duration::from_millis(200));
    let composer = Arc::new(composer_with(&mock, 2));
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    let background = {
        let composer = composer.clone();
        tokio::spawn(async move { composer.load_next(id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = composer.load_next(id).await.unwrap_err();
    assert!(matches!(err, ComposerError::AlreadyLoading));

    let view = background.await.unwrap().unwrap();
    assert_eq!(ids(&view.candidates), vec![1, 2, 3, 4]);
    assert_eq!(mock.candidate_calls(), 2);
}

#[tokio::test]
async fn test_stale_page_discarded_after_filter_change() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_delay(Duration::from_millis(200));
    let composer = Arc::new(composer_with(&mock, 2));
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    // Page 2 of the unfiltered list (deals 3, 4) is in flight when the
    // filter changes.
    let background = {
        let composer = composer.clone();
        tokio::spawn(async move { composer.load_next(id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let view = composer
        .set_filter(
            id,
            CandidateFilter {
                store_id: Some(StoreId::new(2)),
                exclude_selected: false,
            },
        )
        .await
        .unwrap();
    background.await.unwrap().unwrap();

    assert_eq!(ids(&view.candidates), vec![4, 5]);
    let view = composer.view(id).await.unwrap();
    assert_eq!(ids(&view.candidates), vec![4, 5]);
}

#[tokio::test]
async fn test_close_discards_in_flight_page() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_delay(Duration::from_millis(200));
    let composer = Arc::new(composer_with(&mock, 2));
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    let background = {
        let composer = composer.clone();
        tokio::spawn(async move { composer.load_next(id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    composer.close(id).await.unwrap();

    let result = background.await.unwrap();
    assert!(matches!(result, Err(ComposerError::SessionNotFound(_))));
    assert_eq!(composer.session_count().await, 0);
    assert!(matches!(
        composer.view(id).await,
        Err(ComposerError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_submit_creates_stack_and_closes_session() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    composer.select_first(id, DealId::new(1)).await.unwrap();
    composer.toggle(id, DealId::new(2)).await.unwrap();
    composer.toggle(id, DealId::new(3)).await.unwrap();
    composer
        .set_description(id, "  Direct + coupon + cashback ".to_string())
        .await
        .unwrap();

    let outcome = composer.submit(id).await.unwrap();
    assert_eq!(outcome.deal_id, Some(DealId::new(1000)));
    assert!(!outcome.updated);
    assert_eq!(composer.session_count().await, 0);

    let submissions = mock.submissions();
    assert_eq!(submissions.len(), 1);
    match &submissions[0] {
        RecordedSubmission::Create(payload) => {
            assert_eq!(payload.product_id, PRODUCT);
            assert_eq!(
                payload.deal_ids,
                vec![DealId::new(1), DealId::new(2), DealId::new(3)]
            );
            assert_eq!(payload.price, Decimal::from(72));
            assert_eq!(payload.discount_percent, Decimal::from(30));
            assert_eq!(payload.deal_type_id, 3);
            assert_eq!(payload.additional_details, "Direct + coupon + cashback");
        }
        other => panic!("Expected create, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_validation_makes_no_call() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    composer.select_first(id, DealId::new(1)).await.unwrap();
    composer
        .set_description(id, "Only one".to_string())
        .await
        .unwrap();
    let err = composer.submit(id).await.unwrap_err();
    assert!(matches!(
        err,
        ComposerError::Submission(SubmissionError::TooFewSteps { count: 1 })
    ));

    composer.toggle(id, DealId::new(2)).await.unwrap();
    composer.set_description(id, "   ".to_string()).await.unwrap();
    let err = composer.submit(id).await.unwrap_err();
    assert!(matches!(
        err,
        ComposerError::Submission(SubmissionError::BlankDescription)
    ));

    assert!(mock.submissions().is_empty());
    assert_eq!(composer.session_count().await, 1);
}

#[tokio::test]
async fn test_submit_failure_preserves_state() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_submit_error(ApiError::Http {
            status: 400,
            message: "Deal 3 has expired".to_string(),
        });
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    composer.toggle(id, DealId::new(2)).await.unwrap();
    composer.toggle(id, DealId::new(3)).await.unwrap();
    composer.set_description(id, "combo".to_string()).await.unwrap();

    match composer.submit(id).await.unwrap_err() {
        ComposerError::Api(e) => assert_eq!(e.user_message(), "Deal 3 has expired"),
        other => panic!("Expected Api error, got {:?}", other),
    }

    let view = composer.view(id).await.unwrap();
    assert_eq!(ids(&view.selected), vec![2, 3]);
    assert!(view.can_submit);
}

#[tokio::test]
async fn test_edit_session_hydrates_and_updates() {
    let stack = deal(50, Some(1), DealType::Stacked, "61", "30")
        .with_details("Saved combo")
        .with_steps(vec![DealId::new(1), DealId::new(3)]);
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_detail(stack);
    let composer = composer_with(&mock, 10);

    let view = composer
        .open_edit(PRODUCT, DealId::new(50), 51)
        .await
        .unwrap();
    assert_eq!(view.mode, "edit");
    assert_eq!(ids(&view.selected), vec![1, 3]);
    assert_eq!(view.price.as_deref(), Some("61.00"));
    assert_eq!(view.description, "Saved combo");

    let id = view.session_id;
    let view = composer.toggle(id, DealId::new(2)).await.unwrap();
    assert_eq!(view.price.as_deref(), Some("61.00"));
    assert_eq!(view.discount_percent.as_deref(), Some("30.00"));

    let outcome = composer.submit(id).await.unwrap();
    assert!(outcome.updated);
    assert_eq!(outcome.deal_id, Some(DealId::new(50)));

    match &mock.submissions()[0] {
        RecordedSubmission::Update(deal_id, payload) => {
            assert_eq!(*deal_id, DealId::new(50));
            assert_eq!(payload.deal_id, Some(DealId::new(50)));
            assert_eq!(payload.product_deal_id, Some(51));
            assert_eq!(
                payload.deal_ids,
                vec![DealId::new(1), DealId::new(3), DealId::new(2)]
            );
        }
        other => panic!("Expected update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_edit_rejects_non_stacked_deal() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = composer_with(&mock, 10);
    let err = composer
        .open_edit(PRODUCT, DealId::new(2), 9)
        .await
        .unwrap_err();
    assert!(matches!(err, ComposerError::NotAStack(_)));
    assert_eq!(composer.session_count().await, 0);
}

#[tokio::test]
async fn test_dropped_load_does_not_strand_session() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_delay(Duration::from_millis(200));
    let composer = composer_with(&mock, 2);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    // The caller gives up while page 2 is still being fetched.
    let cancelled = tokio::time::timeout(Duration::from_millis(20), composer.load_next(id)).await;
    assert!(cancelled.is_err());
    tokio::time::sleep(Duration::from_millis(500)).await;

    let view = composer.load_next(id).await.unwrap();
    assert_eq!(ids(&view.candidates), vec![1, 2, 3, 4, 5, 6]);
    assert!(!view.loading);
    assert_eq!(mock.candidate_calls(), 3);
}

#[tokio::test]
async fn test_dropped_submit_does_not_strand_session() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_delay(Duration::from_millis(200))
        .with_submit_error(ApiError::Http {
            status: 503,
            message: "Try again later".to_string(),
        });
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;
    composer.toggle(id, DealId::new(2)).await.unwrap();
    composer.toggle(id, DealId::new(3)).await.unwrap();
    composer.set_description(id, "combo".to_string()).await.unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(20), composer.submit(id)).await;
    assert!(cancelled.is_err());
    tokio::time::sleep(Duration::from_millis(500)).await;

    match composer.submit(id).await.unwrap_err() {
        ComposerError::Api(e) => assert_eq!(e.user_message(), "Try again later"),
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dropped_submit_still_lands() {
    let mock = MockDealApi::new()
        .with_deals(PRODUCT, catalog())
        .with_delay(Duration::from_millis(200));
    let composer = composer_with(&mock, 10);
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;
    composer.toggle(id, DealId::new(2)).await.unwrap();
    composer.toggle(id, DealId::new(3)).await.unwrap();
    composer.set_description(id, "combo".to_string()).await.unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(20), composer.submit(id)).await;
    assert!(cancelled.is_err());
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(mock.submissions().len(), 1);
    assert_eq!(composer.session_count().await, 0);
}

#[tokio::test]
async fn test_idle_session_expires() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = idle_composer(&mock, Duration::from_millis(100));
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;
    composer.view(id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(matches!(
        composer.toggle(id, DealId::new(1)).await,
        Err(ComposerError::SessionNotFound(_))
    ));
    assert_eq!(composer.session_count().await, 0);
}

#[tokio::test]
async fn test_activity_keeps_session_alive() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = idle_composer(&mock, Duration::from_millis(300));
    let id = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        composer.view(id).await.unwrap();
    }
    assert_eq!(composer.session_count().await, 1);
}

#[tokio::test]
async fn test_evict_idle_keeps_recent_sessions() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = idle_composer(&mock, Duration::from_millis(150));
    let stale = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;
    tokio::time::sleep(Duration::from_millis(250)).await;
    let fresh = composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap()
        .session_id;

    assert_eq!(composer.evict_idle().await, 1);
    assert_eq!(composer.session_count().await, 1);
    composer.view(fresh).await.unwrap();
    assert!(matches!(
        composer.view(stale).await,
        Err(ComposerError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_idle_sweeper_runs_in_background() {
    let mock = MockDealApi::new().with_deals(PRODUCT, catalog());
    let composer = Arc::new(idle_composer(&mock, Duration::from_millis(100)));
    let sweeper = composer.spawn_idle_sweeper(Duration::from_millis(20));
    composer
        .open(PRODUCT, CandidateFilter::default(), None)
        .await
        .unwrap();
    assert_eq!(composer.session_count().await, 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(composer.session_count().await, 0);
    sweeper.abort();
}
