use chrono::NaiveDate;
use fritz_booking::{HoldPolicy, HoldRequest, ReservationManager, SeatAvailabilityView};
use fritz_core::CoreError;
use fritz_store::memory::fixtures;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn request(seat_ids: Vec<i64>) -> HoldRequest {
    HoldRequest {
        train_id: fixtures::ARGO_BROMO,
        travel_date: date(),
        seat_ids,
        seat_gender_hints: HashMap::new(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_holds_have_exactly_one_winner() {
    let store = Arc::new(fixtures::sample_store());
    let manager = Arc::new(ReservationManager::new(store.clone(), HoldPolicy::default()));

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.hold(request(vec![1, 2, 3])).await })
    };
    let second = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.hold(request(vec![3, 4])).await })
    };

    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    assert!(first.is_ok() ^ second.is_ok());

    let err = first.err().or(second.err()).unwrap();
    match err {
        CoreError::SeatConflict { seats } => {
            let ids: Vec<i64> = seats.iter().map(|s| s.seat_id).collect();
            assert_eq!(ids, vec![3]);
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_eq!(store.rows_for(3, date()).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_racers_never_double_book() {
    let store = Arc::new(fixtures::sample_store());
    let manager = Arc::new(ReservationManager::new(store.clone(), HoldPolicy::default()));

    let attempts = (0..32).map(|i| {
        let manager = manager.clone();
        // every racer wants seat 5 plus one other seat
        let other = [1, 2, 3, 4, 6, 7, 8][i % 7];
        tokio::spawn(async move { manager.hold(request(vec![other, 5])).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for seat_id in 1..=8 {
        assert!(store.rows_for(seat_id, date()).len() <= 1);
    }

    let view = SeatAvailabilityView::new(store.clone(), store.clone());
    let summary = view.summary(fixtures::ARGO_BROMO, date()).await.unwrap();
    assert_eq!(summary.occupied, 2);
    assert_eq!(summary.available, 6);
}
