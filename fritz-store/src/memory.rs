//! Process-local repositories backed by plain collections.
//!
//! The reservation table sits behind one `std::sync::Mutex`; every write is a
//! synchronous check-and-write inside a single critical section, so a
//! cancelled caller can never leave a half-applied batch behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fritz_catalog::{find_pair, StopPair};
use fritz_core::batch::{
    plan, ActiveRow, AppliedChange, ReservationBatch, SeatTransition, WriteKind,
};
use fritz_core::repository::{ReservationRepository, TimetableRepository};
use fritz_core::{CoreError, CoreResult};
use fritz_shared::{
    BookedSeat, OccupiedSeat, Reservation, ReservationStatus, Seat, Stop, Train,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct ReservationTable {
    next_id: i64,
    rows: Vec<Reservation>,
}

impl ReservationTable {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    trains: BTreeMap<i64, Train>,
    stops: Vec<Stop>,
    seats: Vec<Seat>,
    table: Mutex<ReservationTable>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_train(mut self, train: Train, stops: Vec<Stop>, seats: Vec<Seat>) -> Self {
        self.stops.extend(stops);
        self.seats.extend(seats);
        self.trains.insert(train.id, train);
        self
    }

    /// Every row (active or not) on a (seat, date) key.
    pub fn rows_for(&self, seat_id: i64, travel_date: NaiveDate) -> Vec<Reservation> {
        self.peek()
            .rows
            .iter()
            .filter(|r| r.seat_id == seat_id && r.travel_date == travel_date)
            .cloned()
            .collect()
    }

    pub fn reservation_count(&self) -> usize {
        self.peek().rows.len()
    }

    fn peek(&self) -> MutexGuard<'_, ReservationTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, ReservationTable>> {
        self.table
            .lock()
            .map_err(|_| CoreError::storage("reservation table lock poisoned"))
    }

    fn seat(&self, seat_id: i64) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == seat_id)
    }

    fn apply_locked(&self, batch: &ReservationBatch) -> CoreResult<Vec<AppliedChange>> {
        let keys = batch.lock_order();
        if let Some(stray) = keys.iter().find(|id| {
            self.seat(**id)
                .map_or(true, |seat| seat.train_id != batch.train_id)
        }) {
            return Err(CoreError::validation(format!(
                "Seat {} does not belong to train {}",
                stray, batch.train_id
            )));
        }

        let mut table = self.lock()?;
        if table.rows.iter().any(|r| r.booking_code == batch.code) {
            return Err(CoreError::BookingCodeTaken(batch.code.clone()));
        }

        let now = Utc::now();
        let on_key = |r: &Reservation| r.travel_date == batch.travel_date && keys.contains(&r.seat_id);

        let before = table.rows.len();
        table.rows.retain(|r| !on_key(r) || r.is_active(now));
        if table.rows.len() < before {
            debug!("Dropped {} expired holds on batch keys", before - table.rows.len());
        }

        let active: Vec<ActiveRow> = table
            .rows
            .iter()
            .filter(|r| on_key(r))
            .map(|r| ActiveRow {
                reservation_id: r.id,
                seat_id: r.seat_id,
                status: r.status,
                booking_code: r.booking_code.clone(),
            })
            .collect();

        let writes = plan(batch, &active).map_err(|clashes| {
            CoreError::seat_conflict(clashes, |id| self.seat(id).map(|s| s.seat_number.clone()))
        })?;

        // Resolve every promotion target before the first write.
        let mut targets = Vec::with_capacity(writes.len());
        for write in &writes {
            let target = match write.kind {
                WriteKind::Insert => None,
                WriteKind::Promote { reservation_id } => Some(
                    table
                        .rows
                        .iter()
                        .position(|r| r.id == reservation_id)
                        .ok_or_else(|| CoreError::storage("promoted row vanished"))?,
                ),
            };
            targets.push(target);
        }

        let mut inserted = Vec::new();
        let mut applied = Vec::with_capacity(writes.len());
        for (write, target) in writes.iter().zip(targets) {
            let change = write.change;
            let reservation_id = match target {
                Some(index) => {
                    let row = &mut table.rows[index];
                    fill(row, batch, &change.transition);
                    row.id
                }
                None => {
                    let id = table.allocate_id();
                    let mut row = Reservation {
                        id,
                        train_id: batch.train_id,
                        travel_date: batch.travel_date,
                        seat_id: change.seat_id,
                        booking_code: batch.code.clone(),
                        passenger_name: None,
                        passenger_id_number: None,
                        price: 0,
                        status: ReservationStatus::Held,
                        gender: None,
                        created_at: now,
                        expires_at: None,
                    };
                    fill(&mut row, batch, &change.transition);
                    inserted.push(row);
                    id
                }
            };

            applied.push(AppliedChange {
                seat_id: change.seat_id,
                reservation_id,
                status: change.transition.target_status(),
                kind: write.kind,
            });
        }
        table.rows.extend(inserted);

        Ok(applied)
    }
}

fn fill(row: &mut Reservation, batch: &ReservationBatch, transition: &SeatTransition) {
    row.booking_code = batch.code.clone();
    row.status = transition.target_status();
    match transition {
        SeatTransition::Hold { gender } => {
            row.gender = *gender;
            row.expires_at = batch.expires_at;
        }
        SeatTransition::Confirm { passenger, price } => {
            row.passenger_name = Some(passenger.name.clone());
            row.passenger_id_number = Some(passenger.id_number.clone());
            row.price = *price;
            row.gender = passenger.gender.or(row.gender);
            row.expires_at = None;
        }
    }
}

#[async_trait]
impl TimetableRepository for InMemoryStore {
    async fn stop_pairs(&self, origin: &str, destination: &str) -> CoreResult<Vec<StopPair>> {
        Ok(self
            .trains
            .values()
            .filter_map(|train| find_pair(train, &self.stops, origin, destination))
            .collect())
    }

    async fn get_train(&self, train_id: i64) -> CoreResult<Option<Train>> {
        Ok(self.trains.get(&train_id).cloned())
    }

    async fn list_seats(&self, train_id: i64) -> CoreResult<Vec<Seat>> {
        let mut seats: Vec<Seat> = self
            .seats
            .iter()
            .filter(|s| s.train_id == train_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.car_name.cmp(&b.car_name).then(a.id.cmp(&b.id)));
        Ok(seats)
    }

    async fn count_seats(&self, train_id: i64) -> CoreResult<i64> {
        Ok(self.seats.iter().filter(|s| s.train_id == train_id).count() as i64)
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn apply(&self, batch: &ReservationBatch) -> CoreResult<Vec<AppliedChange>> {
        self.apply_locked(batch)
    }

    async fn release(&self, travel_date: NaiveDate, seat_ids: &[i64]) -> CoreResult<Vec<i64>> {
        let mut table = self.lock()?;
        let mut released = Vec::new();
        table.rows.retain(|r| {
            let hit = r.travel_date == travel_date
                && r.status == ReservationStatus::Held
                && seat_ids.contains(&r.seat_id);
            if hit {
                released.push(r.seat_id);
            }
            !hit
        });
        released.sort_unstable();
        Ok(released)
    }

    async fn occupancy(
        &self,
        train_id: i64,
        travel_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<OccupiedSeat>> {
        let table = self.lock()?;
        Ok(table
            .rows
            .iter()
            .filter(|r| r.train_id == train_id && r.travel_date == travel_date && r.is_active(now))
            .map(|r| OccupiedSeat {
                seat_id: r.seat_id,
                status: r.status,
                gender: r.gender,
            })
            .collect())
    }

    async fn booking_group(&self, booking_code: &str) -> CoreResult<Vec<BookedSeat>> {
        let table = self.lock()?;
        let mut booked = Vec::new();
        for row in table
            .rows
            .iter()
            .filter(|r| r.booking_code == booking_code && r.status == ReservationStatus::Confirmed)
        {
            let (Some(seat), Some(train)) = (self.seat(row.seat_id), self.trains.get(&row.train_id))
            else {
                continue;
            };
            booked.push(BookedSeat {
                reservation_id: row.id,
                booking_code: row.booking_code.clone(),
                train_id: train.id,
                train_name: train.name.clone(),
                train_class: train.class.clone(),
                travel_date: row.travel_date,
                seat_id: seat.id,
                car_name: seat.car_name.clone(),
                seat_number: seat.seat_number.clone(),
                passenger_name: row.passenger_name.clone(),
                passenger_id_number: row.passenger_id_number.clone(),
                gender: row.gender,
                price: row.price,
                status: row.status,
                created_at: row.created_at,
            });
        }
        Ok(booked)
    }

    async fn reclaim_expired_holds(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut table = self.lock()?;
        let before = table.rows.len();
        table.rows.retain(|r| r.is_active(now));
        Ok((before - table.rows.len()) as u64)
    }
}

/// A small timetable used by tests and local runs without Postgres.
pub mod fixtures {
    use super::InMemoryStore;
    use chrono::NaiveTime;
    use fritz_shared::{Seat, Stop, Train};

    pub const ARGO_BROMO: i64 = 1;
    pub const KERTAJAYA: i64 = 2;
    pub const ARGO_BROMO_RETURN: i64 = 3;
    pub const KERTAJAYA_FIRST_SEAT: i64 = 101;

    fn at(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn stop(
        train_id: i64,
        code: &str,
        sequence: i32,
        arrival: Option<NaiveTime>,
        departure: Option<NaiveTime>,
        minutes: i32,
        price: i64,
    ) -> Stop {
        Stop {
            train_id,
            station_code: code.to_string(),
            sequence,
            arrival_time: arrival,
            departure_time: departure,
            cumulative_duration: minutes,
            cumulative_price: price,
        }
    }

    fn seats(train_id: i64, first_id: i64, cars: &[&str], per_car: &[&str]) -> Vec<Seat> {
        let mut id = first_id;
        let mut out = Vec::new();
        for car in cars {
            for number in per_car {
                out.push(Seat {
                    id,
                    train_id,
                    car_name: car.to_string(),
                    seat_number: number.to_string(),
                });
                id += 1;
            }
        }
        out
    }

    pub fn argo_bromo() -> (Train, Vec<Stop>, Vec<Seat>) {
        let train = Train {
            id: ARGO_BROMO,
            name: "Argo Bromo".to_string(),
            class: "Eksekutif".to_string(),
            is_fixed_fare: false,
            fixed_fare: 0,
            full_route_price: 500_000,
            full_route_duration: 500,
        };
        let stops = vec![
            stop(ARGO_BROMO, "GMR", 1, None, at(8, 0), 0, 0),
            stop(ARGO_BROMO, "CN", 2, at(11, 0), at(11, 5), 180, 180_000),
            stop(ARGO_BROMO, "SMT", 3, at(13, 30), at(13, 35), 330, 330_000),
            stop(ARGO_BROMO, "SBI", 4, at(16, 20), None, 500, 500_000),
        ];
        let seats = seats(
            ARGO_BROMO,
            1,
            &["Eksekutif 1", "Eksekutif 2"],
            &["A1", "B1", "C1", "D1"],
        );
        (train, stops, seats)
    }

    pub fn kertajaya() -> (Train, Vec<Stop>, Vec<Seat>) {
        let train = Train {
            id: KERTAJAYA,
            name: "Kertajaya".to_string(),
            class: "Ekonomi".to_string(),
            is_fixed_fare: true,
            fixed_fare: 49_000,
            full_route_price: 0,
            full_route_duration: 600,
        };
        let stops = vec![
            stop(KERTAJAYA, "PSE", 1, None, at(14, 0), 0, 0),
            stop(KERTAJAYA, "CN", 2, at(17, 20), at(17, 30), 200, 49_000),
            stop(KERTAJAYA, "SMT", 3, at(20, 0), at(20, 10), 360, 49_000),
            stop(KERTAJAYA, "SBI", 4, at(0, 0), None, 600, 49_000),
        ];
        let seats = seats(
            KERTAJAYA,
            KERTAJAYA_FIRST_SEAT,
            &["Ekonomi 1"],
            &["A1", "B1", "C1", "D1"],
        );
        (train, stops, seats)
    }

    pub fn argo_bromo_return() -> (Train, Vec<Stop>, Vec<Seat>) {
        let train = Train {
            id: ARGO_BROMO_RETURN,
            name: "Argo Bromo Malam".to_string(),
            class: "Eksekutif".to_string(),
            is_fixed_fare: false,
            fixed_fare: 0,
            full_route_price: 500_000,
            full_route_duration: 500,
        };
        let stops = vec![
            stop(ARGO_BROMO_RETURN, "SBI", 1, None, at(20, 0), 0, 0),
            stop(ARGO_BROMO_RETURN, "SMT", 2, at(22, 50), at(22, 55), 170, 170_000),
            stop(ARGO_BROMO_RETURN, "CN", 3, at(1, 20), at(1, 25), 320, 320_000),
            stop(ARGO_BROMO_RETURN, "GMR", 4, at(4, 20), None, 500, 500_000),
        ];
        let seats = seats(ARGO_BROMO_RETURN, 201, &["Eksekutif 1"], &["A1", "B1"]);
        (train, stops, seats)
    }

    pub fn sample_store() -> InMemoryStore {
        [argo_bromo(), kertajaya(), argo_bromo_return()]
            .into_iter()
            .fold(InMemoryStore::new(), |store, (train, stops, seats)| {
                store.with_train(train, stops, seats)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;
    use fritz_core::batch::{ConflictReason, SeatChange};
    use fritz_core::ConflictingSeat;
    use fritz_shared::{Gender, Masked, Passenger};

    fn passenger(name: &str) -> SeatTransition {
        SeatTransition::Confirm {
            passenger: Passenger {
                name: name.to_string(),
                id_number: Masked::new("3201".to_string()),
                gender: None,
            },
            price: 75_000,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn hold(seats: &[i64], code: &str, expires_at: Option<DateTime<Utc>>) -> ReservationBatch {
        ReservationBatch {
            train_id: ARGO_BROMO,
            travel_date: date(),
            code: code.to_string(),
            claim: None,
            expires_at,
            changes: seats
                .iter()
                .map(|&seat_id| SeatChange {
                    seat_id,
                    transition: SeatTransition::Hold { gender: Some(Gender::Male) },
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_stop_pairs_include_both_directions() {
        let store = sample_store();
        let pairs = store.stop_pairs("CN", "SMT").await.unwrap();
        let ids: Vec<i64> = pairs.iter().map(|p| p.train.id).collect();
        assert_eq!(ids, vec![ARGO_BROMO, KERTAJAYA, ARGO_BROMO_RETURN]);
        assert!(store.stop_pairs("CN", "XXX").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seats_listed_by_car() {
        let store = sample_store();
        let seats = store.list_seats(ARGO_BROMO).await.unwrap();
        assert_eq!(seats.len(), 8);
        assert_eq!(seats[0].car_name, "Eksekutif 1");
        assert_eq!(seats[7].car_name, "Eksekutif 2");
        assert_eq!(store.count_seats(KERTAJAYA).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_conflict_names_seat_numbers() {
        let store = sample_store();
        store.apply(&hold(&[2], "HOLD-A", None)).await.unwrap();

        match store.apply(&hold(&[1, 2], "HOLD-B", None)).await {
            Err(CoreError::SeatConflict { seats }) => {
                assert_eq!(
                    seats,
                    vec![ConflictingSeat {
                        seat_id: 2,
                        seat_number: "B1".to_string(),
                        reason: ConflictReason::Held,
                    }]
                );
            }
            other => panic!("expected conflict, got {:?}", other.map(|a| a.len())),
        }
        assert!(store.rows_for(1, date()).is_empty());
    }

    #[tokio::test]
    async fn test_occupancy_skips_expired_holds() {
        let store = sample_store();
        let now = Utc::now();
        store
            .apply(&hold(&[1], "HOLD-OLD", Some(now + Duration::minutes(1))))
            .await
            .unwrap();
        store.apply(&hold(&[2], "HOLD-NEW", None)).await.unwrap();

        let later = now + Duration::minutes(2);
        let occupied = store.occupancy(ARGO_BROMO, date(), later).await.unwrap();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].seat_id, 2);
        assert_eq!(occupied[0].gender, Some(Gender::Male));

        assert_eq!(store.reclaim_expired_holds(later).await.unwrap(), 1);
        assert_eq!(store.reservation_count(), 1);
    }

    #[tokio::test]
    async fn test_promote_keeps_hold_gender_without_passenger_gender() {
        let store = sample_store();
        store.apply(&hold(&[3], "HOLD-A", None)).await.unwrap();

        let mut confirm = hold(&[3], "BK-1", None);
        confirm.claim = Some("HOLD-A".to_string());
        confirm.changes[0].transition = SeatTransition::Confirm {
            passenger: Passenger {
                name: "Dewi".to_string(),
                id_number: Masked::new("3201".to_string()),
                gender: None,
            },
            price: 75_000,
        };
        let applied = store.apply(&confirm).await.unwrap();
        assert!(matches!(applied[0].kind, WriteKind::Promote { .. }));

        let group = store.booking_group("BK-1").await.unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].gender, Some(Gender::Male));
        assert_eq!(group[0].seat_number, "C1");
        assert!(store.booking_group("HOLD-A").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_only_touches_held_rows_on_date() {
        let store = sample_store();
        store.apply(&hold(&[4, 5], "HOLD-A", None)).await.unwrap();

        let other_day = date().succ_opt().unwrap();
        assert!(store.release(other_day, &[4, 5]).await.unwrap().is_empty());
        assert_eq!(store.release(date(), &[5, 4, 6]).await.unwrap(), vec![4, 5]);
        assert_eq!(store.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_mixed_confirm_writes_one_row_per_seat_in_batch_order() {
        let store = sample_store();
        store.apply(&hold(&[1], "HOLD-A", None)).await.unwrap();

        let mut confirm = hold(&[2, 1, 3], "BK-MIX", None);
        confirm.claim = Some("HOLD-A".to_string());
        for change in confirm.changes.iter_mut() {
            change.transition = passenger("Dewi");
        }
        let applied = store.apply(&confirm).await.unwrap();

        let seats: Vec<i64> = applied.iter().map(|a| a.seat_id).collect();
        assert_eq!(seats, vec![2, 1, 3]);
        assert_eq!(applied[0].kind, WriteKind::Insert);
        assert!(matches!(applied[1].kind, WriteKind::Promote { .. }));
        assert_eq!(applied[2].kind, WriteKind::Insert);

        assert_eq!(store.reservation_count(), 3);
        for seat_id in [1, 2, 3] {
            let rows = store.rows_for(seat_id, date());
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].status, ReservationStatus::Confirmed);
            assert_eq!(rows[0].booking_code, "BK-MIX");
        }
    }

    #[tokio::test]
    async fn test_booking_code_cannot_be_reused() {
        let store = sample_store();
        let mut first = hold(&[1], "TRIP-1", None);
        first.changes[0].transition = passenger("Dewi");
        store.apply(&first).await.unwrap();

        let mut second = hold(&[2], "TRIP-1", None);
        second.changes[0].transition = passenger("Budi");
        match store.apply(&second).await {
            Err(CoreError::BookingCodeTaken(code)) => assert_eq!(code, "TRIP-1"),
            other => panic!("expected taken code, got {:?}", other.map(|a| a.len())),
        }

        assert!(store.rows_for(2, date()).is_empty());
        assert_eq!(store.booking_group("TRIP-1").await.unwrap().len(), 1);
    }
}
