use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fritz_core::batch::{
    plan, ActiveRow, AppliedChange, ReservationBatch, SeatTransition, WriteKind,
};
use fritz_core::repository::ReservationRepository;
use fritz_core::{CoreError, CoreResult};
use fritz_shared::{BookedSeat, Gender, Masked, OccupiedSeat, ReservationStatus};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

const UNIQUE_VIOLATION: &str = "23505";
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(sqlx::FromRow)]
struct ActiveRecord {
    id: i64,
    seat_id: i64,
    status: String,
    booking_code: String,
}

#[derive(sqlx::FromRow)]
struct OccupancyRecord {
    seat_id: i64,
    status: String,
    gender: Option<String>,
}

#[derive(sqlx::FromRow)]
struct BookedRecord {
    id: i64,
    booking_code: String,
    train_id: i64,
    train_name: String,
    train_class: String,
    travel_date: NaiveDate,
    seat_id: i64,
    car_name: String,
    seat_number: String,
    passenger_name: Option<String>,
    passenger_id_number: Option<String>,
    gender: Option<String>,
    price: i64,
    status: String,
    created_at: DateTime<Utc>,
}

pub struct PostgresReservationRepository {
    pub pool: sqlx::PgPool,
    lock_timeout: Duration,
}

impl PostgresReservationRepository {
    pub fn new(pool: sqlx::PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    async fn lock_keys(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch: &ReservationBatch,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut **tx)
            .await?;

        // Single-key space, disjoint from the (slot, day) seat locks. Taken first.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(&batch.code)
            .execute(&mut **tx)
            .await?;

        let day = advisory_day(batch.travel_date);
        let mut slots: Vec<i32> = batch.lock_order().into_iter().map(advisory_seat).collect();
        slots.sort_unstable();
        slots.dedup();

        for slot in slots {
            sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
                .bind(slot)
                .bind(day)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn seat_numbers(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        batch: &ReservationBatch,
        keys: &[i64],
    ) -> CoreResult<HashMap<i64, String>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, seat_number FROM seats WHERE train_id = $1 AND id = ANY($2)",
        )
        .bind(batch.train_id)
        .bind(keys)
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error)?;

        let numbers: HashMap<i64, String> = rows.into_iter().collect();
        if let Some(stray) = keys.iter().find(|id| !numbers.contains_key(*id)) {
            return Err(CoreError::validation(format!(
                "Seat {} does not belong to train {}",
                stray, batch.train_id
            )));
        }
        Ok(numbers)
    }
}

/// Advisory locks take two int4 keys: a seat slot and the day offset.
/// Distinct seats sharing a slot only serialize more than needed.
fn advisory_seat(seat_id: i64) -> i32 {
    seat_id.rem_euclid(i64::from(i32::MAX)) as i32
}

fn advisory_day(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

fn db_error(err: sqlx::Error) -> CoreError {
    if let Some(db) = err.as_database_error() {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => error!(
                target: "data_integrity",
                "Active reservation index rejected a write that passed the lock check: {}",
                db.message()
            ),
            Some(LOCK_NOT_AVAILABLE) => warn!("Timed out waiting for seat locks"),
            _ => {}
        }
    }
    CoreError::storage(err)
}

fn parse_status(raw: &str) -> CoreResult<ReservationStatus> {
    raw.parse().map_err(CoreError::storage)
}

fn parse_gender(raw: Option<String>) -> CoreResult<Option<Gender>> {
    raw.map(|g| g.parse::<Gender>()).transpose().map_err(CoreError::storage)
}

#[async_trait]
impl ReservationRepository for PostgresReservationRepository {
    async fn apply(&self, batch: &ReservationBatch) -> CoreResult<Vec<AppliedChange>> {
        let keys = batch.lock_order();
        // Dropping the transaction without commit rolls everything back.
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        self.lock_keys(&mut tx, batch).await.map_err(db_error)?;
        let numbers = self.seat_numbers(&mut tx, batch, &keys).await?;

        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reservations WHERE booking_code = $1)")
                .bind(&batch.code)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;
        if taken {
            return Err(CoreError::BookingCodeTaken(batch.code.clone()));
        }

        let now = Utc::now();
        let expired = sqlx::query(
            r#"
            DELETE FROM reservations
            WHERE travel_date = $1 AND seat_id = ANY($2)
              AND status = 'held' AND expires_at IS NOT NULL AND expires_at <= $3
            "#,
        )
        .bind(batch.travel_date)
        .bind(&keys)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();
        if expired > 0 {
            debug!("Dropped {} expired holds on batch keys", expired);
        }

        let records = sqlx::query_as::<_, ActiveRecord>(
            r#"
            SELECT id, seat_id, status, booking_code
            FROM reservations
            WHERE travel_date = $1 AND seat_id = ANY($2) AND status IN ('held', 'confirmed')
            FOR UPDATE
            "#,
        )
        .bind(batch.travel_date)
        .bind(&keys)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

        let active = records
            .into_iter()
            .map(|r| {
                Ok(ActiveRow {
                    reservation_id: r.id,
                    seat_id: r.seat_id,
                    status: parse_status(&r.status)?,
                    booking_code: r.booking_code,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let writes = plan(batch, &active)
            .map_err(|clashes| CoreError::seat_conflict(clashes, |id| numbers.get(&id).cloned()))?;

        let mut applied = Vec::with_capacity(writes.len());
        for write in writes {
            let change = write.change;
            let reservation_id: i64 = match (&change.transition, write.kind) {
                (SeatTransition::Hold { gender }, WriteKind::Insert) => sqlx::query_scalar(
                    r#"
                    INSERT INTO reservations
                        (train_id, travel_date, seat_id, booking_code, price, status, gender, created_at, expires_at)
                    VALUES ($1, $2, $3, $4, 0, 'held', $5, $6, $7)
                    RETURNING id
                    "#,
                )
                .bind(batch.train_id)
                .bind(batch.travel_date)
                .bind(change.seat_id)
                .bind(&batch.code)
                .bind(gender.map(|g| g.to_string()))
                .bind(now)
                .bind(batch.expires_at)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?,
                (SeatTransition::Confirm { passenger, price }, WriteKind::Insert) => {
                    sqlx::query_scalar(
                        r#"
                        INSERT INTO reservations
                            (train_id, travel_date, seat_id, booking_code, passenger_name,
                             passenger_id_number, price, status, gender, created_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, 'confirmed', $8, $9)
                        RETURNING id
                        "#,
                    )
                    .bind(batch.train_id)
                    .bind(batch.travel_date)
                    .bind(change.seat_id)
                    .bind(&batch.code)
                    .bind(&passenger.name)
                    .bind(passenger.id_number.expose())
                    .bind(*price)
                    .bind(passenger.gender.map(|g| g.to_string()))
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_error)?
                }
                (SeatTransition::Confirm { passenger, price }, WriteKind::Promote { reservation_id }) => {
                    let updated = sqlx::query(
                        r#"
                        UPDATE reservations
                        SET booking_code = $2, status = 'confirmed', passenger_name = $3,
                            passenger_id_number = $4, price = $5,
                            gender = COALESCE($6, gender), expires_at = NULL
                        WHERE id = $1 AND status = 'held'
                        "#,
                    )
                    .bind(reservation_id)
                    .bind(&batch.code)
                    .bind(&passenger.name)
                    .bind(passenger.id_number.expose())
                    .bind(*price)
                    .bind(passenger.gender.map(|g| g.to_string()))
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?
                    .rows_affected();
                    if updated != 1 {
                        return Err(CoreError::storage(format!(
                            "held reservation {} changed under lock",
                            reservation_id
                        )));
                    }
                    reservation_id
                }
                (SeatTransition::Hold { .. }, WriteKind::Promote { .. }) => {
                    return Err(CoreError::storage("hold cannot promote an existing row"));
                }
            };

            applied.push(AppliedChange {
                seat_id: change.seat_id,
                reservation_id,
                status: change.transition.target_status(),
                kind: write.kind,
            });
        }

        tx.commit().await.map_err(db_error)?;
        Ok(applied)
    }

    async fn release(&self, travel_date: NaiveDate, seat_ids: &[i64]) -> CoreResult<Vec<i64>> {
        let mut released: Vec<i64> = sqlx::query_scalar(
            r#"
            DELETE FROM reservations
            WHERE travel_date = $1 AND seat_id = ANY($2) AND status = 'held'
            RETURNING seat_id
            "#,
        )
        .bind(travel_date)
        .bind(seat_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        released.sort_unstable();
        Ok(released)
    }

    async fn occupancy(
        &self,
        train_id: i64,
        travel_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<OccupiedSeat>> {
        let rows = sqlx::query_as::<_, OccupancyRecord>(
            r#"
            SELECT seat_id, status, gender
            FROM reservations
            WHERE train_id = $1 AND travel_date = $2
              AND (status = 'confirmed'
                   OR (status = 'held' AND (expires_at IS NULL OR expires_at > $3)))
            "#,
        )
        .bind(train_id)
        .bind(travel_date)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|r| {
                Ok(OccupiedSeat {
                    seat_id: r.seat_id,
                    status: parse_status(&r.status)?,
                    gender: parse_gender(r.gender)?,
                })
            })
            .collect()
    }

    async fn booking_group(&self, booking_code: &str) -> CoreResult<Vec<BookedSeat>> {
        let rows = sqlx::query_as::<_, BookedRecord>(
            r#"
            SELECT
                r.id, r.booking_code, r.train_id, t.name AS train_name, t.class AS train_class,
                r.travel_date, r.seat_id, s.car_name, s.seat_number,
                r.passenger_name, r.passenger_id_number, r.gender, r.price, r.status, r.created_at
            FROM reservations r
            JOIN seats s ON s.id = r.seat_id
            JOIN trains t ON t.id = r.train_id
            WHERE r.booking_code = $1 AND r.status = 'confirmed'
            ORDER BY r.id
            "#,
        )
        .bind(booking_code)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|r| {
                Ok(BookedSeat {
                    reservation_id: r.id,
                    booking_code: r.booking_code,
                    train_id: r.train_id,
                    train_name: r.train_name,
                    train_class: r.train_class,
                    travel_date: r.travel_date,
                    seat_id: r.seat_id,
                    car_name: r.car_name,
                    seat_number: r.seat_number,
                    passenger_name: r.passenger_name,
                    passenger_id_number: r.passenger_id_number.map(Masked::new),
                    gender: parse_gender(r.gender)?,
                    price: r.price,
                    status: parse_status(&r.status)?,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn reclaim_expired_holds(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM reservations
            WHERE status = 'held' AND expires_at IS NOT NULL AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}
