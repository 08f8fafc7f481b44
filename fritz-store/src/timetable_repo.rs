use async_trait::async_trait;
use chrono::NaiveTime;
use fritz_catalog::StopPair;
use fritz_core::repository::TimetableRepository;
use fritz_core::{CoreError, CoreResult};
use fritz_shared::{Seat, Stop, Train};

#[derive(sqlx::FromRow)]
struct TrainRow {
    id: i64,
    name: String,
    class: String,
    is_fixed_fare: bool,
    fixed_fare: i64,
    full_route_price: i64,
    full_route_duration: i32,
}

impl From<TrainRow> for Train {
    fn from(row: TrainRow) -> Self {
        Train {
            id: row.id,
            name: row.name,
            class: row.class,
            is_fixed_fare: row.is_fixed_fare,
            fixed_fare: row.fixed_fare,
            full_route_price: row.full_route_price,
            full_route_duration: row.full_route_duration,
        }
    }
}

/// One train with both of its calls flattened into a single row.
#[derive(sqlx::FromRow)]
struct PairRow {
    id: i64,
    name: String,
    class: String,
    is_fixed_fare: bool,
    fixed_fare: i64,
    full_route_price: i64,
    full_route_duration: i32,
    o_sequence: i32,
    o_arrival: Option<NaiveTime>,
    o_departure: Option<NaiveTime>,
    o_duration: i32,
    o_price: i64,
    d_sequence: i32,
    d_arrival: Option<NaiveTime>,
    d_departure: Option<NaiveTime>,
    d_duration: i32,
    d_price: i64,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    train_id: i64,
    car_name: String,
    seat_number: String,
}

pub struct PostgresTimetableRepository {
    pub pool: sqlx::PgPool,
}

impl PostgresTimetableRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimetableRepository for PostgresTimetableRepository {
    async fn stop_pairs(&self, origin: &str, destination: &str) -> CoreResult<Vec<StopPair>> {
        // Direction is left to the route resolver.
        let rows = sqlx::query_as::<_, PairRow>(
            r#"
            SELECT
                t.id, t.name, t.class, t.is_fixed_fare, t.fixed_fare,
                t.full_route_price, t.full_route_duration,
                o.sequence AS o_sequence, o.arrival_time AS o_arrival,
                o.departure_time AS o_departure, o.cumulative_duration AS o_duration,
                o.cumulative_price AS o_price,
                d.sequence AS d_sequence, d.arrival_time AS d_arrival,
                d.departure_time AS d_departure, d.cumulative_duration AS d_duration,
                d.cumulative_price AS d_price
            FROM trains t
            JOIN stops o ON o.train_id = t.id AND o.station_code = $1
            JOIN stops d ON d.train_id = t.id AND d.station_code = $2
            "#,
        )
        .bind(origin)
        .bind(destination)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        Ok(rows
            .into_iter()
            .map(|row| StopPair {
                origin: Stop {
                    train_id: row.id,
                    station_code: origin.to_string(),
                    sequence: row.o_sequence,
                    arrival_time: row.o_arrival,
                    departure_time: row.o_departure,
                    cumulative_duration: row.o_duration,
                    cumulative_price: row.o_price,
                },
                destination: Stop {
                    train_id: row.id,
                    station_code: destination.to_string(),
                    sequence: row.d_sequence,
                    arrival_time: row.d_arrival,
                    departure_time: row.d_departure,
                    cumulative_duration: row.d_duration,
                    cumulative_price: row.d_price,
                },
                train: Train {
                    id: row.id,
                    name: row.name,
                    class: row.class,
                    is_fixed_fare: row.is_fixed_fare,
                    fixed_fare: row.fixed_fare,
                    full_route_price: row.full_route_price,
                    full_route_duration: row.full_route_duration,
                },
            })
            .collect())
    }

    async fn get_train(&self, train_id: i64) -> CoreResult<Option<Train>> {
        let row = sqlx::query_as::<_, TrainRow>(
            r#"
            SELECT id, name, class, is_fixed_fare, fixed_fare, full_route_price, full_route_duration
            FROM trains
            WHERE id = $1
            "#,
        )
        .bind(train_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        Ok(row.map(Train::from))
    }

    async fn list_seats(&self, train_id: i64) -> CoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, train_id, car_name, seat_number
            FROM seats
            WHERE train_id = $1
            ORDER BY car_name, id
            "#,
        )
        .bind(train_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        Ok(rows
            .into_iter()
            .map(|row| Seat {
                id: row.id,
                train_id: row.train_id,
                car_name: row.car_name,
                seat_number: row.seat_number,
            })
            .collect())
    }

    async fn count_seats(&self, train_id: i64) -> CoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE train_id = $1")
            .bind(train_id)
            .fetch_one(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        Ok(count)
    }
}
