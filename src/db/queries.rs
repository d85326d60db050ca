use anyhow::Context;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Booking, Master, MasterId, Service};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

// ── Masters & Services ──

pub fn insert_master(conn: &Connection, master: &Master) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO masters (id, name, specialization) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, specialization = excluded.specialization",
        params![master.id, master.name, master.specialization],
    )?;
    Ok(())
}

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, price, duration_minutes) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           price = excluded.price,
           duration_minutes = excluded.duration_minutes",
        params![service.id, service.name, service.price, service.duration_minutes],
    )?;
    Ok(())
}

pub fn assign_service(conn: &Connection, master_id: MasterId, service_id: i64) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO master_services (master_id, service_id) VALUES (?1, ?2)",
        params![master_id, service_id],
    )?;
    Ok(())
}

pub fn find_service_by_name(conn: &Connection, name: &str) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            "SELECT id, name, price, duration_minutes FROM services
             WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
            params![name.trim()],
            |row| {
                Ok(Service {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    duration_minutes: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(service)
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt =
        conn.prepare("SELECT id, name, price, duration_minutes FROM services ORDER BY name, id")?;

    let rows = stmt.query_map([], |row| {
        Ok(Service {
            id: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            duration_minutes: row.get(3)?,
        })
    })?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn get_service_by_id(conn: &Connection, id: i64) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            "SELECT id, name, price, duration_minutes FROM services WHERE id = ?1",
            params![id],
            |row| {
                Ok(Service {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    duration_minutes: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(service)
}

pub fn masters_for_service(conn: &Connection, service_id: i64) -> anyhow::Result<Vec<Master>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.name, m.specialization FROM masters m
         JOIN master_services ms ON ms.master_id = m.id
         WHERE ms.service_id = ?1 ORDER BY m.id",
    )?;

    let rows = stmt.query_map(params![service_id], |row| {
        Ok(Master {
            id: row.get(0)?,
            name: row.get(1)?,
            specialization: row.get(2)?,
        })
    })?;

    let mut masters = vec![];
    for row in rows {
        masters.push(row?);
    }
    Ok(masters)
}

// ── Master Schedules ──

/// Raw `(start, end)` text of a master's schedule row for `date`.
pub fn get_master_schedule(
    conn: &Connection,
    master_id: MasterId,
    date: NaiveDate,
) -> anyhow::Result<Option<(String, String)>> {
    let row = conn
        .query_row(
            "SELECT start_time, end_time FROM master_schedules WHERE master_id = ?1 AND date = ?2",
            params![master_id, date.format(DATE_FORMAT).to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row)
}

pub fn upsert_master_schedule(
    conn: &Connection,
    master_id: MasterId,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO master_schedules (master_id, date, start_time, end_time) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(master_id, date) DO UPDATE SET
           start_time = excluded.start_time,
           end_time = excluded.end_time",
        params![
            master_id,
            date.format(DATE_FORMAT).to_string(),
            start.format(TIME_FORMAT).to_string(),
            end.format(TIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn parse_schedule_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .with_context(|| format!("invalid schedule time: {s}"))
}

// ── Appointments ──

pub fn create_appointment(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, master_id, service_id, client_name, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            booking.id,
            booking.master_id,
            booking.service_id,
            booking.client_name,
            booking.start.format(DATETIME_FORMAT).to_string(),
            booking.end.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// Appointments starting on `date` for any of `master_ids`, ordered by start.
pub fn get_appointments_for_masters_on_date(
    conn: &Connection,
    master_ids: &[MasterId],
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    if master_ids.is_empty() {
        return Ok(vec![]);
    }

    let day_start = date.and_time(NaiveTime::MIN);
    let next_day = date
        .checked_add_days(Days::new(1))
        .with_context(|| format!("date out of range: {date}"))?
        .and_time(NaiveTime::MIN);

    let placeholders = (0..master_ids.len())
        .map(|i| format!("?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT id, master_id, service_id, client_name, start_time, end_time
         FROM appointments
         WHERE start_time >= ?1 AND start_time < ?2 AND master_id IN ({placeholders})
         ORDER BY start_time ASC"
    );

    let mut params_vec: Vec<Box<dyn ToSql>> = vec![
        Box::new(day_start.format(DATETIME_FORMAT).to_string()),
        Box::new(next_day.format(DATETIME_FORMAT).to_string()),
    ];
    for id in master_ids {
        params_vec.push(Box::new(*id));
    }
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// First appointment of `master_id` overlapping `[start, end)`, skipping `exclude_id`.
pub fn find_overlapping_appointment(
    conn: &Connection,
    master_id: MasterId,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    exclude_id: Option<&str>,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, master_id, service_id, client_name, start_time, end_time
         FROM appointments
         WHERE master_id = ?1 AND start_time < ?3 AND end_time > ?2
           AND (?4 IS NULL OR id != ?4)
         ORDER BY start_time LIMIT 1",
        params![
            master_id,
            start.format(DATETIME_FORMAT).to_string(),
            end.format(DATETIME_FORMAT).to_string(),
            exclude_id,
        ],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, master_id, service_id, client_name, start_time, end_time
         FROM appointments WHERE id = ?1",
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Appointments of `client_name` (case-insensitive) starting at or after `from`.
pub fn get_upcoming_appointments_for_client(
    conn: &Connection,
    client_name: &str,
    from: &NaiveDateTime,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, master_id, service_id, client_name, start_time, end_time
         FROM appointments
         WHERE client_name = ?1 COLLATE NOCASE AND start_time >= ?2
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(
        params![client_name.trim(), from.format(DATETIME_FORMAT).to_string()],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_appointment_time(
    conn: &Connection,
    id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET start_time = ?1, end_time = ?2 WHERE id = ?3",
        params![
            start.format(DATETIME_FORMAT).to_string(),
            end.format(DATETIME_FORMAT).to_string(),
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_appointment(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let master_id: MasterId = row.get(1)?;
    let service_id: Option<i64> = row.get(2)?;
    let client_name: Option<String> = row.get(3)?;
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(5)?;

    let start = NaiveDateTime::parse_from_str(&start_str, DATETIME_FORMAT)
        .with_context(|| format!("appointment {id} has invalid start_time: {start_str}"))?;
    let end = NaiveDateTime::parse_from_str(&end_str, DATETIME_FORMAT)
        .with_context(|| format!("appointment {id} has invalid end_time: {end_str}"))?;

    Ok(Booking {
        id,
        master_id,
        service_id,
        client_name,
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn appointment(id: &str, master_id: MasterId, start: &str, end: &str) -> Booking {
        Booking {
            id: id.to_string(),
            master_id,
            service_id: None,
            client_name: Some("Alice".to_string()),
            start: dt(start),
            end: dt(end),
        }
    }

    fn seed_masters(conn: &Connection) {
        for (id, name) in [(1, "Anna"), (2, "Olga"), (3, "Irina")] {
            insert_master(
                conn,
                &Master {
                    id,
                    name: name.to_string(),
                    specialization: None,
                },
            )
            .unwrap();
        }
    }

    #[test]
    fn test_service_lookup_is_case_insensitive() {
        let conn = setup_db();
        insert_service(
            &conn,
            &Service {
                id: 10,
                name: "Manicure".to_string(),
                price: 1500.0,
                duration_minutes: 90,
            },
        )
        .unwrap();

        let service = find_service_by_name(&conn, "  manicure ").unwrap().unwrap();
        assert_eq!(service.id, 10);
        assert_eq!(service.duration_minutes, 90);
        assert!(find_service_by_name(&conn, "pedicure").unwrap().is_none());
    }

    #[test]
    fn test_masters_for_service() {
        let conn = setup_db();
        seed_masters(&conn);
        insert_service(
            &conn,
            &Service {
                id: 10,
                name: "Manicure".to_string(),
                price: 1500.0,
                duration_minutes: 90,
            },
        )
        .unwrap();
        assign_service(&conn, 3, 10).unwrap();
        assign_service(&conn, 1, 10).unwrap();
        assign_service(&conn, 1, 10).unwrap();

        let masters = masters_for_service(&conn, 10).unwrap();
        let ids: Vec<MasterId> = masters.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_schedule_upsert_and_lookup() {
        let conn = setup_db();
        seed_masters(&conn);
        let start = parse_schedule_time("09:00").unwrap();
        let end = parse_schedule_time("18:00:00").unwrap();
        upsert_master_schedule(&conn, 1, d("2025-06-16"), start, end).unwrap();
        upsert_master_schedule(&conn, 1, d("2025-06-16"), start, parse_schedule_time("15:00").unwrap())
            .unwrap();

        let row = get_master_schedule(&conn, 1, d("2025-06-16")).unwrap();
        assert_eq!(row, Some(("09:00".to_string(), "15:00".to_string())));
        assert!(get_master_schedule(&conn, 1, d("2025-06-17")).unwrap().is_none());
    }

    #[test]
    fn test_appointments_filtered_by_day_and_master() {
        let conn = setup_db();
        seed_masters(&conn);
        create_appointment(&conn, &appointment("a1", 1, "2025-06-16 14:00", "2025-06-16 15:00")).unwrap();
        create_appointment(&conn, &appointment("a2", 2, "2025-06-16 10:00", "2025-06-16 11:00")).unwrap();
        create_appointment(&conn, &appointment("a3", 3, "2025-06-16 10:00", "2025-06-16 11:00")).unwrap();
        create_appointment(&conn, &appointment("a4", 1, "2025-06-17 00:00", "2025-06-17 01:00")).unwrap();
        create_appointment(&conn, &appointment("a5", 1, "2025-06-16 00:00", "2025-06-16 00:30")).unwrap();

        let bookings = get_appointments_for_masters_on_date(&conn, &[1, 2], d("2025-06-16")).unwrap();
        let ids: Vec<&str> = bookings.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a5", "a2", "a1"]);
        assert_eq!(bookings[2].start, dt("2025-06-16 14:00"));

        assert!(get_appointments_for_masters_on_date(&conn, &[], d("2025-06-16"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_find_overlapping_appointment() {
        let conn = setup_db();
        seed_masters(&conn);
        create_appointment(&conn, &appointment("a1", 1, "2025-06-16 10:00", "2025-06-16 11:00")).unwrap();

        let hit = find_overlapping_appointment(&conn, 1, &dt("2025-06-16 10:30"), &dt("2025-06-16 11:30"), None)
            .unwrap();
        assert_eq!(hit.map(|b| b.id), Some("a1".to_string()));

        // Adjacent slots do not overlap
        assert!(find_overlapping_appointment(&conn, 1, &dt("2025-06-16 11:00"), &dt("2025-06-16 12:00"), None)
            .unwrap()
            .is_none());
        assert!(find_overlapping_appointment(&conn, 2, &dt("2025-06-16 10:00"), &dt("2025-06-16 11:00"), None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_overlap_check_can_skip_the_moved_appointment() {
        let conn = setup_db();
        seed_masters(&conn);
        create_appointment(&conn, &appointment("a1", 1, "2025-06-16 10:00", "2025-06-16 11:00")).unwrap();

        let hit = find_overlapping_appointment(
            &conn,
            1,
            &dt("2025-06-16 10:30"),
            &dt("2025-06-16 11:30"),
            Some("a1"),
        )
        .unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn test_update_and_delete_appointment() {
        let conn = setup_db();
        seed_masters(&conn);
        create_appointment(&conn, &appointment("a1", 1, "2025-06-16 10:00", "2025-06-16 11:00")).unwrap();

        assert!(update_appointment_time(&conn, "a1", &dt("2025-06-17 12:00"), &dt("2025-06-17 13:00")).unwrap());
        let moved = get_appointment_by_id(&conn, "a1").unwrap().unwrap();
        assert_eq!(moved.start, dt("2025-06-17 12:00"));
        assert_eq!(moved.end, dt("2025-06-17 13:00"));

        assert!(delete_appointment(&conn, "a1").unwrap());
        assert!(get_appointment_by_id(&conn, "a1").unwrap().is_none());
        assert!(!delete_appointment(&conn, "a1").unwrap());
        assert!(!update_appointment_time(&conn, "a1", &dt("2025-06-17 12:00"), &dt("2025-06-17 13:00")).unwrap());
    }

    #[test]
    fn test_upcoming_appointments_for_client() {
        let conn = setup_db();
        seed_masters(&conn);
        create_appointment(&conn, &appointment("past", 1, "2025-06-10 10:00", "2025-06-10 11:00")).unwrap();
        create_appointment(&conn, &appointment("late", 2, "2025-06-18 10:00", "2025-06-18 11:00")).unwrap();
        create_appointment(&conn, &appointment("soon", 1, "2025-06-16 10:00", "2025-06-16 11:00")).unwrap();
        let mut other = appointment("other", 1, "2025-06-17 10:00", "2025-06-17 11:00");
        other.client_name = Some("Bob".to_string());
        create_appointment(&conn, &other).unwrap();

        let upcoming = get_upcoming_appointments_for_client(&conn, " alice ", &dt("2025-06-15 09:00")).unwrap();
        let ids: Vec<&str> = upcoming.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["soon", "late"]);
    }

    #[test]
    fn test_list_services_and_lookup_by_id() {
        let conn = setup_db();
        for (id, name) in [(11, "Pedicure"), (10, "Manicure")] {
            insert_service(
                &conn,
                &Service {
                    id,
                    name: name.to_string(),
                    price: 1500.0,
                    duration_minutes: 60,
                },
            )
            .unwrap();
        }

        let names: Vec<String> = list_services(&conn).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Manicure", "Pedicure"]);
        assert_eq!(get_service_by_id(&conn, 11).unwrap().map(|s| s.name), Some("Pedicure".to_string()));
        assert!(get_service_by_id(&conn, 99).unwrap().is_none());
    }
}
