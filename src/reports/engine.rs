use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use rusqlite::params;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::normalize::title_case;
use crate::storage::SqliteStore;

use super::{Aggregate, Annotation, GroupKey, QueryPlan, ReportSpec, ResultSeries, SeriesPoint};

/// Executes one catalog report against the store. An empty table yields an
/// empty series, never an error.
pub fn run_report(spec: &ReportSpec, store: &SqliteStore) -> Result<ResultSeries> {
    debug!(report = spec.style.name, "running report");
    match spec.plan {
        QueryPlan::TopGroups {
            key,
            aggregate,
            top,
        } => top_groups(store, key, aggregate, top),
        QueryPlan::DiagnosesPerMonth => diagnoses_per_month(store),
        QueryPlan::MonthlyTrends { top } => monthly_trends(store, top),
        QueryPlan::PriceHistogram { bins } => price_histogram(store, bins),
    }
}

fn group_expr(key: GroupKey) -> &'static str {
    match key {
        GroupKey::Diagnosis => "diagnosis",
        GroupKey::Medicine => "medicine_name",
        GroupKey::DoctorNormalized => "lower(trim(doctor_name))",
    }
}

fn aggregate_expr(aggregate: Aggregate) -> &'static str {
    match aggregate {
        Aggregate::Count => "COUNT(*)",
        Aggregate::SumPrice => "SUM(price)",
    }
}

/// Group-count/group-sum reports. Ties on the aggregate break by first-seen
/// order, which `MIN(rowid)` reproduces for insertion-ordered rows.
fn top_groups(
    store: &SqliteStore,
    key: GroupKey,
    aggregate: Aggregate,
    top: usize,
) -> Result<ResultSeries> {
    // Doctor groups are folded again in Rust after whitespace collapsing,
    // so their SQL query must not truncate early.
    let sql_limit: i64 = match key {
        GroupKey::DoctorNormalized => -1,
        _ => top as i64,
    };
    let sql = format!(
        "SELECT {group} AS grp, {aggregate} AS agg FROM prescriptions \
         GROUP BY grp ORDER BY agg DESC, MIN(rowid) ASC LIMIT ?1",
        group = group_expr(key),
        aggregate = aggregate_expr(aggregate),
    );
    let mut stmt = store.connection().prepare(&sql)?;
    let rows = stmt.query_map(params![sql_limit], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;

    let mut points = Vec::new();
    for row in rows {
        let (group, value) = row?;
        points.push(SeriesPoint {
            label: group,
            group: None,
            value,
        });
    }

    if key == GroupKey::DoctorNormalized {
        points = fold_doctor_groups(points);
        points.truncate(top);
    }
    Ok(ResultSeries {
        points,
        annotation: None,
    })
}

/// Collapses doctor keys that differ only in inner whitespace, re-derives
/// the display label from the key, and restores the ranking. The sort is
/// stable, so equal totals keep their first-seen order.
fn fold_doctor_groups(points: Vec<SeriesPoint>) -> Vec<SeriesPoint> {
    let mut folded: Vec<SeriesPoint> = Vec::new();
    for point in points {
        let label = title_case(&point.label);
        match folded.iter_mut().find(|existing| existing.label == label) {
            Some(existing) => existing.value += point.value,
            None => folded.push(SeriesPoint { label, ..point }),
        }
    }
    folded.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    folded
}

fn diagnoses_per_month(store: &SqliteStore) -> Result<ResultSeries> {
    let mut stmt = store.connection().prepare(
        "SELECT strftime('%Y-%m', date) AS month, COUNT(DISTINCT diagnosis) AS n \
         FROM prescriptions GROUP BY month ORDER BY month ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;

    let mut points = Vec::new();
    for row in rows {
        let (month, value) = row?;
        points.push(SeriesPoint {
            label: month,
            group: None,
            value,
        });
    }
    Ok(ResultSeries {
        points,
        annotation: None,
    })
}

/// Two-phase aggregation. Phase one selects the overall top diagnoses by
/// total count; phase two counts cases per (month, diagnosis) and fills the
/// full cross-product so every month carries a value for every selected
/// diagnosis, zero included. Months sort chronologically.
fn monthly_trends(store: &SqliteStore, top: usize) -> Result<ResultSeries> {
    let mut stmt = store.connection().prepare(
        "SELECT diagnosis FROM prescriptions \
         GROUP BY diagnosis ORDER BY COUNT(*) DESC, MIN(rowid) ASC LIMIT ?1",
    )?;
    let top_diagnoses: Vec<String> = stmt
        .query_map(params![top as i64], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    if top_diagnoses.is_empty() {
        return Ok(ResultSeries::empty());
    }

    let mut stmt = store.connection().prepare(
        "SELECT strftime('%Y-%m', date) AS month, diagnosis, COUNT(*) \
         FROM prescriptions GROUP BY month, diagnosis",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    // ISO year-month labels sort chronologically.
    let mut months: BTreeSet<String> = BTreeSet::new();
    let mut cells: HashMap<(String, String), f64> = HashMap::new();
    for row in rows {
        let (month, diagnosis, count) = row?;
        months.insert(month.clone());
        if top_diagnoses.contains(&diagnosis) {
            cells.insert((month, diagnosis), count);
        }
    }

    let mut points = Vec::new();
    for month in &months {
        for diagnosis in &top_diagnoses {
            let value = cells
                .get(&(month.clone(), diagnosis.clone()))
                .copied()
                .unwrap_or(0.0);
            points.push(SeriesPoint {
                label: month.clone(),
                group: Some(diagnosis.clone()),
                value,
            });
        }
    }
    Ok(ResultSeries {
        points,
        annotation: None,
    })
}

/// Histogram over positive prices: equal-width bins between the observed
/// min and max, plus the mean as annotation. An empty filtered set yields
/// an empty series with no annotation.
fn price_histogram(store: &SqliteStore, bins: usize) -> Result<ResultSeries> {
    let mut stmt = store
        .connection()
        .prepare("SELECT price FROM prescriptions WHERE price > ?1")?;
    let prices: Vec<f64> = stmt
        .query_map(params![0.0_f64], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    if prices.is_empty() {
        return Ok(ResultSeries::empty());
    }

    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / bins as f64;

    let mut counts = vec![0.0_f64; bins];
    for price in &prices {
        let bin = if width > 0.0 {
            (((price - min) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[bin] += 1.0;
    }

    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let points = counts
        .iter()
        .enumerate()
        .map(|(bin, &count)| SeriesPoint {
            label: format!(
                "{:.2}-{:.2}",
                min + bin as f64 * width,
                min + (bin + 1) as f64 * width
            ),
            group: None,
            value: count,
        })
        .collect();
    Ok(ResultSeries {
        points,
        annotation: Some(Annotation {
            caption: "Average price",
            value: mean,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Prescription;
    use crate::reports::report_by_id;
    use chrono::NaiveDate;

    fn record(patient: &str, doctor: &str, medicine: &str, date: &str, diagnosis: &str, price: f64) -> Prescription {
        Prescription {
            patient_id: patient.to_string(),
            doctor_name: doctor.to_string(),
            medicine_name: medicine.to_string(),
            dosage: String::new(),
            frequency: String::new(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            diagnosis: diagnosis.to_string(),
            notes: String::new(),
            price,
        }
    }

    fn seeded_store(records: &[Prescription]) -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let outcome = store.store_batch(records).unwrap();
        assert!(outcome.failures.is_empty());
        store
    }

    #[test]
    fn empty_table_yields_empty_series_for_every_report() {
        let store = SqliteStore::open_in_memory().unwrap();
        for spec in crate::reports::CATALOG.iter() {
            let series = run_report(spec, &store).unwrap();
            assert!(series.is_empty(), "report {} should be empty", spec.id);
        }
    }

    #[test]
    fn common_diagnoses_rank_descending_with_first_seen_ties() {
        let store = seeded_store(&[
            record("P1", "Dr. A", "M", "2024-01-01", "Flu", 1.0),
            record("P2", "Dr. A", "M", "2024-01-02", "Cold", 1.0),
            record("P3", "Dr. A", "M", "2024-01-03", "Cold", 1.0),
            record("P4", "Dr. A", "M", "2024-01-04", "Migraine", 1.0),
        ]);
        let spec = report_by_id(1).unwrap();
        let series = run_report(spec, &store).unwrap();
        let labels: Vec<&str> = series.points.iter().map(|p| p.label.as_str()).collect();
        // Flu and Migraine tie at 1; Flu was seen first.
        assert_eq!(labels, vec!["Cold", "Flu", "Migraine"]);
        assert_eq!(series.points[0].value, 2.0);
    }

    #[test]
    fn doctor_groups_collapse_case_and_whitespace() {
        let store = seeded_store(&[
            record("P1", "Dr. Lisa Ray", "M", "2024-01-01", "Flu", 10.0),
            record("P2", "dr.  lisa ray ", "M", "2024-01-02", "Flu", 5.0),
            record("P3", "Dr. Bob Cruz", "M", "2024-01-03", "Flu", 7.0),
        ]);

        let patterns = run_report(report_by_id(5).unwrap(), &store).unwrap();
        assert_eq!(patterns.points.len(), 2);
        assert_eq!(patterns.points[0].label, "Dr. Lisa Ray");
        assert_eq!(patterns.points[0].value, 2.0);

        let revenue = run_report(report_by_id(8).unwrap(), &store).unwrap();
        assert_eq!(revenue.points[0].label, "Dr. Lisa Ray");
        assert_eq!(revenue.points[0].value, 15.0);
        assert_eq!(revenue.points[1].value, 7.0);
    }

    #[test]
    fn monthly_trends_fill_the_full_cross_product() {
        let store = seeded_store(&[
            record("P1", "Dr. A", "M", "2024-01-10", "Flu", 1.0),
            record("P2", "Dr. A", "M", "2024-01-11", "Flu", 1.0),
            record("P3", "Dr. A", "M", "2024-02-01", "Cold", 1.0),
            record("P4", "Dr. A", "M", "2024-03-05", "Flu", 1.0),
        ]);
        let series = run_report(report_by_id(2).unwrap(), &store).unwrap();

        // 3 months x 2 diagnoses, month-major, zero-filled.
        assert_eq!(series.points.len(), 6);
        let cell = |month: &str, diagnosis: &str| {
            series
                .points
                .iter()
                .find(|p| p.label == month && p.group.as_deref() == Some(diagnosis))
                .map(|p| p.value)
        };
        assert_eq!(cell("2024-01", "Flu"), Some(2.0));
        assert_eq!(cell("2024-01", "Cold"), Some(0.0));
        assert_eq!(cell("2024-02", "Cold"), Some(1.0));
        assert_eq!(cell("2024-02", "Flu"), Some(0.0));
        assert_eq!(cell("2024-03", "Flu"), Some(1.0));
        assert_eq!(series.points[0].label, "2024-01");
        assert_eq!(series.points[4].label, "2024-03");
    }

    #[test]
    fn emerging_diagnoses_count_distinct_per_month() {
        let store = seeded_store(&[
            record("P1", "Dr. A", "M", "2024-01-10", "Flu", 1.0),
            record("P2", "Dr. A", "M", "2024-01-11", "Cold", 1.0),
            record("P3", "Dr. A", "M", "2024-01-12", "Flu", 1.0),
            record("P4", "Dr. A", "M", "2024-02-01", "Flu", 1.0),
        ]);
        let series = run_report(report_by_id(4).unwrap(), &store).unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].label, "2024-01");
        assert_eq!(series.points[0].value, 2.0);
        assert_eq!(series.points[1].value, 1.0);
    }

    #[test]
    fn price_histogram_filters_zero_prices_and_reports_mean() {
        let store = seeded_store(&[
            record("P1", "Dr. A", "M", "2024-01-01", "Flu", 0.0),
            record("P2", "Dr. A", "M", "2024-01-02", "Flu", 10.0),
            record("P3", "Dr. A", "M", "2024-01-03", "Flu", 20.0),
            record("P4", "Dr. A", "M", "2024-01-04", "Flu", 30.0),
        ]);
        let series = run_report(report_by_id(7).unwrap(), &store).unwrap();
        assert_eq!(series.points.len(), 10);
        let total: f64 = series.points.iter().map(|p| p.value).sum();
        assert_eq!(total, 3.0);
        assert_eq!(series.annotation.as_ref().unwrap().value, 20.0);
    }

    #[test]
    fn price_histogram_on_empty_filtered_set_has_no_annotation() {
        let store = seeded_store(&[
            record("P1", "Dr. A", "M", "2024-01-01", "Flu", 0.0),
        ]);
        let series = run_report(report_by_id(7).unwrap(), &store).unwrap();
        assert!(series.is_empty());
        assert!(series.annotation.is_none());
    }

    #[test]
    fn revenue_by_diagnosis_sums_prices() {
        let store = seeded_store(&[
            record("P1", "Dr. A", "M", "2024-01-01", "Flu", 10.0),
            record("P2", "Dr. A", "M", "2024-01-02", "Flu", 5.0),
            record("P3", "Dr. A", "M", "2024-01-03", "Cold", 40.0),
        ]);
        let series = run_report(report_by_id(6).unwrap(), &store).unwrap();
        assert_eq!(series.points[0].label, "Cold");
        assert_eq!(series.points[0].value, 40.0);
        assert_eq!(series.points[1].value, 15.0);
    }

    #[test]
    fn top_groups_respects_the_cap() {
        let records: Vec<Prescription> = (0..12)
            .map(|i| {
                record(
                    &format!("P{i}"),
                    "Dr. A",
                    &format!("Med{i}"),
                    "2024-01-01",
                    "Flu",
                    1.0,
                )
            })
            .collect();
        let store = seeded_store(&records);
        let series = run_report(report_by_id(3).unwrap(), &store).unwrap();
        assert_eq!(series.points.len(), 10);
    }
}
