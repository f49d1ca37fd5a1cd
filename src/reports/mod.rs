pub mod dispatcher;
pub mod engine;

use once_cell::sync::Lazy;
use serde::Serialize;

/// One point in a result series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    /// Secondary grouping for multi-series charts; only the monthly-trends
    /// report populates this.
    pub group: Option<String>,
    pub value: f64,
}

/// A reference value attached to a series, drawn alongside the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub caption: &'static str,
    pub value: f64,
}

/// Ordered (label, value) series produced by one report execution and
/// consumed exactly once by a rendering sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSeries {
    pub points: Vec<SeriesPoint>,
    pub annotation: Option<Annotation>,
}

impl ResultSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Grouping keys available to catalog queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupKey {
    Diagnosis,
    Medicine,
    /// Doctor name lower-cased, trimmed, inner whitespace collapsed; the
    /// display label is re-derived from this key alone.
    DoctorNormalized,
}

/// Aggregate functions available to catalog queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Count,
    SumPrice,
}

/// Query plan shapes the engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryPlan {
    /// Group by `key`, order by the aggregate descending (ties by
    /// first-seen order), keep the top `top` groups.
    TopGroups {
        key: GroupKey,
        aggregate: Aggregate,
        top: usize,
    },
    /// Distinct diagnoses seen per month, chronological.
    DiagnosesPerMonth,
    /// Two-phase: pick the overall top `top` diagnoses, then count cases
    /// per (month, diagnosis) over the full cross-product.
    MonthlyTrends { top: usize },
    /// Equal-width histogram over positive prices, annotated with the mean.
    PriceHistogram { bins: usize },
}

/// How a series should be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartKind {
    BarHorizontal,
    BarVertical,
    GroupedBar,
    Histogram,
}

/// Rendering directives handed to the sink together with the series.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub kind: ChartKind,
    /// File stem for image sinks.
    pub name: &'static str,
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
}

/// One entry of the fixed report catalog.
#[derive(Debug, Clone)]
pub struct ReportSpec {
    pub id: u8,
    pub menu_label: &'static str,
    pub plan: QueryPlan,
    pub style: ChartStyle,
}

/// The fixed report catalog. Ids are dense and ordered so the menu maps
/// selections 1:1; that shape is asserted on first access.
pub static CATALOG: Lazy<Vec<ReportSpec>> = Lazy::new(|| {
    let catalog = vec![
        ReportSpec {
            id: 1,
            menu_label: "Most Common Diagnoses",
            plan: QueryPlan::TopGroups {
                key: GroupKey::Diagnosis,
                aggregate: Aggregate::Count,
                top: 10,
            },
            style: ChartStyle {
                kind: ChartKind::BarHorizontal,
                name: "common_diagnoses",
                title: "Top 10 Most Common Diagnoses",
                x_label: "Number of Cases",
                y_label: "Diagnosis",
            },
        },
        ReportSpec {
            id: 2,
            menu_label: "Monthly Diagnosis Trends",
            plan: QueryPlan::MonthlyTrends { top: 5 },
            style: ChartStyle {
                kind: ChartKind::GroupedBar,
                name: "monthly_trends",
                title: "Monthly Cases of Top 5 Diagnoses",
                x_label: "Month",
                y_label: "Number of Cases",
            },
        },
        ReportSpec {
            id: 3,
            menu_label: "Most Prescribed Medicines",
            plan: QueryPlan::TopGroups {
                key: GroupKey::Medicine,
                aggregate: Aggregate::Count,
                top: 10,
            },
            style: ChartStyle {
                kind: ChartKind::BarHorizontal,
                name: "top_medicines",
                title: "Top 10 Most Prescribed Medicines",
                x_label: "Prescription Count",
                y_label: "Medicine",
            },
        },
        ReportSpec {
            id: 4,
            menu_label: "New Emerging Diagnoses",
            plan: QueryPlan::DiagnosesPerMonth,
            style: ChartStyle {
                kind: ChartKind::BarVertical,
                name: "emerging_diagnoses",
                title: "Distinct Diagnoses Found Each Month",
                x_label: "Month",
                y_label: "Distinct Diagnoses",
            },
        },
        ReportSpec {
            id: 5,
            menu_label: "Doctor Specific Prescriptions",
            plan: QueryPlan::TopGroups {
                key: GroupKey::DoctorNormalized,
                aggregate: Aggregate::Count,
                top: 5,
            },
            style: ChartStyle {
                kind: ChartKind::BarHorizontal,
                name: "doctor_patterns",
                title: "Top 5 Busiest Doctors",
                x_label: "Number of Prescriptions",
                y_label: "Doctor",
            },
        },
        ReportSpec {
            id: 6,
            menu_label: "Revenue by Diagnosis",
            plan: QueryPlan::TopGroups {
                key: GroupKey::Diagnosis,
                aggregate: Aggregate::SumPrice,
                top: 10,
            },
            style: ChartStyle {
                kind: ChartKind::BarHorizontal,
                name: "revenue_by_diagnosis",
                title: "Top 10 Revenue Generating Diagnoses",
                x_label: "Total Revenue",
                y_label: "Diagnosis",
            },
        },
        ReportSpec {
            id: 7,
            menu_label: "Medicine Price Distribution",
            plan: QueryPlan::PriceHistogram { bins: 10 },
            style: ChartStyle {
                kind: ChartKind::Histogram,
                name: "price_distribution",
                title: "Common Medicine Prices",
                x_label: "Price",
                y_label: "Count",
            },
        },
        ReportSpec {
            id: 8,
            menu_label: "Doctor Specific Revenue",
            plan: QueryPlan::TopGroups {
                key: GroupKey::DoctorNormalized,
                aggregate: Aggregate::SumPrice,
                top: 5,
            },
            style: ChartStyle {
                kind: ChartKind::BarHorizontal,
                name: "doctor_revenue",
                title: "Top 5 Doctors by Revenue",
                x_label: "Total Revenue",
                y_label: "Doctor",
            },
        },
    ];
    for (position, spec) in catalog.iter().enumerate() {
        assert_eq!(
            spec.id as usize,
            position + 1,
            "report catalog ids must be dense and ordered"
        );
    }
    catalog
});

/// Looks up a catalog entry by its menu id.
pub fn report_by_id(id: u8) -> Option<&'static ReportSpec> {
    CATALOG.iter().find(|spec| spec.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_dense_and_exhaustive() {
        assert_eq!(CATALOG.len(), 8);
        for (position, spec) in CATALOG.iter().enumerate() {
            assert_eq!(spec.id as usize, position + 1);
        }
    }

    #[test]
    fn every_report_is_reachable_by_id() {
        for spec in CATALOG.iter() {
            assert_eq!(report_by_id(spec.id).unwrap().id, spec.id);
        }
        assert!(report_by_id(0).is_none());
        assert!(report_by_id(99).is_none());
    }
}
