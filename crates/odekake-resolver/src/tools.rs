//! The agent-facing tool surface: each function answers with a JSON string
//! and folds every failure into a structured `error` field, never a panic.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use odekake_core::{parse_target_date, weekday_ja, FacilityTable};

use crate::resolver::Resolver;
use crate::verdict::ClosureVerdict;

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Checks one facility's closure for one date expression.
///
/// `today` anchors relative expressions like 明日; unknown facilities and
/// unparsable dates come back as structured errors.
pub async fn check_facility_closure(
    resolver: &Resolver,
    facility_name: &str,
    date_expr: &str,
    today: NaiveDate,
) -> String {
    let Some(rule) = resolver.table().find(facility_name) else {
        let names: Vec<&str> = resolver.table().all().iter().map(|f| f.name.as_str()).collect();
        return to_json(&json!({
            "error": format!("施設が見つかりません: {facility_name}"),
            "available_facilities": names,
        }));
    };

    let Some(date) = parse_target_date(date_expr, today) else {
        return to_json(&ClosureVerdict::undetermined(
            &rule.name,
            date_expr,
            &format!("日付を解釈できません: {date_expr}"),
        ));
    };

    let verdict = resolver.resolve(rule, date).await;
    to_json(&verdict)
}

/// Resolves the whole facility set for one date expression.
pub async fn check_all_facilities_closure(
    resolver: &Resolver,
    date_expr: &str,
    today: NaiveDate,
) -> String {
    let Some(date) = parse_target_date(date_expr, today) else {
        return to_json(&json!({
            "error": format!("日付を解釈できません: {date_expr}"),
            "date": date_expr,
        }));
    };
    let summary = resolver.resolve_all(date).await;
    to_json(&summary)
}

/// Lists the facility set with its contact metadata.
#[must_use]
pub fn list_available_facilities(table: &FacilityTable) -> String {
    let facilities: Vec<_> = table
        .all()
        .iter()
        .map(|f| {
            let regular_closed: Vec<&str> = f
                .regular_closed
                .iter()
                .map(|d| weekday_ja(d.to_weekday()))
                .collect();
            json!({
                "slug": f.slug,
                "name": f.name,
                "aliases": f.aliases,
                "url": f.url,
                "regular_closed": regular_closed,
                "phone": f.phone,
                "address": f.address,
                "notes": f.notes,
            })
        })
        .collect();
    to_json(&json!({
        "total": table.len(),
        "facilities": facilities,
    }))
}
