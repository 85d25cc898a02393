//! Filtering, sorting and pagination over item collections.
//!
//! These are pure functions; resources call them on a snapshot copy of their
//! items so no lock is held while a list is being shaped.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::item::{
    stringify, ResourceItem, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD,
};

/// Page size used when the caller asks for a non-positive limit.
pub const DEFAULT_LIMIT: i64 = 100;

/// Query options for listing a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    /// Maximum items per page. Non-positive means [`DEFAULT_LIMIT`].
    pub limit: i64,
    /// Number of items to skip. Negative values clamp to 0.
    pub offset: i64,
    /// Field to sort by. Empty means `createdAt`.
    pub sort: String,
    /// `"asc"` (default) or `"desc"`.
    pub order: String,
    /// Exact-match field filters.
    pub filters: BTreeMap<String, String>,
    /// Parent key value for nested resources.
    pub parent_id: Option<String>,
    /// Field holding the parent key.
    pub parent_field: Option<String>,
}

impl Filter {
    /// Returns `true` when `order` asks for descending results.
    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.order.eq_ignore_ascii_case("desc")
    }
}

/// Metadata attached to every list page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub count: usize,
}

/// One page of a list result, serialized as the paginated list envelope
/// `{"data": [...], "meta": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    pub data: Vec<ResourceItem>,
    pub meta: ListMeta,
}

/// Keeps the items matching the parent scope and every exact-match filter.
#[must_use]
pub fn apply_filters(items: Vec<ResourceItem>, filter: &Filter) -> Vec<ResourceItem> {
    let parent = match (&filter.parent_field, &filter.parent_id) {
        (Some(field), Some(id)) if !field.is_empty() => Some((field.as_str(), id.as_str())),
        _ => None,
    };

    if parent.is_none() && filter.filters.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            if let Some((field, id)) = parent {
                match item.data.get(field) {
                    Some(v) if stringify(v) == id => {}
                    _ => return false,
                }
            }
            filter
                .filters
                .iter()
                .all(|(field, expected)| field_matches(item, field, expected))
        })
        .collect()
}

fn field_matches(item: &ResourceItem, field: &str, expected: &str) -> bool {
    if field == ID_FIELD {
        return item.id == expected;
    }
    item.data
        .get(field)
        .is_some_and(|v| stringify(v) == expected)
}

/// Sort key extracted from one item.
#[derive(Debug)]
enum SortValue<'a> {
    Missing,
    Str(&'a str),
    Time(DateTime<Utc>),
    Raw(&'a Value),
}

fn sort_value<'a>(item: &'a ResourceItem, field: &str) -> SortValue<'a> {
    match field {
        ID_FIELD => SortValue::Str(&item.id),
        CREATED_AT_FIELD => SortValue::Time(item.created_at),
        UPDATED_AT_FIELD => SortValue::Time(item.updated_at),
        _ => item.data.get(field).map_or(SortValue::Missing, SortValue::Raw),
    }
}

/// Sorts items in place by `field` (default `createdAt`). The sort is stable,
/// so items with equal keys keep their relative order.
pub fn sort_items(items: &mut [ResourceItem], field: &str, order: &str) {
    let field = if field.is_empty() { CREATED_AT_FIELD } else { field };
    let descending = order.eq_ignore_ascii_case("desc");

    items.sort_by(|a, b| {
        let ord = compare_sort_values(&sort_value(a, field), &sort_value(b, field));
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn compare_sort_values(a: &SortValue<'_>, b: &SortValue<'_>) -> Ordering {
    match (a, b) {
        (SortValue::Missing, SortValue::Missing) => Ordering::Equal,
        (SortValue::Missing, _) => Ordering::Less,
        (_, SortValue::Missing) => Ordering::Greater,
        (SortValue::Str(x), SortValue::Str(y)) => x.cmp(y),
        (SortValue::Time(x), SortValue::Time(y)) => x.cmp(y),
        (SortValue::Raw(x), SortValue::Raw(y)) => compare_values(x, y),
        (x, y) => sort_value_text(x).cmp(&sort_value_text(y)),
    }
}

fn sort_value_text(v: &SortValue<'_>) -> String {
    match v {
        SortValue::Missing => String::new(),
        SortValue::Str(s) => (*s).to_string(),
        SortValue::Time(t) => crate::item::format_time(*t),
        SortValue::Raw(v) => stringify(v),
    }
}

/// Orders two dynamic values by runtime type.
///
/// Values of different types order by type: `null`, booleans, numbers,
/// strings, arrays, objects. Within a type, strings compare lexically,
/// booleans `false < true`, and numbers by value; an integer and a float
/// with the same value order the float first. Arrays and objects compare
/// their stringified forms. The result is a total order.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => number_key(x).cmp(&number_key(y)),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| stringify(a).cmp(&stringify(b))),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Approximate value first, then the exact integer when there is one.
fn number_key(n: &serde_json::Number) -> (OrderedFloat<f64>, Option<i128>) {
    let exact = n
        .as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from));
    (OrderedFloat(n.as_f64().unwrap_or(f64::NAN)), exact)
}

/// Returns the requested page and the total count before pagination.
///
/// A negative offset behaves as 0, an offset past the end yields an empty
/// page, and a non-positive limit defaults to [`DEFAULT_LIMIT`].
#[must_use]
pub fn paginate(items: Vec<ResourceItem>, offset: i64, limit: i64) -> (Vec<ResourceItem>, usize) {
    let total = items.len();
    let (offset, limit) = normalize_window(offset, limit);
    if offset >= total {
        return (Vec::new(), total);
    }
    let page = items.into_iter().skip(offset).take(limit).collect();
    (page, total)
}

/// Clamps a raw `(offset, limit)` pair the same way [`paginate`] does.
#[must_use]
pub fn normalize_window(offset: i64, limit: i64) -> (usize, usize) {
    let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
    let limit = if limit <= 0 { DEFAULT_LIMIT } else { limit };
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    (offset, limit)
}

/// Runs filter, sort and paginate in order and assembles the page envelope.
#[must_use]
pub fn query(items: Vec<ResourceItem>, filter: &Filter) -> ListPage {
    let mut filtered = apply_filters(items, filter);
    sort_items(&mut filtered, &filter.sort, &filter.order);
    let (page, total) = paginate(filtered, filter.offset, filter.limit);
    let (offset, limit) = normalize_window(filter.offset, filter.limit);
    ListPage {
        meta: ListMeta {
            total,
            limit,
            offset,
            count: page.len(),
        },
        data: page,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn item(id: &str, v: Value, secs: i64) -> ResourceItem {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs);
        ResourceItem::new(id, v.as_object().cloned().unwrap(), t)
    }

    fn ids(items: &[ResourceItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn filter_by_multiple_fields_is_exact() {
        let items = vec![
            item("1", json!({"status": "active", "type": "admin"}), 0),
            item("2", json!({"status": "inactive", "type": "user"}), 1),
            item("3", json!({"status": "active", "type": "user"}), 2),
        ];
        let mut filter = Filter::default();
        filter.filters.insert("status".into(), "active".into());
        filter.filters.insert("type".into(), "user".into());

        let out = apply_filters(items, &filter);
        assert_eq!(ids(&out), vec!["3"]);
    }

    #[test]
    fn filter_has_no_substring_matching() {
        let items = vec![item("1", json!({"name": "alice"}), 0)];
        let mut filter = Filter::default();
        filter.filters.insert("name".into(), "ali".into());
        assert!(apply_filters(items, &filter).is_empty());
    }

    #[test]
    fn filter_on_id_and_numbers() {
        let items = vec![
            item("a", json!({"age": 30}), 0),
            item("b", json!({"age": 31}), 1),
        ];
        let mut by_id = Filter::default();
        by_id.filters.insert("id".into(), "b".into());
        assert_eq!(ids(&apply_filters(items.clone(), &by_id)), vec!["b"]);

        let mut by_age = Filter::default();
        by_age.filters.insert("age".into(), "30".into());
        assert_eq!(ids(&apply_filters(items, &by_age)), vec!["a"]);
    }

    #[test]
    fn parent_filter_compares_stringified() {
        let items = vec![
            item("o1", json!({"userId": "u1"}), 0),
            item("o2", json!({"userId": "u2"}), 1),
            item("o3", json!({"userId": 1}), 2),
        ];
        let filter = Filter {
            parent_field: Some("userId".into()),
            parent_id: Some("u1".into()),
            ..Filter::default()
        };
        assert_eq!(ids(&apply_filters(items.clone(), &filter)), vec!["o1"]);

        let numeric = Filter {
            parent_field: Some("userId".into()),
            parent_id: Some("1".into()),
            ..Filter::default()
        };
        assert_eq!(ids(&apply_filters(items, &numeric)), vec!["o3"]);
    }

    #[test]
    fn default_sort_is_created_at() {
        let mut items = vec![
            item("late", json!({}), 10),
            item("early", json!({}), 1),
            item("mid", json!({}), 5),
        ];
        sort_items(&mut items, "", "");
        assert_eq!(ids(&items), vec!["early", "mid", "late"]);
        sort_items(&mut items, "", "desc");
        assert_eq!(ids(&items), vec!["late", "mid", "early"]);
    }

    #[test]
    fn sort_by_numbers_strings_and_id() {
        let mut items = vec![
            item("c", json!({"n": 2.5, "s": "b"}), 0),
            item("a", json!({"n": 10, "s": "c"}), 1),
            item("b", json!({"n": -1, "s": "a"}), 2),
        ];
        sort_items(&mut items, "n", "asc");
        assert_eq!(ids(&items), vec!["b", "c", "a"]);
        sort_items(&mut items, "s", "asc");
        assert_eq!(ids(&items), vec!["b", "c", "a"]);
        sort_items(&mut items, "id", "desc");
        assert_eq!(ids(&items), vec!["c", "b", "a"]);
    }

    #[test]
    fn sort_missing_fields_first() {
        let mut items = vec![item("x", json!({"n": 1}), 0), item("y", json!({}), 1)];
        sort_items(&mut items, "n", "asc");
        assert_eq!(ids(&items), vec!["y", "x"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut items = vec![
            item("1", json!({"g": "a"}), 3),
            item("2", json!({"g": "a"}), 1),
            item("3", json!({"g": "a"}), 2),
        ];
        sort_items(&mut items, "g", "desc");
        assert_eq!(ids(&items), vec!["1", "2", "3"]);
    }

    #[test]
    fn paginate_example() {
        let items: Vec<_> = (0..10).map(|i| item(&i.to_string(), json!({}), i)).collect();
        let (page, total) = paginate(items, 8, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(total, 10);
    }

    #[test]
    fn paginate_clamps_and_defaults() {
        let items: Vec<_> = (0..150).map(|i| item(&i.to_string(), json!({}), i)).collect();
        let (page, total) = paginate(items.clone(), -5, 0);
        assert_eq!(page.len(), 100);
        assert_eq!(page[0].id, "0");
        assert_eq!(total, 150);

        let (page, _) = paginate(items, 150, 10);
        assert!(page.is_empty());
    }

    #[test]
    fn query_builds_meta() {
        let items: Vec<_> = (0..7).map(|i| item(&i.to_string(), json!({}), i)).collect();
        let page = query(
            items,
            &Filter {
                limit: 3,
                offset: 6,
                ..Filter::default()
            },
        );
        assert_eq!(
            page.meta,
            ListMeta {
                total: 7,
                limit: 3,
                offset: 6,
                count: 1
            }
        );
        let envelope = serde_json::to_value(&page).unwrap();
        assert_eq!(envelope["meta"]["total"], 7);
        assert_eq!(envelope["data"][0]["id"], "6");
    }

    #[test]
    fn compare_values_mixed_types() {
        assert_eq!(compare_values(&json!(1), &json!(1.5)), Ordering::Less);
        assert_eq!(compare_values(&json!(false), &json!(true)), Ordering::Less);
        assert_eq!(compare_values(&Value::Null, &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("9")), Ordering::Less);
        assert_eq!(compare_values(&json!("9"), &json!(9)), Ordering::Greater);
        assert_eq!(compare_values(&json!(1.0), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(u64::MAX), &json!(i64::MAX)), Ordering::Greater);
    }

    #[test]
    fn timestamp_strings_sort_lexically_in_any_input_order() {
        let keys = ["2024-01-01T23:00:00-05:00", "2024-01-02T00:00:00Z", "2024-01-01U"];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let mut items: Vec<_> = order
                .iter()
                .map(|&i| item(&i.to_string(), json!({"k": keys[i]}), 0))
                .collect();
            sort_items(&mut items, "k", "asc");
            assert_eq!(ids(&items), vec!["0", "2", "1"], "input order {order:?}");
        }
    }

    proptest! {
        #[test]
        fn paginate_bounds(len in 0usize..60, offset in -10i64..80, limit in -5i64..30) {
            let items: Vec<_> = (0..len).map(|i| item(&i.to_string(), json!({}), 0)).collect();
            let (page, total) = paginate(items, offset, limit);
            let effective_limit = if limit <= 0 { 100 } else { limit as usize };
            let effective_offset = offset.max(0) as usize;
            prop_assert_eq!(total, len);
            prop_assert!(page.len() <= effective_limit);
            if effective_offset >= len {
                prop_assert!(page.is_empty());
            } else {
                prop_assert_eq!(page.len(), effective_limit.min(len - effective_offset));
                prop_assert_eq!(&page[0].id, &effective_offset.to_string());
            }
        }

        #[test]
        fn sort_preserves_relative_order_of_ties(keys in proptest::collection::vec(0u8..4, 0..40)) {
            let mut items: Vec<_> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| item(&i.to_string(), json!({"k": k}), 0))
                .collect();
            sort_items(&mut items, "k", "asc");
            for pair in items.windows(2) {
                let ka = pair[0].data["k"].as_u64().unwrap();
                let kb = pair[1].data["k"].as_u64().unwrap();
                prop_assert!(ka <= kb);
                if ka == kb {
                    let ia: usize = pair[0].id.parse().unwrap();
                    let ib: usize = pair[1].id.parse().unwrap();
                    prop_assert!(ia < ib);
                }
            }
        }

        #[test]
        fn sorted_keys_do_not_depend_on_input_order(
            keys in proptest::collection::vec(
                prop_oneof![
                    Just(None),
                    (-3i64..3).prop_map(|n| Some(json!(n))),
                    (-3i64..3).prop_map(|n| Some(json!(n as f64 / 2.0))),
                    "[a-c0-9:TZ-]{0,4}".prop_map(|s| Some(json!(s))),
                ],
                0..24,
            ),
            seed in any::<u64>(),
            descending in any::<bool>(),
        ) {
            let build = |keys: &[Option<Value>]| -> Vec<ResourceItem> {
                keys.iter()
                    .enumerate()
                    .map(|(i, k)| {
                        let data = k.as_ref().map_or_else(|| json!({}), |k| json!({"k": k}));
                        item(&i.to_string(), data, 0)
                    })
                    .collect()
            };
            let sorted_keys = |mut items: Vec<ResourceItem>| -> Vec<Option<Value>> {
                sort_items(&mut items, "k", if descending { "desc" } else { "asc" });
                items.iter().map(|i| i.data.get("k").cloned()).collect()
            };

            let mut shuffled = keys.clone();
            let len = shuffled.len();
            let mut state = seed;
            for i in (1..len).rev() {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
                let j = usize::try_from(state >> 33).unwrap() % (i + 1);
                shuffled.swap(i, j);
            }
            let mut reversed = keys.clone();
            reversed.reverse();

            let expected = sorted_keys(build(&keys));
            prop_assert_eq!(&sorted_keys(build(&shuffled)), &expected);
            prop_assert_eq!(&sorted_keys(build(&reversed)), &expected);
        }
    }
}
