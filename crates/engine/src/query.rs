//! Query: filtered, sorted and projected view over a table
//!
//! A query is built from the table contents at the time
//! [`Table::query`](crate::Table::query) was called. It has two states:
//!
//! - **building**: filters (`eq`, `gt`, `has_any_of`, `filter_by`, ...) are
//!   applied immediately; sort keys, pagination and projection are recorded
//! - **finalized**: the first call to a result accessor sorts, slices and
//!   caches the result; every further builder call fails with `QueryState`
//!
//! ```ignore
//! let mut q = people.query()?;
//! let young = q.lt("age", 30)?.ascend("name")?.limit(10)?.results()?;
//! ```

use coffer_core::codec::kind_name;
use coffer_core::{thaw, Error, Item, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// Mean Earth radius used for haversine distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

type Comparator = Box<dyn Fn(&Item, &Item) -> Ordering + Send + Sync>;

enum SortKey {
    Field {
        field: String,
        descending: bool,
    },
    Distance {
        field: String,
        origin: (f64, f64),
        descending: bool,
    },
    Custom(Comparator),
}

/// Filtered view over a table snapshot
pub struct Query {
    label: String,
    items: Vec<Arc<Item>>,
    offset: usize,
    limit: Option<usize>,
    sort_keys: Vec<SortKey>,
    select: Option<Vec<String>>,
    hide: Vec<String>,
    finalized: Option<Vec<Arc<Item>>>,
}

impl Query {
    pub(crate) fn new(label: &str, items: Vec<Arc<Item>>) -> Self {
        Query {
            label: label.to_string(),
            items,
            offset: 0,
            limit: None,
            sort_keys: Vec::new(),
            select: None,
            hide: Vec::new(),
            finalized: None,
        }
    }

    /// Label of the queried table
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True once a result accessor has run
    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    // ========== Pagination ==========

    /// Skip the first `n` results
    pub fn offset(&mut self, n: usize) -> Result<&mut Self> {
        self.building()?;
        self.offset = n;
        Ok(self)
    }

    /// Return at most `n` results
    pub fn limit(&mut self, n: usize) -> Result<&mut Self> {
        self.building()?;
        self.limit = Some(n);
        Ok(self)
    }

    // ========== Sorting ==========

    /// Sort ascending by `field`; later keys break ties
    pub fn ascend(&mut self, field: &str) -> Result<&mut Self> {
        self.push_key(SortKey::Field {
            field: field.to_string(),
            descending: false,
        })
    }

    /// Sort descending by `field`
    pub fn descend(&mut self, field: &str) -> Result<&mut Self> {
        self.push_key(SortKey::Field {
            field: field.to_string(),
            descending: true,
        })
    }

    /// Sort by distance from `(lat, lon)`, nearest first
    ///
    /// `field` must hold `[lat, lon]` in degrees.
    pub fn ascend_haversine(&mut self, field: &str, lat: f64, lon: f64) -> Result<&mut Self> {
        self.push_key(SortKey::Distance {
            field: field.to_string(),
            origin: (lat, lon),
            descending: false,
        })
    }

    /// Sort by distance from `(lat, lon)`, farthest first
    pub fn descend_haversine(&mut self, field: &str, lat: f64, lon: f64) -> Result<&mut Self> {
        self.push_key(SortKey::Distance {
            field: field.to_string(),
            origin: (lat, lon),
            descending: true,
        })
    }

    /// Sort with a caller-supplied comparator
    pub fn sort_by<F>(&mut self, compare: F) -> Result<&mut Self>
    where
        F: Fn(&Item, &Item) -> Ordering + Send + Sync + 'static,
    {
        self.push_key(SortKey::Custom(Box::new(compare)))
    }

    // ========== Range filters ==========

    /// Keep items whose `field` is greater than `value`
    pub fn gt(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.range(field, value.into(), |o| o == Ordering::Greater)
    }

    /// Keep items whose `field` is greater than or equal to `value`
    pub fn gte(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.range(field, value.into(), |o| o != Ordering::Less)
    }

    /// Keep items whose `field` is less than `value`
    pub fn lt(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.range(field, value.into(), |o| o == Ordering::Less)
    }

    /// Keep items whose `field` is less than or equal to `value`
    pub fn lte(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.range(field, value.into(), |o| o != Ordering::Greater)
    }

    // ========== Equality filters ==========

    /// Keep items whose `field` equals `value`
    ///
    /// Numbers compare by value, so `23` matches `23.0`.
    pub fn eq(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        self.retain(|item| item.get(field).map_or(false, |v| values_equal(v, &value)))
    }

    /// Keep items whose `field` is absent or differs from `value`
    pub fn neq(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        self.retain(|item| !item.get(field).map_or(false, |v| values_equal(v, &value)))
    }

    // ========== Array filters ==========

    /// Keep items whose array `field` contains `value`
    pub fn has(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        self.retain(|item| array_at(item, field).map_or(false, |a| contains(a, &value)))
    }

    /// Keep items whose array `field` contains at least one of `values`
    pub fn has_any_of<I, V>(&mut self, field: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_operands(values);
        self.retain(|item| {
            array_at(item, field).map_or(false, |a| values.iter().any(|v| contains(a, v)))
        })
    }

    /// Keep items whose array `field` contains every one of `values`
    pub fn has_all_of<I, V>(&mut self, field: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_operands(values);
        self.retain(|item| {
            array_at(item, field).map_or(false, |a| values.iter().all(|v| contains(a, v)))
        })
    }

    /// Keep items whose `field` contains none of `values`
    ///
    /// Items where `field` is not an array always match.
    pub fn has_none_of_any<I, V>(&mut self, field: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_operands(values);
        self.retain(|item| {
            array_at(item, field).map_or(true, |a| !values.iter().any(|v| contains(a, v)))
        })
    }

    /// Keep items whose `field` does not contain all of `values`
    ///
    /// Items where `field` is not an array always match.
    pub fn has_none_of_all<I, V>(&mut self, field: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_operands(values);
        self.retain(|item| {
            array_at(item, field).map_or(true, |a| !values.iter().all(|v| contains(a, v)))
        })
    }

    /// Keep items for which `predicate` returns true
    pub fn filter_by<F>(&mut self, predicate: F) -> Result<&mut Self>
    where
        F: Fn(&Item) -> bool,
    {
        self.retain(predicate)
    }

    // ========== Projection ==========

    /// Only return the named fields (plus `id`) from the cloned accessors
    pub fn select<I, S>(&mut self, fields: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.building()?;
        self.select = Some(fields.into_iter().map(Into::into).collect());
        Ok(self)
    }

    /// Drop the named fields from the cloned accessors
    pub fn hide<I, S>(&mut self, fields: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.building()?;
        self.hide.extend(fields.into_iter().map(Into::into));
        Ok(self)
    }

    // ========== Results ==========

    /// Shared stored items
    ///
    /// Fails when a projection was requested; use
    /// [`Query::results_cloned`] for projected results.
    pub fn results(&mut self) -> Result<Vec<Arc<Item>>> {
        self.reject_projection("results")?;
        Ok(self.finalize()?.to_vec())
    }

    /// Independent copies with `select` then `hide` applied
    pub fn results_cloned(&mut self) -> Result<Vec<Item>> {
        let results = self.finalize()?.to_vec();
        Ok(results.iter().map(|item| self.project(item)).collect())
    }

    /// First result, if any
    pub fn first_result(&mut self) -> Result<Option<Arc<Item>>> {
        self.reject_projection("first_result")?;
        Ok(self.finalize()?.first().cloned())
    }

    /// Copy of the first result, if any
    pub fn first_result_cloned(&mut self) -> Result<Option<Item>> {
        let first = self.finalize()?.first().cloned();
        Ok(first.map(|item| self.project(&item)))
    }

    /// True if at least one result remains after pagination
    pub fn has_results(&mut self) -> Result<bool> {
        Ok(!self.finalize()?.is_empty())
    }

    /// Number of results after pagination
    pub fn count_results(&mut self) -> Result<usize> {
        Ok(self.finalize()?.len())
    }

    // ========== Internals ==========

    fn building(&self) -> Result<()> {
        if self.finalized.is_some() {
            return Err(Error::query_state(format!(
                "query on table '{}' is already finalized",
                self.label
            )));
        }
        Ok(())
    }

    fn push_key(&mut self, key: SortKey) -> Result<&mut Self> {
        self.building()?;
        self.sort_keys.push(key);
        Ok(self)
    }

    fn retain(&mut self, keep: impl Fn(&Item) -> bool) -> Result<&mut Self> {
        self.building()?;
        self.items.retain(|item| keep(item.as_ref()));
        Ok(self)
    }

    fn range(
        &mut self,
        field: &str,
        operand: Value,
        accept: impl Fn(Ordering) -> bool,
    ) -> Result<&mut Self> {
        self.building()?;
        if !matches!(operand, Value::Number(_) | Value::String(_)) {
            return Err(Error::query_state(format!(
                "range operand for '{}' must be a number or string, got {}",
                field,
                kind_name(&operand)
            )));
        }
        self.retain(|item| {
            item.get(field)
                .and_then(|v| compare_scalars(v, &operand))
                .map_or(false, &accept)
        })
    }

    fn reject_projection(&self, accessor: &str) -> Result<()> {
        if self.select.is_some() || !self.hide.is_empty() {
            return Err(Error::query_state(format!(
                "{} cannot apply select/hide; use the cloned accessor",
                accessor
            )));
        }
        Ok(())
    }

    fn project(&self, item: &Item) -> Item {
        let mut copy = thaw(item);
        if let Some(keep) = &self.select {
            copy.retain_fields(keep);
        }
        for field in &self.hide {
            copy.remove(field);
        }
        copy
    }

    /// Sort, paginate and cache on first use
    fn finalize(&mut self) -> Result<&[Arc<Item>]> {
        if self.finalized.is_none() {
            let mut items = std::mem::take(&mut self.items);
            if let Err(e) = self.sort(&mut items) {
                self.items = items;
                return Err(e);
            }
            let limit = self.limit.unwrap_or(usize::MAX);
            let page = items.into_iter().skip(self.offset).take(limit).collect();
            self.finalized = Some(page);
        }
        Ok(self.finalized.as_deref().unwrap_or_default())
    }

    fn sort(&self, items: &mut [Arc<Item>]) -> Result<()> {
        if self.sort_keys.is_empty() {
            return Ok(());
        }
        let mut failure = None;
        items.sort_by(|a, b| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            for key in &self.sort_keys {
                match compare_by(key, a, b) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ordering) => return ordering,
                    Err(e) => {
                        failure = Some(e);
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("label", &self.label)
            .field("candidates", &self.items.len())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("sort_keys", &self.sort_keys.len())
            .field("finalized", &self.finalized.is_some())
            .finish()
    }
}

fn compare_by(key: &SortKey, a: &Item, b: &Item) -> Result<Ordering> {
    match key {
        SortKey::Field { field, descending } => {
            let (x, y) = (a.get(field), b.get(field));
            let ordering = x
                .zip(y)
                .and_then(|(x, y)| compare_scalars(x, y))
                .ok_or_else(|| {
                    Error::query_state(format!(
                        "cannot sort on '{}': items '{}' ({}) and '{}' ({}) are not both numbers or both strings",
                        field,
                        a.id(),
                        x.map_or("missing", kind_name),
                        b.id(),
                        y.map_or("missing", kind_name)
                    ))
                })?;
            Ok(if *descending { ordering.reverse() } else { ordering })
        }
        SortKey::Distance {
            field,
            origin,
            descending,
        } => {
            let da = distance_from(a, field, *origin)?;
            let db = distance_from(b, field, *origin)?;
            let ordering = da.total_cmp(&db);
            Ok(if *descending { ordering.reverse() } else { ordering })
        }
        SortKey::Custom(compare) => Ok(compare(a, b)),
    }
}

fn distance_from(item: &Item, field: &str, (lat, lon): (f64, f64)) -> Result<f64> {
    let point = item
        .get(field)
        .and_then(Value::as_array)
        .filter(|pair| pair.len() == 2)
        .and_then(|pair| Some((pair[0].as_f64()?, pair[1].as_f64()?)));
    match point {
        Some((plat, plon)) => Ok(haversine_km((lat, lon), (plat, plon))),
        None => Err(Error::query_state(format!(
            "field '{}' of item '{}' is not a [lat, lon] pair",
            field,
            item.id()
        ))),
    }
}

/// Great-circle distance in kilometres between two `(lat, lon)` points
pub fn haversine_km((lat1, lon1): (f64, f64), (lat2, lon2): (f64, f64)) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Order two values of the same scalar kind; `None` otherwise
fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Structural equality where numbers compare by value
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

fn array_at<'a>(item: &'a Item, field: &str) -> Option<&'a Vec<Value>> {
    item.get(field).and_then(Value::as_array)
}

fn contains(array: &[Value], value: &Value) -> bool {
    array.iter().any(|v| values_equal(v, value))
}

fn collect_operands<I, V>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(Into::into).collect()
}
