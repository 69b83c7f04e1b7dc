//! Backend-independent conformance suite.
//!
//! Every scenario runs against a fresh adapter from an [`AdapterFactory`] and
//! touches only records whose ids start with `cf-`, so the suite can run
//! against a shared database. Scenarios clear those ids before and after.
//!
//! The [`conformance_tests!`](crate::conformance_tests) macro expands one
//! test per scenario for a factory; the `check` command calls [`run_suite`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::db::memory::{MemoryEngine, MemoryStore};
use crate::db::{
    Adapter, AdapterError, AdapterOptions, FindMany, IdGenerator, IdRequest, Operator, Record,
    SortBy, StorageAdapter, Value, WhereCondition,
};
use crate::record;

/// Builds migrated adapters for the suite.
pub trait AdapterFactory {
    fn name(&self) -> &str;

    /// A ready-to-use adapter. Storage must already exist.
    fn build(&self, options: AdapterOptions) -> Result<StorageAdapter, AdapterError>;
}

/// [`AdapterFactory`] from a name and a closure.
pub struct FnFactory<F> {
    name: String,
    build: F,
}

/// Wrap a closure as an [`AdapterFactory`].
pub fn factory<F>(name: impl Into<String>, build: F) -> FnFactory<F>
where
    F: Fn(AdapterOptions) -> Result<StorageAdapter, AdapterError>,
{
    FnFactory {
        name: name.into(),
        build,
    }
}

impl<F> AdapterFactory for FnFactory<F>
where
    F: Fn(AdapterOptions) -> Result<StorageAdapter, AdapterError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, options: AdapterOptions) -> Result<StorageAdapter, AdapterError> {
        (self.build)(options)
    }
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("{0}")]
    Assertion(String),
}

pub type Scenario = fn(&dyn AdapterFactory) -> Result<(), ScenarioError>;

/// Counting id generator. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct IdProbe {
    calls: Arc<AtomicUsize>,
}

impl IdProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdGenerator for IdProbe {
    fn generate(&self, _request: IdRequest<'_>) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        format!("cf-probe-{}", n)
    }
}

const USER: &str = "cf-u1";
const THREAD_IDS: [&str; 6] = ["cf-t1", "cf-t2", "cf-t3", "cf-t9", "cf-probe-1", "cf-probe-2"];
const DOCUMENT_IDS: [&str; 3] = ["cf-d1", "cf-d2", "cf-d3"];

fn in_ids(ids: &[&str]) -> WhereCondition {
    WhereCondition::new("id", Operator::In, ids.to_vec())
}

/// Restrict a filter to scenario records.
fn scoped(mut conditions: Vec<WhereCondition>) -> Vec<WhereCondition> {
    conditions.insert(0, in_ids(&THREAD_IDS));
    conditions
}

fn reset(adapter: &dyn Adapter) -> Result<(), AdapterError> {
    adapter.delete_many("document", &[in_ids(&DOCUMENT_IDS)])?;
    adapter.delete_many("thread", &[in_ids(&THREAD_IDS)])?;
    adapter.delete_many("user", &[WhereCondition::eq("id", USER)])?;
    Ok(())
}

fn with_adapter(
    factory: &dyn AdapterFactory,
    options: AdapterOptions,
    body: impl FnOnce(&StorageAdapter) -> Result<(), ScenarioError>,
) -> Result<(), ScenarioError> {
    let adapter = factory.build(options)?;
    reset(&adapter)?;
    let result = body(&adapter);
    reset(&adapter)?;
    result
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(message()))
    }
}

fn ensure_eq<T: PartialEq + std::fmt::Debug>(
    actual: T,
    expected: T,
    what: &str,
) -> Result<(), ScenarioError> {
    ensure(actual == expected, || {
        format!("{}: expected {:?}, got {:?}", what, expected, actual)
    })
}

fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("id").map(Value::to_text).unwrap_or_default())
        .collect()
}

fn id_set(records: &[Record]) -> BTreeSet<String> {
    ids(records).into_iter().collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn seed_user(adapter: &dyn Adapter) -> Result<(), AdapterError> {
    adapter.create(
        "user",
        record! { "id" => USER, "email" => "conformance@example.com", "name" => "Conformance" },
        None,
    )?;
    Ok(())
}

/// `cf-t1` General (private, 3), `cf-t2` alpha-room (public, pinned, 1),
/// `cf-t3` beta-room (public, 2).
fn seed_threads(adapter: &dyn Adapter) -> Result<(), AdapterError> {
    seed_user(adapter)?;
    let rows = [
        record! { "id" => "cf-t1", "title" => "General", "userId" => USER, "messageCount" => 3i64 },
        record! {
            "id" => "cf-t2", "title" => "alpha-room", "userId" => USER,
            "visibility" => "public", "pinned" => true, "messageCount" => 1i64,
        },
        record! {
            "id" => "cf-t3", "title" => "beta-room", "userId" => USER,
            "visibility" => "public", "messageCount" => 2i64,
        },
    ];
    for row in rows {
        adapter.create("thread", row, None)?;
    }
    Ok(())
}

fn seed_documents(adapter: &dyn Adapter) -> Result<(), AdapterError> {
    let rows = [
        record! { "id" => "cf-d1", "title" => "one", "content" => "alpha", "userId" => USER },
        record! { "id" => "cf-d2", "title" => "two", "content" => "beta", "userId" => USER },
        record! { "id" => "cf-d3", "title" => "three", "userId" => USER },
    ];
    for row in rows {
        adapter.create("document", row, None)?;
    }
    Ok(())
}

fn lowercase_titles(adapter: &dyn Adapter, sort: SortBy) -> Result<Vec<String>, AdapterError> {
    let rows = adapter.find_many("thread", &FindMany::filter(scoped(vec![])).sort(sort))?;
    Ok(rows
        .iter()
        .map(|r| r.get("title").map(Value::to_text).unwrap_or_default().to_ascii_lowercase())
        .collect())
}

fn find_ids(adapter: &dyn Adapter, query: FindMany) -> Result<Vec<String>, AdapterError> {
    Ok(ids(&adapter.find_many("thread", &query)?))
}

/// Create fills defaults; reading the record back returns the same values.
pub fn create(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_user(adapter)?;
        let created = adapter.create(
            "thread",
            record! { "id" => "cf-t1", "title" => "General", "userId" => USER },
            None,
        )?;
        ensure_eq(created.get("title"), Some(&Value::from("General")), "title")?;
        ensure_eq(created.get("visibility"), Some(&Value::from("private")), "visibility")?;
        ensure_eq(created.get("pinned"), Some(&Value::Bool(false)), "pinned")?;
        ensure_eq(created.get("messageCount"), Some(&Value::Int(0)), "messageCount")?;
        ensure(
            matches!(created.get("createdAt"), Some(Value::Date(_))),
            || format!("createdAt should be a date, got {:?}", created.get("createdAt")),
        )?;

        let found = adapter.find_one("thread", &[WhereCondition::eq("id", "cf-t1")], None)?;
        ensure_eq(found.as_ref(), Some(&created), "find_one after create")
    })
}

pub fn find_by_id_with_select(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        let found = adapter
            .find_one("thread", &[WhereCondition::eq("id", "cf-t2")], Some(&["id", "title"]))?
            .ok_or_else(|| ScenarioError::Assertion("cf-t2 not found".to_string()))?;
        ensure_eq(
            found,
            record! { "id" => "cf-t2", "title" => "alpha-room" },
            "selected fields",
        )
    })
}

pub fn filtered_find_many(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        let cases: Vec<(WhereCondition, Vec<&str>)> = vec![
            (
                WhereCondition::new("id", Operator::In, vec!["cf-t1", "cf-t3"]),
                vec!["cf-t1", "cf-t3"],
            ),
            (WhereCondition::new("title", Operator::Contains, "room"), vec!["cf-t2", "cf-t3"]),
            (WhereCondition::new("title", Operator::StartsWith, "alpha"), vec!["cf-t2"]),
            (WhereCondition::new("title", Operator::EndsWith, "room"), vec!["cf-t2", "cf-t3"]),
            (WhereCondition::new("title", Operator::Contains, "Room"), vec![]),
        ];
        for (condition, expected) in cases {
            let label = format!("{} {}", condition.field, condition.operator.as_str());
            let found = adapter.find_many("thread", &FindMany::filter(scoped(vec![condition])))?;
            ensure_eq(id_set(&found), strings(&expected).into_iter().collect(), &label)?;
        }
        Ok(())
    })
}

/// Text sorts ignore ASCII case.
pub fn sort(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        let asc = find_ids(adapter, FindMany::filter(scoped(vec![])).sort(SortBy::asc("title")))?;
        ensure_eq(asc, strings(&["cf-t2", "cf-t3", "cf-t1"]), "title asc")?;
        let desc = find_ids(adapter, FindMany::filter(scoped(vec![])).sort(SortBy::desc("title")))?;
        ensure_eq(desc, strings(&["cf-t1", "cf-t3", "cf-t2"]), "title desc")?;
        let numeric = find_ids(
            adapter,
            FindMany::filter(scoped(vec![])).sort(SortBy::desc("messageCount")),
        )?;
        ensure_eq(numeric, strings(&["cf-t1", "cf-t3", "cf-t2"]), "messageCount desc")
    })
}

/// Pagination equals sorting then slicing.
pub fn limit_offset(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        let sorted = || FindMany::filter(scoped(vec![])).sort(SortBy::asc("title"));
        ensure_eq(find_ids(adapter, sorted().limit(2))?, strings(&["cf-t2", "cf-t3"]), "limit 2")?;
        ensure_eq(
            find_ids(adapter, sorted().limit(1).offset(1))?,
            strings(&["cf-t3"]),
            "limit 1 offset 1",
        )?;
        ensure_eq(find_ids(adapter, sorted().offset(2))?, strings(&["cf-t1"]), "offset 2")?;
        ensure_eq(find_ids(adapter, sorted().offset(5))?, Vec::<String>::new(), "offset past end")
    })
}

/// Update changes only the given fields.
pub fn partial_update(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        let before = adapter.find_one("thread", &[WhereCondition::eq("id", "cf-t1")], None)?;
        let updated = adapter
            .update("thread", &[WhereCondition::eq("id", "cf-t1")], record! { "pinned" => true })?
            .ok_or_else(|| ScenarioError::Assertion("update returned nothing".to_string()))?;
        let mut expected = before
            .ok_or_else(|| ScenarioError::Assertion("cf-t1 not found".to_string()))?;
        expected.insert("pinned".to_string(), Value::Bool(true));
        ensure_eq(&updated, &expected, "updated record")?;
        let reread = adapter.find_one("thread", &[WhereCondition::eq("id", "cf-t1")], None)?;
        ensure_eq(reread.as_ref(), Some(&expected), "reread after update")
    })
}

pub fn update_many(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        let updated = adapter.update_many(
            "thread",
            &scoped(vec![WhereCondition::eq("visibility", "public")]),
            record! { "visibility" => "private" },
        )?;
        ensure_eq(updated, 2, "updated count")?;
        let private = adapter.count("thread", &scoped(vec![WhereCondition::eq("visibility", "private")]))?;
        ensure_eq(private, 3, "private threads")?;
        let none = adapter.update_many(
            "thread",
            &scoped(vec![WhereCondition::eq("visibility", "public")]),
            record! { "pinned" => false },
        )?;
        ensure_eq(none, 0, "second update_many")
    })
}

pub fn count(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        ensure_eq(adapter.count("thread", &scoped(vec![]))?, 3, "all threads")?;
        ensure_eq(
            adapter.count("thread", &scoped(vec![WhereCondition::eq("visibility", "public")]))?,
            2,
            "public threads",
        )?;
        ensure_eq(
            adapter.count("thread", &scoped(vec![WhereCondition::eq("title", "missing")]))?,
            0,
            "no match",
        )
    })
}

/// Upsert inserts once, then updates in place.
pub fn upsert(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_user(adapter)?;
        let filter = [WhereCondition::eq("id", "cf-t9")];
        let create = || record! { "title" => "New", "userId" => USER };
        let inserted = adapter.upsert("thread", &filter, create(), record! { "title" => "Updated" })?;
        ensure_eq(inserted.get("title"), Some(&Value::from("New")), "inserted title")?;
        ensure_eq(inserted.get("id"), Some(&Value::from("cf-t9")), "inserted id")?;

        let updated = adapter.upsert("thread", &filter, create(), record! { "title" => "Updated" })?;
        ensure_eq(updated.get("title"), Some(&Value::from("Updated")), "updated title")?;
        ensure_eq(adapter.count("thread", &filter)?, 1, "records with cf-t9")
    })
}

pub fn delete(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        adapter.delete("thread", &[WhereCondition::eq("id", "cf-t1")])?;
        let gone = adapter.find_one("thread", &[WhereCondition::eq("id", "cf-t1")], None)?;
        ensure(gone.is_none(), || "cf-t1 still present".to_string())?;
        ensure_eq(adapter.count("thread", &scoped(vec![]))?, 2, "remaining threads")
    })
}

/// Removes exactly the matching set; a second call removes nothing.
pub fn delete_many(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_threads(adapter)?;
        let public = scoped(vec![WhereCondition::eq("visibility", "public")]);
        ensure_eq(adapter.delete_many("thread", &public)?, 2, "first delete_many")?;
        ensure_eq(adapter.delete_many("thread", &public)?, 0, "second delete_many")?;
        ensure_eq(find_ids(adapter, FindMany::filter(scoped(vec![])))?, strings(&["cf-t1"]), "survivors")
    })
}

/// Missing records are not errors.
pub fn delete_missing(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        let missing = [WhereCondition::eq("id", "cf-t9")];
        adapter.delete("thread", &missing)?;
        let updated = adapter.update("thread", &missing, record! { "title" => "x" })?;
        ensure(updated.is_none(), || "update of a missing record returned a row".to_string())?;
        let found = adapter.find_one("thread", &missing, None)?;
        ensure(found.is_none(), || "find_one of a missing record returned a row".to_string())
    })
}

/// The generator runs once per create without an explicit id.
pub fn custom_id_generator(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    let probe = IdProbe::default();
    let options = AdapterOptions::default().with_id_generator(probe.clone());
    with_adapter(factory, options, |adapter| {
        seed_user(adapter)?;
        ensure_eq(probe.calls(), 0, "generator calls for an explicit id")?;
        let first = adapter.create("thread", record! { "title" => "a", "userId" => USER }, None)?;
        let second = adapter.create("thread", record! { "title" => "b", "userId" => USER }, None)?;
        ensure_eq(probe.calls(), 2, "generator calls")?;
        ensure_eq(first.get("id"), Some(&Value::from("cf-probe-1")), "first id")?;
        ensure_eq(second.get("id"), Some(&Value::from("cf-probe-2")), "second id")
    })
}

/// Create, update, read, delete one thread end to end.
pub fn thread_lifecycle(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_user(adapter)?;
        let id = [WhereCondition::eq("id", "cf-t1")];
        let created = adapter.create(
            "thread",
            record! { "id" => "cf-t1", "title" => "General", "userId" => USER },
            None,
        )?;
        ensure_eq(created.get("visibility"), Some(&Value::from("private")), "default visibility")?;

        let updated = adapter.update("thread", &id, record! { "visibility" => "public" })?;
        ensure_eq(
            updated.as_ref().and_then(|r| r.get("visibility")),
            Some(&Value::from("public")),
            "updated visibility",
        )?;

        let title = adapter.find_one("thread", &id, Some(&["title"]))?;
        ensure_eq(title, Some(record! { "title" => "General" }), "selected title")?;

        adapter.delete("thread", &id)?;
        ensure_eq(
            find_ids(adapter, FindMany::filter(scoped(vec![])))?,
            Vec::<String>::new(),
            "threads after delete",
        )
    })
}

/// Titles that differ only by case are equal sort keys: the sequence of
/// lowercased titles matches the in-memory store, whatever the tie order.
pub fn mixed_case_sort(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        let oracle = StorageAdapter::new(
            adapter.schema().clone(),
            MemoryEngine::new(MemoryStore::new()),
            AdapterOptions::default(),
        );
        for target in [adapter as &dyn Adapter, &oracle] {
            seed_user(target)?;
            for (id, title) in [("cf-t1", "b"), ("cf-t2", "B"), ("cf-t3", "a"), ("cf-t9", "C")] {
                target.create("thread", record! { "id" => id, "title" => title, "userId" => USER }, None)?;
            }
        }

        for sort in [SortBy::asc("title"), SortBy::desc("title")] {
            let label = format!("{:?}", sort);
            let expected = lowercase_titles(&oracle, sort.clone())?;
            ensure_eq(lowercase_titles(adapter, sort)?, expected, &label)?;
        }

        let first = find_ids(adapter, FindMany::filter(scoped(vec![])).sort(SortBy::asc("title")))?;
        ensure_eq(first.first().map(String::as_str), Some("cf-t3"), "first ascending")?;
        ensure_eq(first.last().map(String::as_str), Some("cf-t9"), "last ascending")?;
        ensure_eq(
            first.get(1..3).unwrap_or_default().iter().cloned().collect::<BTreeSet<_>>(),
            strings(&["cf-t1", "cf-t2"]).into_iter().collect(),
            "case-only tie",
        )
    })
}

/// Contains, sort, update_many then delete_many by id over three threads;
/// the second delete_many removes nothing and the table ends empty.
pub fn room_threads(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        seed_user(adapter)?;
        let rows = [
            record! { "id" => "cf-t1", "title" => "General", "visibility" => "private", "userId" => USER },
            record! { "id" => "cf-t2", "title" => "alpha-room", "visibility" => "public", "userId" => USER },
            record! { "id" => "cf-t3", "title" => "beta-room", "visibility" => "public", "userId" => USER },
        ];
        for row in rows {
            adapter.create("thread", row, None)?;
        }

        let rooms = adapter.find_many(
            "thread",
            &FindMany::filter(scoped(vec![WhereCondition::new("title", Operator::Contains, "room")])),
        )?;
        ensure_eq(id_set(&rooms), strings(&["cf-t2", "cf-t3"]).into_iter().collect(), "contains room")?;

        let sorted = find_ids(adapter, FindMany::filter(scoped(vec![])).sort(SortBy::asc("title")))?;
        let position = |id: &str| sorted.iter().position(|found| found == id);
        ensure(
            matches!((position("cf-t2"), position("cf-t3")), (Some(a), Some(b)) if a < b),
            || format!("title asc should put cf-t2 before cf-t3, got {:?}", sorted),
        )?;

        let updated = adapter.update_many(
            "thread",
            &scoped(vec![WhereCondition::eq("visibility", "public")]),
            record! { "visibility" => "private" },
        )?;
        ensure_eq(updated, 2, "update_many public")?;

        let all = [in_ids(&["cf-t1", "cf-t2", "cf-t3"])];
        ensure_eq(adapter.delete_many("thread", &all)?, 3, "delete_many id in")?;
        ensure_eq(adapter.delete_many("thread", &all)?, 0, "second delete_many id in")?;
        ensure_eq(
            find_ids(adapter, FindMany::filter(scoped(vec![])))?,
            Vec::<String>::new(),
            "threads after delete_many",
        )
    })
}

/// Every operator agrees with the in-memory store on the same data.
pub fn operator_oracle(factory: &dyn AdapterFactory) -> Result<(), ScenarioError> {
    with_adapter(factory, AdapterOptions::default(), |adapter| {
        let oracle = StorageAdapter::new(
            adapter.schema().clone(),
            MemoryEngine::new(MemoryStore::new()),
            AdapterOptions::default(),
        );
        for target in [adapter as &dyn Adapter, &oracle] {
            seed_threads(target)?;
            seed_documents(target)?;
        }

        let thread_cases = vec![
            vec![WhereCondition::eq("visibility", "public")],
            vec![WhereCondition::new("visibility", Operator::Ne, "public")],
            vec![WhereCondition::new("messageCount", Operator::Lt, 2i64)],
            vec![WhereCondition::new("messageCount", Operator::Lte, 2i64)],
            vec![WhereCondition::new("messageCount", Operator::Gt, 1i64)],
            vec![WhereCondition::new("messageCount", Operator::Gte, 3i64)],
            vec![WhereCondition::new("title", Operator::In, vec!["General", "beta-room"])],
            vec![WhereCondition::new("title", Operator::NotIn, vec!["General"])],
            vec![WhereCondition::new("title", Operator::Contains, "-")],
            vec![WhereCondition::new("title", Operator::StartsWith, "beta")],
            vec![WhereCondition::new("title", Operator::EndsWith, "al")],
            vec![WhereCondition::new("messageCount", Operator::In, vec![Value::Float(3.0)])],
            vec![WhereCondition::new(
                "messageCount",
                Operator::In,
                vec![Value::Float(2.0), Value::Int(1)],
            )],
            vec![WhereCondition::new("messageCount", Operator::NotIn, vec![Value::Float(3.0)])],
            vec![WhereCondition::eq("pinned", true)],
            vec![
                WhereCondition::eq("userId", USER),
                WhereCondition::eq("visibility", "private").or(),
                WhereCondition::eq("pinned", true).or(),
            ],
        ];
        for conditions in thread_cases {
            let filter = FindMany::filter(scoped(conditions));
            let label = format!("thread {:?}", &filter.filter[1..]);
            let expected = id_set(&oracle.find_many("thread", &filter)?);
            ensure_eq(id_set(&adapter.find_many("thread", &filter)?), expected, &label)?;
        }

        let document_cases = vec![
            vec![WhereCondition::new("content", Operator::Ne, "alpha")],
            vec![WhereCondition::new("content", Operator::NotIn, vec!["alpha"])],
            vec![WhereCondition::eq("content", Value::Null)],
            vec![WhereCondition::new("content", Operator::Ne, Value::Null)],
            vec![WhereCondition::new("content", Operator::Contains, "a")],
        ];
        for conditions in document_cases {
            let mut filter = vec![in_ids(&DOCUMENT_IDS)];
            filter.extend(conditions);
            let label = format!("document {:?}", &filter[1..]);
            let query = FindMany::filter(filter);
            let expected = id_set(&oracle.find_many("document", &query)?);
            ensure_eq(id_set(&adapter.find_many("document", &query)?), expected, &label)?;
        }
        Ok(())
    })
}

/// Scenario names and functions, in run order.
pub const SCENARIOS: &[(&str, Scenario)] = &[
    ("create", create),
    ("find_by_id_with_select", find_by_id_with_select),
    ("filtered_find_many", filtered_find_many),
    ("sort", sort),
    ("limit_offset", limit_offset),
    ("partial_update", partial_update),
    ("update_many", update_many),
    ("count", count),
    ("upsert", upsert),
    ("delete", delete),
    ("delete_many", delete_many),
    ("delete_missing", delete_missing),
    ("custom_id_generator", custom_id_generator),
    ("thread_lifecycle", thread_lifecycle),
    ("mixed_case_sort", mixed_case_sort),
    ("room_threads", room_threads),
    ("operator_oracle", operator_oracle),
];

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub backend: String,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Run every scenario; failures are collected, not propagated.
pub fn run_suite(factory: &dyn AdapterFactory) -> SuiteReport {
    let results = SCENARIOS
        .iter()
        .map(|(name, scenario)| {
            let outcome = scenario(factory);
            if let Err(err) = &outcome {
                tracing::warn!(backend = factory.name(), scenario = name, error = %err, "scenario failed");
            }
            ScenarioResult {
                name: name.to_string(),
                passed: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            }
        })
        .collect();
    SuiteReport {
        backend: factory.name().to_string(),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::builtin_tables;
    use crate::db::Schema;
    use rstest::rstest;

    fn memory() -> impl AdapterFactory {
        factory("memory", |options| {
            Ok(StorageAdapter::new(
                Schema { tables: builtin_tables() },
                MemoryEngine::new(MemoryStore::new()),
                options,
            ))
        })
    }

    #[rstest]
    fn test_memory_passes_suite() {
        let report = run_suite(&memory());
        let failures: Vec<_> = report.results.iter().filter(|r| !r.passed).collect();
        assert!(failures.is_empty(), "{:?}", failures);
        assert_eq!(report.passed(), SCENARIOS.len());
        assert!(report.is_success());
    }

    #[rstest]
    fn test_failures_are_reported() {
        let broken = factory("broken", |_| {
            Err(AdapterError::BackendUnavailable {
                model: "thread".to_string(),
                reason: "offline".to_string(),
            })
        });
        let report = run_suite(&broken);
        assert_eq!(report.backend, "broken");
        assert_eq!(report.failed(), SCENARIOS.len());
        assert!(report.results[0].error.as_deref().unwrap().contains("offline"));
    }

    #[rstest]
    fn test_id_probe_counts_across_clones() {
        let probe = IdProbe::default();
        let shared = probe.clone();
        let request = IdRequest { model: "thread", size: 32 };
        assert_eq!(shared.generate(request), "cf-probe-1");
        assert_eq!(probe.generate(request), "cf-probe-2");
        assert_eq!(probe.calls(), 2);
    }
}
