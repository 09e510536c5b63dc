//! Tests for script eligibility, ordering, atomicity, and run scoping.

use super::*;
use async_trait::async_trait;
use sl_core::{CoreError, SchemaFilter};
use sl_db::{DbResult, DuckDbBackend, SqlValue};
use std::sync::Mutex;
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────────────

fn key(schema: &str) -> SchemaKey {
    SchemaKey::for_schema(schema)
}

fn scripts(schema: &str, list: &[(i64, &str, &str)]) -> ScriptsBySchema {
    let mut map = ScriptsBySchema::new();
    map.insert(
        key(schema),
        list.iter()
            .map(|(version, name, sql)| MigrationScript::new(*version, *name, *sql))
            .collect(),
    );
    map
}

fn config(schema: &str) -> RunConfig {
    RunConfig::new(":memory:", schema).with_floor_version(0)
}

async fn ledger_versions(db: &DuckDbBackend, schema: &str) -> Vec<i64> {
    Ledger::new(db)
        .history(&key(schema))
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect()
}

async fn table_count(db: &DuckDbBackend, table: &str) -> i64 {
    let rows = db
        .query_rows(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            &[table.into()],
        )
        .await
        .unwrap();
    rows[0][0].as_i64().unwrap()
}

// ── Eligibility ────────────────────────────────────────────────────────

#[test]
fn eligibility_rules() {
    let last = LastApplied {
        version: 3,
        hash: "ABC".to_string(),
    };
    let at = |v: i64| MigrationScript::new(v, "s", "SELECT 1");

    assert_eq!(eligibility(&at(1), 2, &last), Eligibility::BelowFloor);
    assert_eq!(eligibility(&at(2), 0, &last), Eligibility::AlreadyApplied);
    assert_eq!(eligibility(&at(3), 0, &last), Eligibility::AlreadyApplied);
    assert_eq!(eligibility(&at(4), 0, &last), Eligibility::Eligible);
    assert_eq!(eligibility(&at(4), 4, &last), Eligibility::Eligible);
    assert_eq!(eligibility(&at(4), 5, &last), Eligibility::BelowFloor);
}

#[test]
fn eligibility_ignores_hash_at_last_version() {
    let script = MigrationScript::new(3, "changed", "SELECT 'changed'");
    let last = LastApplied {
        version: 3,
        hash: "SOMETHING-ELSE".to_string(),
    };
    assert_eq!(eligibility(&script, 0, &last), Eligibility::AlreadyApplied);
}

// ── Apply ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn applies_in_version_order() {
    let db = DuckDbBackend::in_memory().unwrap();
    let found = scripts(
        "app",
        &[
            (2, "fill", "INSERT INTO items VALUES (1)"),
            (1, "create", "CREATE TABLE items (id INT)"),
        ],
    );

    let report = Migrator::new(&db).run(&config("app"), found).await.unwrap();
    assert_eq!(report.last_known("__schema_app"), Some(0));
    assert_eq!(report.applied("__schema_app"), Some(2));
    assert_eq!(ledger_versions(&db, "app").await, vec![1, 2]);
}

#[tokio::test]
async fn multi_batch_script_runs_every_batch() {
    let db = DuckDbBackend::in_memory().unwrap();
    let found = scripts(
        "app",
        &[(
            1,
            "init",
            "CREATE TABLE a (id INT);\nGO\nCREATE TABLE b (id INT);\ngo\n",
        )],
    );

    Migrator::new(&db).run(&config("app"), found).await.unwrap();
    assert_eq!(table_count(&db, "a").await, 1);
    assert_eq!(table_count(&db, "b").await, 1);
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let db = DuckDbBackend::in_memory().unwrap();
    let found = scripts("app", &[(1, "create", "CREATE TABLE items (id INT)")]);
    let migrator = Migrator::new(&db);

    migrator.run(&config("app"), found.clone()).await.unwrap();
    let report = migrator.run(&config("app"), found).await.unwrap();

    assert_eq!(report.last_known("__schema_app"), Some(1));
    assert!(report.applied_version().is_empty());
    assert_eq!(ledger_versions(&db, "app").await, vec![1]);
}

#[tokio::test]
async fn floor_version_skips_lower_scripts() {
    let db = DuckDbBackend::in_memory().unwrap();
    let found = scripts(
        "app",
        &[
            (1, "one", "CREATE TABLE one (id INT)"),
            (2, "two", "CREATE TABLE two (id INT)"),
            (3, "three", "CREATE TABLE three (id INT)"),
        ],
    );

    let cfg = config("app").with_floor_version(2);
    let report = Migrator::new(&db).run(&cfg, found).await.unwrap();

    assert_eq!(report.applied("__schema_app"), Some(3));
    assert_eq!(ledger_versions(&db, "app").await, vec![2, 3]);
    assert_eq!(table_count(&db, "one").await, 0);
}

#[tokio::test]
async fn default_floor_skips_version_zero() {
    let db = DuckDbBackend::in_memory().unwrap();
    let found = scripts(
        "app",
        &[
            (0, "zero", "CREATE TABLE zero (id INT)"),
            (1, "one", "CREATE TABLE one (id INT)"),
        ],
    );

    let cfg = RunConfig::new(":memory:", "app");
    Migrator::new(&db).run(&cfg, found).await.unwrap();
    assert_eq!(ledger_versions(&db, "app").await, vec![1]);
}

#[tokio::test]
async fn new_scripts_apply_incrementally() {
    let db = DuckDbBackend::in_memory().unwrap();
    let migrator = Migrator::new(&db);
    migrator
        .run(&config("app"), scripts("app", &[(1, "a", "CREATE TABLE a (id INT)")]))
        .await
        .unwrap();

    let report = migrator
        .run(
            &config("app"),
            scripts(
                "app",
                &[
                    (1, "a", "CREATE TABLE a (id INT)"),
                    (2, "b", "CREATE TABLE b (id INT)"),
                ],
            ),
        )
        .await
        .unwrap();
    assert_eq!(report.last_known("__schema_app"), Some(1));
    assert_eq!(report.applied("__schema_app"), Some(2));
}

// ── Failure handling ───────────────────────────────────────────────────

#[tokio::test]
async fn failing_statement_rolls_back_whole_script() {
    let db = DuckDbBackend::in_memory().unwrap();
    let found = scripts(
        "app",
        &[
            (1, "good", "CREATE TABLE good (id INT)"),
            (
                2,
                "bad",
                "CREATE TABLE partial (id INT);\nGO\nINSERT INTO missing_table VALUES (1);\n",
            ),
            (3, "never", "CREATE TABLE never (id INT)"),
        ],
    );

    let err = Migrator::new(&db).run(&config("app"), found).await.unwrap_err();
    match err {
        MigrationError::Statement {
            schema,
            script,
            version,
            statement,
            ..
        } => {
            assert_eq!(schema, "__schema_app");
            assert_eq!(script, "bad");
            assert_eq!(version, 2);
            assert!(statement.contains("missing_table"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(ledger_versions(&db, "app").await, vec![1]);
    assert_eq!(table_count(&db, "partial").await, 0);
    assert_eq!(table_count(&db, "never").await, 0);
}

#[tokio::test]
async fn duplicate_versions_conflict_on_ledger() {
    let db = DuckDbBackend::in_memory().unwrap();
    let mut cfg = config("dup");
    cfg.add_script("dup", 2, "first", "SELECT 1");
    cfg.add_script("dup", 2, "second", "SELECT 2");

    let err = Migrator::new(&db)
        .run(&cfg, ScriptsBySchema::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, MigrationError::LedgerConflict { version: 2, .. }),
        "unexpected error: {err}"
    );

    let history = Ledger::new(&db).history(&key("dup")).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].name, "first");
}

#[tokio::test]
async fn invalid_config_fails_before_io() {
    let db = DuckDbBackend::in_memory().unwrap();
    let cfg = RunConfig::new(":memory:", "bad'name");
    let err = Migrator::new(&db)
        .run(&cfg, scripts("bad'name", &[(1, "x", "SELECT 1")]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Config(CoreError::InvalidSchemaKey { .. })
    ));
}

// ── Scope ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn named_filter_only_touches_matching_schema() {
    let db = DuckDbBackend::in_memory().unwrap();
    let mut found = scripts("app", &[(1, "a", "CREATE TABLE a (id INT)")]);
    found.extend(scripts("other", &[(1, "o", "CREATE TABLE o (id INT)")]));

    let report = Migrator::new(&db).run(&config("app"), found).await.unwrap();
    assert_eq!(report.last_known_version().len(), 1);
    assert_eq!(table_count(&db, "__schema_other").await, 0);
    assert_eq!(table_count(&db, "o").await, 0);
}

#[tokio::test]
async fn wildcard_filter_covers_all_schemas() {
    let db = DuckDbBackend::in_memory().unwrap();
    let mut found = scripts("app", &[(1, "a", "CREATE TABLE a (id INT)")]);
    found.extend(scripts("other", &[(1, "o", "CREATE TABLE o (id INT)")]));

    let cfg = config("All");
    assert_eq!(cfg.schema, SchemaFilter::All);
    let report = Migrator::new(&db).run(&cfg, found).await.unwrap();
    assert_eq!(report.applied("__schema_app"), Some(1));
    assert_eq!(report.applied("__schema_other"), Some(1));
}

#[tokio::test]
async fn extra_scripts_replace_discovered_for_same_schema() {
    let db = DuckDbBackend::in_memory().unwrap();
    let mut cfg = config("app");
    cfg.add_script("app", 1, "extra", "CREATE TABLE from_extra (id INT)");
    let found = scripts("app", &[(1, "found", "CREATE TABLE from_catalog (id INT)")]);

    Migrator::new(&db).run(&cfg, found).await.unwrap();
    assert_eq!(table_count(&db, "from_extra").await, 1);
    assert_eq!(table_count(&db, "from_catalog").await, 0);
}

#[tokio::test]
async fn apply_discovered_false_ignores_catalog() {
    let db = DuckDbBackend::in_memory().unwrap();
    let mut cfg = config("All");
    cfg.apply_discovered = false;
    let found = scripts("app", &[(1, "found", "CREATE TABLE from_catalog (id INT)")]);

    let report = Migrator::new(&db).run(&cfg, found).await.unwrap();
    assert_eq!(report, MigrationReport::default());
}

// ── Registry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn registry_skips_repeated_runs() {
    let db = DuckDbBackend::in_memory().unwrap();
    let registry = Arc::new(RunRegistry::new());
    let migrator = Migrator::new(&db).with_registry(Arc::clone(&registry));

    migrator
        .run(&config("app"), scripts("app", &[(1, "a", "CREATE TABLE a (id INT)")]))
        .await
        .unwrap();

    let more = scripts(
        "app",
        &[
            (1, "a", "CREATE TABLE a (id INT)"),
            (2, "b", "CREATE TABLE b (id INT)"),
        ],
    );
    let report = migrator.run(&config("app"), more.clone()).await.unwrap();
    assert_eq!(report, MigrationReport::default());
    assert_eq!(ledger_versions(&db, "app").await, vec![1]);

    registry.forget(&RunKey::from_config(&config("app")));
    let report = migrator.run(&config("app"), more).await.unwrap();
    assert_eq!(report.applied("__schema_app"), Some(2));
}

#[tokio::test]
async fn registry_not_marked_on_failure() {
    let db = DuckDbBackend::in_memory().unwrap();
    let registry = Arc::new(RunRegistry::new());
    let migrator = Migrator::new(&db).with_registry(Arc::clone(&registry));

    let bad = scripts("app", &[(1, "bad", "INSERT INTO nowhere VALUES (1)")]);
    assert!(migrator.run(&config("app"), bad).await.is_err());
    assert!(!registry.is_completed(&RunKey::from_config(&config("app"))));
}

// ── Timeout ────────────────────────────────────────────────────────────

/// Test double that records every call and stalls on statements containing
/// `STALL`.
#[derive(Default, Clone)]
struct RecordingDb {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingDb {
    fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

struct RecordingTx {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Database for RecordingDb {
    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.log.lock().unwrap().push(format!("DDL {}", sql.trim()));
        Ok(())
    }

    async fn query_rows(&self, _sql: &str, _params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        Ok(Vec::new())
    }

    async fn begin(&self, _isolation: IsolationLevel) -> DbResult<Box<dyn Transaction>> {
        self.log.lock().unwrap().push("BEGIN".to_string());
        Ok(Box::new(RecordingTx {
            log: Arc::clone(&self.log),
        }))
    }

    fn db_type(&self) -> &'static str {
        "recording"
    }
}

#[async_trait]
impl Transaction for RecordingTx {
    async fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        if sql.contains("STALL") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if sql.contains("BLOCK") {
            // Never yields, like a synchronous driver call.
            std::thread::sleep(Duration::from_millis(1500));
        }
        self.log.lock().unwrap().push(format!("EXEC {}", sql.trim()));
        Ok(())
    }

    async fn execute_params(&mut self, _sql: &str, _params: &[SqlValue]) -> DbResult<usize> {
        self.log.lock().unwrap().push("INSERT".to_string());
        Ok(1)
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.log.lock().unwrap().push("COMMIT".to_string());
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.log.lock().unwrap().push("ROLLBACK".to_string());
        Ok(())
    }
}

#[tokio::test]
async fn timeout_rolls_back_script() {
    let db = RecordingDb::default();
    let mut cfg = config("slow");
    cfg.command_timeout_secs = 1;
    let found = scripts("slow", &[(1, "slow", "SELECT 1\nGO\nSTALL\n")]);

    let err = Migrator::new(&db).run(&cfg, found).await.unwrap_err();
    assert!(
        matches!(err, MigrationError::Timeout { version: 1, .. }),
        "unexpected error: {err}"
    );

    let events = db.events();
    assert!(events.contains(&"EXEC SELECT 1".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!events.iter().any(|e| e == "INSERT" || e == "COMMIT"));
}

#[tokio::test]
async fn blocking_statement_past_deadline_rolls_back() {
    let db = RecordingDb::default();
    let mut cfg = config("slow");
    cfg.command_timeout_secs = 1;
    let found = scripts("slow", &[(1, "slow", "BLOCK\n")]);

    let err = Migrator::new(&db).run(&cfg, found).await.unwrap_err();
    assert!(
        matches!(err, MigrationError::Timeout { version: 1, .. }),
        "unexpected error: {err}"
    );

    let events = db.events();
    assert_eq!(events.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!events.iter().any(|e| e == "INSERT" || e == "COMMIT"));
}

#[tokio::test]
async fn slow_duckdb_statement_times_out_without_ledger_row() {
    let db = DuckDbBackend::in_memory().unwrap();
    let mut cfg = config("slow");
    cfg.command_timeout_secs = 1;
    cfg.add_script(
        "slow",
        1,
        "big",
        "CREATE TABLE big AS SELECT sum(a.range * b.range) AS total \
         FROM range(25000) a, range(25000) b;",
    );

    let err = Migrator::new(&db)
        .run(&cfg, ScriptsBySchema::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, MigrationError::Timeout { version: 1, .. }),
        "unexpected error: {err}"
    );
    assert!(Ledger::new(&db).history(&key("slow")).await.unwrap().is_empty());
    assert_eq!(table_count(&db, "big").await, 0);
}

#[tokio::test]
async fn statements_and_ledger_share_one_transaction() {
    let db = RecordingDb::default();
    let found = scripts("s", &[(1, "init", "A\nGO\nB\n")]);

    Migrator::new(&db).run(&config("s"), found).await.unwrap();

    let events = db.events();
    let begin = events.iter().position(|e| e == "BEGIN").unwrap();
    assert_eq!(
        &events[begin..],
        &["BEGIN", "EXEC A", "EXEC B", "INSERT", "COMMIT"]
    );
}
