//! Runs the `shardroute` binary against rule and statement files.

use std::{fs, path::PathBuf};

use assert_cmd::Command;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tracing::debug;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fixture.write(
            "rules.json",
            json!({
                "data_sources": ["ds_0", "ds_1"],
                "tables": [
                    {
                        "logic_table": "t_order",
                        "actual_data_nodes": "ds_${0..1}.t_order_${0..1}",
                        "key_generate_strategy": {"column": "order_id"}
                    },
                    {
                        "logic_table": "t_order_item",
                        "actual_data_nodes": "ds_${0..1}.t_order_item_${0..1}"
                    }
                ],
                "binding_tables": ["t_order, t_order_item"],
                "broadcast_tables": ["t_config"],
                "default_database_strategy": {"standard": {"algorithm_name": "mod_2"}},
                "default_table_strategy": {"standard": {"algorithm_name": "mod_2"}},
                "default_sharding_column": "order_id",
                "sharding_algorithms": {
                    "mod_2": {"type": "MOD", "props": {"sharding-count": 2}}
                }
            }),
        );
        fixture
    }

    fn write(&self, name: &str, content: Value) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
        path
    }

    fn rules(&self) -> PathBuf {
        self.dir.path().join("rules.json")
    }

    fn select_order(&self, sql: Option<&str>) -> PathBuf {
        let mut statement = json!({
            "statement": {
                "type": "select",
                "tables": [{"name": "t_order"}],
                "where_clause": {"binary": {
                    "left": {"column": {"name": "order_id"}},
                    "op": "eq",
                    "right": {"parameter": 0}
                }}
            },
            "parameters": [5]
        });
        if let Some(sql) = sql {
            statement["sql"] = json!(sql);
        }
        self.write("select.json", statement)
    }
}

/// The binary with no configuration leaking in from the environment.
fn shardroute() -> Command {
    let mut cmd = Command::cargo_bin("shardroute").unwrap();
    cmd.env_remove("LOG_FILTER")
        .env_remove("SHARDROUTE_RULES")
        .env_remove("SHARDROUTE_SQL_SHOW");
    cmd
}

fn run(cmd: &mut Command) -> (bool, String, String) {
    let output = cmd.output().unwrap();
    let (stdout, stderr) = (
        String::from_utf8(output.stdout).unwrap(),
        String::from_utf8(output.stderr).unwrap(),
    );
    debug!(status = %output.status, %stdout, %stderr, "shardroute finished");
    (output.status.success(), stdout, stderr)
}

#[test_log::test]
fn check_reports_a_valid_rule() {
    let fixture = Fixture::new();

    let (ok, stdout, stderr) =
        run(shardroute().arg("check").arg("--rules").arg(fixture.rules()));

    assert!(ok, "{stderr}");
    assert!(
        stdout.contains(
            "is valid: 2 data sources, 2 sharding tables, 1 binding groups, 1 broadcast tables"
        ),
        "{stdout}"
    );
}

#[test_log::test]
fn check_rejects_an_unknown_algorithm() {
    let fixture = Fixture::new();
    let rules = fixture.write(
        "broken.json",
        json!({
            "data_sources": ["ds_0"],
            "tables": [{
                "logic_table": "t_order",
                "table_strategy": {"standard": {"sharding_column": "order_id", "algorithm_name": "missing"}}
            }]
        }),
    );

    let (ok, _, stderr) = run(shardroute().arg("check").arg("--rules").arg(rules));

    assert!(!ok);
    assert!(stderr.contains("Check command failed: invalid sharding rule"), "{stderr}");
    assert!(stderr.contains("missing"), "{stderr}");
}

#[test_log::test]
fn check_reports_an_unreadable_file() {
    let fixture = Fixture::new();

    let (ok, _, stderr) = run(shardroute()
        .arg("check")
        .arg("--rules")
        .arg(fixture.dir.path().join("absent.json")));

    assert!(!ok);
    assert!(stderr.contains("cannot read"), "{stderr}");
}

#[test_log::test]
fn rules_path_from_environment() {
    let fixture = Fixture::new();

    let (ok, stdout, stderr) = run(shardroute()
        .env("SHARDROUTE_RULES", fixture.rules())
        .arg("route")
        .arg("--statement")
        .arg(fixture.select_order(None)));

    assert!(ok, "{stderr}");
    assert_eq!(stdout, "ds_1: t_order -> t_order_1\n");
}

#[test_log::test]
fn route_as_json() {
    let fixture = Fixture::new();

    let (ok, stdout, stderr) = run(shardroute()
        .args(["route", "--format", "json", "--rules"])
        .arg(fixture.rules())
        .arg("--statement")
        .arg(fixture.select_order(None)));

    assert!(ok, "{stderr}");
    let route: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        route,
        json!({
            "units": [{
                "data_source_mapper": {"logic_name": "ds_1", "actual_name": "ds_1"},
                "table_mappers": [{"logic_name": "t_order", "actual_name": "t_order_1"}]
            }],
            "write_route_only": false
        })
    );
}

#[test_log::test]
fn hint_comment_forces_the_data_source() {
    let fixture = Fixture::new();
    let statement = fixture.select_order(Some(
        "/* SHARDINGSPHERE_HINT: DATA_SOURCE_NAME=ds_0 */ SELECT * FROM t_order WHERE order_id = ?",
    ));

    let (ok, stdout, stderr) = run(shardroute()
        .arg("route")
        .arg("--rules")
        .arg(fixture.rules())
        .arg("--statement")
        .arg(statement));

    assert!(ok, "{stderr}");
    assert_eq!(stdout, "ds_0: t_order -> t_order\n");
}

#[test_log::test]
fn data_source_flag_must_name_a_configured_source() {
    let fixture = Fixture::new();

    let (ok, _, stderr) = run(shardroute()
        .arg("route")
        .arg("--rules")
        .arg(fixture.rules())
        .arg("--statement")
        .arg(fixture.select_order(None))
        .args(["--data-source", "ds_9"]));

    assert!(!ok);
    assert!(
        stderr.contains("Route command failed: hinted data source \"ds_9\" is not configured"),
        "{stderr}"
    );
}

#[test_log::test]
fn update_of_the_sharding_key_fails() {
    let fixture = Fixture::new();
    let statement = fixture.write(
        "update.json",
        json!({
            "statement": {
                "type": "update",
                "tables": [{"name": "t_order"}],
                "assignments": [{"column": {"name": "order_id"}, "value": {"literal": 6}}],
                "where_clause": {"binary": {
                    "left": {"column": {"name": "order_id"}},
                    "op": "eq",
                    "right": {"literal": 5}
                }}
            }
        }),
    );

    let (ok, stdout, stderr) = run(shardroute()
        .arg("route")
        .arg("--rules")
        .arg(fixture.rules())
        .arg("--statement")
        .arg(statement));

    assert!(!ok);
    assert_eq!(stdout, "");
    assert!(
        stderr.contains("changing the sharding value of table \"t_order\" is not supported"),
        "{stderr}"
    );
}

#[test_log::test]
fn sql_show_logs_units_to_stderr() {
    let fixture = Fixture::new();

    let (ok, stdout, stderr) = run(shardroute()
        .env("SHARDROUTE_SQL_SHOW", "true")
        .args(["-v", "route", "--rules"])
        .arg(fixture.rules())
        .arg("--statement")
        .arg(fixture.select_order(None)));

    assert!(ok, "{stderr}");
    assert_eq!(stdout, "ds_1: t_order -> t_order_1\n");
    assert!(stderr.contains("ds_1: t_order -> t_order_1"), "{stderr}");
}

#[test_log::test]
fn route_reports_generated_keys() {
    let fixture = Fixture::new();
    let statement = fixture.write(
        "insert.json",
        json!({
            "statement": {
                "type": "insert",
                "table": {"name": "t_order"},
                "columns": ["status"],
                "values": [[{"literal": "new"}]]
            }
        }),
    );

    let (ok, stdout, stderr) = run(shardroute()
        .args(["route", "--format", "json", "--rules"])
        .arg(fixture.rules())
        .arg("--statement")
        .arg(statement));

    assert!(ok, "{stderr}");
    let route: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(route["generated_key"]["column"], "order_id");
    let key = route["generated_key"]["values"][0].as_i64().unwrap();
    let (data_source, table) = (format!("ds_{}", key % 2), format!("t_order_{}", key % 2));
    assert_eq!(
        route["units"],
        json!([{
            "data_source_mapper": {"logic_name": data_source, "actual_name": data_source},
            "table_mappers": [{"logic_name": "t_order", "actual_name": table}]
        }])
    );
}
