//! End-to-end tests for the incremental indexer over temporary corpora.

use codeindex::{
    CorpusFile, Edge, EdgeKind, EntityId, EntityKind, GraphSnapshot, GraphStore, IndexError,
    Indexer, IndexerConfig, KernelRole, LockKind, ParserRegistry, UnitId, UnitState,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FIXTURES: &[(&str, &str)] = &[
    ("hello.c", include_str!("fixtures/hello.c")),
    ("structs.c", include_str!("fixtures/structs.c")),
    ("pointer_test.c", include_str!("fixtures/pointer_test.c")),
    ("math_utils.h", include_str!("fixtures/math_utils.h")),
    ("kernel_example.c", include_str!("fixtures/kernel_example.c")),
];

const LIB_C: &str = "int lib_fn(int x) {\n    return x * 2;\n}\n";
const MAIN_C: &str = "int main(void) {\n    return lib_fn(21);\n}\n";

const TABLE_C: &str = r#"static DEFINE_MUTEX(table_lock);
int table_size;

SYSCALL_DEFINE1(table_get, int, index)
{
	int v;

	mutex_lock(&table_lock);
	v = lookup(index);
	mutex_unlock(&table_lock);
	return v;
}

int lookup(int index)
{
	return index + table_size;
}
EXPORT_SYMBOL(lookup);
EXPORT_SYMBOL_GPL(table_size);
"#;

fn write(dir: &Path, relative: &str, content: impl AsRef<[u8]>) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn corpus(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        write(dir.path(), name, content);
    }
    dir
}

fn indexer(dir: &TempDir) -> Indexer {
    Indexer::for_root(dir.path(), IndexerConfig::default()).unwrap()
}

fn id(text: &str) -> EntityId {
    EntityId::from(text)
}

fn edges_from(graph: &GraphStore, source: &str) -> Vec<Edge> {
    graph
        .edges_from(&id(source))
        .unwrap()
        .into_iter()
        .cloned()
        .collect()
}

fn entity_ids(graph: &GraphStore, unit: &str) -> Vec<String> {
    graph
        .entities_in_unit(&UnitId::new(unit))
        .iter()
        .map(|e| e.id.to_string())
        .collect()
}

#[test]
fn test_scan_root_indexes_fixture_corpus() {
    let dir = corpus(FIXTURES);
    let indexer = indexer(&dir);

    let report = indexer.scan_root().unwrap();
    assert_eq!(report.indexed, FIXTURES.len());
    assert!(report.is_clean(), "{report}");

    let graph = indexer.read().unwrap();
    assert_eq!(graph.unit_count(), FIXTURES.len());
    let mains: Vec<String> = graph
        .find_by_name("main")
        .iter()
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(mains, vec!["hello.c#fn:main", "pointer_test.c#fn:main"]);
    assert!(graph.get_entity(&id("structs.c#fn:make_point")).is_ok());
    assert!(graph.get_entity(&id("math_utils.h#macro:SQUARE")).is_ok());

    // Each unit resolves its own definitions before looking elsewhere
    let hello_main = edges_from(&graph, "hello.c#fn:main");
    let add = hello_main.iter().find(|e| e.target_name == "add").unwrap();
    assert_eq!(add.target, Some(id("hello.c#fn:add")));
}

#[test]
fn test_rescan_is_idempotent() {
    let dir = corpus(FIXTURES);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();
    let before = indexer.snapshot().unwrap();

    let report = indexer.scan_root().unwrap();
    assert_eq!(report.unchanged, FIXTURES.len());
    assert_eq!(report.indexed, 0);
    assert!(report.is_noop());
    assert_eq!(indexer.snapshot().unwrap(), before);
}

#[test]
fn test_ids_stable_under_whitespace_and_comment_edits() {
    let dir = corpus(&[(
        "a.c",
        "int helper(int x) {\n    return x + 1;\n}\n\nint main(void) {\n    return helper(2);\n}\n",
    )]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();
    let before = entity_ids(&indexer.read().unwrap(), "a.c");

    write(
        dir.path(),
        "a.c",
        "/* header */\n\nint helper(int x)\n{\n  return x + 1;\n}\n// trailing\nint main(void) { return helper(2); }\n",
    );
    let report = indexer.on_file_changed("a.c").unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.entities_added, 0);
    assert_eq!(report.entities_removed, 0);

    let graph = indexer.read().unwrap();
    assert_eq!(entity_ids(&graph, "a.c"), before);
    let call = &edges_from(&graph, "a.c#fn:main")[0];
    assert_eq!(call.target, Some(id("a.c#fn:helper")));
}

#[test]
fn test_remove_unit_leaves_nothing_behind() {
    let dir = corpus(&[("lib.c", LIB_C), ("main.c", MAIN_C)]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();
    {
        let graph = indexer.read().unwrap();
        assert_eq!(graph.edges_to(&id("lib.c#fn:lib_fn")).unwrap().len(), 1);
    }

    fs::remove_file(dir.path().join("lib.c")).unwrap();
    let report = indexer.on_file_removed("lib.c").unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.edges_dangled, 1);

    let graph = indexer.read().unwrap();
    assert!(graph.unit(&UnitId::new("lib.c")).is_none());
    assert!(graph.entities_in_unit(&UnitId::new("lib.c")).is_empty());
    assert!(graph.find_by_name("lib_fn").is_empty());
    assert!(graph.entities().all(|e| e.unit.as_str() != "lib.c"));

    let call = &edges_from(&graph, "main.c#fn:main")[0];
    assert_eq!(call.target_name, "lib_fn");
    assert!(!call.is_resolved());
    assert_eq!(graph.dangling_edges().len(), 1);
}

#[test]
fn test_dangling_edge_reconciled_without_reindexing_referrer() {
    let dir = corpus(&[("main.c", MAIN_C)]);
    let indexer = indexer(&dir);
    indexer.scan(["main.c"]).unwrap();

    let referrer_before = {
        let graph = indexer.read().unwrap();
        assert!(!edges_from(&graph, "main.c#fn:main")[0].is_resolved());
        graph.unit(&UnitId::new("main.c")).cloned().unwrap()
    };

    write(dir.path(), "lib.c", LIB_C);
    let report = indexer.on_file_changed("lib.c").unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.edges_reconciled, 1);

    let graph = indexer.read().unwrap();
    let call = &edges_from(&graph, "main.c#fn:main")[0];
    assert_eq!(call.target, Some(id("lib.c#fn:lib_fn")));
    assert_eq!(graph.unit(&UnitId::new("main.c")), Some(&referrer_before));
    assert_eq!(graph.dangling_count(), 0);
}

#[test]
fn test_removed_target_reconnects_when_name_reappears() {
    let dir = corpus(&[("lib.c", LIB_C), ("main.c", MAIN_C)]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();

    fs::remove_file(dir.path().join("lib.c")).unwrap();
    indexer.on_file_changed("lib.c").unwrap();
    assert_eq!(indexer.read().unwrap().dangling_count(), 1);

    write(dir.path(), "other/lib2.c", LIB_C);
    let report = indexer.on_file_changed("other/lib2.c").unwrap();
    assert_eq!(report.edges_reconciled, 1);

    let graph = indexer.read().unwrap();
    let call = &edges_from(&graph, "main.c#fn:main")[0];
    assert_eq!(call.target, Some(id("other/lib2.c#fn:lib_fn")));
}

#[test]
fn test_structs_fixture_graph() {
    let dir = corpus(&[("structs.c", include_str!("fixtures/structs.c"))]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();
    let graph = indexer.read().unwrap();

    let kinds: BTreeSet<(EntityKind, String)> = graph
        .entities_in_unit(&UnitId::new("structs.c"))
        .iter()
        .map(|e| (e.kind, e.name.clone()))
        .collect();
    for expected in [
        (EntityKind::Struct, "Person"),
        (EntityKind::Struct, "__anon_struct_Point"),
        (EntityKind::Union, "Data"),
        (EntityKind::Enum, "Status"),
        (EntityKind::Typedef, "Point"),
        (EntityKind::Function, "create_person"),
        (EntityKind::Function, "make_point"),
        (EntityKind::Function, "multiply"),
        (EntityKind::GlobalVariable, "operation"),
    ] {
        assert!(
            kinds.contains(&(expected.0, expected.1.to_string())),
            "missing {expected:?}"
        );
    }

    let create = edges_from(&graph, "structs.c#fn:create_person");
    let person = create
        .iter()
        .find(|e| e.kind == EdgeKind::ReferencesType && e.target_name == "Person")
        .unwrap();
    assert_eq!(person.target, Some(id("structs.c#struct:Person")));
    let malloc = create.iter().find(|e| e.target_name == "malloc").unwrap();
    assert_eq!(malloc.kind, EdgeKind::Calls);
    assert!(malloc.target.is_none());

    let make_point = edges_from(&graph, "structs.c#fn:make_point");
    assert!(make_point
        .iter()
        .any(|e| e.target == Some(id("structs.c#typedef:Point"))));

    assert!(graph
        .edges_to(&id("structs.c#fn:make_point"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_pointer_fixture_over_approximation() {
    let dir = corpus(&[("pointer_test.c", include_str!("fixtures/pointer_test.c"))]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();

    {
        let graph = indexer.read().unwrap();
        let through_op_ptr: Vec<Option<EntityId>> =
            edges_from(&graph, "pointer_test.c#fn:test_function_pointers")
                .into_iter()
                .filter(|e| e.kind == EdgeKind::Calls && e.via.as_deref() == Some("op_ptr"))
                .map(|e| e.target)
                .collect();
        assert_eq!(
            through_op_ptr,
            vec![
                Some(id("pointer_test.c#fn:add")),
                Some(id("pointer_test.c#fn:multiply"))
            ]
        );

        let handlers: Vec<Option<EntityId>> = edges_from(&graph, "pointer_test.c#fn:main")
            .into_iter()
            .filter(|e| e.kind == EdgeKind::Calls && e.via.as_deref() == Some(".handle"))
            .map(|e| e.target)
            .collect();
        assert_eq!(handlers.len(), 4);
        assert!(handlers.iter().all(Option::is_some));

        let through_param: Vec<Edge> = edges_from(&graph, "pointer_test.c#fn:calculate")
            .into_iter()
            .filter(|e| e.kind == EdgeKind::Calls)
            .collect();
        assert_eq!(through_param.len(), 1);
        assert_eq!(through_param[0].via.as_deref(), Some("op"));
        assert!(!through_param[0].is_resolved());
    }

    // A function named like the parameter slot never satisfies the call
    write(dir.path(), "op.c", "int op(int a, int b) { return a - b; }\n");
    let report = indexer.on_file_changed("op.c").unwrap();
    assert_eq!(report.edges_reconciled, 0);
    let graph = indexer.read().unwrap();
    let slot_call = edges_from(&graph, "pointer_test.c#fn:calculate")
        .into_iter()
        .find(|e| e.kind == EdgeKind::Calls && e.target_name == "op")
        .unwrap();
    assert!(!slot_call.is_resolved());
    assert!(graph.edges_to(&id("op.c#fn:op")).unwrap().is_empty());
}

fn single(edges: &[Edge], kind: EdgeKind) -> Edge {
    let mut found: Vec<&Edge> = edges.iter().filter(|e| e.kind == kind).collect();
    assert_eq!(found.len(), 1, "{kind} edges: {found:?}");
    found.remove(0).clone()
}

#[test]
fn test_kernel_fixture_registrations_and_locks() {
    let dir = corpus(&[
        ("kernel_example.c", include_str!("fixtures/kernel_example.c")),
        ("table.c", TABLE_C),
    ]);
    let indexer = indexer(&dir);
    assert!(indexer.scan_root().unwrap().is_clean());
    let graph = indexer.read().unwrap();

    // module_init/module_exit bind the File entity to the registered functions
    let file = edges_from(&graph, "kernel_example.c#file:kernel_example.c");
    let init = single(&file, EdgeKind::ModuleInit);
    assert_eq!(init.target, Some(id("kernel_example.c#fn:example_init")));
    let exit = single(&file, EdgeKind::ModuleExit);
    assert_eq!(exit.target, Some(id("kernel_example.c#fn:example_exit")));
    assert!(!file
        .iter()
        .any(|e| e.kind == EdgeKind::Calls && e.target_name.starts_with("module_")));
    let incoming = graph.edges_to(&id("kernel_example.c#fn:example_init")).unwrap();
    assert!(incoming.iter().any(|e| e.kind == EdgeKind::ModuleInit));

    let teardown = edges_from(&graph, "kernel_example.c#fn:example_exit");
    let lock = id("kernel_example.c#var:example_lock");
    assert_eq!(single(&teardown, EdgeKind::Locks).target, Some(lock.clone()));
    assert_eq!(single(&teardown, EdgeKind::Unlocks).target, Some(lock.clone()));
    assert_eq!(
        graph.get_entity(&lock).unwrap().kernel_role,
        Some(KernelRole::Lock(LockKind::Spinlock))
    );
    let debug = graph
        .get_entity(&id("kernel_example.c#var:debug_level"))
        .unwrap();
    assert!(matches!(
        &debug.kernel_role,
        Some(KernelRole::ModuleParameter { param_type, description: Some(_), .. }) if param_type == "int"
    ));

    // SYSCALL_DEFINE1 defines sys_table_get, which owns the body's edges
    let syscall = graph.get_entity(&id("table.c#fn:sys_table_get")).unwrap();
    assert!(matches!(
        &syscall.kernel_role,
        Some(KernelRole::Syscall { name, param_count: 1, compat: false }) if name == "table_get"
    ));
    let body = edges_from(&graph, "table.c#fn:sys_table_get");
    let table_lock = id("table.c#var:table_lock");
    assert_eq!(single(&body, EdgeKind::Locks).target, Some(table_lock.clone()));
    assert_eq!(single(&body, EdgeKind::Unlocks).target, Some(table_lock.clone()));
    let calls: Vec<(&str, Option<EntityId>)> = body
        .iter()
        .filter(|e| e.kind == EdgeKind::Calls)
        .map(|e| (e.target_name.as_str(), e.target.clone()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("mutex_lock", None),
            ("lookup", Some(id("table.c#fn:lookup"))),
            ("mutex_unlock", None),
        ]
    );
    assert_eq!(
        graph.get_entity(&table_lock).unwrap().kernel_role,
        Some(KernelRole::Lock(LockKind::Mutex))
    );

    // EXPORT_SYMBOL* binds to functions and variables alike
    let exports: Vec<Option<EntityId>> = edges_from(&graph, "table.c#file:table.c")
        .into_iter()
        .filter(|e| e.kind == EdgeKind::Exports)
        .map(|e| e.target)
        .collect();
    assert_eq!(
        exports,
        vec![Some(id("table.c#fn:lookup")), Some(id("table.c#var:table_size"))]
    );
}

#[test]
fn test_partial_failure_isolation() {
    let dir = corpus(&[
        ("good.c", LIB_C),
        ("broken.c", "}} )) ]] ;; }}\n"),
        ("partial.c", "int ok(void) { return 1; }\n/* never closed\nint hidden(void) { return 2; }\n"),
    ]);
    write(dir.path(), "big.c", "int x;\n".repeat(400));
    write(dir.path(), "latin1.c", b"int x = 1; /* caf\xe9 */\n");

    let config = IndexerConfig::default().with_max_file_size(1024);
    let indexer = Indexer::for_root(dir.path(), config).unwrap();
    let report = indexer.scan_root().unwrap();

    assert_eq!(report.indexed, 2);
    assert_eq!(report.failed.len(), 3);
    assert!(!report.is_clean());
    let failed: BTreeSet<String> = report
        .failed
        .iter()
        .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let expected: BTreeSet<String> = ["big.c", "broken.c", "latin1.c"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(failed, expected);
    let reason = |name: &str| {
        report
            .failed
            .iter()
            .find(|(path, _)| path.ends_with(name))
            .map(|(_, reason)| reason.clone())
            .unwrap()
    };
    assert!(reason("big.c").contains("exceeding maximum size"));
    assert!(reason("latin1.c").contains("not valid UTF-8"));
    assert!(reason("broken.c").contains("No entities"));

    assert_eq!(report.partial.len(), 1);
    assert!(report.partial[0].0.ends_with("partial.c"));
    assert!(report.partial[0].1 > 0);

    let graph = indexer.read().unwrap();
    assert!(graph.get_entity(&id("good.c#fn:lib_fn")).is_ok());
    assert!(graph.get_entity(&id("partial.c#fn:ok")).is_ok());
    assert!(graph.unit(&UnitId::new("broken.c")).is_none());
}

#[test]
fn test_failed_reindex_keeps_previous_content_and_retries() {
    let dir = corpus(&[("lib.c", LIB_C)]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();

    write(dir.path(), "lib.c", "}} )) ]] ;; }}\n");
    let report = indexer.on_file_changed("lib.c").unwrap();
    assert_eq!(report.failed.len(), 1);
    {
        let graph = indexer.read().unwrap();
        assert!(graph.get_entity(&id("lib.c#fn:lib_fn")).is_ok());
        assert_eq!(
            graph.unit(&UnitId::new("lib.c")).unwrap().state,
            UnitState::Stale
        );
    }

    // Same bytes as the indexed version: still retried because the unit is stale
    write(dir.path(), "lib.c", LIB_C);
    let report = indexer.scan_root().unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.unchanged, 0);
    let graph = indexer.read().unwrap();
    assert_eq!(
        graph.unit(&UnitId::new("lib.c")).unwrap().state,
        UnitState::Indexed
    );
}

#[test]
fn test_scan_removes_units_missing_from_file_list() {
    let dir = corpus(&[("a.c", LIB_C), ("b.c", MAIN_C)]);
    let indexer = indexer(&dir);
    assert_eq!(indexer.scan(["a.c", "b.c"]).unwrap().indexed, 2);

    let report = indexer.scan(["a.c"]).unwrap();
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.removed, 1);
    let graph = indexer.read().unwrap();
    assert_eq!(
        graph.units().map(|u| u.id.to_string()).collect::<Vec<_>>(),
        vec!["a.c"]
    );
}

#[test]
fn test_snapshot_round_trip_preserves_queries() {
    let dir = corpus(FIXTURES);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();

    let snapshot = indexer.snapshot().unwrap();
    let json = serde_json::to_string(&snapshot).unwrap();
    let decoded: GraphSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, snapshot);

    let restored = GraphStore::from_snapshot(decoded).unwrap();
    {
        let original = indexer.read().unwrap();
        for name in ["main", "add", "multiply", "Person", "DEBUG_PRINT"] {
            let lhs: Vec<_> = original.find_by_name(name).iter().map(|e| e.id.clone()).collect();
            let rhs: Vec<_> = restored.find_by_name(name).iter().map(|e| e.id.clone()).collect();
            assert_eq!(lhs, rhs, "find_by_name({name})");
        }
        for source in ["pointer_test.c#fn:main", "structs.c#fn:create_person"] {
            assert_eq!(edges_from(&original, source), edges_from(&restored, source));
        }
        assert_eq!(
            original.edges_to(&id("pointer_test.c#fn:add")).unwrap(),
            restored.edges_to(&id("pointer_test.c#fn:add")).unwrap()
        );
        assert_eq!(original.dangling_count(), restored.dangling_count());
        for unit in original.units() {
            let unit = unit.id.as_str();
            assert_eq!(entity_ids(&original, unit), entity_ids(&restored, unit), "order of {unit}");
        }
    }

    // A restored graph knows the content hashes: nothing to redo
    let config = IndexerConfig::default();
    let registry = ParserRegistry::with_builtin(&config.parser);
    let resumed = Indexer::with_store(dir.path(), config, registry, restored).unwrap();
    let report = resumed.scan_root().unwrap();
    assert_eq!(report.unchanged, FIXTURES.len());
    assert!(report.is_noop());
}

#[test]
fn test_cancelled_scan_applies_nothing() {
    let dir = corpus(&[("a.c", LIB_C), ("b.c", MAIN_C)]);
    let indexer = indexer(&dir);
    let token = indexer.cancellation_token();

    token.cancel();
    let report = indexer.scan_root().unwrap();
    assert!(report.cancelled);
    assert!(!report.is_clean());
    assert_eq!(report.indexed, 0);
    assert_eq!(indexer.read().unwrap().entity_count(), 0);

    token.reset();
    assert_eq!(indexer.scan_root().unwrap().indexed, 2);

    // Cancellation also stops the removal of units missing from the list
    token.cancel();
    let report = indexer.scan(Vec::<CorpusFile>::new()).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.removed, 0);
    assert_eq!(indexer.read().unwrap().unit_count(), 2);
}

#[test]
fn test_unsupported_files_and_language_detection() {
    let dir = corpus(&[
        ("notes.txt", "nothing to see here\n"),
        ("table.inc", "// language: c\nint table_size(void) { return 4; }\n"),
        ("gen.def", "int generated(void) { return 0; }\n"),
    ]);
    let config = IndexerConfig::default().with_report_unsupported(true);
    let indexer = Indexer::for_root(dir.path(), config).unwrap();

    let report = indexer
        .scan(vec![
            CorpusFile::new("notes.txt"),
            CorpusFile::new("table.inc"),
            CorpusFile::new("gen.def").with_language("c"),
        ])
        .unwrap();
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].0.ends_with("notes.txt"));
    assert!(report.is_clean());

    let graph = indexer.read().unwrap();
    assert!(graph.get_entity(&id("table.inc#fn:table_size")).is_ok());
    assert!(graph.get_entity(&id("gen.def#fn:generated")).is_ok());
    assert_eq!(graph.unit(&UnitId::new("gen.def")).unwrap().language, "c");

    let quiet = Indexer::for_root(dir.path(), IndexerConfig::default()).unwrap();
    let report = quiet.scan(["notes.txt"]).unwrap();
    assert!(report.skipped.is_empty());
    assert!(report.is_clean());
}

#[test]
fn test_scan_root_skips_ignored_directories() {
    let dir = corpus(&[
        ("src/main.c", MAIN_C),
        (".git/hooks/sample.c", LIB_C),
        ("target/gen.c", LIB_C),
        ("vendor/lib.c", LIB_C),
        ("README.md", "# readme\n"),
    ]);
    let config = IndexerConfig::default().with_ignore_dir("vendor");
    let indexer = Indexer::for_root(dir.path(), config).unwrap();

    let report = indexer.scan_root().unwrap();
    assert_eq!(report.indexed, 1);
    let graph = indexer.read().unwrap();
    assert!(graph.unit(&UnitId::new("src/main.c")).is_some());
    assert!(graph.find_by_name("lib_fn").is_empty());
}

#[test]
fn test_scan_root_requires_directory() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::for_root(dir.path().join("missing"), IndexerConfig::default()).unwrap();
    assert!(matches!(indexer.scan_root(), Err(IndexError::Io { .. })));
}

#[test]
fn test_includes_resolve_to_files_by_path_suffix() {
    let dir = corpus(&[
        ("include/util.h", "int util(void);\n#define UTIL_MAX 8\n"),
        ("src/main.c", "#include \"util.h\"\n#include <stdio.h>\nint main(void) { return util(); }\n"),
    ]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();
    let graph = indexer.read().unwrap();

    let includes: Vec<Edge> = edges_from(&graph, "src/main.c#file:src/main.c")
        .into_iter()
        .filter(|e| e.kind == EdgeKind::Includes)
        .collect();
    assert_eq!(includes.len(), 2);
    assert_eq!(includes[0].target_name, "util.h");
    assert_eq!(
        includes[0].target,
        Some(id("include/util.h#file:include/util.h"))
    );
    assert_eq!(includes[1].target_name, "stdio.h");
    assert!(includes[1].target.is_none());
}

#[test]
fn test_static_definitions_do_not_bind_across_units() {
    let dir = corpus(&[
        ("a.c", "static int helper(void) { return 1; }\nint a(void) { return helper(); }\n"),
        ("b.c", "int b(void) { return helper(); }\n"),
    ]);
    let indexer = indexer(&dir);
    indexer.scan_root().unwrap();
    let graph = indexer.read().unwrap();

    assert_eq!(
        edges_from(&graph, "a.c#fn:a")[0].target,
        Some(id("a.c#fn:helper"))
    );
    assert!(edges_from(&graph, "b.c#fn:b")[0].target.is_none());
}

#[test]
fn test_parallel_and_sequential_scans_agree() {
    let dir = corpus(FIXTURES);
    let parallel =
        Indexer::for_root(dir.path(), IndexerConfig::default().with_workers(4)).unwrap();
    let sequential = Indexer::for_root(dir.path(), IndexerConfig::sequential()).unwrap();
    parallel.scan_root().unwrap();
    sequential.scan_root().unwrap();

    let a = parallel.snapshot().unwrap();
    let b = sequential.snapshot().unwrap();
    assert_eq!(a.entities, b.entities);
    assert_eq!(a.edges, b.edges);
}

#[test]
fn test_readers_can_query_during_scan() {
    let dir = corpus(FIXTURES);
    let indexer = indexer(&dir);
    let graph = indexer.graph();

    let reader = std::thread::spawn(move || {
        let mut seen = 0;
        for _ in 0..200 {
            seen = seen.max(graph.read().unwrap().entity_count());
        }
        seen
    });
    let report = indexer.scan_root().unwrap();
    let seen = reader.join().unwrap();

    assert_eq!(report.indexed, FIXTURES.len());
    assert!(seen <= indexer.read().unwrap().entity_count());
}
