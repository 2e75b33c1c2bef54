//! End-to-end transpilation scenarios: source text in, artifact map out.

use mcfn_core::{compile, transpile, ArtifactMap, CompileError, Position, Stage, TranspileConfig};

fn build(src: &str) -> ArtifactMap {
    transpile(src, &TranspileConfig::default())
        .unwrap_or_else(|e| panic!("transpile failed: {}", e))
}

fn fail(src: &str) -> CompileError {
    match transpile(src, &TranspileConfig::default()) {
        Ok(map) => panic!("expected an error, got {:?}", map.keys()),
        Err(e) => e,
    }
}

fn artifact<'m>(map: &'m ArtifactMap, resource: &str) -> &'m str {
    let path = format!("namespace/function/{}.mcfunction", resource);
    map.get(&path)
        .unwrap_or_else(|| panic!("missing {}; have {:?}", path, map.keys()))
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn guarded_raw_command_and_dispatcher() {
    let map = build("obj a(dummy); var a:x; a:x = 2; if(a:x==2)[Q1]{ runs{ say hi } }");

    let entry = artifact(&map, "main");
    assert!(entry.contains("scoreboard players set x a 2\n"));
    assert!(entry.contains(
        "execute if score x a matches 2..2 run function namespace:__mcfn/main/s1\n"
    ));
    assert!(!entry.contains("say hi"));
    assert_eq!(artifact(&map, "__mcfn/main/s1"), "say hi\n");

    assert!(artifact(&map, "__mcfn/main/w0").contains("#main.Q1 mcfq"));
    assert!(artifact(&map, "__mcfn/any_open").contains("#main.Q1 mcfq"));
    assert!(artifact(&map, "__mcfn/load").contains("scoreboard players set #main.Q1 mcfq 0"));
    assert!(map.contains_key("namespace/function/__mcfn/dispatch.mcfunction"));
}

#[test]
fn statement_after_wait_call_runs_in_gated_segment() {
    let map = build(
        "obj a\nvar a:x\nfunc worker() {\n  a:x += 1\n}\ncall worker()[Q2];\nrun(\"say done\")",
    );
    let entry = artifact(&map, "main");
    assert!(!entry.contains("say done"), "continuation merged into entry:\n{}", entry);
    assert!(entry.contains("function namespace:worker\n"));
    assert!(entry.contains("schedule function namespace:__mcfn/main/w0 1t replace\n"));

    assert_eq!(artifact(&map, "__mcfn/main/s1"), "say done\n");
    assert_eq!(
        artifact(&map, "__mcfn/main/select"),
        "execute if score #resume mcfq matches 1 run function namespace:__mcfn/main/s1\n"
    );
    let watcher = artifact(&map, "__mcfn/main/w0");
    assert!(watcher.starts_with("scoreboard players set #main.Q2 mcfq 0\n"));
    assert!(watcher.contains("scoreboard players set #resume mcfq 1\n"));
}

#[test]
fn sibling_slot_reuse_is_rejected_before_codegen() {
    let err = fail("obj a\nvar a:x\nif(a:x==1)[Qx]{ a:x = 2 }\nif(a:x==2)[Qx]{ a:x = 3 }");
    assert_eq!(err.stage, Stage::Plan);
    assert_eq!(err.position, Some(Position::new(4, 12)));
    assert!(err.message.contains("queue slot 'Qx'"), "{}", err.message);
}

// ──────────────────────────────────────────────
// Properties
// ──────────────────────────────────────────────

const PROGRAM: &str = r#"
obj pts, deaths(deathCount)
var pts:alex, pts:round
const ROUNDS = 3

func countdown() {
  while(pts:round > 0)[Tick] {
    title(actionbar, "Tick")
    pts:round -= 1
  }
}

func announce() {
  show(v"Alex has [pts:alex] points")
}

while(pts:round < ROUNDS) {
  call countdown()[Wait]
  call announce()
  pts:alex = pts:alex + pts:round
}
call countdown()[Again]
show("done")
"#;

#[test]
fn transpiling_twice_is_byte_identical() {
    let first = build(PROGRAM);
    let second = build(PROGRAM);
    assert_eq!(first, second);
}

#[test]
fn k_waits_give_k_plus_one_segments() {
    let program = compile(
        "obj a\nvar a:x\nfunc w() { a:x = 1 }\nif(a:x==1)[A]{ }\ncall w()[B]\nwhile(a:x<3)[C]{ a:x += 1 }\nif(a:x)[D]{ }\na:x = 0",
        &TranspileConfig::default(),
    )
    .unwrap();
    let main = program.plan.root("main").unwrap();
    assert_eq!(main.body.segments.len(), 5);
}

#[test]
fn async_call_sites_get_distinct_counter_keys() {
    let map = build(PROGRAM);
    let load = artifact(&map, "__mcfn/load");
    assert!(load.contains("#countdown-1.Tick mcfq 0"));
    assert!(load.contains("#countdown-2.Tick mcfq 0"));
    assert!(load.contains("#main.Wait mcfq 0"));
    assert!(load.contains("#main.Again mcfq 0"));

    let wait = artifact(&map, "__mcfn/main/w0");
    assert!(wait.contains("#countdown-1.Tick"));
    assert!(!wait.contains("#countdown-2.Tick"));
    let again = artifact(&map, "__mcfn/main/w1");
    assert!(again.contains("#countdown-2.Tick"));
}

#[test]
fn interpolation_binds_scores_not_text() {
    let map = build(PROGRAM);
    assert_eq!(
        artifact(&map, "announce"),
        "tellraw @a [{\"text\":\"Alex has \"},{\"score\":{\"name\":\"alex\",\"objective\":\"pts\"}},{\"text\":\" points\"}]\n"
    );
}

#[test]
fn interpolated_reference_to_undeclared_score_is_an_error() {
    let err = fail("obj pts\nvar pts:alex\nshow(v\"[pts:steve] wins\")");
    assert_eq!(err.stage, Stage::Plan);
    assert_eq!(err.position, Some(Position::new(3, 6)));

    let err = fail("obj pts\nrun(v\"say [kills:alex]\")");
    assert_eq!(err.stage, Stage::Plan);
}

#[test]
fn interpolation_is_rejected_where_it_is_not_supported() {
    let err = fail("obj pts\nvar pts:alex\ntitle(title, v\"[pts:alex]\")");
    assert_eq!(err.stage, Stage::Plan);

    let err = fail("runs {\n  tellraw @a v\"x\"\n}");
    assert_eq!(err.stage, Stage::Lex);
    assert_eq!(err.position, Some(Position::new(2, 14)));
}

#[test]
fn runtime_objective_name_is_reserved() {
    let err = fail("obj mcfq");
    assert_eq!(err.stage, Stage::Plan);
    assert_eq!(err.position, Some(Position::new(1, 5)));
}

// ──────────────────────────────────────────────
// Error positions
// ──────────────────────────────────────────────

#[test]
fn errors_carry_line_and_column() {
    let err = fail("obj a\nvar a:x\na:x = 1 ?");
    assert_eq!(err.stage, Stage::Lex);
    assert_eq!((err.line(), err.column()), (Some(3), Some(9)));

    let err = fail("obj a\nvar a:x\nif a:x { }");
    assert_eq!(err.stage, Stage::Parse);
    assert_eq!(err.position, Some(Position::new(3, 4)));

    let err = fail("obj a\nvar a:x\n\n  a:y = 1");
    assert_eq!(err.stage, Stage::Plan);
    assert_eq!(err.position, Some(Position::new(4, 3)));

    let err = fail("obj a\nvar a:x\ncall nowhere()[Q]");
    assert_eq!(err.stage, Stage::Plan);
    assert!(err.message.contains("nowhere"), "{}", err.message);
}

#[test]
fn failed_run_returns_no_artifacts() {
    let config = TranspileConfig {
        namespace: "demo".into(),
        ..TranspileConfig::default()
    };
    assert!(transpile("obj a\nshow(v\"[a:nope]\")", &config).is_err());
    let ok = transpile("obj a", &config).unwrap();
    assert!(ok
        .keys()
        .all(|k| k.starts_with("demo/function/") || k == "minecraft/tags/function/load.json"));
}

// ──────────────────────────────────────────────
// Hooks and loops
// ──────────────────────────────────────────────

#[test]
fn ready_hook_runs_after_the_runtime_bootstrap() {
    let config = TranspileConfig {
        namespace: "arena".into(),
        ..TranspileConfig::default()
    };
    let map = transpile(
        "obj pts\nvar pts:alex\nfunc w() { if(pts:alex > 0)[W] { pts:alex -= 1 } }\nfunc _ready() {\n  call w()[Boot]\n  show(\"ready\")\n}",
        &config,
    )
    .unwrap();
    let tag: serde_json::Value =
        serde_json::from_str(&map["minecraft/tags/function/load.json"]).unwrap();
    assert_eq!(
        tag["values"],
        serde_json::json!(["arena:__mcfn/load", "arena:_ready"])
    );
    assert!(!map.contains_key("minecraft/tags/function/tick.json"));
    assert!(map["arena/function/_ready.mcfunction"].contains("scoreboard players set #_ready.Boot mcfq 1\n"));
}

#[test]
fn unawaited_wait_bearing_call_in_a_loop_fails() {
    let err = fail(
        "obj a, b\nvar a:x, a:i, b:count\nfunc w() { if(a:x >= 0)[W] { }\n b:count += 1 }\nwhile(a:i < 3) { a:i += 1\n call w() }",
    );
    assert_eq!(err.stage, Stage::Plan);
    assert_eq!(err.position, Some(Position::new(6, 2)));
}

#[test]
fn awaited_call_in_a_loop_keeps_one_copy() {
    let map = build(
        "obj a\nvar a:x, a:i\nfunc w() { if(a:x > 0)[W] { a:x -= 1 } }\nwhile(a:i < 3) {\n  a:i += 1\n  call w()[Q]\n}",
    );
    assert!(map.contains_key("namespace/function/__mcfn/w-1/s0.mcfunction"));
    assert!(!map.keys().any(|k| k.contains("__mcfn/w-2/")));
}
