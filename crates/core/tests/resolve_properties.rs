//! End-to-end resolution behavior: merge precedence, self-reference,
//! cycles, optionality, concatenation, partial resolution, and the
//! resolve/render round trip.

use std::rc::Rc;

use canopy_core::render::render;
use canopy_core::resolve::{ResolveOptions, Resolver};
use canopy_core::{Config, ConfigError, Origin, Path, RenderOptions, Value};

fn resolved(text: &str) -> Config {
    Config::parse_str(text).unwrap().resolve().unwrap()
}

// ── Merge precedence ─────────────────────────────────────────────────

#[test]
fn fallback_prefers_primary_recursively() {
    let a = Config::parse_str("k = 1\nnested = { x = \"a\", only-a = true }").unwrap();
    let b = Config::parse_str("k = 2\nother = 3\nnested = { x = \"b\", only-b = true }").unwrap();
    let merged = a.with_fallback(&b);
    assert_eq!(merged.get_int("k").unwrap(), 1);
    assert_eq!(merged.get_int("other").unwrap(), 3);
    assert_eq!(merged.get_string("nested.x").unwrap(), "a");
    assert!(merged.get_bool("nested.only-a").unwrap());
    assert!(merged.get_bool("nested.only-b").unwrap());
}

// ── Self-reference via backward-looking merge ────────────────────────

#[test]
fn self_referential_merge_sees_only_earlier_definitions() {
    let config = resolved("a = { b = 1 }\na = ${a} { c = 2 }");
    assert_eq!(config.get_int("a.b").unwrap(), 1);
    assert_eq!(config.get_int("a.c").unwrap(), 2);
}

#[test]
fn plus_equals_accumulates_against_earlier_self() {
    let config = resolved("xs = [1]\nxs += 2\nxs += 3");
    let xs: Vec<i64> = config
        .get_list("xs")
        .unwrap()
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    assert_eq!(xs, [1, 2, 3]);
}

#[test]
fn plus_equals_on_undefined_path_starts_a_list() {
    let config = resolved("xs += 1");
    assert_eq!(config.get_list("xs").unwrap().len(), 1);
}

// ── Cycles ───────────────────────────────────────────────────────────

#[test]
fn true_cycle_is_an_error_naming_the_participants() {
    let err = Config::parse_str("a = ${b}\nb = ${a}")
        .unwrap()
        .resolve()
        .unwrap_err();
    match err {
        ConfigError::UnresolvedSubstitution { message, .. } => {
            assert!(message.contains("cycle"), "message: {}", message);
            assert!(message.contains("${a}"), "message: {}", message);
            assert!(message.contains("${b}"), "message: {}", message);
        }
        other => panic!("expected unresolved substitution, got {:?}", other),
    }
}

#[test]
fn self_cycle_without_merge_is_an_error() {
    let err = Config::parse_str("a = ${a}").unwrap().resolve().unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedSubstitution { .. }));
}

#[test]
fn optional_cycle_resolves_to_absent() {
    let config = resolved("a = ${?b}\nb = ${?a}\nkeep = 1");
    assert!(!config.has_path("a").unwrap());
    assert!(!config.has_path("b").unwrap());
    assert_eq!(config.get_int("keep").unwrap(), 1);
}

#[test]
fn cycles_error_even_with_allow_unresolved() {
    let config = Config::parse_str("a = ${b}\nb = ${a}").unwrap();
    let err = config
        .resolve_with(&ResolveOptions::new().allow_unresolved(true))
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedSubstitution { .. }));
}

// ── Concatenation ────────────────────────────────────────────────────

#[test]
fn string_concatenation_through_substitution() {
    let config = resolved("y = \"X\"\nx = abc ${y} def");
    assert_eq!(config.get_string("x").unwrap(), "abcXdef");
}

#[test]
fn list_concatenation_through_substitution() {
    let config = resolved("y = [3]\nx = [1, 2] ${y}");
    let xs: Vec<i64> = config
        .get_list("x")
        .unwrap()
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    assert_eq!(xs, [1, 2, 3]);
}

#[test]
fn object_concatenation_through_substitution_merges() {
    let config = resolved("base = { a = 1 }\nx = ${base} { b = 2 }");
    assert_eq!(config.get_int("x.a").unwrap(), 1);
    assert_eq!(config.get_int("x.b").unwrap(), 2);
}

#[test]
fn missing_optional_pieces_drop_out_of_concatenations() {
    let config = resolved("x = abc ${?gone} def");
    assert_eq!(config.get_string("x").unwrap(), "abcdef");
    let config = resolved("x = ${?gone} ${?also-gone}\nkeep = 1");
    assert!(!config.has_path("x").unwrap());
    assert_eq!(config.get_int("keep").unwrap(), 1);
}

#[test]
fn concatenating_list_with_scalar_is_wrong_type() {
    let err = Config::parse_str("y = \"s\"\nx = [1] ${y}")
        .unwrap()
        .resolve()
        .unwrap_err();
    assert!(matches!(err, ConfigError::WrongType { .. }));
}

// ── Optional omission ────────────────────────────────────────────────

#[test]
fn missing_optional_substitution_omits_the_key() {
    let config = resolved("x = ${?missing}\nkeep = 1");
    assert!(!config.has_path("x").unwrap());
    assert!(config.root().object_fields().unwrap().get("x").is_none());
}

#[test]
fn missing_optional_element_omits_the_list_slot() {
    let config = resolved("xs = [1, ${?gone}, 3]");
    let xs: Vec<i64> = config
        .get_list("xs")
        .unwrap()
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    assert_eq!(xs, [1, 3]);
}

#[test]
fn missing_non_optional_substitution_is_an_error() {
    let err = Config::parse_str("x = ${missing}")
        .unwrap()
        .resolve()
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedSubstitution { .. }));
}

// ── Backward/forward references ──────────────────────────────────────

#[test]
fn forward_references_resolve() {
    let config = resolved("x = ${later}\nlater = 10");
    assert_eq!(config.get_int("x").unwrap(), 10);
}

#[test]
fn chained_references_share_one_resolution() {
    let config = resolved("a = ${b}\nb = ${c}\nc = { deep = 1 }");
    assert_eq!(config.get_int("a.deep").unwrap(), 1);
    assert_eq!(config.get_int("b.deep").unwrap(), 1);
}

#[test]
fn substitution_sees_the_whole_document_not_just_siblings() {
    let config = resolved("outer { r = ${target} }\ntarget = 7");
    assert_eq!(config.get_int("outer.r").unwrap(), 7);
}

// ── External fallback ────────────────────────────────────────────────

struct MapResolver(Vec<(String, String)>);

impl Resolver for MapResolver {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.0
            .iter()
            .find(|(k, _)| k == path)
            .map(|(_, v)| Value::string(v.clone(), Origin::new("map resolver")))
    }
}

#[test]
fn external_fallback_fills_paths_missing_from_the_document() {
    let options = ResolveOptions::new().with_resolver(Rc::new(MapResolver(vec![(
        "HOME_DIR".to_owned(),
        "/home/someone".to_owned(),
    )])));
    let config = Config::parse_str("home = ${HOME_DIR}\nlocal = 1")
        .unwrap()
        .resolve_with(&options)
        .unwrap();
    assert_eq!(config.get_string("home").unwrap(), "/home/someone");
}

#[test]
fn document_values_win_over_the_external_fallback() {
    let options = ResolveOptions::new().with_resolver(Rc::new(MapResolver(vec![(
        "x".to_owned(),
        "from-env".to_owned(),
    )])));
    let config = Config::parse_str("x = from-doc\ny = ${x}")
        .unwrap()
        .resolve_with(&options)
        .unwrap();
    assert_eq!(config.get_string("y").unwrap(), "from-doc");
}

// ── Partial / lazy resolution ────────────────────────────────────────

#[test]
fn resolve_value_at_ignores_broken_unrelated_branches() {
    let config = Config::parse_str(
        "holder = ${template}\ntemplate = { leaf = ${v} }\nv = 5\nbroken = ${nope}",
    )
    .unwrap();
    // a full resolve fails on the broken branch
    assert!(config.resolve().is_err());
    // but the one path we care about resolves lazily
    let leaf = config
        .resolve_value_at("holder.leaf", &ResolveOptions::new())
        .unwrap()
        .unwrap();
    assert_eq!(leaf.as_int(), Some(5));
}

#[test]
fn resolve_value_at_absent_path_is_none() {
    let config = Config::parse_str("a = 1").unwrap();
    assert!(config
        .resolve_value_at("b.c", &ResolveOptions::new())
        .unwrap()
        .is_none());
}

#[test]
fn restricted_resolve_leaves_other_branches_untouched() {
    let config = Config::parse_str(
        "holder = ${template}\ntemplate = { leaf = 1 }\nbroken = ${nope}",
    )
    .unwrap();
    let partial = config
        .resolve_with(
            &ResolveOptions::new().restrict_to_path(Path::parse("holder.leaf").unwrap()),
        )
        .unwrap();
    // the path spine was materialized
    assert_eq!(partial.get_int("holder.leaf").unwrap(), 1);
    // the broken branch was never visited
    assert!(!partial.is_resolved());
}

#[test]
fn allow_unresolved_returns_the_reference_nodes() {
    let config = Config::parse_str("a = ${missing}\nb = 2").unwrap();
    let partial = config
        .resolve_with(&ResolveOptions::new().allow_unresolved(true))
        .unwrap();
    assert_eq!(partial.get_int("b").unwrap(), 2);
    assert!(!partial.is_resolved());
    let out = partial.render(&RenderOptions::concise());
    assert!(out.contains("${missing}"));
}

// ── Idempotence and determinism ──────────────────────────────────────

const EXERCISE: &str = "base = { a = 1 }\nbase = ${base} { b = 2 }\n\
                        y = \"X\"\nx = abc ${y} def\n\
                        more = [3]\nlist = [1, 2] ${more}\n\
                        opt = ${?nothing}\nplus += 1\n";

#[test]
fn resolve_is_idempotent() {
    let once = resolved(EXERCISE);
    let twice = once.resolve().unwrap();
    assert_eq!(once, twice);
    assert!(once.root().same_node(twice.root()));
}

#[test]
fn resolve_is_deterministic() {
    let a = resolved(EXERCISE);
    let b = resolved(EXERCISE);
    assert_eq!(a, b);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
}

// ── Render round trip ────────────────────────────────────────────────

#[test]
fn rendered_unresolved_tree_reparses_to_the_same_resolution() {
    for options in [RenderOptions::hocon(), RenderOptions::concise()] {
        let unresolved = Config::parse_str(EXERCISE).unwrap();
        let rendered = unresolved.render(&options);
        let reparsed = Config::parse_str(&rendered)
            .unwrap_or_else(|e| panic!("render did not reparse: {}\n{}", e, rendered));
        assert_eq!(
            reparsed.resolve().unwrap().to_json().unwrap(),
            unresolved.resolve().unwrap().to_json().unwrap()
        );
    }
}

#[test]
fn rendered_resolved_tree_round_trips_as_json() {
    let config = resolved(EXERCISE);
    let rendered = config.render(&RenderOptions::json());
    let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(json, config.to_json().unwrap());
}

// ── Resolution never mutates its input ───────────────────────────────

#[test]
fn the_unresolved_tree_survives_resolution() {
    let config = Config::parse_str("a = ${b}\nb = 1").unwrap();
    let before = render(config.root(), &RenderOptions::concise());
    let _ = config.resolve().unwrap();
    let after = render(config.root(), &RenderOptions::concise());
    assert_eq!(before, after);
    assert!(!config.is_resolved());
}

#[test]
fn failed_resolution_leaves_the_tree_untouched() {
    let config = Config::parse_str("a = ${missing}").unwrap();
    let before = render(config.root(), &RenderOptions::concise());
    assert!(config.resolve().is_err());
    assert_eq!(before, render(config.root(), &RenderOptions::concise()));
}

// ── Pathological depth ───────────────────────────────────────────────

#[test]
fn runaway_substitution_chains_error_instead_of_overflowing() {
    let mut text = String::new();
    for i in 0..1500 {
        text.push_str(&format!("k{} = ${{k{}}}\n", i, i + 1));
    }
    text.push_str("k1500 = 1\n");
    let err = Config::parse_str(&text).unwrap().resolve().unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedSubstitution { .. }));
}

// ── Null vs missing ──────────────────────────────────────────────────

#[test]
fn explicit_null_is_distinct_from_missing() {
    let config = resolved("a = null");
    // the key exists in the tree
    assert!(config.root().object_fields().unwrap().contains_key("a"));
    // but reads as missing through the typed facade
    assert!(matches!(
        config.get_string("a"),
        Err(ConfigError::Missing { .. })
    ));
    // substituting a null is fine
    let config = resolved("a = null\nb = ${a}");
    assert!(config.root().object_fields().unwrap()["b"].is_null());
}

#[test]
fn to_json_distinguishes_null_from_absent() {
    let json = resolved("a = null\nb = ${?gone}").to_json().unwrap();
    assert_eq!(json, serde_json::json!({ "a": null }));
}
