//! End-to-end scenarios: partial datasets → merge → container → engine.

use common::{RuleDataset, RuleKind, RulePayload, Signature, Source, Visibility};
use engine::{
    ArgValue, DependencyTracker, LinterConfig, LinterPlugin, LookupEngine, MatchScope, QueryContext,
    Replacement,
};
use merge::{merge, PartialDataset};
use std::sync::Arc;
use std::thread;

const SDK: &str = r#"{
    "source": "sdk_lint",
    "records": [
        { "pattern": "android.webkit.WebView#clearCache(boolean)", "kind": "deprecated", "replacement": "clearCache2" },
        { "pattern": "android.webkit.WebView#clearCache(boolean)", "kind": "min_api_level", "level": 21 },
        { "pattern": "com.android.internal.*", "kind": "restricted_visibility", "visibility": { "type": "hidden" } },
        { "pattern": "com.android.*", "kind": "deprecated" },
        { "pattern": "android.app.Activity#getFragmentManager()", "kind": "deprecated" },
        { "pattern": "android.app.Activity#getFragmentManager()", "kind": "removed", "since": 34 },
        { "pattern": "android.graphics.Canvas#clipRect(float,float,float,float)", "kind": "min_api_level", "level": 14 },
        { "pattern": "not a pattern(", "kind": "deprecated" }
    ],
    "typedefs": [
        { "method": "android.view.View#setVisibility(int)", "argument": 0, "kind": "int",
          "constants": ["android.view.View.VISIBLE", "android.view.View.INVISIBLE", "android.view.View.GONE"] },
        { "method": "android.content.Context#sendBroadcast(android.content.Intent,int)", "argument": 1, "kind": "int", "flag": true,
          "constants": ["android.content.Intent.FLAG_RECEIVER_REGISTERED_ONLY",
                        "android.content.Intent.FLAG_RECEIVER_FOREGROUND",
                        "android.content.Intent.FLAG_DEBUG_LOG_RESOLUTION"] },
        { "method": "android.content.Context#getSystemService(java.lang.String)", "argument": 0, "kind": "string",
          "constants": ["android.content.Context.WINDOW_SERVICE"] }
    ],
    "constants": {
        "android.view.View.VISIBLE": "0",
        "android.view.View.INVISIBLE": "4",
        "android.view.View.GONE": "8",
        "android.content.Intent.FLAG_RECEIVER_REGISTERED_ONLY": "0x40000000",
        "android.content.Intent.FLAG_RECEIVER_FOREGROUND": "0x10000000",
        "android.content.Intent.FLAG_DEBUG_LOG_RESOLUTION": "8",
        "android.content.Context.WINDOW_SERVICE": "window"
    }
}"#;

const GOOGLE: &str = r#"{
    "source": "google_maven",
    "artifact": "androidx.core:core",
    "records": [
        { "pattern": "android.webkit.WebView#clearCache(boolean)", "kind": "deprecated", "replacement": "somethingElse" },
        { "pattern": "android.graphics.Canvas#clipRect(float,float,float,float)", "kind": "min_api_level", "level": 21 },
        { "pattern": "androidx.core.content.ContextCompat#getDrawable(android.content.Context,int)", "kind": "since_version", "version": "1.1.0" }
    ]
}"#;

const CENTRAL: &str = r#"{
    "source": "maven_central",
    "records": [
        { "pattern": "okhttp3.OkHttpClient#setProxy(java.net.Proxy)", "kind": "removed",
          "artifact": "com.squareup.okhttp3:okhttp" }
    ]
}"#;

fn dataset() -> Arc<RuleDataset> {
    let partials = [CENTRAL, GOOGLE, SDK]
        .iter()
        .map(|json| PartialDataset::from_json_str(json).unwrap());
    let (table, report) = merge(partials);
    assert_eq!(report.skipped, 1);
    let bytes = table.to_bytes().unwrap();
    Arc::new(RuleDataset::from_bytes(&bytes).unwrap())
}

fn shared_engine() -> LookupEngine {
    LookupEngine::new(dataset())
}

fn sig(text: &str) -> Signature {
    Signature::parse(text).unwrap()
}

#[test]
fn conflicting_sources_keep_one_record_from_higher_priority() {
    let dataset = dataset();
    let records: Vec<_> = dataset
        .lookup_exact(&sig("android.webkit.WebView#clearCache(boolean)"))
        .filter(|r| r.kind() == RuleKind::Deprecated)
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source, Source::SdkLint);
    assert_eq!(
        records[0].payload,
        RulePayload::Deprecated {
            replacement: Some("clearCache2".into())
        }
    );
}

#[test]
fn absent_signature_yields_nothing() {
    let engine = shared_engine();
    let absent = sig("org.nowhere.Thing#run()");
    assert_eq!(engine.dataset().lookup_exact(&absent).count(), 0);
    assert!(engine
        .find_rules_for(&absent, &QueryContext::at_api_level(30))
        .unwrap()
        .is_empty());
}

#[test]
fn minimum_levels_are_intersected() {
    let engine = shared_engine();
    let clip = sig("android.graphics.Canvas#clipRect(float,float,float,float)");
    let bounds: Vec<_> = engine.dataset().lookup_exact(&clip).collect();
    assert_eq!(bounds.len(), 1);
    assert_eq!(bounds[0].payload, RulePayload::MinApiLevel { level: 21 });
    assert_eq!(bounds[0].source, Source::GoogleMaven);

    let at_18 = engine.find_rules_for(&clip, &QueryContext::at_api_level(18)).unwrap();
    assert_eq!(at_18.len(), 1);
    assert_eq!(at_18[0].payload, RulePayload::MinApiLevel { level: 21 });
    assert!(engine
        .find_rules_for(&clip, &QueryContext::at_api_level(21))
        .unwrap()
        .is_empty());
}

#[test]
fn lookups_are_idempotent() {
    let engine = shared_engine();
    let target = sig("com.android.internal.Foo#bar()");
    let context = QueryContext::at_api_level(30);
    let first = engine.find_rules_for(&target, &context).unwrap();
    let second = engine.find_rules_for(&target, &context).unwrap();
    assert_eq!(first, second);
}

#[test]
fn removed_is_reported_before_deprecated() {
    let engine = shared_engine();
    let findings = engine
        .find_rules_for_text("android.app.Activity#getFragmentManager()", &QueryContext::new())
        .unwrap();
    let kinds: Vec<_> = findings.iter().map(|f| f.kind()).collect();
    assert_eq!(kinds, vec![RuleKind::Removed, RuleKind::Deprecated]);
}

#[test]
fn deprecated_webview_call_above_minimum() {
    let engine = shared_engine();
    let findings = engine
        .find_rules_for_text(
            "Landroid/webkit/WebView;#clearCache(Z)V",
            &QueryContext::at_api_level(30),
        )
        .unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].payload,
        RulePayload::Deprecated {
            replacement: Some("clearCache2".into())
        }
    );
    assert_eq!(findings[0].scope, MatchScope::Exact);
}

#[test]
fn restricted_prefix_stops_the_walk() {
    let engine = shared_engine();
    let findings = engine
        .find_rules_for_text("com.android.internal.Foo#bar()", &QueryContext::new())
        .unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(
        findings[0].payload,
        RulePayload::RestrictedVisibility {
            visibility: Visibility::Hidden
        }
    );
    assert_eq!(
        findings[0].scope,
        MatchScope::OwnerPrefix("com.android.internal".into())
    );

    // Outside the restricted subtree the outer Deprecated prefix applies.
    let outer = engine
        .find_rules_for_text("com.android.server.Bar#baz()", &QueryContext::new())
        .unwrap();
    assert_eq!(outer.len(), 1);
    assert_eq!(outer[0].kind(), RuleKind::Deprecated);
}

#[test]
fn typedef_constants_resolve() {
    let engine = shared_engine();
    let set_visibility = sig("android.view.View#setVisibility(int)");
    let gone = engine
        .resolve_argument(&set_visibility, None::<&str>, 0, ArgValue::Integer(8))
        .unwrap()
        .unwrap();
    assert_eq!(gone.replacement.to_string(), "View.GONE");
    assert_eq!(gone.source, Source::SdkLint);

    // Unknown value on a non-flag typedef.
    assert!(engine
        .resolve_argument(&set_visibility, None::<&str>, 0, ArgValue::Integer(3))
        .unwrap()
        .is_none());
    // Text never matches an integer typedef.
    assert!(engine
        .resolve_argument(&set_visibility, None::<&str>, 0, ArgValue::Text("8"))
        .unwrap()
        .is_none());
}

#[test]
fn flag_typedefs_unfold() {
    let engine = shared_engine();
    let send = sig("android.content.Context#sendBroadcast(android.content.Intent,int)");
    let resolution = engine
        .resolve_argument(&send, None::<&str>, 1, ArgValue::Integer(0x5000_0008))
        .unwrap()
        .unwrap();
    assert_eq!(
        resolution.replacement.to_string(),
        "1342177288 = (Intent.FLAG_RECEIVER_REGISTERED_ONLY | Intent.FLAG_RECEIVER_FOREGROUND | Intent.FLAG_DEBUG_LOG_RESOLUTION)"
    );
    match resolution.replacement {
        Replacement::Flags { remainder, .. } => assert_eq!(remainder, None),
        other => panic!("expected flags, got {other:?}"),
    }
}

#[test]
fn supertypes_are_walked_in_order() {
    let engine = shared_engine();
    let on_subclass = sig("android.app.Activity#getSystemService(java.lang.String)");
    assert!(engine
        .resolve_argument(&on_subclass, None::<&str>, 0, ArgValue::Text("window"))
        .unwrap()
        .is_none());

    let resolution = engine
        .resolve_argument(
            &on_subclass,
            ["android.view.ContextThemeWrapper", "android.content.Context"],
            0,
            ArgValue::Text("window"),
        )
        .unwrap()
        .unwrap();
    assert_eq!(resolution.replacement.to_string(), "Context.WINDOW_SERVICE");
    assert_eq!(resolution.declared_on.owner(), "android.content.Context");
}

#[test]
fn resolve_rejects_non_methods() {
    let engine = shared_engine();
    let field = sig("android.view.View#VISIBLE");
    assert!(engine
        .resolve_argument(&field, None::<&str>, 0, ArgValue::Integer(0))
        .is_err());
}

#[test]
fn dependencies_are_tracked_from_findings() {
    let engine = shared_engine();
    let tracker = DependencyTracker::new();
    for text in [
        "okhttp3.OkHttpClient#setProxy(java.net.Proxy)",
        "androidx.core.content.ContextCompat#getDrawable(android.content.Context,int)",
        "android.app.Activity#getFragmentManager()",
    ] {
        let findings = engine.find_rules_for_text(text, &QueryContext::new()).unwrap();
        tracker.observe_findings(&findings);
    }
    assert_eq!(
        tracker.snapshot(),
        vec!["androidx.core:core", "com.squareup.okhttp3:okhttp"]
    );
}

#[test]
fn concurrent_queries_share_one_engine() {
    let engine = shared_engine();
    let expected = engine
        .find_rules_for_text("com.android.internal.Foo#bar()", &QueryContext::new())
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let expected = expected.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let got = engine
                        .find_rules_for_text("com.android.internal.Foo#bar()", &QueryContext::new())
                        .unwrap();
                    assert_eq!(got, expected);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn plugin_activates_from_saved_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.rkyv");
    let partials = [PartialDataset::from_json_str(SDK).unwrap()];
    let (table, _) = merge(partials);
    table.save(&path).unwrap();

    let config = LinterConfig {
        dataset: path,
        api_level: Some(30),
        strict: false,
    };
    let plugin = LinterPlugin::activate(&config);
    assert!(plugin.is_enabled());
    let findings = plugin
        .find_rules_for(
            &sig("android.webkit.WebView#clearCache(boolean)"),
            &config.query_context(),
        )
        .unwrap();
    assert_eq!(findings.len(), 1);
}
