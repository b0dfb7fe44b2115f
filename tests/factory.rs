//! End-to-end resolution tests running the factory against a mounted
//! repository and real fixture files.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use asset_resolver::{
    AssetError, AssetFactory, AssetName, AssetNode, AssetOptions, AssetSource, InMemoryRepository,
    ResolvedNode, RootLayout,
};

fn write_fixture(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture directory");
    }
    std::fs::write(&path, content).expect("failed to write fixture");
}

/// A project layout with a default root mounted into the repository at
/// `/acme/blog`, plus a second root outside of the repository.
fn fixture_with(customize: impl FnOnce(&mut InMemoryRepository)) -> (AssetFactory, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_fixture(dir.path(), "assets/css/style.css", "/* style.css */\n");
    write_fixture(dir.path(), "assets/css/reset.css", "/* reset.css */\n");
    write_fixture(dir.path(), "assets/css/app.css", "/* app root */\n");
    write_fixture(
        dir.path(),
        "assets/js/messages.en.js",
        "/* messages.en.js */\n",
    );
    write_fixture(
        dir.path(),
        "custom/css/style.css",
        "/* custom style.css */\n",
    );

    let mut repo = InMemoryRepository::new();
    repo.mount("/acme/blog", dir.path().join("assets"))
        .expect("failed to mount fixtures");
    repo.register_scheme("resource");
    customize(&mut repo);

    let layout = RootLayout::new(dir.path().join("assets"));
    (AssetFactory::new(Arc::new(repo), layout), dir)
}

fn fixture() -> (AssetFactory, TempDir) {
    fixture_with(|_| {})
}

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn leaf(node: &AssetNode) -> &asset_resolver::Asset {
    match node {
        AssetNode::Resolved(ResolvedNode::Leaf(asset)) => asset,
        other => panic!("expected a resolved leaf, got {other:?}"),
    }
}

#[test]
fn accessors_fail_before_the_context_is_supplied() {
    let (factory, _dir) = fixture();
    let asset = factory.create_asset(["css/style.css"], Vec::new(), AssetOptions::default());

    assert!(!asset.is_resolved());
    assert!(matches!(asset.name(), Err(AssetError::InvalidState(_))));
    assert!(matches!(
        asset.collection(),
        Err(AssetError::InvalidState(_))
    ));
}

#[test]
fn relative_paths_resolve_against_the_base_directory() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(["css/style.css"], Vec::new(), AssetOptions::default());

    asset
        .supply_context(Some("/acme/blog"))
        .expect("resolution should succeed");

    assert!(asset.is_resolved());
    let collection = asset.collection().expect("collection");
    assert_eq!(
        collection.nodes()[0].source_path(),
        "/acme/blog/css/style.css"
    );
    assert_eq!(asset.content().expect("content"), b"/* style.css */\n");
}

#[test]
fn supplying_the_context_twice_fails() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(["css/style.css"], Vec::new(), AssetOptions::default());

    asset.supply_context(Some("/acme/blog")).expect("first");
    let err = asset
        .supply_context(Some("/acme/blog"))
        .expect_err("second context must be rejected");
    assert!(matches!(err, AssetError::InvalidState(_)));
}

#[test]
fn failed_resolution_reports_the_same_error_again() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(["css/missing.css"], Vec::new(), AssetOptions::default());

    let first = asset
        .supply_context(Some("/acme/blog"))
        .expect_err("missing asset");
    let second = asset
        .supply_context(Some("/acme/blog"))
        .expect_err("still missing");
    assert_eq!(first.to_string(), second.to_string());
    assert!(!asset.is_resolved());
}

#[test]
fn the_repository_wins_over_files_under_the_roots() {
    let (factory, _dir) = fixture_with(|repo| {
        repo.insert_memory("/vendor/pkg/css/app.css", "/* app vendor */\n");
    });

    let mut vendored = factory.create_asset(["css/app.css"], Vec::new(), AssetOptions::default());
    vendored
        .supply_context(Some("/vendor/pkg"))
        .expect("repository hit");
    assert_eq!(vendored.content().expect("content"), b"/* app vendor */\n");

    // A base directory with no matching repository entry falls through to the
    // configured roots.
    let mut rooted = factory.create_asset(["css/app.css"], Vec::new(), AssetOptions::default());
    rooted
        .supply_context(Some("/elsewhere"))
        .expect("root fallback");
    assert_eq!(rooted.content().expect("content"), b"/* app root */\n");
}

#[test]
fn without_a_base_dir_relative_paths_go_straight_to_the_roots() {
    let (factory, dir) = fixture();
    let mut asset = factory.create_asset(["css/style.css"], Vec::new(), AssetOptions::default());

    asset.supply_context(None).expect("root resolution");

    let collection = asset.collection().expect("collection");
    let leaf = leaf(&collection.nodes()[0]);
    assert_eq!(leaf.source_path(), "css/style.css");
    assert_eq!(
        leaf.source_root(),
        Some(dir.path().join("assets").as_path())
    );
}

#[test]
fn a_per_asset_root_takes_precedence_over_the_default_root() {
    let (factory, dir) = fixture();
    let options = AssetOptions {
        root: Some(dir.path().join("custom")),
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["css/style.css"], Vec::new(), options);

    asset.supply_context(None).expect("custom root resolution");
    assert_eq!(
        asset.content().expect("content"),
        b"/* custom style.css */\n"
    );
}

#[test]
fn absolute_filesystem_paths_resolve_directly() {
    let (factory, dir) = fixture();
    let input = dir
        .path()
        .join("assets/css/style.css")
        .to_string_lossy()
        .into_owned();
    let mut asset = factory.create_asset([input], Vec::new(), AssetOptions::default());

    asset.supply_context(None).expect("direct file resolution");
    assert_eq!(asset.content().expect("content"), b"/* style.css */\n");
}

#[test]
fn unresolvable_references_enumerate_the_searched_locations() {
    let (factory, dir) = fixture();
    let mut asset = factory.create_asset(["css/missing.css"], Vec::new(), AssetOptions::default());

    let err = asset
        .supply_context(Some("/acme/blog"))
        .expect_err("missing asset should fail");

    let AssetError::NotFound { input, searched } = err else {
        panic!("expected NotFound, got {err:?}");
    };
    assert_eq!(input, "css/missing.css");
    assert_eq!(
        searched,
        vec![
            "/acme/blog".to_string(),
            dir.path().join("assets").display().to_string(),
        ]
    );
}

#[test]
fn globs_expand_to_the_matching_repository_files() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(["css/*.css"], Vec::new(), AssetOptions::default());

    asset.supply_context(Some("/acme/blog")).expect("glob");
    let content = asset.content().expect("concatenated content");
    assert_eq!(
        content,
        b"/* app root */\n/* reset.css */\n/* style.css */\n"
    );
}

#[test]
fn http_urls_and_references_pass_through_unresolved() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(
        ["//cdn.example.com/app.js", "@jquery"],
        Vec::new(),
        AssetOptions::default(),
    );

    asset.supply_context(Some("/acme/blog")).expect("resolution");
    let collection = asset.collection().expect("collection");
    assert!(matches!(
        leaf(&collection.nodes()[0]).source(),
        AssetSource::Http { .. }
    ));
    assert_eq!(collection.nodes()[1].source_path(), "@jquery");

    let err = asset.load().expect_err("remote content is not local");
    assert!(matches!(err, AssetError::InvalidState(_)));
}

#[test]
fn supported_scheme_uris_resolve_through_the_repository() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(
        ["resource:///acme/blog/css/style.css"],
        Vec::new(),
        AssetOptions::default(),
    );

    asset.supply_context(None).expect("scheme resolution");
    assert_eq!(asset.content().expect("content"), b"/* style.css */\n");
}

#[test]
fn variables_defer_resolution_until_the_values_arrive() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        vars: vec!["locale".to_string()],
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["js/messages.{locale}.js"], Vec::new(), options);

    asset.supply_context(Some("/acme/blog")).expect("context");
    {
        let collection = asset.collection().expect("collection");
        assert!(matches!(collection.nodes()[0], AssetNode::Deferred(_)));
        assert_eq!(
            collection.nodes()[0].source_path(),
            "js/messages.{locale}.js"
        );
    }

    asset
        .set_values(values(&[("locale", "en")]))
        .expect("values resolve the node");
    assert_eq!(
        asset.content().expect("content"),
        b"/* messages.en.js */\n"
    );
}

#[test]
fn values_can_arrive_together_with_the_context() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        vars: vec!["locale".to_string()],
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["js/messages.{locale}.js"], Vec::new(), options);

    asset
        .supply_context_with_values(Some("/acme/blog"), values(&[("locale", "en")]))
        .expect("context with values");
    assert_eq!(
        asset.content().expect("content"),
        b"/* messages.en.js */\n"
    );
}

#[test]
fn a_declared_variable_without_a_value_fails() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        vars: vec!["locale".to_string()],
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["js/messages.{locale}.js"], Vec::new(), options);

    let err = asset
        .supply_context_with_values(Some("/acme/blog"), values(&[]))
        .expect_err("missing value should fail");
    assert!(matches!(err, AssetError::MissingVariable { name, .. } if name == "locale"));
}

#[test]
fn values_cannot_change_after_resolution() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        vars: vec!["locale".to_string()],
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["js/messages.{locale}.js"], Vec::new(), options);

    asset
        .supply_context_with_values(Some("/acme/blog"), values(&[("locale", "en")]))
        .expect("first values");
    let err = asset
        .set_values(values(&[("locale", "de")]))
        .expect_err("second values must be rejected");
    assert!(matches!(err, AssetError::InvalidState(_)));
}

#[test]
fn globs_substitute_variables_before_expanding() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        vars: vec!["locale".to_string()],
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["js/*.{locale}.js"], Vec::new(), options);

    asset
        .supply_context_with_values(Some("/acme/blog"), values(&[("locale", "en")]))
        .expect("glob with values");
    assert_eq!(
        asset.content().expect("content"),
        b"/* messages.en.js */\n"
    );
}

#[test]
fn the_same_asset_gets_the_same_name_in_every_spelling() {
    let (factory, dir) = fixture();
    let absolute = dir
        .path()
        .join("assets/css/style.css")
        .to_string_lossy()
        .into_owned();

    let spellings: [(&str, Option<&str>); 3] = [
        ("css/style.css", Some("/acme/blog")),
        ("/acme/blog/css/style.css", Some("/acme/blog")),
        (&absolute, None),
    ];

    let mut names = Vec::new();
    for (input, base_dir) in spellings {
        let name = factory.generate_asset_name([input], Vec::new(), AssetOptions::default());
        name.supply_context(base_dir).expect("name generation");
        names.push(name.get().expect("generated name").to_string());
    }

    assert_eq!(names[0], names[1]);
    assert_eq!(names[1], names[2]);
    assert_eq!(names[0].len(), 8);
    assert!(names[0].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn filters_change_the_generated_name() {
    let (factory, _dir) = fixture();

    let plain = factory.generate_asset_name(["css/style.css"], Vec::new(), AssetOptions::default());
    plain.supply_context(Some("/acme/blog")).expect("name");

    let filtered = factory.generate_asset_name(
        ["css/style.css"],
        vec!["cssmin".to_string()],
        AssetOptions::default(),
    );
    filtered.supply_context(Some("/acme/blog")).expect("name");

    assert_ne!(plain.get(), filtered.get());
}

#[test]
fn a_deferred_name_resolves_only_once() {
    let (factory, _dir) = fixture();
    let name = factory.generate_asset_name(["css/style.css"], Vec::new(), AssetOptions::default());

    name.supply_context(Some("/acme/blog")).expect("first");
    let err = name
        .supply_context(Some("/acme/blog"))
        .expect_err("second context must be rejected");
    assert!(matches!(err, AssetError::InvalidState(_)));
}

#[test]
fn a_pregenerated_name_is_reused_by_the_collection() {
    let (factory, _dir) = fixture();
    let name = factory.generate_asset_name(["css/style.css"], Vec::new(), AssetOptions::default());

    let options = AssetOptions {
        name: Some(AssetName::Deferred(name.clone())),
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["css/style.css"], Vec::new(), options);
    asset.supply_context(Some("/acme/blog")).expect("resolution");

    assert_eq!(asset.name().expect("name"), name.get().expect("name"));
}

#[test]
fn fixed_names_are_used_verbatim() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        name: Some(AssetName::Fixed("mystyle".to_string())),
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(
        ["css/style.css", "css/reset.css"],
        Vec::new(),
        options,
    );

    asset.supply_context(Some("/acme/blog")).expect("resolution");
    let collection = asset.collection().expect("collection");

    assert_eq!(collection.name(), "mystyle");
    assert_eq!(collection.target_path(), Some("assets/mystyle.css"));
    assert_eq!(
        leaf(&collection.nodes()[0]).target_path(),
        Some("assets/mystyle_style_1.css")
    );
    assert_eq!(
        leaf(&collection.nodes()[1]).target_path(),
        Some("assets/mystyle_reset_2.css")
    );
}

#[test]
fn custom_output_patterns_replace_the_wildcard_with_the_name() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        name: Some(AssetName::Fixed("app".to_string())),
        output: Some("dist/*".to_string()),
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["css/style.css"], Vec::new(), options);

    asset.supply_context(Some("/acme/blog")).expect("resolution");
    assert_eq!(
        asset.target_path().expect("target"),
        Some("dist/app.css")
    );
}

#[test]
fn target_patterns_gain_placeholders_for_declared_variables() {
    let (factory, _dir) = fixture();
    let options = AssetOptions {
        name: Some(AssetName::Fixed("messages".to_string())),
        vars: vec!["locale".to_string()],
        ..AssetOptions::default()
    };
    let mut asset = factory.create_asset(["js/messages.{locale}.js"], Vec::new(), options);

    asset.supply_context(Some("/acme/blog")).expect("resolution");
    let target = asset
        .target_path()
        .expect("target access")
        .expect("target set");
    assert!(target.contains("{locale}"), "target was {target:?}");
    assert!(target.starts_with("assets/messages"));
    assert!(target.ends_with(".js"));
}

#[test]
fn collection_filters_reach_every_node() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(
        ["css/style.css", "css/reset.css"],
        vec!["cssmin".to_string()],
        AssetOptions::default(),
    );

    asset.supply_context(Some("/acme/blog")).expect("resolution");
    let collection = asset.collection_mut().expect("collection");
    collection.ensure_filter("autoprefix");
    collection.ensure_filter("autoprefix");

    assert_eq!(collection.filters(), ["cssmin", "autoprefix"]);
    for node in collection.nodes() {
        assert_eq!(leaf(node).filters(), ["autoprefix"]);
    }
}

#[test]
fn last_modified_tracks_the_newest_leaf() {
    let (factory, _dir) = fixture();
    let mut asset = factory.create_asset(
        ["css/style.css", "css/reset.css"],
        Vec::new(),
        AssetOptions::default(),
    );

    asset.supply_context(Some("/acme/blog")).expect("resolution");
    let newest = asset.last_modified().expect("timestamp");
    assert!(newest <= std::time::SystemTime::now());
}

#[test]
fn a_glob_is_not_named_like_its_enumeration() {
    let (factory, _dir) = fixture();

    let globbed = factory.generate_asset_name(["css/*.css"], Vec::new(), AssetOptions::default());
    globbed.supply_context(Some("/acme/blog")).expect("glob name");

    // The pattern currently expands to exactly these files, yet the two
    // spellings must keep distinct names.
    let enumerated = factory.generate_asset_name(
        ["css/app.css", "css/reset.css", "css/style.css"],
        Vec::new(),
        AssetOptions::default(),
    );
    enumerated
        .supply_context(Some("/acme/blog"))
        .expect("enumerated name");

    assert_ne!(globbed.get(), enumerated.get());
}

#[test]
fn extra_roots_are_searched_before_the_default_root() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_fixture(dir.path(), "assets/css/style.css", "/* default style.css */\n");
    write_fixture(dir.path(), "theme/css/style.css", "/* theme style.css */\n");

    let layout =
        RootLayout::new(dir.path().join("assets")).with_extra_root(dir.path().join("theme"));
    let factory = AssetFactory::new(Arc::new(InMemoryRepository::new()), layout);

    let mut asset = factory.create_asset(["css/style.css"], Vec::new(), AssetOptions::default());
    asset.supply_context(None).expect("extra root resolution");

    let collection = asset.collection().expect("collection");
    assert_eq!(
        leaf(&collection.nodes()[0]).source_root(),
        Some(dir.path().join("theme").as_path())
    );
    assert_eq!(asset.content().expect("content"), b"/* theme style.css */\n");
}
