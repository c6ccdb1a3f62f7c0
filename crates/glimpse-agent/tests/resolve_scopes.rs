mod common;

use std::sync::Arc;

use glimpse_agent::program::BlockKind;
use glimpse_agent::{LocationResolver, ProgramIndexBuilder, ResolveError};

fn layered_resolver() -> LocationResolver {
    let mut builder = ProgramIndexBuilder::new();
    builder.file("app/service.php", 1..=100, |f| {
        f.statement(2);
        f.namespace("App\\Billing", 4..=60, |ns| {
            ns.statement(5);
            ns.class("Invoices", 8..=40, |c| {
                c.method("total", 10..=22, |m| {
                    m.statement(12);
                    m.block(BlockKind::Loop, 14..=19, |body| {
                        body.statement(15);
                        body.statement(18);
                    });
                    m.statement(21);
                });
                c.use_trait("Audited");
            });
            ns.closure(45..=55, |body| {
                body.statement(47);
                body.statement(52);
            });
        });
        f.trait_def("Audited", 65..=80, |t| {
            t.method("audit", 67..=75, |m| {
                m.statement(68);
                m.statement(72);
            });
        });
        f.statement(90);
    });
    LocationResolver::new(Arc::new(builder.finish()))
}

#[test]
fn loop_body_lines_stay_inside_the_loop() {
    let resolver = layered_resolver();
    let resolved = resolver.resolve("app/service.php", 16).unwrap();
    assert_eq!(resolved.line, 18);
    assert_eq!(
        resolver.index().statement_block_kind(resolved.statement),
        BlockKind::Loop
    );
}

#[test]
fn line_between_loop_and_method_tail_resolves_in_the_method() {
    let resolver = layered_resolver();
    let resolved = resolver.resolve("app/service.php", 20).unwrap();
    assert_eq!(resolved.line, 21);
    assert_eq!(
        resolver.index().enclosing_function(resolved.statement),
        Some("total")
    );
}

#[test]
fn closure_is_an_independent_statement_scope() {
    let resolver = layered_resolver();
    let resolved = resolver.resolve("app/service.php", 49).unwrap();
    assert_eq!(resolved.line, 52);
    assert_eq!(
        resolver.index().statement_block_kind(resolved.statement),
        BlockKind::Closure
    );
}

#[test]
fn namespace_tail_without_statements_fails() {
    // Line 57 is inside the namespace but past its last direct
    // statement; closure statements do not leak into the namespace.
    let resolver = layered_resolver();
    let err = resolver.resolve("app/service.php", 57).unwrap_err();
    assert!(matches!(err, ResolveError::NoStatement { .. }));
}

#[test]
fn trait_method_lines_resolve_like_any_method() {
    let resolver = layered_resolver();
    let resolved = resolver.resolve("app/service.php", 70).unwrap();
    assert_eq!(resolved.line, 72);
    assert_eq!(
        resolver.index().enclosing_function(resolved.statement),
        Some("audit")
    );
    let methods: Vec<&str> = resolver.index().class_methods("Invoices").unwrap().collect();
    assert_eq!(methods, vec!["total", "audit"]);
}

#[test]
fn file_tail_resolves_to_top_level_statement() {
    let resolver = layered_resolver();
    let resolved = resolver.resolve("app/service.php", 85).unwrap();
    assert_eq!(resolved.line, 90);
}

#[test]
fn shared_fixture_normalizes_blank_lines() {
    let resolver = LocationResolver::new(common::web_app_index());
    let resolved = resolver.resolve("web/index.php", 31).unwrap();
    assert_eq!(resolved.line, 34);
}
