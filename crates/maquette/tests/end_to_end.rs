//! One small app exercised end to end through the umbrella paths.

use maquette::reserve::StoreScope;
use maquette::scene::{
    Blueprint, ChildDecl, ChildDecls, Component, Cx, Props, Stage, StoreEvent,
};
use maquette::socle::CompactString;
use maquette::toile::HeadlessSurface;
use serde_json::json;

struct ProfileCard;

impl Component for ProfileCard {
    fn template(&self) -> CompactString {
        "<article><h1>${name}</h1>${badge}</article>".into()
    }
}

impl Blueprint for ProfileCard {
    const KIND: &'static str = "ProfileCard";

    fn assemble(_props: Props, _children: ChildDecls) -> Self {
        ProfileCard
    }
}

/// Mirrors the session's `status` entry into its own markup.
struct StatusBadge;

impl Component for StatusBadge {
    fn template(&self) -> CompactString {
        "<em>${status}</em>".into()
    }

    fn on_mounted(&mut self, cx: &mut Cx<'_>) {
        cx.watch("status_changed", "session", "status");
    }

    fn on_store_update(&mut self, _update: &StoreEvent, cx: &mut Cx<'_>) {
        if let Ok(status) = cx.load("session", Some("status")) {
            if let Some(text) = status.as_str() {
                cx.set_prop("status", text);
            }
        }
    }
}

impl Blueprint for StatusBadge {
    const KIND: &'static str = "StatusBadge";

    fn assemble(_props: Props, _children: ChildDecls) -> Self {
        StatusBadge
    }
}

#[test]
fn a_small_app_renders_reacts_and_tears_down() {
    let mut stage = Stage::new(HeadlessSurface::new());
    stage.create_store("session", StoreScope::Session).unwrap();

    let card = stage
        .mount::<ProfileCard>(
            Props::new().with("name", "Ada"),
            ChildDecls::new()
                .with("badge", ChildDecl::of::<StatusBadge>().with_prop("status", "offline")),
        )
        .unwrap();
    stage.flush().unwrap();
    insta::assert_snapshot!(
        stage.surface().root_content(),
        @"<article><h1>Ada</h1><em>offline</em></article>"
    );

    stage.save("session", "status", json!("online")).unwrap();
    stage.flush().unwrap();
    insta::assert_snapshot!(
        stage.surface().root_content(),
        @"<article><h1>Ada</h1><em>online</em></article>"
    );

    stage.destroy(&card);
    assert!(stage.registry().is_empty());
    assert_eq!(stage.surface().container_count(), 0);
    assert_eq!(stage.surface().binding_count(), 0);
}
