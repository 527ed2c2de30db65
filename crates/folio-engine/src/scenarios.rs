//! End-to-end document scenarios against a temporary storage root.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use folio_crypto::document_etag;
use folio_sections::parse_document;
use proptest::prelude::*;

use crate::{
    AppendRequest, ChunkOp, DocKey, DocumentEngine, EngineConfig, ErrorKind, LayoutResolver,
    LockRegistry, SyncDirection,
};

fn engine(root: &Path) -> DocumentEngine {
    DocumentEngine::from_config(&EngineConfig {
        projects_root: root.join("projects"),
        fsync: false,
        ..EngineConfig::default()
    })
}

fn design() -> DocKey {
    DocKey::task("p1", "t1", "design").unwrap()
}

#[test]
fn first_append_creates_document() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let out = engine
        .append(&design(), AppendRequest::new("# Title\n\nBody"))
        .unwrap();
    assert_eq!(out.meta.version, 1);
    assert!(!out.duplicate);

    let (compiled, meta) = engine.export(&design()).unwrap();
    assert_eq!(compiled, "# Title\n\nBody");
    assert_eq!(meta.chunk_count, 1);
}

#[test]
fn stale_section_update_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine
        .append(&design(), AppendRequest::new("# A\n\none\n\n# B\n\ntwo"))
        .unwrap();
    let meta = engine.get_sections(&design()).unwrap();
    engine
        .update_section(&design(), "section_001", "uno", Some(meta.version))
        .unwrap();

    let sections_json = engine.resolve(&design()).unwrap().join("sections.json");
    let before = fs::read_to_string(&sections_json).unwrap();

    let err = engine
        .update_section(&design(), "section_002", "dos", Some(meta.version))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionMismatch);
    assert_eq!(fs::read_to_string(&sections_json).unwrap(), before);
}

#[test]
fn cascade_delete_removes_subtree_from_compiled() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let text = "# Keep\n\nstay\n\n# Parent\n\np\n\n## Child one\n\nc1\n\n## Child two\n\nc2";
    engine.append(&design(), AppendRequest::new(text)).unwrap();

    let out = engine
        .delete_section(&design(), "section_002", true, None)
        .unwrap();
    let ids: Vec<_> = out.sections.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["section_001"]);

    let sections = engine.get_sections(&design()).unwrap();
    assert_eq!(sections.sections.len(), 1);

    let compiled =
        fs::read_to_string(engine.resolve(&design()).unwrap().join("compiled.md")).unwrap();
    for title in ["# Parent", "## Child one", "## Child two"] {
        assert!(!compiled.contains(title), "{title} still compiled");
    }
    assert_eq!(compiled, "# Keep\n\nstay");
}

#[test]
fn squash_collapses_log_and_keeps_text() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    for i in 1..=5 {
        engine
            .append(&design(), AppendRequest::new(format!("part {i}")))
            .unwrap();
    }
    engine.delete_chunk(&design(), 2).unwrap();
    engine.delete_chunk(&design(), 4).unwrap();
    let (before, _) = engine.export(&design()).unwrap();
    assert_eq!(before, "part 1\npart 3\npart 5");

    let meta = engine.squash(&design(), "alice", None, None).unwrap();
    assert_eq!(meta.chunk_count, 1);
    assert_eq!(meta.deleted_count, 0);

    let (chunks, _) = engine.list_chunks(&design()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].op, ChunkOp::ReplaceFull);
    assert_eq!(engine.export(&design()).unwrap().0, before);
}

#[test]
fn repeated_content_is_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let first = engine.append(&design(), AppendRequest::new("same")).unwrap();
    let second = engine.append(&design(), AppendRequest::new("same")).unwrap();
    assert!(second.duplicate);
    assert_eq!(second.meta.version, first.meta.version);
    assert_eq!(second.meta.last_sequence, first.meta.last_sequence);
}

#[test]
fn rebuild_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine.append(&design(), AppendRequest::new("a")).unwrap();
    engine
        .append(&design(), AppendRequest::new("b").op(ChunkOp::ReplaceFull))
        .unwrap();
    engine.append(&design(), AppendRequest::new("c")).unwrap();

    let one = engine.rebuild(&design()).unwrap();
    let text_one = engine.export(&design()).unwrap().0;
    let two = engine.rebuild(&design()).unwrap();
    let text_two = engine.export(&design()).unwrap().0;
    assert_eq!(text_one, "b\nc");
    assert_eq!(text_one, text_two);
    assert_eq!(one.etag, two.etag);
}

#[test]
fn sections_round_trip_through_compiled() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let text = "## One\n\nfirst\n\n### One a\n\nnested\n\n## Two\n\nsecond";
    engine.append(&design(), AppendRequest::new(text)).unwrap();

    let meta = engine
        .sync_sections(&design(), SyncDirection::FromCompiled)
        .unwrap();
    assert_eq!(meta.root_level, 2);
    engine
        .sync_sections(&design(), SyncDirection::ToCompiled)
        .unwrap();
    let compiled =
        fs::read_to_string(engine.resolve(&design()).unwrap().join("compiled.md")).unwrap();
    assert_eq!(compiled, text);
}

#[test]
fn replace_full_append_resyncs_sections() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine
        .append(&design(), AppendRequest::new("# Old\n\nx"))
        .unwrap();
    assert_eq!(engine.get_sections(&design()).unwrap().sections[0].title, "# Old");

    engine
        .append(
            &design(),
            AppendRequest::new("# New\n\ny\n\n# Newer\n\nz").op(ChunkOp::ReplaceFull),
        )
        .unwrap();
    let titles: Vec<_> = engine
        .get_sections(&design())
        .unwrap()
        .sections
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, ["# New", "# Newer"]);
}

#[test]
fn section_edit_does_not_reparse() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine
        .append(&design(), AppendRequest::new("# A\n\none"))
        .unwrap();
    let before = engine.get_sections(&design()).unwrap();
    let out = engine
        .update_section(&design(), "section_001", "two", None)
        .unwrap();

    // A reparse would have bumped the version a second time.
    assert_eq!(out.sections.version, before.version + 1);
    assert_eq!(engine.get_sections(&design()).unwrap(), out.sections);
}

#[test]
fn hierarchy_holds_after_structural_edits() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine
        .append(&design(), AppendRequest::new("# Root\n\nr\n\n## Left\n\nl\n\n## Right\n\nr"))
        .unwrap();
    engine
        .insert_section(&design(), "### Deep", "d", Some("section_002"), None)
        .unwrap();
    engine
        .reorder_section(&design(), "section_003", Some("section_001"), None)
        .unwrap();
    let meta = engine.get_sections(&design()).unwrap();

    for (i, section) in meta.sections.iter().enumerate() {
        assert_eq!(section.order as usize, i + 1);
        if let Some(parent) = &section.parent_id {
            let parent = meta.get(parent).unwrap();
            assert!(parent.level < section.level);
            assert!(parent.children.contains(&section.id));
        }
    }
    engine.validate_sections(&design()).unwrap();
}

#[test]
fn concurrent_appends_serialize_per_document() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let path_key = DocKey::path(engine.resolve(&design()).unwrap());

    thread::scope(|s| {
        for t in 0..4 {
            let engine = &engine;
            let key = if t % 2 == 0 { design() } else { path_key.clone() };
            s.spawn(move || {
                for i in 0..5 {
                    engine
                        .append(&key, AppendRequest::new(format!("t{t} line {i}")))
                        .unwrap();
                }
            });
        }
    });

    let (chunks, meta) = engine.list_chunks(&design()).unwrap();
    assert_eq!(chunks.len(), 20);
    assert_eq!(meta.version, 20);
    let seqs: Vec<_> = chunks.iter().map(|c| c.sequence).collect();
    assert_eq!(seqs, (1..=20).collect::<Vec<_>>());
}

#[test]
fn engines_can_share_a_lock_registry() {
    let dir = tempfile::tempdir().unwrap();
    let locks = Arc::new(LockRegistry::new());
    let root = dir.path().join("projects");
    let a = DocumentEngine::with_locks(LayoutResolver::new(&root), Default::default(), locks.clone());
    let b = DocumentEngine::with_locks(LayoutResolver::new(&root), Default::default(), locks.clone());

    a.append(&design(), AppendRequest::new("from a")).unwrap();
    b.append(&design(), AppendRequest::new("from b")).unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(a.export(&design()).unwrap().0, "from a\nfrom b");
}

#[test]
fn meeting_and_project_documents_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let meeting = DocKey::meeting("m1", "summary").unwrap();
    let project = DocKey::project("p1", "feature_list").unwrap();
    engine.append(&meeting, AppendRequest::new("notes")).unwrap();
    engine.append(&project, AppendRequest::new("features")).unwrap();

    assert!(dir.path().join("meetings/m1/docs/summary/compiled.md").exists());
    assert_eq!(engine.doc_meta(&meeting).unwrap().doc_type, "summary");
    assert_eq!(engine.export(&project).unwrap().0, "features");
}

fn compiled_on_disk(engine: &DocumentEngine) -> String {
    fs::read_to_string(engine.resolve(&design()).unwrap().join("compiled.md")).unwrap()
}

/// The stored section tree must describe the compiled text as it stands.
fn assert_sections_match_compiled(engine: &DocumentEngine) {
    let parsed = parse_document(&compiled_on_disk(engine));
    let meta = engine.get_sections(&design()).unwrap();
    let titles: Vec<_> = meta.sections.iter().map(|s| s.title.as_str()).collect();
    let expected: Vec<_> = parsed.meta.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, expected);
    for (section, body) in meta.sections.iter().zip(&parsed.bodies) {
        let content = engine.get_section(&design(), &section.id, false).unwrap();
        assert_eq!(&content.content, body, "{} drifted", section.id);
    }
    engine.validate_sections(&design()).unwrap();
}

#[test]
fn etag_tracks_compiled_through_section_edits() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine
        .append(&design(), AppendRequest::new("# A\n\none\n\n# B\n\nb"))
        .unwrap();

    let check = |engine: &DocumentEngine| {
        let (compiled, meta) = engine.export(&design()).unwrap();
        assert_eq!(compiled, compiled_on_disk(engine));
        assert_eq!(meta.etag, document_etag(&compiled));
    };

    for body in ["two", "three", "two"] {
        engine.update_section(&design(), "section_001", body, None).unwrap();
        check(&engine);
    }
    engine
        .insert_section(&design(), "## A.1", "sub", Some("section_001"), None)
        .unwrap();
    check(&engine);
    engine.delete_section(&design(), "section_002", false, None).unwrap();
    check(&engine);
    engine
        .update_section_full(&design(), "section_001", "# A\n\nfull\n\n## A.1\n\nsub", None)
        .unwrap();
    check(&engine);
    engine.update_section(&design(), "section_001", "two", None).unwrap();
    check(&engine);

    let before = engine.export(&design()).unwrap();
    let rebuilt = engine.rebuild(&design()).unwrap();
    assert_eq!(engine.export(&design()).unwrap().0, before.0);
    assert_eq!(rebuilt.etag, before.1.etag);
}

#[test]
fn sections_follow_chunk_delete_and_toggle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    engine.append(&design(), AppendRequest::new("# A\n\none")).unwrap();
    engine
        .append(&design(), AppendRequest::new("# Secret\n\nleaked"))
        .unwrap();
    assert_sections_match_compiled(&engine);

    engine.delete_chunk(&design(), 2).unwrap();
    assert_sections_match_compiled(&engine);

    engine.toggle_chunk(&design(), 2).unwrap();
    assert_sections_match_compiled(&engine);
    let titles: Vec<_> = engine
        .get_sections(&design())
        .unwrap()
        .sections
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, ["# A", "# Secret"]);

    engine.toggle_chunk(&design(), 2).unwrap();
    assert_sections_match_compiled(&engine);
    engine
        .update_section(&design(), "section_001", "uno", None)
        .unwrap();
    let compiled = compiled_on_disk(&engine);
    assert!(!compiled.contains("leaked"));
    assert!(!compiled.contains("# Secret"));

    engine.squash(&design(), "alice", None, None).unwrap();
    assert_sections_match_compiled(&engine);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn each_accepted_append_bumps_version(lines in proptest::collection::vec("[a-z]{1,12}", 1..12)) {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut accepted = 0u64;
        for line in &lines {
            let out = engine.append(&design(), AppendRequest::new(line.as_str())).unwrap();
            if !out.duplicate {
                accepted += 1;
            }
            prop_assert_eq!(out.meta.version, accepted);
        }
    }
}
