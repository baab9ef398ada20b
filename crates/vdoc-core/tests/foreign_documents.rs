use pretty_assertions::assert_eq;
use std::sync::Arc;
use vdoc_core::{
    DocumentOptions, DocumentServices, EditorId, EditorPosition, EditorRange, ExtractorRegistry,
    ForeignFragment, RegexForeignCodeExtractor, RootPosition, SourceFragment, SourcePosition,
    VirtualDocument, VirtualPosition,
};
use vdoc_lang::{ExtractorSpec, ExtractorsConfig};

const HOST: EditorId = EditorId::new(1);
const SCRIPT: EditorId = EditorId::new(2);
const JS_CELL: &str = "%%javascript\nvar a = 1;\nconsole.log(a)";

fn javascript_cells() -> ExtractorSpec {
    let mut spec = ExtractorSpec::new("javascript", r"\A%%javascript\n((?s:.*))\z", "js");
    spec.keep_in_host = false;
    spec
}

fn sql_strings() -> ExtractorSpec {
    let mut spec = ExtractorSpec::new("sql", r#"sql\("([^"]*)"\)"#, "sql");
    spec.standalone = true;
    spec
}

fn markup_blocks() -> ExtractorSpec {
    let mut spec = ExtractorSpec::new("markup", r"<<((?s:.*?))>>", "mk");
    spec.keep_in_host = false;
    spec
}

fn sql_blocks() -> ExtractorSpec {
    let mut spec = ExtractorSpec::new("sql", r"SQL\{((?s:.*?))\}", "sql");
    spec.keep_in_host = false;
    spec.host_template = Some("run_sql()".to_string());
    spec
}

fn document(lifetime: u32, specs: Vec<ExtractorSpec>) -> VirtualDocument {
    let mut extractors = ExtractorRegistry::new();
    for spec in specs {
        extractors.register("python", Arc::new(RegexForeignCodeExtractor::new(spec).unwrap()));
    }
    let services = DocumentServices {
        extractors: Arc::new(extractors),
        ..DocumentServices::default()
    };
    let mut options = DocumentOptions::new("python", "nb.ipynb");
    options.foreign_document_lifetime = lifetime;
    VirtualDocument::with_services(options, services)
}

fn pass(doc: &mut VirtualDocument, cells: &[(EditorId, &str)]) {
    doc.rebuild(cells.iter().map(|(editor, text)| SourceFragment::new(*editor, text)));
}

#[test]
fn test_extracted_cell_opens_foreign_document() {
    let mut doc = document(6, vec![javascript_cells()]);
    pass(&mut doc, &[(HOST, "x = 1"), (SCRIPT, JS_CELL)]);

    // The whole cell moved out: the host keeps one empty line for it.
    assert_eq!(doc.value(), "x = 1\n\n\n\n");
    assert_eq!(doc.foreign_documents().len(), 1);
    let handle = doc.foreign_documents().iter().next().unwrap();
    assert_eq!(handle.virtual_id(), "javascript");
    let foreign = handle.document();
    assert_eq!(foreign.id_path(), "python-javascript");
    assert_eq!(foreign.uri(), "nb.ipynb.python-javascript.js");
    assert_eq!(foreign.value(), "var a = 1;\nconsole.log(a)\n");

    let maps = doc.get_foreign_documents(SCRIPT);
    assert_eq!(maps.len(), 1);
    let entries: Vec<_> = maps[0].iter().map(|(range, fragment)| (*range, *fragment)).collect();
    assert_eq!(
        entries,
        vec![(
            EditorRange::new(EditorPosition::new(0, 0), EditorPosition::new(2, 14)),
            ForeignFragment {
                document: handle.id(),
                editor: SCRIPT,
                virtual_line: 0,
                source_line: 0,
                origin: EditorPosition::new(1, 0),
            }
        )]
    );
    assert!(doc.get_foreign_documents(HOST)[0].is_empty());
}

#[test]
fn test_foreign_positions_translate_to_root() {
    let mut doc = document(6, vec![javascript_cells()]);
    pass(&mut doc, &[(HOST, "x = 1"), (SCRIPT, JS_CELL)]);
    let id = doc.foreign_documents().shared("javascript").unwrap();

    assert_eq!(
        doc.transform_foreign_virtual_to_root(&[id], VirtualPosition::new(1, 8)),
        Ok(Some(RootPosition::new(3, 8)))
    );
    assert_eq!(
        doc.transform_foreign_virtual_to_root(&[id], VirtualPosition::new(0, 4)),
        Ok(Some(RootPosition::new(2, 4)))
    );
    let foreign = doc.foreign_document(id).unwrap();
    assert_eq!(
        foreign.transform_virtual_to_editor(VirtualPosition::new(1, 8)),
        Ok(Some(EditorPosition::new(2, 8)))
    );

    // Root source line 3 is the second line of the extracted code.
    let at = SourcePosition::new(3, 3);
    assert!(doc.is_within_foreign(at));
    assert_eq!(doc.document_at_source_position(at).id_path(), "python-javascript");
    assert_eq!(doc.virtual_position_at_document(at), Some(VirtualPosition::new(1, 3)));

    let outside = SourcePosition::new(0, 2);
    assert!(!doc.is_within_foreign(outside));
    assert_eq!(doc.document_at_source_position(outside).id_path(), "python");
    assert_eq!(doc.virtual_position_at_document(outside), Some(VirtualPosition::new(0, 2)));
}

#[test]
fn test_non_standalone_requests_share_one_document() {
    let mut doc = document(6, vec![javascript_cells()]);
    pass(
        &mut doc,
        &[
            (EditorId::new(1), "%%javascript\nlet a = 1"),
            (EditorId::new(2), "%%javascript\nlet b = 2"),
        ],
    );
    assert_eq!(doc.foreign_documents().len(), 1);
    let id = doc.foreign_documents().shared("javascript").unwrap();
    assert_eq!(doc.foreign_document(id).unwrap().value(), "let a = 1\n\n\nlet b = 2\n");

    let first = doc.get_foreign_documents(EditorId::new(1));
    let second = doc.get_foreign_documents(EditorId::new(2));
    assert_eq!(first[0].values().next().unwrap().document, id);
    assert_eq!(second[0].values().next().unwrap().document, id);
    assert_eq!(second[0].values().next().unwrap().virtual_line, 3);
}

#[test]
fn test_standalone_requests_get_distinct_documents_and_reuse_pool() {
    let mut doc = document(6, vec![sql_strings()]);
    let cell = "a = sql(\"SELECT 1\")\nb = sql(\"SELECT 2\")";
    pass(&mut doc, &[(HOST, cell)]);

    // Matches stay in the host code.
    assert_eq!(doc.value(), format!("{cell}\n"));
    let registry = doc.foreign_documents();
    assert_eq!(registry.len(), 2);
    let first = registry.by_virtual_id("0(sql)").unwrap();
    let second = registry.by_virtual_id("1(sql)").unwrap();
    assert_eq!(doc.foreign_document(first).unwrap().value(), "SELECT 1\n");
    assert_eq!(doc.foreign_document(second).unwrap().value(), "SELECT 2\n");
    assert_eq!(doc.foreign_document(first).unwrap().id_path(), "python-0(sql)");

    // Next pass: both come back from the pool (most recently pooled first) and nothing new
    // is opened.
    pass(&mut doc, &[(HOST, cell)]);
    assert_eq!(doc.foreign_documents().len(), 2);
    assert_eq!(doc.foreign_document(second).unwrap().value(), "SELECT 1\n");
    assert_eq!(doc.foreign_document(first).unwrap().value(), "SELECT 2\n");

    // A third occurrence needs a fresh document.
    pass(&mut doc, &[(HOST, cell), (SCRIPT, "c = sql(\"SELECT 3\")")]);
    assert_eq!(doc.foreign_documents().len(), 3);
    assert!(doc.foreign_documents().by_virtual_id("2(sql)").is_some());
}

#[test]
fn test_unreferenced_document_expires_after_lifetime() {
    let mut doc = document(2, vec![javascript_cells()]);
    pass(&mut doc, &[(HOST, "x = 1"), (SCRIPT, JS_CELL)]);
    let id = doc.foreign_documents().shared("javascript").unwrap();

    // Referenced in this pass: never aged.
    assert_eq!(doc.foreign_documents().get(id).unwrap().remaining_lifetime(), 2);

    pass(&mut doc, &[(HOST, "x = 1")]);
    assert!(doc.foreign_documents().contains(id));
    assert_eq!(doc.foreign_documents().get(id).unwrap().remaining_lifetime(), 1);

    pass(&mut doc, &[(HOST, "x = 1")]);
    assert!(!doc.foreign_documents().contains(id));
    assert_eq!(doc.foreign_documents().shared("javascript"), None);
    assert!(doc.get_foreign_documents(SCRIPT).is_empty());
}

#[test]
fn test_transient_disuse_keeps_document() {
    let mut doc = document(3, vec![javascript_cells()]);
    pass(&mut doc, &[(SCRIPT, JS_CELL)]);
    let id = doc.foreign_documents().shared("javascript").unwrap();

    pass(&mut doc, &[(HOST, "x = 1")]);
    pass(&mut doc, &[(HOST, "x = 1")]);
    assert_eq!(doc.foreign_documents().get(id).unwrap().remaining_lifetime(), 1);

    // Chosen again: same document, full lifetime.
    pass(&mut doc, &[(SCRIPT, JS_CELL)]);
    assert_eq!(doc.foreign_documents().shared("javascript"), Some(id));
    assert_eq!(doc.foreign_documents().get(id).unwrap().remaining_lifetime(), 3);
    assert_eq!(doc.foreign_document(id).unwrap().value(), "var a = 1;\nconsole.log(a)\n");
}

#[test]
fn test_dispose_cascades_to_foreign_documents() {
    let mut doc = document(6, vec![javascript_cells(), sql_strings()]);
    pass(&mut doc, &[(SCRIPT, JS_CELL), (HOST, "q = sql(\"SELECT 1\")")]);
    assert_eq!(doc.foreign_documents().len(), 2);

    doc.dispose();
    assert!(doc.foreign_documents().is_empty());
    assert!(doc.get_foreign_documents(SCRIPT).is_empty());
    pass(&mut doc, &[(SCRIPT, JS_CELL)]);
    assert!(doc.foreign_documents().is_empty());
}

#[test]
fn test_close_foreign_documents_explicitly() {
    let mut doc = document(6, vec![javascript_cells(), sql_strings()]);
    pass(&mut doc, &[(SCRIPT, JS_CELL), (HOST, "q = sql(\"SELECT 1\")")]);
    let js = doc.foreign_documents().shared("javascript").unwrap();

    doc.close_foreign(js);
    assert_eq!(doc.foreign_documents().len(), 1);
    assert!(doc.foreign_document(js).is_none());

    doc.close_all_foreign_documents();
    assert!(doc.foreign_documents().is_empty());
    assert!(!doc.is_disposed());
}

#[test]
fn test_extractors_load_from_json() {
    let config = ExtractorsConfig::from_json_str(
        r#"{
            "python": [
                {
                    "language": "sql",
                    "pattern": "sql\\(\"([^\"]*)\"\\)",
                    "standalone": true,
                    "file_extension": "sql"
                }
            ]
        }"#,
    )
    .unwrap();
    let services = DocumentServices {
        extractors: Arc::new(ExtractorRegistry::from_config(&config).unwrap()),
        ..DocumentServices::default()
    };
    let mut doc =
        VirtualDocument::with_services(DocumentOptions::new("python", "nb.ipynb"), services);
    doc.rebuild([SourceFragment::new(HOST, "q = sql(\"SELECT 1\")")]);

    let id = doc.foreign_documents().by_virtual_id("0(sql)").unwrap();
    let foreign = doc.foreign_document(id).unwrap();
    assert_eq!(foreign.value(), "SELECT 1\n");
    assert!(foreign.standalone());
    assert_eq!(foreign.uri(), "nb.ipynb.python-0(sql).sql");
}

#[test]
fn test_lines_after_removed_text_keep_their_editor_line() {
    let mut doc = document(6, vec![markup_blocks()]);
    pass(&mut doc, &[(HOST, "a = 1\n<<x\ny>>\nb = 2")]);

    assert_eq!(doc.value(), "a = 1\n\nb = 2\n");
    assert_eq!(
        doc.transform_virtual_to_editor(VirtualPosition::new(2, 0)),
        Ok(Some(EditorPosition::new(3, 0)))
    );
    assert_eq!(
        doc.transform_virtual_to_editor(VirtualPosition::new(0, 3)),
        Ok(Some(EditorPosition::new(0, 3)))
    );
    // The blank line left behind is the tail of the match line.
    assert_eq!(
        doc.transform_virtual_to_editor(VirtualPosition::new(1, 0)),
        Ok(Some(EditorPosition::new(2, 3)))
    );
    assert_eq!(
        doc.transform_editor_to_virtual(HOST, EditorPosition::new(3, 4)),
        Some(VirtualPosition::new(2, 4))
    );
    assert_eq!(doc.transform_editor_to_virtual(HOST, EditorPosition::new(1, 1)), None);
    assert_eq!(
        doc.transform_virtual_to_root(VirtualPosition::new(2, 2), &doc),
        Ok(Some(RootPosition::new(3, 2)))
    );

    let id = doc.foreign_documents().shared("markup").unwrap();
    assert_eq!(doc.foreign_document(id).unwrap().value(), "x\ny\n");
    assert_eq!(
        doc.transform_foreign_virtual_to_root(&[id], VirtualPosition::new(1, 1)),
        Ok(Some(RootPosition::new(2, 1)))
    );
    assert_eq!(
        doc.virtual_position_at_document(SourcePosition::new(2, 0)),
        Some(VirtualPosition::new(1, 0))
    );
}

#[test]
fn test_host_template_shorter_than_match() {
    let mut doc = document(6, vec![sql_blocks()]);
    pass(&mut doc, &[(HOST, "x = 0"), (SCRIPT, "q = SQL{select *\nfrom t}\nprint(q)")]);

    assert_eq!(doc.value(), "x = 0\n\n\nq = run_sql()\nprint(q)\n");
    assert_eq!(
        doc.transform_virtual_to_editor(VirtualPosition::new(4, 5)),
        Ok(Some(EditorPosition::new(2, 5)))
    );
    assert_eq!(
        doc.transform_virtual_to_editor(VirtualPosition::new(3, 2)),
        Ok(Some(EditorPosition::new(0, 2)))
    );
    assert_eq!(
        doc.transform_editor_to_virtual(SCRIPT, EditorPosition::new(2, 1)),
        Some(VirtualPosition::new(4, 1))
    );
    assert_eq!(doc.transform_editor_to_virtual(SCRIPT, EditorPosition::new(1, 2)), None);

    let id = doc.foreign_documents().shared("sql").unwrap();
    let foreign = doc.foreign_document(id).unwrap();
    assert_eq!(foreign.value(), "select *\nfrom t\n");
    assert_eq!(
        foreign.transform_virtual_to_editor(VirtualPosition::new(0, 2)),
        Ok(Some(EditorPosition::new(0, 10)))
    );
    assert_eq!(
        foreign.transform_virtual_to_editor(VirtualPosition::new(1, 2)),
        Ok(Some(EditorPosition::new(1, 2)))
    );
}

#[test]
fn test_chained_extractors_report_fragment_coordinates() {
    let mut doc = document(6, vec![markup_blocks(), sql_strings()]);
    pass(&mut doc, &[(HOST, "<<x\ny>>\nq = sql(\"SELECT 1\")")]);

    assert_eq!(doc.value(), "\nq = sql(\"SELECT 1\")\n");
    assert_eq!(
        doc.transform_virtual_to_editor(VirtualPosition::new(1, 4)),
        Ok(Some(EditorPosition::new(2, 4)))
    );

    let markup = doc.foreign_documents().shared("markup").unwrap();
    // Ids count every document opened, shared or not.
    let sql = doc.foreign_documents().by_virtual_id("1(sql)").unwrap();
    let maps = doc.get_foreign_documents(HOST);
    assert_eq!(maps.len(), 1);
    let entries: Vec<_> = maps[0]
        .iter()
        .map(|(range, fragment)| (*range, fragment.document, fragment.origin))
        .collect();
    assert_eq!(
        entries,
        vec![
            (
                EditorRange::new(EditorPosition::new(0, 0), EditorPosition::new(1, 3)),
                markup,
                EditorPosition::new(0, 2),
            ),
            (
                EditorRange::new(EditorPosition::new(2, 4), EditorPosition::new(2, 19)),
                sql,
                EditorPosition::new(2, 9),
            ),
        ]
    );

    assert_eq!(
        doc.transform_foreign_virtual_to_root(&[sql], VirtualPosition::new(0, 3)),
        Ok(Some(RootPosition::new(2, 12)))
    );
    assert_eq!(
        doc.document_at_source_position(SourcePosition::new(2, 10)).id_path(),
        "python-1(sql)"
    );
    assert_eq!(
        doc.virtual_position_at_document(SourcePosition::new(2, 10)),
        Some(VirtualPosition::new(0, 1))
    );
}

#[test]
fn test_match_text_before_foreign_code_stays_in_host() {
    let mut doc = document(6, vec![javascript_cells()]);
    pass(&mut doc, &[(SCRIPT, JS_CELL)]);

    // Inside the `%%javascript` header line.
    let header = SourcePosition::new(0, 4);
    assert!(!doc.is_within_foreign(header));
    assert_eq!(doc.document_at_source_position(header).id_path(), "python");
    assert!(doc.is_within_foreign(SourcePosition::new(1, 0)));
    assert_eq!(
        doc.virtual_position_at_document(SourcePosition::new(1, 4)),
        Some(VirtualPosition::new(0, 4))
    );
}
