//! End-to-end tests through the library API: upload intake, routing,
//! both analyzers, and store lifecycle.

use analyst_harness::config::Config;
use analyst_harness::document::DocumentAnswer;
use analyst_harness::orchestrator::{FileKind, Orchestrator, QueryOutcome};
use analyst_harness::router::{QueryContext, QueryType};
use analyst_harness::tabular::TabularAnswer;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

const SALES: &str = "Date,Region,Product,Revenue\n\
                     2024-01-03,North,Widget,1200\n\
                     2024-01-01,South,Gadget,75\n\
                     2024-01-02,North,Widget,400\n\
                     2024-01-05,East,Gizmo,1200\n\
                     2024-01-04,South,Gadget,80\n";

/// A one-page PDF with each line drawn as its own text object.
fn build_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("TL", vec![16.into()]),
        Operation::new("Td", vec![50.into(), 780.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(&Config::minimal()).unwrap()
}

#[test]
fn pdf_upload_is_extracted_and_searchable() {
    let o = orchestrator();
    let pdf = build_pdf(&[
        "Attention Mechanisms In Practice",
        "Transformers rely on attention layers.",
        "Each layer mixes information across tokens.",
    ]);

    let uploaded = o.ingest_upload(&pdf, "paper.pdf").unwrap();
    assert_eq!(uploaded.kind, FileKind::Document);
    assert_eq!(uploaded.message, "Successfully processed paper.pdf");

    let info = o.documents().info("paper.pdf").unwrap();
    assert!(info.summary.contains("attention"), "summary: {}", info.summary);
    assert_eq!(info.metadata.chunk_count, 1);

    let results = o.documents().search("attention layers", None).unwrap();
    assert_eq!(results.results[0].document, "paper.pdf");
}

#[test]
fn corrupt_pdf_reports_both_extraction_failures() {
    let o = orchestrator();
    let err = o.ingest_upload(b"%PDF-1.4 truncated", "broken.pdf").unwrap_err();
    assert_eq!(err.code(), "extraction_error");
    assert!(o.documents().is_empty());
}

#[test]
fn mixed_session_routes_each_query() {
    let o = orchestrator();
    o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
    o.documents()
        .load_text(
            "Quarterly Review Notes\n\
             The review found that northern stores grew fastest. \
             Our method compared weekly revenue against the prior year.",
            "review.txt",
        )
        .unwrap();

    // Fast path to the dataset.
    let r = o.process_query("top 2 by Revenue in the spreadsheet", None);
    match r.result {
        Some(QueryOutcome::Tabular(TabularAnswer::Ranking { ref result, .. })) => {
            assert_eq!(result.len(), 2);
            assert_eq!(result[0]["Region"], "North");
            assert_eq!(result[1]["Region"], "East");
        }
        ref other => panic!("unexpected outcome {:?}", other),
    }

    // Fast path to the documents, method cue. ("research" would also
    // contain the search trigger.)
    let r = o.process_query("what method was used in this paper?", None);
    assert_eq!(r.query_type, QueryType::Document);
    match r.result {
        Some(QueryOutcome::Document(DocumentAnswer::Answer(ref a))) => {
            assert_eq!(
                a.answer,
                "Our method compared weekly revenue against the prior year."
            );
            assert_eq!(a.documents_searched, vec!["review.txt"]);
        }
        ref other => panic!("unexpected outcome {:?}", other),
    }

    // Both stores populated and the caller says so: clarification.
    let ctx = o.current_context();
    let r = o.process_query("what is the total", Some(&ctx));
    assert_eq!(r.query_type, QueryType::Ambiguous);
    assert!(matches!(r.result, Some(QueryOutcome::Clarification { .. })));
}

#[test]
fn trend_query_sorts_by_date() {
    let o = orchestrator();
    o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
    let answer = o.tabular().query("revenue trend over time", None).unwrap();
    let TabularAnswer::Trend { chart_data, .. } = answer else {
        panic!("expected a trend answer");
    };
    assert_eq!(chart_data.x_column.as_deref(), Some("Date"));
    assert_eq!(chart_data.labels.len(), 5);
    assert_eq!(chart_data.values[0], serde_json::json!(75));
    assert_eq!(chart_data.values[4], serde_json::json!(1200));
}

#[test]
fn concurrent_queries_during_loads() {
    let o = orchestrator();
    o.ingest_upload(SALES.as_bytes(), "sales.csv").unwrap();
    let ctx = QueryContext::default();

    std::thread::scope(|s| {
        for i in 0..4 {
            let o = &o;
            let ctx = &ctx;
            s.spawn(move || {
                for _ in 0..20 {
                    let r = o.process_query("count rows in sales.csv", Some(ctx));
                    assert!(r.success);
                }
                o.documents()
                    .load_text(
                        &format!("Worker {} Report Notes\nWorker {} finished its batch.", i, i),
                        &format!("worker-{}.txt", i),
                    )
                    .unwrap();
            });
        }
    });

    assert_eq!(o.documents().names().len(), 4);
    o.clear_all();
    assert!(o.tabular().is_empty());
    assert!(o.documents().is_empty());
}
