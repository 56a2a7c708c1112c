// tests/orders_pipeline.rs
//
// Row enrichment as the ingestion pipeline uses it: order preservation,
// pass-through of business fields, batch report and re-classification.

use serde_json::{json, Value};

use defect_classifier::orders::{classify_orders, reclassify_orders, ClassifiedOrder, OrderRow};
use defect_classifier::{Classification, Classifier, Confidence, UNCLASSIFIED};

fn clf() -> Classifier {
    Classifier::builtin().unwrap()
}

fn rows() -> Vec<OrderRow> {
    serde_json::from_value(json!([
        { "order_number": "1001", "defect_text": "vazamento de óleo pelo retentor", "status": "Garantia" },
        { "order_number": 1002, "defect_text": "motor aqueceu muito" },
        { "order_number": "1003", "defect_text": null },
        { "order_number": "1004", "defect_text": 17 },
        { "order_number": "1005", "defect_text": "xyz123 sem sentido nenhum" },
        { "order_number": "1006", "defect_text": "vazamento pelo bujão", "total": 1500.0 }
    ]))
    .unwrap()
}

#[test]
fn classifies_in_order_and_keeps_fields() {
    let batch = classify_orders(&clf(), rows());
    let ids: Vec<&str> = batch
        .orders
        .iter()
        .map(|o| o.row.order_number.as_str())
        .collect();
    assert_eq!(ids, ["1001", "1002", "1003", "1004", "1005", "1006"]);

    assert_eq!(batch.orders[0].defect_subsubgroup, "Oil");
    assert_eq!(batch.orders[0].row.fields["status"], "Garantia");
    assert_eq!(batch.orders[1].classification_confidence, Confidence::Subgroup);
    assert_eq!(batch.orders[2].defect_group, UNCLASSIFIED);
    assert_eq!(batch.orders[3].defect_group, UNCLASSIFIED);
    assert_eq!(batch.orders[5].classification_confidence, Confidence::Group);
    assert_eq!(batch.orders[5].row.fields["total"], 1500.0);
}

#[test]
fn report_counts_depths_and_groups() {
    let r = classify_orders(&clf(), rows()).report;
    assert_eq!(r.total, 6);
    assert_eq!(r.processed, 6);
    assert_eq!(r.unclassified, 3);
    assert!((r.unclassified_pct - 50.0).abs() < 1e-9);
    assert!((r.classified_pct() - 50.0).abs() < 1e-9);
    assert_eq!(r.by_depth["subsubgroup"], 1);
    assert_eq!(r.by_depth["subgroup"], 1);
    assert_eq!(r.by_depth["group"], 1);
    assert_eq!(r.by_depth["unclassified"], 3);
    assert_eq!(r.by_group["Leaks"], 2);
    assert_eq!(r.by_group["Performance/Operation"], 1);
    assert!(r.generated_at.is_some());
}

#[test]
fn empty_batch_has_zero_percentages() {
    let r = classify_orders(&clf(), Vec::new()).report;
    assert_eq!(r.total, 0);
    assert_eq!(r.unclassified_pct, 0.0);
    assert_eq!(r.classified_pct(), 0.0);
}

#[test]
fn large_batch_matches_sequential_results() {
    let c = clf();
    let texts = [
        "vazamento de óleo",
        "problema na bateria",
        "",
        "embreagem patinando",
        "nada a declarar",
    ];
    let rows: Vec<OrderRow> = (0..2_000)
        .map(|i| OrderRow::new(i.to_string(), texts[i % texts.len()]))
        .collect();
    let batch = classify_orders(&c, rows);
    for (i, o) in batch.orders.iter().enumerate() {
        assert_eq!(o.row.order_number, i.to_string());
        assert_eq!(o.classification(), c.classify(texts[i % texts.len()]));
    }
}

#[test]
fn serialized_row_is_flat() {
    let batch = classify_orders(&clf(), rows());
    let v: Value = serde_json::to_value(&batch.orders[1]).unwrap();
    let obj = v.as_object().unwrap();
    for key in [
        "order_number",
        "defect_text",
        "defect_group",
        "defect_subgroup",
        "defect_subsubgroup",
        "classification_confidence",
    ] {
        assert!(obj.contains_key(key), "missing {key}: {v}");
    }
    assert_eq!(v["order_number"], "1002");
    assert_eq!(v["classification_confidence"], 0.7);
}

#[test]
fn reclassify_only_touches_unclassified_rows_with_text() {
    let persisted: Vec<ClassifiedOrder> = serde_json::from_value(json!([
        // stale label, but already classified: left alone
        { "order_number": "1", "defect_text": "problema na bateria",
          "defect_group": "Leaks", "defect_subgroup": "General",
          "defect_subsubgroup": "General", "classification_confidence": 0.5 },
        // never classified (no classification fields at all)
        { "order_number": "2", "defect_text": "motor aqueceu muito" },
        // unclassified and still nothing to go on
        { "order_number": "3", "defect_text": "   ",
          "defect_group": "Unclassified", "defect_subgroup": "Unclassified",
          "defect_subsubgroup": "Unclassified", "classification_confidence": 0 }
    ]))
    .unwrap();

    let batch = reclassify_orders(&clf(), persisted.clone(), false);
    assert_eq!(batch.report.processed, 1);
    assert_eq!(batch.report.changed, 1);
    assert_eq!(batch.orders[0].defect_group, "Leaks");
    assert_eq!(batch.orders[1].defect_subgroup, "Overheating");
    assert_eq!(batch.orders[2].classification(), Classification::unclassified());

    let forced = reclassify_orders(&clf(), persisted, true);
    assert_eq!(forced.report.processed, 3);
    assert_eq!(forced.report.changed, 2);
    assert_eq!(forced.orders[0].defect_group, "Electrical");
}

#[test]
fn rejects_off_scale_confidence() {
    let r = serde_json::from_value::<ClassifiedOrder>(json!({
        "order_number": "9", "classification_confidence": 0.42
    }));
    assert!(r.is_err());
}
