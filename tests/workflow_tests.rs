//! End-to-end tests: entry form, store over an in-memory data service,
//! table view and report export.

use inspection_dashboard::error::{Error, Result, ValidationError};
use inspection_dashboard::filters::FilterSpec;
use inspection_dashboard::form::InspectionDraft;
use inspection_dashboard::output::{render_export, write_export};
use inspection_dashboard::service::DataService;
use inspection_dashboard::store::{DataChanged, ImportOutcome, InspectionStore};
use inspection_dashboard::table::{total_defects, ExportDocument, TableView, TOTAL_DEFECTS_COLUMN};
use inspection_dashboard::types::InspectionRecord;
use std::cell::{Cell, RefCell};

/// Stands in for the HTTP service; records round-trip through JSON like
/// they would over the wire.
#[derive(Default)]
struct MemoryService {
    docs: RefCell<Vec<serde_json::Value>>,
    next_id: Cell<usize>,
    reject_writes: Cell<bool>,
}

impl MemoryService {
    fn guard(&self) -> Result<()> {
        if self.reject_writes.get() {
            return Err(Error::Service {
                endpoint: "/inspections/import".into(),
                status: 500,
            });
        }
        Ok(())
    }

    fn insert(&self, record: &InspectionRecord) {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let mut doc = record.to_payload();
        doc["_id"] = serde_json::json!(format!("id{}", id));
        doc["__v"] = serde_json::json!(0);
        self.docs.borrow_mut().push(doc);
    }
}

impl DataService for MemoryService {
    fn list(&self) -> Result<Vec<InspectionRecord>> {
        let docs = self.docs.borrow();
        docs.iter()
            .map(|d| serde_json::from_value(d.clone()).map_err(Error::from))
            .collect()
    }

    fn create(&self, record: &InspectionRecord) -> Result<()> {
        self.guard()?;
        self.insert(record);
        Ok(())
    }

    fn update(&self, id: &str, record: &InspectionRecord) -> Result<()> {
        self.guard()?;
        let mut docs = self.docs.borrow_mut();
        for doc in docs.iter_mut() {
            if doc["_id"] == id {
                let mut replacement = record.to_payload();
                replacement["_id"] = serde_json::json!(id);
                *doc = replacement;
            }
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.guard()?;
        self.docs.borrow_mut().retain(|d| d["_id"] != id);
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.guard()?;
        self.docs.borrow_mut().clear();
        Ok(())
    }

    fn import_bulk(&self, records: &[InspectionRecord]) -> Result<()> {
        self.guard()?;
        records.iter().for_each(|r| self.insert(r));
        Ok(())
    }
}

fn filled_draft() -> InspectionDraft {
    let mut draft = InspectionDraft::new(2024);
    let cells = [
        ("serialNo", "7"),
        ("month", "March"),
        ("inspectionId", "INS-7"),
        ("inspectionDate", "2024-03-04"),
        ("servicePerformed", "Final Random"),
        ("inspectionType", "Final"),
        ("customer", "Acme"),
        ("bvFinal", "No"),
        ("aktiSelf", "Self"),
        ("inspectorName", "Asif"),
        ("offeredQtyCtn", "10"),
        ("offeredQtyPacks", "120"),
        ("noOfInspection", "1"),
        ("sampleSize", "200"),
        ("major", "4"),
        ("minor", "6"),
        ("percentAllowed", "2.5"),
        ("critical", "0"),
        ("actualMajor", "3"),
        ("actualMinor", "5"),
    ];
    for (field, value) in cells {
        draft.set(field, value).unwrap();
    }
    draft.set("fail", "1").unwrap();
    for (field, value) in [("pulledTerry", "1"), ("rawEdge", "2"), ("hole", "1"), ("flyYarn", "3")] {
        draft.set(field, value).unwrap();
    }
    draft
}

/// Fill every still-empty defect counter with zero.
fn zero_remaining(draft: &mut InspectionDraft) {
    for (_, fields) in inspection_dashboard::fields::FORM_SECTIONS {
        for field in *fields {
            if draft.get(field).is_empty() {
                draft.set(field, "0").unwrap();
            }
        }
    }
}

mod entry_form {
    use super::*;

    #[test]
    fn fail_disposition_forces_status() {
        let draft = filled_draft();
        assert_eq!(draft.get("pass"), "0");
        assert_eq!(draft.get("abort"), "0");
        assert_eq!(draft.get("pending"), "0");
        assert_eq!(draft.get("inspectionStatus"), "Fail");
    }

    #[test]
    fn missing_field_is_named() {
        let draft = filled_draft();
        match draft.submit() {
            Err(ValidationError::MissingField(label)) => assert!(!label.is_empty()),
            other => panic!("expected a missing field, got {:?}", other),
        }
    }

    #[test]
    fn cartons_cannot_exceed_packs() {
        let mut draft = filled_draft();
        zero_remaining(&mut draft);
        draft.set("offeredQtyCtn", "500").unwrap();
        assert_eq!(draft.submit(), Err(ValidationError::CtnExceedsPacks));
    }

    #[test]
    fn complete_draft_submits() {
        let mut draft = filled_draft();
        zero_remaining(&mut draft);
        let record = draft.submit().unwrap();
        assert_eq!(record.fail, 1.0);
        assert_eq!(record.oql, 2.0);
        assert_eq!(record.dpi, 2.0);
        assert_eq!(record.actual_oql, 1.5);
        assert_eq!(record.inspection_status.as_deref(), Some("Fail"));
    }
}

mod store_round_trip {
    use super::*;

    #[test]
    fn submitted_record_comes_back_unchanged() {
        let mut draft = filled_draft();
        zero_remaining(&mut draft);
        let submitted = draft.submit().unwrap();

        let mut store = InspectionStore::new(MemoryService::default());
        store.add(&submitted).unwrap();
        let fetched = &store.records()[0];

        assert_eq!(fetched.id.as_deref(), Some("id1"));
        assert_eq!(fetched.pass, submitted.pass);
        assert_eq!(fetched.fail, submitted.fail);
        assert_eq!(fetched.abort, submitted.abort);
        assert_eq!(fetched.pending, submitted.pending);
        assert_eq!(fetched.defects, submitted.defects);
        assert_eq!(total_defects(fetched), total_defects(&submitted));

        let table = store.table();
        let fail_col = table.columns.iter().position(|c| c == "fail").unwrap();
        assert_eq!(table.rows[0].cells[fail_col], "1");
        assert!(!table.columns.iter().any(|c| c == "_id" || c == "__v"));
    }

    #[test]
    fn edit_replaces_whole_record() {
        let mut store = InspectionStore::new(MemoryService::default());
        let mut draft = filled_draft();
        zero_remaining(&mut draft);
        store.add(&draft.submit().unwrap()).unwrap();

        let existing = store.records()[0].clone();
        let mut edit = InspectionDraft::from_record(&existing);
        edit.set("pass", "1").unwrap();
        let id = existing.id.clone().unwrap();
        store.update(&id, &edit.save_edit().unwrap()).unwrap();

        let after = &store.records()[0];
        assert_eq!(after.pass, 1.0);
        assert_eq!(after.fail, 0.0);
        assert_eq!(after.inspection_status.as_deref(), Some("Pass"));
        assert_eq!(after.id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn hand_typed_index_survives_save_and_reopen() {
        let mut draft = filled_draft();
        zero_remaining(&mut draft);
        draft.set("sampleSize", "100").unwrap();
        draft.set("major", "2").unwrap();
        draft.set("oql", "2.00").unwrap();
        assert!(draft.is_overridden("oql"));

        let mut store = InspectionStore::new(MemoryService::default());
        store.add(&draft.submit().unwrap()).unwrap();

        let saved = store.find("INS-7").unwrap().clone();
        let mut reopened = InspectionDraft::from_record(&saved);
        assert!(reopened.is_overridden("oql"));
        assert!(!reopened.is_overridden("dpi"));
        reopened.set("major", "4").unwrap();
        assert_eq!(reopened.get("oql"), "2.00");
        assert_eq!(reopened.get("dpi"), "4.00");

        let id = saved.id.clone().unwrap();
        store.update(&id, &reopened.save_edit().unwrap()).unwrap();
        let again = InspectionDraft::from_record(store.find(&id).unwrap());
        assert!(again.is_overridden("oql"));
        assert_eq!(again.get("oql"), "2.00");
        assert_eq!(again.get("major"), "4");
    }

    #[test]
    fn edit_picked_by_inspection_id() {
        let mut store = InspectionStore::new(MemoryService::default());
        let mut draft = filled_draft();
        zero_remaining(&mut draft);
        store.add(&draft.submit().unwrap()).unwrap();

        let record = store.find("INS-7").unwrap().clone();
        let mut edit = InspectionDraft::from_record(&record);
        edit.set("customer", "Zen").unwrap();
        edit.set("offeredQtyCtn", "999").unwrap();
        assert_eq!(edit.save_edit(), Err(ValidationError::CtnExceedsPacks));
        edit.set("offeredQtyCtn", "12").unwrap();

        store.update(record.id.as_deref().unwrap(), &edit.save_edit().unwrap()).unwrap();
        assert_eq!(store.records().len(), 1);
        let after = store.find("INS-7").unwrap();
        assert_eq!(after.customer.as_deref(), Some("Zen"));
        assert_eq!(after.offered_qty_ctn, 12.0);
        assert_eq!(after.id, record.id);
    }

    #[test]
    fn single_delete_removes_only_that_record() {
        let mut store = InspectionStore::new(MemoryService::default());
        for id in ["INS-1", "INS-2", "INS-3"] {
            let mut draft = filled_draft();
            zero_remaining(&mut draft);
            draft.set("inspectionId", id).unwrap();
            store.add(&draft.submit().unwrap()).unwrap();
        }
        let id = store.find("INS-2").and_then(|r| r.id.clone()).unwrap();
        store.delete(&id).unwrap();

        let left: Vec<_> = store.records().iter().filter_map(|r| r.inspection_id.as_deref()).collect();
        assert_eq!(left, vec!["INS-1", "INS-3"]);
        assert!(store.find("INS-2").is_none());
    }

    #[test]
    fn import_failure_is_local_only() {
        let mut store = InspectionStore::new(MemoryService::default());
        store.service().reject_writes.set(true);
        let outcome = store.import(vec![InspectionRecord::default(), InspectionRecord::default()]);
        assert!(!outcome.is_persisted());
        assert!(matches!(outcome, ImportOutcome::LocalOnly { count: 2, .. }));
        assert_eq!(store.records().len(), 2);
        assert!(store.last_error().is_some());
    }

    #[test]
    fn import_success_reloads_from_service() {
        let mut store = InspectionStore::new(MemoryService::default());
        let outcome = store.import(vec![InspectionRecord::default()]);
        assert_eq!(outcome, ImportOutcome::Persisted { count: 1 });
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].id.as_deref(), Some("id1"));
    }

    #[test]
    fn notification_triggers_refetch() {
        let mut store = InspectionStore::new(MemoryService::default());
        store.service().insert(&InspectionRecord::default());
        assert!(store.records().is_empty());
        store.notifier().send(DataChanged).unwrap();
        assert!(store.pump_notifications());
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.dashboard(&FilterSpec::default()).kpi.total, 1);
    }

    #[test]
    fn delete_all_empties_the_cache() {
        let mut store = InspectionStore::new(MemoryService::default());
        store.import(vec![InspectionRecord::default(), InspectionRecord::default()]);
        store.delete("id1").unwrap();
        assert_eq!(store.records().len(), 1);
        store.delete_all().unwrap();
        assert!(store.records().is_empty());
    }
}

mod table_and_export {
    use super::*;

    fn sample(n: usize) -> Vec<InspectionRecord> {
        (0..n)
            .map(|i| {
                let mut r = InspectionRecord {
                    inspection_id: Some(format!("INS-{}", i)),
                    inspector_name: Some(if i % 2 == 0 { "Asif" } else { "Bilal" }.into()),
                    pass: 1.0,
                    major: 1.0,
                    ..Default::default()
                };
                r.defects.hole = i as f64;
                r
            })
            .collect()
    }

    #[test]
    fn search_and_pagination() {
        let view = TableView::build(&sample(23));
        assert_eq!(view.total_pages(10), 3);
        assert_eq!(view.page(3, 10).len(), 3);
        let found = view.search("bilal");
        assert_eq!(found.rows.len(), 11);
        assert_eq!(found.search("INS-3").rows.len(), 1);
        assert_eq!(view.search("   ").rows.len(), 23);
    }

    #[test]
    fn export_uses_present_columns_only() {
        let doc = ExportDocument::build(&sample(3), "2025-01-01 09:00", 2).unwrap();
        assert_eq!(
            doc.columns,
            vec!["inspectionId", "inspectorName", "pass", "fail", "abort", "pending", TOTAL_DEFECTS_COLUMN]
        );
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[1].footer(), "Page 2");
        // major + hole
        assert_eq!(doc.pages[1].rows[0].last().map(String::as_str), Some("3"));
    }

    #[test]
    fn empty_export_is_refused() {
        assert!(matches!(
            ExportDocument::build(&[], "now", 10),
            Err(Error::NothingToExport)
        ));
    }

    #[test]
    fn export_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ExportDocument::build(&sample(5), "2025-01-01 09:00", 2).unwrap();
        let (text_path, _) = write_export(&doc, dir.path(), "inspection_report").unwrap();
        let text = std::fs::read_to_string(text_path).unwrap();
        assert_eq!(text, render_export(&doc));
        assert!(text.contains("Page 3"));
    }
}
