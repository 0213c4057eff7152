//! Tests for templates, workbook documents, custom functions and pass ordering

use std::future::Future;
use std::sync::Mutex;

use normsheet::prelude::*;
use normsheet::{BridgeError, EvaluationRequest, EvaluationResponse};
use pretty_assertions::assert_eq;

/// Function service that multiplies every parameter of each call
#[derive(Default)]
struct Multiplier {
    requests: Mutex<Vec<EvaluationRequest>>,
}

impl Multiplier {
    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl FunctionEvaluator for Multiplier {
    fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> impl Future<Output = std::result::Result<EvaluationResponse, BridgeError>> + Send {
        let products: Vec<f64> = request
            .functions
            .iter()
            .map(|call| call.parameters.0.iter().map(|(_, v)| v).product())
            .collect();
        self.requests.lock().unwrap().push(request);
        async move { Ok(EvaluationResponse::numbers(products)) }
    }
}

fn trafo() -> CustomFunctionDefinition {
    CustomFunctionDefinition::new("TRAFO", ["potencia", "factor"], 42)
}

fn engine() -> Recalculator {
    let mut store = WorkbookStore::new();
    store.add_instance(Instance::new("design")).unwrap();
    Recalculator::new(store).with_functions([trafo()])
}

const TEMPLATE: &str = r#"{
    "name": "Transformador",
    "cells": {
        "A1": {"value": "Potencia", "formula": "Potencia", "computed": "Potencia"},
        "B1": {"value": "", "formula": "", "computed": "", "elementKey": "power"},
        "A2": {"value": "Material", "formula": "Material", "computed": "Material"},
        "B2": {"value": "", "formula": "", "computed": "", "elementKey": "material"},
        "B3": {"value": "", "formula": "", "computed": "", "elementKey": "missing"},
        "C1": {"value": "=B1*2", "formula": "=B1*2", "computed": "=B1*2", "bold": true},
        "C2": {"value": "=TRAFO(B1, 1.5)", "formula": "=TRAFO(B1, 1.5)", "computed": 0}
    },
    "cellsStyles": {
        "columnWidths": {"0": 150},
        "rowHeights": {"2": 40},
        "hiddenRows": [4],
        "hiddenColumns": [3]
    }
}"#;

fn elements() -> Vec<ElementValue> {
    vec![
        ElementValue::new("power", "number", "400"),
        ElementValue::new("material", "text", "Cobre"),
        ElementValue::new("missing", "text", serde_json::Value::Null),
    ]
}

#[tokio::test]
async fn test_custom_function_through_edit() {
    let service = Multiplier::default();
    let mut calc = engine();

    calc.edit_cell("design", "Hoja1", "A1", "4", &service)
        .await
        .unwrap();
    let stats = calc
        .edit_cell("design", "Hoja1", "B1", "=TRAFO(A1, -2.5)", &service)
        .await
        .unwrap();

    assert_eq!(stats.custom_calls, 1);
    assert_eq!(
        calc.computed("design", "Hoja1", "B1").unwrap(),
        CellValue::Number(-10.0)
    );

    let requests = service.requests.lock().unwrap();
    let call = &requests[0].functions[0];
    assert_eq!(call.id, 42);
    assert_eq!(call.parameters.get("potencia"), Some(4.0));
    assert_eq!(call.parameters.get("factor"), Some(-2.5));
}

#[tokio::test]
async fn test_custom_function_failures_stay_in_their_cell() {
    let mut calc = engine();
    calc.edit_cell("design", "Hoja1", "A1", "=TRAFO(1, 2)", &Unavailable)
        .await
        .unwrap();
    calc.edit_cell("design", "Hoja1", "A2", "=TRAFO(1)", &Unavailable)
        .await
        .unwrap();
    calc.edit_cell("design", "Hoja1", "A3", "=2+2", &Unavailable)
        .await
        .unwrap();

    assert_eq!(
        calc.computed("design", "Hoja1", "A1").unwrap(),
        CellValue::Error(CellError::Error)
    );
    assert_eq!(
        calc.computed("design", "Hoja1", "A2").unwrap(),
        CellValue::Error(CellError::MissingArgs)
    );
    assert_eq!(
        calc.computed("design", "Hoja1", "A3").unwrap(),
        CellValue::Number(4.0)
    );
}

#[tokio::test]
async fn test_load_template_injects_elements() {
    let service = Multiplier::default();
    let template = Template::from_json(TEMPLATE).unwrap();
    let mut calc = engine();
    calc.store_mut()
        .sheet_mut("design", "Hoja1")
        .unwrap()
        .hide_row(9);

    let stats = calc
        .load_template("design", "Hoja1", &template, &elements(), &service)
        .await
        .unwrap();
    assert_eq!(stats.cells_evaluated, 7);
    assert_eq!(service.request_count(), 1);

    let sheet = calc.store().sheet("design", "Hoja1").unwrap();
    let b1 = sheet.cell_at("B1").unwrap().unwrap();
    assert_eq!(b1.raw_input, "400");
    assert_eq!(b1.computed, CellValue::Number(400.0));
    assert_eq!(sheet.cell_at("B2").unwrap().unwrap().raw_input, "Cobre");
    // Null element values leave the template cell alone
    assert_eq!(sheet.cell_at("B3").unwrap().unwrap().raw_input, "");

    assert_eq!(sheet.computed(&CellRef::parse("C1").unwrap()), CellValue::Number(800.0));
    assert_eq!(sheet.computed(&CellRef::parse("C2").unwrap()), CellValue::Number(600.0));
    assert_eq!(sheet.cell_at("C1").unwrap().unwrap().style.bold, Some(true));

    assert_eq!(sheet.column_width(0), 150);
    assert_eq!(sheet.row_height(2), 40);
    assert!(sheet.is_row_hidden(4));
    assert!(sheet.is_column_hidden(3));
    assert!(!sheet.is_row_hidden(9));
}

#[tokio::test]
async fn test_add_sheet_from_template() {
    let template = Template::from_json(TEMPLATE).unwrap();
    let mut calc = engine();

    let (sheet_id, _) = calc
        .add_sheet_from_template("design", &template, &elements(), &Multiplier::default())
        .await
        .unwrap();
    assert_eq!(sheet_id, "design-sheet2");
    assert_eq!(
        calc.computed("design", "Hoja2", "C1").unwrap(),
        CellValue::Number(800.0)
    );

    // Editing the new sheet recomputes its dependents
    calc.edit_cell("design", &sheet_id, "B1", "10", &Multiplier::default())
        .await
        .unwrap();
    assert_eq!(
        calc.computed("design", "Hoja2", "C1").unwrap(),
        CellValue::Number(20.0)
    );
    assert_eq!(
        calc.computed("design", "Hoja2", "C2").unwrap(),
        CellValue::Number(15.0)
    );

    let missing = calc
        .add_sheet_from_template("nowhere", &template, &[], &Unavailable)
        .await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_load_workbook_document() {
    let json = r#"{
        "instances": [
            {
                "instanceId": "design",
                "sheets": [
                    {
                        "id": "design-sheet1",
                        "name": "Hoja1",
                        "cells": {
                            "A1": {"value": "5", "formula": "5", "computed": 5},
                            "A2": {"value": "=A1*cost:Hoja1!A1", "formula": "=A1*cost:Hoja1!A1", "computed": 0},
                            "A3": {"value": "=TRAFO(A1, A2)", "formula": "=TRAFO(A1, A2)", "computed": 0}
                        }
                    }
                ]
            },
            {
                "instanceId": "cost",
                "sheets": [
                    {
                        "id": "cost-sheet1",
                        "name": "Hoja1",
                        "cells": {"A1": {"value": "3", "formula": "3", "computed": 3}}
                    }
                ]
            },
            {"instanceId": "quote"}
        ],
        "functions": [{"code": "TRAFO", "variables": ["a", "b"], "id": 7}]
    }"#;
    let document = WorkbookDocument::from_json(json).unwrap();
    let service = Multiplier::default();
    let mut calc = Recalculator::new(WorkbookStore::new());

    calc.load_workbook(document, &service).await.unwrap();

    assert_eq!(calc.functions().len(), 1);
    assert_eq!(
        calc.computed("design", "Hoja1", "A2").unwrap(),
        CellValue::Number(15.0)
    );
    assert_eq!(
        calc.computed("design", "Hoja1", "A3").unwrap(),
        CellValue::Number(75.0)
    );
    assert_eq!(calc.store().instance("quote").unwrap().sheet_count(), 1);

    // Export and reload keeps the computed values and the functions
    let exported = calc.to_document();
    let reparsed = WorkbookDocument::from_json(&exported.to_json_pretty().unwrap()).unwrap();
    assert_eq!(reparsed, exported);

    let mut reloaded = Recalculator::new(WorkbookStore::new());
    reloaded.load_workbook(reparsed, &service).await.unwrap();
    assert_eq!(reloaded.store(), calc.store());
}

#[tokio::test]
async fn test_stale_pass_is_discarded() {
    let mut calc = engine();
    let cell = CellRef::parse("A1").unwrap();

    let older = calc.begin_edit("design", "Hoja1", cell, "=1+1").unwrap();
    let newer = calc.begin_edit("design", "Hoja1", cell, "=2+2").unwrap();
    assert!(newer.id() > older.id());

    let newer = newer.run(&Unavailable).await;
    let older = older.run(&Unavailable).await;

    assert!(matches!(calc.commit(newer).unwrap(), CommitOutcome::Applied(_)));
    assert_eq!(calc.commit(older).unwrap(), CommitOutcome::Stale);
    assert_eq!(
        calc.computed("design", "Hoja1", "A1").unwrap(),
        CellValue::Number(4.0)
    );
}

#[tokio::test]
async fn test_older_pass_on_other_cells_is_kept() {
    let mut calc = engine();
    calc.edit_cell("design", "Hoja1", "B2", "=A1*10", &Unavailable)
        .await
        .unwrap();

    let older = calc
        .begin_edit("design", "Hoja1", CellRef::parse("A1").unwrap(), "=1+1")
        .unwrap();
    let newer = calc
        .begin_edit("design", "Hoja1", CellRef::parse("C1").unwrap(), "7")
        .unwrap();
    let newer = newer.run(&Unavailable).await;
    let older = older.run(&Unavailable).await;

    assert!(matches!(calc.commit(newer).unwrap(), CommitOutcome::Applied(_)));
    assert!(matches!(calc.commit(older).unwrap(), CommitOutcome::Applied(_)));
    assert_eq!(
        calc.computed("design", "Hoja1", "A1").unwrap(),
        CellValue::Number(2.0)
    );
    assert_eq!(
        calc.computed("design", "Hoja1", "B2").unwrap(),
        CellValue::Number(20.0)
    );
}

#[tokio::test]
async fn test_optimistic_value_before_commit() {
    let mut calc = engine();
    let cell = CellRef::parse("B2").unwrap();

    let pass = calc.begin_edit("design", "Hoja1", cell, "=1+1").unwrap();
    assert_eq!(
        calc.computed("design", "Hoja1", "B2").unwrap(),
        CellValue::Text("=1+1".to_string())
    );
    assert_eq!(pass.cells(), &[cell]);

    let result = pass.run(&Unavailable).await;
    assert_eq!(result.values(), &[(cell, CellValue::Number(2.0))]);
    calc.commit(result).unwrap();
    assert_eq!(
        calc.computed("design", "Hoja1", "B2").unwrap(),
        CellValue::Number(2.0)
    );
}
