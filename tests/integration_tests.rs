use pnl_engine::*;
use std::collections::BTreeMap;

fn record(code: &str, name: &str, months: &[f64]) -> AccountRecord {
    let mut values = BTreeMap::new();
    for (i, v) in months.iter().enumerate() {
        values.insert(MONTHS[i], *v);
    }
    AccountRecord {
        code: code.to_string(),
        name: name.to_string(),
        values,
    }
}

/// A small but complete manufacturing ledger: revenue with a discount
/// line, a cost-of-sales branch, selling and admin branches, plus
/// depreciation and interest leaves that the views treat specially.
fn manufacturing_ledger() -> Vec<AccountRecord> {
    vec![
        record("4", "Ingresos operacionales", &[]),
        record(
            "4.1",
            "Ventas nacionales",
            &[
                10000.0, 11000.0, 9500.0, 12000.0, 10500.0, 11500.0, 10000.0, 12500.0, 11000.0,
                11800.0, 10200.0, 13000.0,
            ],
        ),
        record(
            "4.2",
            "Descuentos en ventas",
            &[
                -200.0, -220.0, -190.0, -240.0, -210.0, -230.0, -200.0, -250.0, -220.0, -236.0,
                -204.0, -260.0,
            ],
        ),
        record("5", "Egresos", &[]),
        record("5.1", "Costo de ventas", &[]),
        record(
            "5.1.1",
            "Materia prima",
            &[
                3000.0, 3300.0, 2850.0, 3600.0, 3150.0, 3450.0, 3000.0, 3750.0, 3300.0, 3540.0,
                3060.0, 3900.0,
            ],
        ),
        record(
            "5.1.2",
            "Fletes de compra",
            &[
                500.0, 550.0, 475.0, 600.0, 525.0, 575.0, 500.0, 625.0, 550.0, 590.0, 510.0,
                650.0,
            ],
        ),
        record("5.2", "Gastos de ventas", &[]),
        record(
            "5.2.1",
            "Comisiones de ventas",
            &[
                300.0, 330.0, 285.0, 360.0, 315.0, 345.0, 300.0, 375.0, 330.0, 354.0, 306.0,
                390.0,
            ],
        ),
        record("5.2.2", "Publicidad", &[400.0; 12]),
        record("5.3", "Gastos de administración", &[]),
        record("5.3.1", "Sueldos administrativos", &[2000.0; 12]),
        record("5.3.2", "Arriendo oficina", &[800.0; 12]),
        record("5.3.3", "Depreciación equipos", &[250.0; 12]),
        record("5.3.4", "Intereses préstamo bancario", &[150.0; 12]),
    ]
}

#[test]
fn test_rollup_invariant_across_nesting_depths() {
    // Hierarchies from 1 to 5 levels deep; every subtotal must equal the
    // sum of its leaf descendants, regardless of depth.
    let records = vec![
        record("4", "Nivel uno", &[100.0; 12]),
        record("5", "Raiz", &[]),
        record("5.1", "Nivel dos", &[]),
        record("5.1.1", "Hoja a", &[10.0; 12]),
        record("5.1.2", "Nivel tres", &[]),
        record("5.1.2.1", "Hoja b", &[20.0; 12]),
        record("5.1.2.2", "Nivel cuatro", &[]),
        record("5.1.2.2.1", "Hoja c", &[30.0; 12]),
        record("5.1.2.2.2", "Nivel cinco", &[]),
        record("5.1.2.2.2.1", "Hoja d", &[40.0; 12]),
    ];
    let arena = AccountArena::resolve(&records);
    let builder = StatementBuilder::new(&records, &arena);
    let tree = builder.build(Period::Month(Month::Enero), AnalysisView::Contable);

    fn check(node: &AccountNode) {
        if !node.children.is_empty() {
            let mut leaf_sum = 0.0;
            node.walk(&mut |n| {
                if n.kind == NodeKind::Leaf {
                    leaf_sum += n.value;
                }
            });
            assert!(
                (node.value - leaf_sum).abs() < 1e-9,
                "subtotal {} = {} but leaves sum to {}",
                node.code,
                node.value,
                leaf_sum
            );
        }
        for child in &node.children {
            check(child);
        }
    }
    check(tree.find("5").unwrap());

    assert_eq!(tree.find("5").unwrap().value, 100.0);
    assert_eq!(tree.find("5.1.2.2").unwrap().value, 70.0);
    assert_eq!(tree.find("5.1.2.2.2.1").unwrap().depth, 5);
}

#[test]
fn test_parent_balance_never_double_counts() {
    let mut with_parent = manufacturing_ledger();
    // Give the 5.1 subtotal account a direct balance of its own
    with_parent[4] = record("5.1", "Costo de ventas", &[9999.0; 12]);

    let options = ProcessOptions {
        period: Period::Month(Month::Enero),
        ..Default::default()
    };
    let clean = PnlProcessor::process(&manufacturing_ledger(), &options).unwrap();
    let dirty = PnlProcessor::process(&with_parent, &options).unwrap();

    let enero_clean = clean.aggregates.for_period(Period::Month(Month::Enero)).unwrap();
    let enero_dirty = dirty.aggregates.for_period(Period::Month(Month::Enero)).unwrap();
    assert_eq!(enero_clean.costo_ventas_total, enero_dirty.costo_ventas_total);
    assert_eq!(
        clean.tree.find("5.1").unwrap().value,
        dirty.tree.find("5.1").unwrap().value
    );
}

#[test]
fn test_scenario_example_exact_figures() {
    let input = "4;Ventas;1000\n5.1;Costo de ventas;400\n5.2;Gastos;200\n";
    let options = ProcessOptions {
        period: Period::Month(Month::Enero),
        ..Default::default()
    };
    let (output, report) = PnlProcessor::process_text(input, &options).unwrap();
    assert_eq!(report.skipped_rows, 0);

    let enero = output.aggregates.for_period(Period::Month(Month::Enero)).unwrap();
    assert_eq!(enero.utilidad_bruta, 600.0);
    assert_eq!(enero.gastos_operativos, 200.0);
    assert_eq!(enero.utilidad_neta, 400.0);

    // Gross margin 60% shows up as the cost line's vertical share of 40%
    let cost = output.tree.find("5.1").unwrap();
    assert_eq!(cost.vertical_percentage, Some(40.0));
}

#[test]
fn test_vertical_bounds_and_zero_revenue_flag() {
    let options = ProcessOptions {
        period: Period::Month(Month::Enero),
        ..Default::default()
    };
    let output = PnlProcessor::process(&manufacturing_ledger(), &options).unwrap();

    assert!(!output.revenue_was_zero);
    assert_eq!(output.tree.find("4").unwrap().vertical_percentage, Some(100.0));
    output.tree.walk(&mut |n| {
        assert!(n.vertical_percentage.unwrap().is_finite());
    });

    // A ledger with costs but no revenue: all percentages 0, flag raised
    let no_revenue = vec![record("5.3.1", "Sueldos", &[500.0; 12])];
    let output = PnlProcessor::process(&no_revenue, &options).unwrap();
    assert!(output.revenue_was_zero);
    output.tree.walk(&mut |n| {
        assert_eq!(n.vertical_percentage, Some(0.0));
    });
}

#[test]
fn test_horizontal_self_comparison_is_all_zero() {
    let options = ProcessOptions {
        period: Period::Month(Month::Marzo),
        comparison_period: Some(Period::Month(Month::Marzo)),
        ..Default::default()
    };
    let output = PnlProcessor::process(&manufacturing_ledger(), &options).unwrap();

    assert!(output.unmatched_comparison.is_empty());
    output.tree.walk(&mut |n| {
        let change = n.horizontal_change.unwrap();
        assert_eq!(change.variation_absolute, 0.0);
        assert_eq!(change.variation_percentual, 0.0);
    });
}

#[test]
fn test_views_disagree_only_below_the_line() {
    let records = manufacturing_ledger();
    let period = Period::Month(Month::Enero);

    let contable = PnlProcessor::process(
        &records,
        &ProcessOptions {
            period,
            view: AnalysisView::Contable,
            ..Default::default()
        },
    )
    .unwrap();
    let operativo = PnlProcessor::process(
        &records,
        &ProcessOptions {
            period,
            view: AnalysisView::Operativo,
            ..Default::default()
        },
    )
    .unwrap();
    let caja = PnlProcessor::process(
        &records,
        &ProcessOptions {
            period,
            view: AnalysisView::Caja,
            ..Default::default()
        },
    )
    .unwrap();

    // Revenue is identical everywhere
    for output in [&contable, &operativo, &caja] {
        assert_eq!(output.tree.find("4").unwrap().value, 9800.0);
    }

    // Contable keeps interest and depreciation inside admin expenses
    assert_eq!(contable.tree.find("5.3").unwrap().value, 3200.0);
    // Operativo carves the interest out to its own line
    assert_eq!(operativo.tree.find("5.3").unwrap().value, 3050.0);
    assert_eq!(
        operativo.tree.find(views::FINANCIAL_LINE_CODE).unwrap().value,
        150.0
    );
    // Caja also removes depreciation and reports the add-back
    assert_eq!(caja.tree.find("5.3").unwrap().value, 2800.0);
    assert_eq!(caja.tree.find(views::ADDBACK_LINE_CODE).unwrap().value, 250.0);

    // Excluded leaves stay visible with their face value in every view
    assert_eq!(caja.tree.find("5.3.3").unwrap().value, 250.0);
    assert_eq!(caja.tree.find("5.3.4").unwrap().value, 150.0);
}

#[test]
fn test_break_even_example_and_identity() {
    let base = compute_break_even(1000.0, 400.0, 300.0);
    assert!((base.margen_contribucion_porc - 0.6).abs() < 1e-12);
    assert!((base.punto_equilibrio - 500.0).abs() < 1e-12);
    assert!(
        (base.punto_equilibrio * base.margen_contribucion_porc - base.costos_fijos).abs() < 1e-9
    );

    let hopeless = compute_break_even(1000.0, 1100.0, 300.0);
    assert_eq!(hopeless.punto_equilibrio, 0.0);
    assert!(hopeless.margin_not_positive);
}

#[test]
fn test_simulation_example_through_processor() {
    let input = "4;Ventas;1000\n5.1.1;Materia prima;400\n5.3.1;Arriendo;300\n";
    let options = ProcessOptions {
        period: Period::Month(Month::Enero),
        simulation: Some(SimulationParameters {
            price_change_pct: 10.0,
            fixed_cost_delta: 50.0,
            variable_cost_rate_change_pct: 0.0,
        }),
        ..Default::default()
    };
    let (output, _) = PnlProcessor::process_text(input, &options).unwrap();

    let base = output.break_even;
    assert!((base.ingresos - 1000.0).abs() < 1e-9);
    assert!((base.costos_variables - 400.0).abs() < 1e-9);
    assert!((base.costos_fijos - 300.0).abs() < 1e-9);
    assert!((base.punto_equilibrio - 500.0).abs() < 1e-9);

    let sim = output.simulated.unwrap();
    assert!((sim.ingresos - 1100.0).abs() < 1e-9);
    assert!((sim.costos_fijos - 350.0).abs() < 1e-9);
    // The rate held at 0.4, so margin stays 0.6 and break-even follows
    // both deltas: 350 / 0.6
    assert!((sim.punto_equilibrio - 350.0 / 0.6).abs() < 1e-6);
    assert!((sim.punto_equilibrio * sim.margen_contribucion_porc - sim.costos_fijos).abs() < 1e-9);
}

#[test]
fn test_classifier_workflow_with_overrides() {
    let records = manufacturing_ledger();
    let arena = AccountArena::resolve(&records);

    let mut classifier = CostClassifier::default();
    assert!(classifier.classify("5.1.1", "Materia prima").is_err());

    classifier.set_financial_data(FinancialSnapshot::from_ledger(&records, &arena));

    let accounts: Vec<(String, String)> = arena
        .leaves()
        .filter(|n| !n.code.starts_with('4'))
        .map(|n| (n.code.clone(), n.name.clone()))
        .collect();
    let results = classifier.classify_accounts(&accounts).unwrap();

    let materia = results.get("5.1.1").unwrap();
    assert_eq!(materia.classification, CostBehavior::Variable);
    assert_eq!(materia.band(), ConfidenceBand::High);

    let arriendo = results.get("5.3.2").unwrap();
    assert_eq!(arriendo.classification, CostBehavior::Fijo);

    // Re-running the batch yields byte-for-byte identical decisions
    let rerun = classifier.classify_accounts(&accounts).unwrap();
    for (code, result) in &results {
        let again = rerun.get(code).unwrap();
        assert_eq!(result.classification, again.classification);
        assert_eq!(result.confidence, again.confidence);
    }

    // Feeding accepted classifications back into the engine as overrides
    let mut overrides: BTreeMap<String, CostBehavior> = BTreeMap::new();
    for (code, result) in &results {
        if result.band() == ConfidenceBand::High {
            overrides.insert(code.clone(), result.classification);
        }
    }
    overrides.insert("5.2.2".to_string(), CostBehavior::Fijo);

    let options = ProcessOptions {
        period: Period::Annual,
        overrides,
        ..Default::default()
    };
    let output = PnlProcessor::process(&records, &options).unwrap();
    assert!(output.aggregates.annual.costos_variables > 0.0);
    assert!(output.aggregates.annual.costos_fijos > 0.0);
}

#[test]
fn test_ingestion_tolerates_bad_rows_and_locales() {
    let input = "Codigo;Cuenta;Enero;Febrero\n\
                 4;Ventas;1.234,56;2,000.00\n\
                 ;Fila sin codigo;100\n\
                 4.x;Codigo invalido;100\n\
                 5.1;Costo de ventas;617,28;1000\n";
    let options = ProcessOptions {
        period: Period::Month(Month::Enero),
        ..Default::default()
    };
    let (output, report) = PnlProcessor::process_text(input, &options).unwrap();

    assert_eq!(report.skipped_rows, 2);
    assert_eq!(report.warnings.len(), 2);

    let enero = output.aggregates.for_period(Period::Month(Month::Enero)).unwrap();
    assert!((enero.ingresos - 1234.56).abs() < 1e-9);
    assert!((enero.costo_ventas_total - 617.28).abs() < 1e-9);
    assert!((enero.utilidad_bruta - 617.28).abs() < 1e-9);
}

#[test]
fn test_state_roundtrip_preserves_a_session() -> anyhow::Result<()> {
    let mut state = EngineState {
        records: manufacturing_ledger(),
        overrides: BTreeMap::new(),
        active_view: AnalysisView::Operativo,
    };
    state
        .overrides
        .insert("5.2.2".to_string(), CostBehavior::Fijo);

    let mut store = InMemoryStore::default();
    store.save(&state)?;
    let restored = store.load()?.expect("saved state present");

    let options = ProcessOptions {
        view: restored.active_view,
        period: Period::Month(Month::Enero),
        overrides: restored.overrides.clone(),
        ..Default::default()
    };
    let before = PnlProcessor::process(&state.records, &options)?;
    let after = PnlProcessor::process(&restored.records, &options)?;

    assert_eq!(
        before.aggregates.annual.utilidad_neta,
        after.aggregates.annual.utilidad_neta
    );
    assert_eq!(
        before.break_even.punto_equilibrio,
        after.break_even.punto_equilibrio
    );
    Ok(())
}

#[test]
fn test_annual_aggregate_sums_leaf_months() {
    let options = ProcessOptions::default();
    let output = PnlProcessor::process(&manufacturing_ledger(), &options).unwrap();

    let expected_revenue: f64 = manufacturing_ledger()
        .iter()
        .filter(|r| r.code.starts_with('4') && r.code.contains('.'))
        .map(|r| r.annual_value())
        .sum();
    assert!((output.aggregates.annual.ingresos - expected_revenue).abs() < 1e-9);

    let monthly_sum: f64 = MONTHS
        .iter()
        .map(|m| {
            output
                .aggregates
                .for_period(Period::Month(*m))
                .unwrap()
                .ingresos
        })
        .sum();
    assert!((output.aggregates.annual.ingresos - monthly_sum).abs() < 1e-9);
}

#[test]
fn test_tree_exports_to_json() -> anyhow::Result<()> {
    let options = ProcessOptions {
        period: Period::Month(Month::Enero),
        ..Default::default()
    };
    let output = PnlProcessor::process(&manufacturing_ledger(), &options)?;

    let json = output.tree.to_json()?;
    assert!(json.contains("Materia prima"));
    assert!(json.contains("vertical_percentage"));

    let enero = output
        .aggregates
        .for_period(Period::Month(Month::Enero))
        .expect("enero aggregate");
    let json = enero.to_json()?;
    assert!(json.contains("punto_equilibrio"));
    Ok(())
}
