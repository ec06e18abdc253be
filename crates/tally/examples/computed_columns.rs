//! Example: Add computed columns to a dataset and recalculate after an edit

use tally::prelude::*;

fn main() -> Result<()> {
    let mut dataset = Dataset::new(4);

    // Add data columns
    dataset.add_column(DataColumn::text("name", ["Item 1", "Item 2", "Item 3", "Item 4"]))?;
    dataset.add_column(DataColumn::decimal("value", [100.0, 200.0, 150.0, f64::NAN]))?;

    // Add computed columns
    dataset.add_computed_column(
        "double",
        FormulaExpr::binary(
            FormulaExpr::column("value"),
            BinaryOperator::Multiply,
            FormulaExpr::number(2.0),
        ),
    )?;
    dataset.add_computed_column(
        "z",
        FormulaExpr::call("Z", vec![FormulaExpr::column("value")]),
    )?;
    dataset.add_computed_column(
        "band",
        FormulaExpr::call(
            "IF",
            vec![
                FormulaExpr::compare(
                    FormulaExpr::column("double"),
                    vec![(CompareOperator::GreaterEqual, FormulaExpr::number(300.0))],
                ),
                FormulaExpr::text("high"),
                FormulaExpr::text("low"),
            ],
        ),
    )?;

    let stats = dataset.calculate()?;
    println!(
        "Calculated {} columns ({} errors)",
        stats.columns_calculated, stats.errors
    );
    print_columns(&dataset)?;

    // Edit a value; only the columns downstream of it are recalculated
    dataset.set_value("value", 3, Value::Decimal(50.0))?;
    let stats = dataset.calculate()?;
    println!(
        "\nRecalculated {} columns after the edit",
        stats.columns_calculated
    );
    print_columns(&dataset)?;

    Ok(())
}

fn print_columns(dataset: &Dataset) -> Result<()> {
    for name in dataset.column_names() {
        let source = dataset.source(name)?;
        println!(
            "{} ({}, {}): {:?}",
            name,
            source.data_type().name(),
            source.measure_type().name(),
            dataset.values(name)?
        );
    }
    Ok(())
}
