use csv::WriterBuilder;

use crate::book::Month;

/// Render a month as CSV: header, then the fixed expenses (placeholder
/// date, type `Fijo`), then the variable expenses (stored date, type
/// `Variable`). Rows follow storage order, not the dashboard's
/// reverse-date view.
pub fn month_csv(month: &Month) -> Result<String, Box<dyn std::error::Error>> {
    let mut writer = WriterBuilder::new().from_writer(vec![]);
    writer.write_record(["Fecha", "Concepto", "Importe", "Tipo"])?;

    for g in &month.fixed {
        let amount = g.amount.to_string();
        writer.write_record(["--/--", g.description.as_str(), &amount, "Fijo"])?;
    }
    for g in &month.variable {
        let amount = g.amount.to_string();
        writer.write_record([g.date.as_str(), g.description.as_str(), &amount, "Variable"])?;
    }

    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{FixedExpense, VariableExpense};
    use rust_decimal::Decimal;

    #[test]
    fn one_fixed_and_one_variable_expense_is_three_lines() {
        let month = Month {
            income: Decimal::from(1000),
            fixed: vec![FixedExpense {
                description: "Alquiler".into(),
                amount: Decimal::from(650),
            }],
            variable: vec![VariableExpense {
                description: "Supermercado".into(),
                amount: Decimal::new(8250, 2),
                date: "05/01".into(),
            }],
        };

        let csv = month_csv(&month).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Fecha,Concepto,Importe,Tipo");
        assert_eq!(lines[1], "--/--,Alquiler,650,Fijo");
        assert_eq!(lines[2], "05/01,Supermercado,82.50,Variable");
    }

    #[test]
    fn export_preserves_storage_order_even_when_dates_are_unsorted() {
        let month = Month {
            income: Decimal::from(1000),
            fixed: vec![],
            variable: vec![
                VariableExpense {
                    description: "later".into(),
                    amount: Decimal::from(10),
                    date: "20/01".into(),
                },
                VariableExpense {
                    description: "earlier".into(),
                    amount: Decimal::from(10),
                    date: "02/01".into(),
                },
            ],
        };

        // dashboard order would put 20/01 first; export must not re-sort
        let csv = month_csv(&month).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[1].starts_with("20/01,later"));
        assert!(lines[2].starts_with("02/01,earlier"));
    }

    #[test]
    fn descriptions_with_commas_are_quoted() {
        let month = Month {
            income: Decimal::from(100),
            fixed: vec![FixedExpense {
                description: "Agua, luz y gas".into(),
                amount: Decimal::from(90),
            }],
            variable: vec![],
        };

        let csv = month_csv(&month).unwrap();
        assert!(csv.contains("\"Agua, luz y gas\""));
    }
}
